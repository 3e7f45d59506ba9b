pub mod commands;

use std::io::{self, Write};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::chat::{ChatInput, ChatWidget, DeadLetterSink, Sender};
use crate::cli::commands::{AdminAction, CollectionArg, Commands, OutboxAction, SessionAction};
use crate::client::{ApiClient, ApiError, AuthContext};
use crate::cms::content::default_page;
use crate::cms::{Collection, ContentResolver, CrmLead, HeroText, HttpRepository, Page, PageView, Product, Repository, Resource, Setting};
use crate::config::{AppConfig, DatabaseConfig};
use crate::db::{self, service::DbService, ChatSession, ChatTranscript, DbDeadLetterSink};

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("Database error: {0}")]
    Db(#[from] duckdb::Error),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Invalid(String),
}

pub async fn run_cli(command: Commands, config_path: String) -> Result<(), CliError> {
    let config = AppConfig::load(&config_path)?;

    match command {
        Commands::Serve => Err(CliError::Invalid(
            "serve is handled by the server entry point".to_string(),
        )),
        Commands::Chat { page_url } => run_chat(config, page_url).await,
        Commands::Login { token } => {
            let auth = auth_context(&config);
            auth.login(token.trim())?;
            println!("Token stored.");
            Ok(())
        }
        Commands::Logout => {
            auth_context(&config).logout()?;
            println!("Logged out.");
            Ok(())
        }
        Commands::Admin { collection, action } => {
            let client = admin_client(&config)?;
            match collection {
                CollectionArg::Pages => run_admin::<Page>(client, action).await,
                CollectionArg::HeroTexts => run_admin::<HeroText>(client, action).await,
                CollectionArg::Products => run_admin::<Product>(client, action).await,
                CollectionArg::Crm => run_admin::<CrmLead>(client, action).await,
                CollectionArg::Settings => run_admin::<Setting>(client, action).await,
            }
        }
        Commands::Sessions { action } => run_sessions(admin_client(&config)?, action).await,
        Commands::Outbox { action } => run_outbox(&config, action).await,
        Commands::Page { slug } => {
            let client = admin_client(&config)?;
            let resolver = ContentResolver::new(Arc::new(HttpRepository::<Page>::new(client)));
            let fallback = default_page(&slug).unwrap_or_else(|| PageView {
                slug: slug.clone(),
                title: slug.clone(),
                content: serde_json::json!({}),
                overridden: false,
            });
            print_json(&resolver.resolve(fallback).await)
        }
    }
}

fn auth_context(config: &AppConfig) -> AuthContext {
    match &config.api.token_file {
        Some(path) => AuthContext::load(path),
        None => AuthContext::in_memory(),
    }
}

fn admin_client(config: &AppConfig) -> Result<ApiClient, CliError> {
    Ok(ApiClient::new(&config.api, auth_context(config))?)
}

fn outbox_store(config: &DatabaseConfig) -> Result<db::DbPool, CliError> {
    let local = DatabaseConfig {
        path: config.outbox_path.clone(),
        outbox_path: config.outbox_path.clone(),
    };
    Ok(db::get_connection(&local)?)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Accepts inline JSON or `@path` to read it from a file.
fn read_data(arg: &str) -> Result<serde_json::Value, CliError> {
    let raw = match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)?,
        None => arg.to_string(),
    };
    Ok(serde_json::from_str(&raw)?)
}

fn confirm(question: &str) -> Result<bool, CliError> {
    print!("{question} [y/N] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

// --- Admin ---

async fn run_admin<T: Resource>(client: ApiClient, action: AdminAction) -> Result<(), CliError> {
    let repo: Arc<dyn Repository<T>> = Arc::new(HttpRepository::<T>::new(client));
    let screen = Collection::new(repo.clone());

    match action {
        AdminAction::List => {
            screen.refresh().await?;
        }
        AdminAction::Get { id } => {
            return print_json(&repo.get(&id).await?);
        }
        AdminAction::Create { data } => {
            let mut value = read_data(&data)?;
            if let Some(map) = value.as_object_mut() {
                map.remove("id");
                map.remove("_id");
            }
            let item: T = serde_json::from_value(value)?;
            screen.save(&item).await?;
        }
        AdminAction::Update { id, data } => {
            let mut value = read_data(&data)?;
            let map = value
                .as_object_mut()
                .ok_or_else(|| CliError::Invalid("record must be a JSON object".to_string()))?;
            map.insert("id".to_string(), serde_json::Value::String(id));
            let item: T = serde_json::from_value(value)?;
            screen.save(&item).await?;
        }
        AdminAction::Delete { id, yes } => {
            if !yes && !confirm(&format!("Delete {} record {}?", T::COLLECTION, id))? {
                println!("Aborted.");
                return Ok(());
            }
            screen.remove(&id).await?;
        }
    }

    print_json(&screen.items())
}

// --- Transcripts ---

async fn run_sessions(client: ApiClient, action: SessionAction) -> Result<(), CliError> {
    match action {
        SessionAction::List { limit } => {
            let sessions: Vec<ChatSession> = client
                .get(&format!("/chat/sessions?limit={limit}"))
                .await
                .into_result()?
                .unwrap_or_default();

            if sessions.is_empty() {
                println!("No sessions found.");
                return Ok(());
            }
            println!("{:<38} | {:<20} | {:<8} | {}", "ID", "Updated At", "Complete", "Lead");
            println!("{:-<38}-+-{:-<20}-+-{:-<8}-+-{:-<20}", "", "", "", "");
            for s in sessions {
                let lead = match (&s.name, &s.email) {
                    (Some(name), Some(email)) => format!("{name} <{email}>"),
                    (Some(name), None) => name.clone(),
                    (None, Some(email)) => email.clone(),
                    (None, None) => "-".to_string(),
                };
                println!(
                    "{:<38} | {:<20} | {:<8} | {}",
                    s.id.to_string(),
                    s.updated_at.format("%Y-%m-%d %H:%M:%S"),
                    if s.completed { "yes" } else { "no" },
                    lead
                );
            }
            Ok(())
        }
        SessionAction::Show { id } => {
            let transcript: ChatTranscript = client.get(&format!("/chat/sessions/{id}")).await.into_data()?;
            println!("Session: {}", transcript.session.id);
            if let Some(page) = &transcript.session.page_url {
                println!("Page: {page}");
            }
            println!("---");
            for m in transcript.messages {
                println!("[{}]: {}", m.sender.to_uppercase(), m.content);
            }
            Ok(())
        }
    }
}

// --- Dead letters ---

async fn run_outbox(config: &AppConfig, action: OutboxAction) -> Result<(), CliError> {
    let pool = outbox_store(&config.database)?;

    match action {
        OutboxAction::List => {
            let letters = {
                let conn = pool.lock().unwrap_or_else(|e| e.into_inner());
                DbService::list_dead_letters(&conn)?
            };
            if letters.is_empty() {
                println!("Outbox is empty.");
                return Ok(());
            }
            println!("{:<6} | {:<38} | {:<8} | {:<40} | {}", "ID", "Session", "Attempts", "Message", "Error");
            println!("{:-<6}-+-{:-<38}-+-{:-<8}-+-{:-<40}-+-{:-<20}", "", "", "", "", "");
            for letter in letters {
                let message: String = letter.payload["message"]
                    .as_str()
                    .unwrap_or_default()
                    .chars()
                    .take(40)
                    .collect();
                println!(
                    "{:<6} | {:<38} | {:<8} | {:<40} | {}",
                    letter.id,
                    letter.session_id.as_deref().unwrap_or("-"),
                    letter.attempts,
                    message,
                    letter.error
                );
            }
            Ok(())
        }
        OutboxAction::Replay => {
            let client = ApiClient::new(&config.api, AuthContext::in_memory())?;
            let summary = db::replay_dead_letters(&pool, &client).await?;

            println!(
                "Replay finished: {} delivered, {} remaining, {} unreadable.",
                summary.delivered, summary.remaining, summary.skipped
            );
            Ok(())
        }
    }
}

// --- Chat ---

/// Maps a line typed at the prompt to a flow input. Numbers and service
/// names pick a chip while chips are on screen.
pub fn parse_chat_input(widget: &ChatWidget, line: &str) -> ChatInput {
    let text = line.trim();
    if text.eq_ignore_ascii_case("/skip") {
        return ChatInput::Skip;
    }

    if widget.step().offers_services() {
        let names: Vec<&str> = widget.catalog().names().collect();
        if let Ok(n) = text.parse::<usize>() {
            if let Some(name) = n.checked_sub(1).and_then(|i| names.get(i)) {
                return ChatInput::SelectService(name.to_string());
            }
        }
        if let Some(entry) = widget.catalog().find(text) {
            return ChatInput::SelectService(entry.name.clone());
        }
    }

    ChatInput::Text(text.to_string())
}

fn print_new_bot_lines(widget: &ChatWidget, shown: usize) -> usize {
    let transcript = widget.transcript();
    for entry in transcript.iter().skip(shown) {
        if entry.message.sender == Sender::Bot {
            println!("Bot> {}", entry.message.text);
        }
    }
    transcript.len()
}

async fn run_chat(config: AppConfig, page_url: Option<String>) -> Result<(), CliError> {
    let client = ApiClient::new(&config.api, AuthContext::in_memory())?;
    let sink: Arc<dyn DeadLetterSink> = Arc::new(DbDeadLetterSink::new(outbox_store(&config.database)?));

    let mut chat_config = config.chat.clone();
    if page_url.is_some() {
        chat_config.page_url = page_url;
    }

    let mut widget = ChatWidget::from_config(&chat_config, Arc::new(client), Some(sink));

    println!("--- Sitedesk Chat ---");
    println!("Pick a service by number, /skip to skip a question, /exit to quit.");
    println!("---------------------");

    let mut shown = print_new_bot_lines(&widget, 0);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        if widget.step().offers_services() {
            for (i, name) in widget.catalog().names().enumerate() {
                println!("  [{}] {}", i + 1, name);
            }
        }

        print!("\nYou> ");
        io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let text = line.trim();
        if text == "/exit" || text == "/quit" {
            break;
        }
        if text.is_empty() && !widget.step().is_skippable() {
            continue;
        }

        let input = parse_chat_input(&widget, text);
        if let Err(e) = widget.submit(input) {
            println!("! {e}");
            continue;
        }
        shown = print_new_bot_lines(&widget, shown);
    }

    let summary = widget.close().await;

    println!(
        "\nDelivered {} message(s), {} failed, {} pending.",
        summary.sent, summary.failed, summary.pending
    );
    if summary.failed > 0 {
        println!("Undelivered messages were parked; run `sitedesk outbox replay` to resend them.");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{ChatFlow, Outbox, RetryPolicy, ServiceCatalog};

    fn widget() -> ChatWidget {
        let client = ApiClient::with_base_url("http://127.0.0.1:9", AuthContext::in_memory()).unwrap();
        let flow = ChatFlow::new(Arc::new(ServiceCatalog::default()), None);
        ChatWidget::new(flow, Outbox::spawn(Arc::new(client), RetryPolicy::no_retry()))
    }

    #[tokio::test]
    async fn numbers_and_names_pick_services() {
        let widget = widget();
        assert_eq!(parse_chat_input(&widget, "2"), ChatInput::SelectService("E-commerce Services".into()));
        assert_eq!(parse_chat_input(&widget, "digital marketing"), ChatInput::SelectService("Digital Marketing".into()));
        assert_eq!(parse_chat_input(&widget, "9"), ChatInput::Text("9".into()));
        assert_eq!(parse_chat_input(&widget, " /SKIP "), ChatInput::Skip);
    }

    #[tokio::test]
    async fn names_are_plain_text_after_the_service_step() {
        let mut widget = widget();
        widget.submit(ChatInput::SelectService("IT Services".into())).unwrap();
        assert_eq!(parse_chat_input(&widget, "1"), ChatInput::Text("1".into()));
        assert_eq!(parse_chat_input(&widget, "IT Services"), ChatInput::Text("IT Services".into()));
    }

    #[test]
    fn inline_and_file_data() {
        assert_eq!(read_data(r#"{"name":"Audit"}"#).unwrap()["name"], "Audit");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.json");
        std::fs::write(&path, r#"{"slug":"home"}"#).unwrap();
        assert_eq!(read_data(&format!("@{}", path.display())).unwrap()["slug"], "home");
        assert!(matches!(read_data("{oops"), Err(CliError::Json(_))));
    }
}
