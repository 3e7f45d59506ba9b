use clap::{Parser, Subcommand, ValueEnum};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "sitedesk", version, about = "Marketing site console and chat backend", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Override the config file path globally
    #[arg(short, long, global = true, default_value = "config.yaml")]
    pub config: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the local REST backend
    Serve,

    /// Talk to the lead-capture chat from the terminal
    Chat {
        /// Page the conversation is attributed to
        #[arg(long)]
        page_url: Option<String>,
    },

    /// Store the admin bearer token used by the other commands
    Login {
        #[arg(short, long)]
        token: String,
    },

    /// Forget the stored admin token
    Logout,

    /// Manage CMS records
    Admin {
        #[arg(value_enum)]
        collection: CollectionArg,

        #[command(subcommand)]
        action: AdminAction,
    },

    /// Browse captured chat transcripts
    Sessions {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// Inspect or resend chat messages that could not be delivered
    Outbox {
        #[command(subcommand)]
        action: OutboxAction,
    },

    /// Print a marketing page with its CMS override applied
    Page {
        slug: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CollectionArg {
    Pages,
    HeroTexts,
    Products,
    Crm,
    Settings,
}

#[derive(Subcommand)]
pub enum AdminAction {
    /// List every record
    List,

    /// Show one record
    Get {
        id: String,
    },

    /// Create a record from JSON (inline, or @path to read a file)
    Create {
        #[arg(short, long)]
        data: String,
    },

    /// Replace a record with JSON (inline, or @path to read a file)
    Update {
        id: String,
        #[arg(short, long)]
        data: String,
    },

    /// Delete a record
    Delete {
        id: String,
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum SessionAction {
    /// List recent chat sessions
    List {
        #[arg(short, long, default_value_t = 50)]
        limit: usize,
    },

    /// Show the transcript of one session
    Show {
        id: Uuid,
    },
}

#[derive(Subcommand)]
pub enum OutboxAction {
    /// List parked messages
    List,

    /// Try to deliver every parked message again
    Replay,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_admin_delete() {
        let cli = Cli::try_parse_from(["sitedesk", "admin", "hero-texts", "delete", "42", "--yes"]).unwrap();
        match cli.command {
            Commands::Admin { collection, action: AdminAction::Delete { id, yes } } => {
                assert_eq!(collection, CollectionArg::HeroTexts);
                assert_eq!(id, "42");
                assert!(yes);
            }
            _ => panic!("expected admin delete"),
        }
        assert_eq!(cli.config, "config.yaml");
    }

    #[test]
    fn global_config_flag() {
        let cli = Cli::try_parse_from(["sitedesk", "chat", "--config", "dev.yaml", "--page-url", "/pricing"]).unwrap();
        assert_eq!(cli.config, "dev.yaml");
        assert!(matches!(cli.command, Commands::Chat { page_url: Some(ref p) } if p == "/pricing"));
    }
}
