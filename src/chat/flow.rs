//! Lead-capture conversation.
//!
//! [`ChatFlow`] is a pure state machine: it owns the transcript and the
//! lead, and every accepted input yields exactly one [`Outbound`]
//! persistence request. Delivering that request is the caller's job.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::chat::models::{ChatMessage, Lead, Outbound, PersistRequest};
use crate::chat::services::ServiceCatalog;

pub const GREETING: &str =
    "Hi there! Thanks for stopping by. Which of our services can we help you with today?";
pub const PICK_SERVICE_PROMPT: &str =
    "Thanks for your message! To point you to the right team, please pick one of the services below.";
pub const NAME_PROMPT: &str = "Before we dive in, may I have your name?";
pub const CONTEXT_PROMPT: &str =
    "Is there anything else you'd like us to know about your project?";
pub const COMPLETION_MESSAGES: [&str; 2] = [
    "Thank you! A member of our team will be in touch shortly.",
    "Feel free to keep chatting here if you think of anything else.",
];
pub const ACKNOWLEDGEMENT: &str = "Thanks, we've added that to your enquiry.";
pub const SKIP_LABEL: &str = "Skip";
pub const SKIPPED_NAME: &str = "Skipped name";
pub const SKIPPED_CONTEXT: &str = "Skipped context";
pub const SKIPPED: &str = "Skipped";
pub const NOT_PROVIDED: &str = "Not provided";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChatStep {
    Greeting,
    Service,
    LeadName,
    LeadEmail,
    Context,
    Complete,
}

impl ChatStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatStep::Greeting => "greeting",
            ChatStep::Service => "service",
            ChatStep::LeadName => "lead-name",
            ChatStep::LeadEmail => "lead-email",
            ChatStep::Context => "context",
            ChatStep::Complete => "complete",
        }
    }

    /// Steps where the visitor may skip instead of answering.
    pub fn is_skippable(&self) -> bool {
        matches!(self, ChatStep::LeadName | ChatStep::LeadEmail | ChatStep::Context)
    }

    /// Steps where service chips are shown.
    pub fn offers_services(&self) -> bool {
        matches!(self, ChatStep::Greeting | ChatStep::Service)
    }
}

impl fmt::Display for ChatStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatInput {
    SelectService(String),
    Text(String),
    Skip,
}

impl ChatInput {
    fn kind(&self) -> &'static str {
        match self {
            ChatInput::SelectService(_) => "service selection",
            ChatInput::Text(_) => "text",
            ChatInput::Skip => "skip",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowError {
    #[error("Unknown service: {0}")]
    UnknownService(String),
    #[error("Message is empty")]
    EmptyMessage,
    #[error("Cannot accept {input} at step {step}")]
    UnexpectedInput { step: ChatStep, input: &'static str },
}

#[derive(Debug, Clone)]
pub struct ChatFlow {
    step: ChatStep,
    lead: Lead,
    transcript: Vec<ChatMessage>,
    catalog: Arc<ServiceCatalog>,
    page_url: Option<String>,
}

impl ChatFlow {
    pub fn new(catalog: Arc<ServiceCatalog>, page_url: Option<String>) -> Self {
        Self {
            step: ChatStep::Greeting,
            lead: Lead::default(),
            transcript: vec![ChatMessage::bot(GREETING)],
            catalog,
            page_url,
        }
    }

    pub fn step(&self) -> ChatStep {
        self.step
    }

    pub fn lead(&self) -> &Lead {
        &self.lead
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    pub fn catalog(&self) -> &ServiceCatalog {
        &self.catalog
    }

    /// Applies one visitor action. On error nothing changes.
    pub fn handle(&mut self, input: ChatInput) -> Result<Outbound, FlowError> {
        match self.step {
            ChatStep::Greeting | ChatStep::Service => match input {
                ChatInput::SelectService(name) => self.select_service(&name),
                ChatInput::Text(text) => self.free_text(&text),
                other @ ChatInput::Skip => Err(self.unexpected(&other)),
            },
            ChatStep::LeadName => {
                let name = self.answer(input)?;
                Ok(self.record_name(name))
            }
            ChatStep::LeadEmail => {
                let email = self.answer(input)?;
                Ok(self.record_email(email))
            }
            ChatStep::Context => {
                let context = self.answer(input)?;
                Ok(self.record_context(context))
            }
            ChatStep::Complete => match input {
                ChatInput::Text(text) | ChatInput::SelectService(text) => self.follow_up(&text),
                ChatInput::Skip => Ok(self.skipped_follow_up()),
            },
        }
    }

    fn unexpected(&self, input: &ChatInput) -> FlowError {
        FlowError::UnexpectedInput {
            step: self.step,
            input: input.kind(),
        }
    }

    /// Normalises an answer at a lead step: blank text counts as a skip.
    fn answer(&self, input: ChatInput) -> Result<Option<String>, FlowError> {
        match input {
            ChatInput::Text(text) => {
                let trimmed = text.trim();
                Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
            }
            ChatInput::Skip => Ok(None),
            other => Err(self.unexpected(&other)),
        }
    }

    fn push_user(&mut self, text: &str) -> ChatMessage {
        let message = ChatMessage::user(text);
        self.transcript.push(message.clone());
        message
    }

    fn push_bot(&mut self, text: impl Into<String>) {
        self.transcript.push(ChatMessage::bot(text));
    }

    fn outbound(&self, user: &ChatMessage, mut request: PersistRequest) -> Outbound {
        request.page_url = self.page_url.clone();
        Outbound {
            message_id: user.id,
            request,
        }
    }

    fn select_service(&mut self, name: &str) -> Result<Outbound, FlowError> {
        let entry = self
            .catalog
            .find(name)
            .cloned()
            .ok_or_else(|| FlowError::UnknownService(name.trim().to_string()))?;

        let user = self.push_user(&entry.name);
        self.push_bot(entry.intro.clone());
        for question in &entry.follow_ups {
            self.push_bot(question.clone());
        }
        self.push_bot(NAME_PROMPT);

        self.lead.service = entry.name.clone();
        self.step = ChatStep::LeadName;
        Ok(self.outbound(&user, PersistRequest::user(entry.name)))
    }

    fn free_text(&mut self, text: &str) -> Result<Outbound, FlowError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(FlowError::EmptyMessage);
        }

        let user = self.push_user(text);
        self.push_bot(PICK_SERVICE_PROMPT);
        self.step = ChatStep::Service;
        Ok(self.outbound(&user, PersistRequest::user(text)))
    }

    fn record_name(&mut self, name: Option<String>) -> Outbound {
        let user = self.push_user(name.as_deref().unwrap_or(SKIP_LABEL));
        let prompt = match &name {
            Some(name) => format!("Nice to meet you, {name}! What's the best email address to reach you?"),
            None => "No problem. What's the best email address to reach you?".to_string(),
        };
        self.push_bot(prompt);

        let mut request = PersistRequest::user(name.as_deref().unwrap_or(SKIPPED_NAME));
        request.name = name.clone();
        self.lead.name = name;
        self.step = ChatStep::LeadEmail;
        self.outbound(&user, request)
    }

    fn record_email(&mut self, email: Option<String>) -> Outbound {
        let user = self.push_user(email.as_deref().unwrap_or(SKIP_LABEL));
        self.push_bot(CONTEXT_PROMPT);

        self.lead.email = email;
        let mut request = PersistRequest::user(lead_summary(&self.lead));
        request.name = self.lead.name.clone();
        request.email = self.lead.email.clone();
        self.step = ChatStep::Context;
        self.outbound(&user, request)
    }

    fn record_context(&mut self, context: Option<String>) -> Outbound {
        let user = self.push_user(context.as_deref().unwrap_or(SKIP_LABEL));
        for line in COMPLETION_MESSAGES {
            self.push_bot(line);
        }

        let mut request = PersistRequest::user(context.as_deref().unwrap_or(SKIPPED_CONTEXT));
        request.session_complete = Some(true);
        self.lead.context = context;
        self.step = ChatStep::Complete;
        self.outbound(&user, request)
    }

    fn follow_up(&mut self, text: &str) -> Result<Outbound, FlowError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(FlowError::EmptyMessage);
        }

        let user = self.push_user(text);
        self.push_bot(ACKNOWLEDGEMENT);
        Ok(self.outbound(&user, PersistRequest::user(text)))
    }

    fn skipped_follow_up(&mut self) -> Outbound {
        let user = self.push_user(SKIP_LABEL);
        self.push_bot(ACKNOWLEDGEMENT);
        self.outbound(&user, PersistRequest::user(SKIPPED))
    }
}

/// The message persisted once the contact details are known.
pub fn lead_summary(lead: &Lead) -> String {
    format!(
        "Lead captured - Service: {}, Name: {}, Email: {}",
        lead.service,
        lead.name.as_deref().unwrap_or(NOT_PROVIDED),
        lead.email.as_deref().unwrap_or(NOT_PROVIDED),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::models::Sender;

    fn flow() -> ChatFlow {
        ChatFlow::new(Arc::new(ServiceCatalog::default()), Some("/home".into()))
    }

    #[test]
    fn starts_with_greeting() {
        let flow = flow();
        assert_eq!(flow.step(), ChatStep::Greeting);
        assert_eq!(flow.transcript().len(), 1);
        assert_eq!(flow.transcript()[0].sender, Sender::Bot);
        assert_eq!(flow.transcript()[0].text, GREETING);
    }

    #[test]
    fn free_text_asks_for_a_service() {
        let mut flow = flow();
        let out = flow.handle(ChatInput::Text("hello?".into())).unwrap();

        assert_eq!(flow.step(), ChatStep::Service);
        assert_eq!(out.request.message, "hello?");
        assert_eq!(out.request.page_url.as_deref(), Some("/home"));
        assert!(flow.lead().service.is_empty());
        assert_eq!(flow.transcript().last().unwrap().text, PICK_SERVICE_PROMPT);
    }

    #[test]
    fn rejected_input_changes_nothing() {
        let mut flow = flow();
        let before = flow.transcript().to_vec();

        assert_eq!(
            flow.handle(ChatInput::SelectService("Plumbing".into())),
            Err(FlowError::UnknownService("Plumbing".into()))
        );
        assert_eq!(flow.handle(ChatInput::Text("   ".into())), Err(FlowError::EmptyMessage));
        assert!(matches!(
            flow.handle(ChatInput::Skip),
            Err(FlowError::UnexpectedInput { step: ChatStep::Greeting, .. })
        ));

        assert_eq!(flow.transcript(), before.as_slice());
        assert_eq!(flow.step(), ChatStep::Greeting);
    }

    #[test]
    fn outbound_points_at_the_user_entry() {
        let mut flow = flow();
        let out = flow.handle(ChatInput::SelectService("IT Services".into())).unwrap();
        let entry = flow
            .transcript()
            .iter()
            .find(|m| m.id == out.message_id)
            .unwrap();
        assert_eq!(entry.sender, Sender::User);
        assert_eq!(entry.text, "IT Services");
    }

    #[test]
    fn name_step_sends_name_metadata() {
        let mut flow = flow();
        flow.handle(ChatInput::SelectService("Digital Marketing".into())).unwrap();

        let out = flow.handle(ChatInput::Text(" Sam ".into())).unwrap();
        assert_eq!(out.request.message, "Sam");
        assert_eq!(out.request.name.as_deref(), Some("Sam"));
        assert_eq!(flow.step(), ChatStep::LeadEmail);
    }

    #[test]
    fn email_step_sends_lead_summary() {
        let mut flow = flow();
        flow.handle(ChatInput::SelectService("IT Services".into())).unwrap();
        flow.handle(ChatInput::Skip).unwrap();

        let out = flow.handle(ChatInput::Text("ops@example.com".into())).unwrap();
        assert_eq!(
            out.request.message,
            "Lead captured - Service: IT Services, Name: Not provided, Email: ops@example.com"
        );
        assert_eq!(out.request.name, None);
        assert_eq!(out.request.email.as_deref(), Some("ops@example.com"));
        assert_eq!(flow.step(), ChatStep::Context);
    }

    #[test]
    fn context_step_completes_the_session() {
        let mut flow = flow();
        flow.handle(ChatInput::SelectService("IT Services".into())).unwrap();
        flow.handle(ChatInput::Skip).unwrap();
        flow.handle(ChatInput::Skip).unwrap();

        let out = flow.handle(ChatInput::Skip).unwrap();
        assert_eq!(out.request.message, SKIPPED_CONTEXT);
        assert_eq!(out.request.session_complete, Some(true));
        assert_eq!(flow.step(), ChatStep::Complete);

        let tail: Vec<&str> = flow.transcript().iter().rev().take(2).map(|m| m.text.as_str()).collect();
        assert_eq!(tail, vec![COMPLETION_MESSAGES[1], COMPLETION_MESSAGES[0]]);
    }

    #[test]
    fn complete_loops_on_itself() {
        let mut flow = flow();
        flow.handle(ChatInput::SelectService("IT Services".into())).unwrap();
        for _ in 0..3 {
            flow.handle(ChatInput::Skip).unwrap();
        }

        let out = flow.handle(ChatInput::Text("One more thing".into())).unwrap();
        assert_eq!(out.request.message, "One more thing");
        assert_eq!(out.request.session_complete, None);
        assert_eq!(flow.step(), ChatStep::Complete);
        assert_eq!(flow.transcript().last().unwrap().text, ACKNOWLEDGEMENT);
    }

    #[test]
    fn complete_accepts_any_input() {
        let mut flow = flow();
        flow.handle(ChatInput::SelectService("IT Services".into())).unwrap();
        for _ in 0..3 {
            flow.handle(ChatInput::Skip).unwrap();
        }

        let out = flow.handle(ChatInput::Skip).unwrap();
        assert_eq!(out.request.message, SKIPPED);
        assert_eq!(flow.step(), ChatStep::Complete);
        let entry = flow.transcript().iter().find(|m| m.id == out.message_id).unwrap();
        assert_eq!(entry.text, SKIP_LABEL);

        let out = flow.handle(ChatInput::SelectService("Digital Marketing".into())).unwrap();
        assert_eq!(out.request.message, "Digital Marketing");
        assert_eq!(flow.step(), ChatStep::Complete);
        assert_eq!(flow.lead().service, "IT Services");
        assert_eq!(flow.transcript().last().unwrap().text, ACKNOWLEDGEMENT);

        assert_eq!(flow.handle(ChatInput::Text(" ".into())), Err(FlowError::EmptyMessage));
    }
}
