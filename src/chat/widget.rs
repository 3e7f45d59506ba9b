use std::sync::Arc;

use uuid::Uuid;

use crate::chat::flow::{ChatFlow, ChatInput, ChatStep, FlowError};
use crate::chat::models::{Lead, TranscriptEntry};
use crate::chat::outbox::{ChatTransport, DeadLetterSink, DeliverySummary, Outbox, RetryPolicy};
use crate::chat::services::ServiceCatalog;
use crate::config::ChatConfig;

/// The floating chat box: conversation state plus delivery of what the
/// visitor types. Submitting never waits on the network.
pub struct ChatWidget {
    flow: ChatFlow,
    outbox: Outbox,
}

impl ChatWidget {
    pub fn new(flow: ChatFlow, outbox: Outbox) -> Self {
        Self { flow, outbox }
    }

    pub fn from_config(
        config: &ChatConfig,
        transport: Arc<dyn ChatTransport>,
        sink: Option<Arc<dyn DeadLetterSink>>,
    ) -> Self {
        let catalog = ServiceCatalog::from_config(config.services.as_deref());
        let flow = ChatFlow::new(Arc::new(catalog), config.page_url.clone());
        let outbox = Outbox::spawn_with_sink(transport, RetryPolicy::from_config(&config.retry), sink);
        Self::new(flow, outbox)
    }

    pub fn submit(&mut self, input: ChatInput) -> Result<ChatStep, FlowError> {
        let outbound = self.flow.handle(input)?;
        self.outbox.enqueue(outbound);
        Ok(self.flow.step())
    }

    pub fn step(&self) -> ChatStep {
        self.flow.step()
    }

    pub fn lead(&self) -> &Lead {
        self.flow.lead()
    }

    pub fn catalog(&self) -> &ServiceCatalog {
        self.flow.catalog()
    }

    pub fn transcript(&self) -> Vec<TranscriptEntry> {
        self.flow
            .transcript()
            .iter()
            .map(|message| TranscriptEntry {
                delivery: self.outbox.status(&message.id),
                message: message.clone(),
            })
            .collect()
    }

    pub fn session_id(&self) -> Option<String> {
        self.outbox.session_id()
    }

    pub fn conversation_id(&self) -> Uuid {
        self.outbox.conversation_id()
    }

    pub fn delivery_summary(&self) -> DeliverySummary {
        self.outbox.summary()
    }

    pub async fn flush(&self) {
        self.outbox.flush().await;
    }

    /// Waits for queued deliveries to settle and stops the outbox.
    pub async fn close(self) -> DeliverySummary {
        self.outbox.flush().await;
        let summary = self.outbox.summary();
        self.outbox.shutdown().await;
        summary
    }
}
