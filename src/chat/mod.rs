pub mod flow;
pub mod models;
pub mod outbox;
pub mod services;
pub mod widget;

pub use flow::{ChatFlow, ChatInput, ChatStep, FlowError};
pub use models::{ChatMessage, DeliveryStatus, Lead, Outbound, PersistAck, PersistRequest, Sender, TranscriptEntry};
pub use outbox::{ChatTransport, DeadLetter, DeadLetterSink, DeliverySummary, Outbox, RetryPolicy};
pub use services::{ServiceCatalog, ServiceEntry};
pub use widget::ChatWidget;
