//! Chat transport port
//!
//! The transport is an opaque source of inbound messages and a sink for
//! replies. Telegram and the local console are the two implementations.

use crate::domain::result::Result;

/// The person who sent a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub id: String,
    pub display_name: String,
}

impl Sender {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

/// A text message received from the chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Where the reply goes
    pub chat_id: String,
    pub sender: Sender,
    pub text: String,
}

/// A file sent alongside a reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// What the bot answers with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub attachment: Option<Attachment>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attachment: None,
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }
}

/// Chat transport trait
pub trait ChatTransport {
    /// Transport name (e.g., "telegram", "console")
    fn name(&self) -> &str;

    /// Wait for the next batch of messages.
    ///
    /// Returns `None` once the transport is closed and no more messages
    /// will arrive. An empty batch is not a close (e.g. long-poll timeout).
    fn poll(&mut self) -> Result<Option<Vec<InboundMessage>>>;

    /// Deliver a reply to a chat
    fn send(&mut self, chat_id: &str, reply: &Reply) -> Result<()>;
}
