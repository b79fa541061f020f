//! Telegram Bot API client
//!
//! Long-polls `getUpdates` and answers with `sendMessage` / `sendDocument`.
//! Only plain text messages are picked up; everything else is skipped.

use std::time::Duration;

use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use url::Url;

use crate::domain::result::{Error, Result};
use crate::ports::{ChatTransport, InboundMessage, Reply, Sender};

/// Default Bot API endpoint
pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Default long-poll timeout in seconds
pub const DEFAULT_POLL_TIMEOUT_SECS: u64 = 30;

/// Envelope every Bot API method answers with
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<TelegramUser>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl TelegramUser {
    /// "First Last", falling back to @username, then the numeric id
    pub fn display_name(&self) -> String {
        let full = match &self.last_name {
            Some(last) if !last.is_empty() => format!("{} {}", self.first_name, last),
            _ => self.first_name.clone(),
        };
        let full = full.trim().to_string();
        if !full.is_empty() {
            return full;
        }
        match &self.username {
            Some(username) if !username.is_empty() => format!("@{}", username),
            _ => self.id.to_string(),
        }
    }
}

impl Update {
    /// Convert to a transport-neutral message; None for non-text updates
    pub fn into_inbound(self) -> Option<InboundMessage> {
        let message = self.message?;
        let text = message.text?;
        let from = message.from?;

        Some(InboundMessage {
            chat_id: message.chat.id.to_string(),
            sender: Sender::new(from.id.to_string(), from.display_name()),
            text,
        })
    }
}

/// Telegram transport over the Bot API
#[derive(Debug)]
pub struct TelegramTransport {
    client: Client,
    /// `<api>/bot<token>`, without trailing slash
    base_url: String,
    poll_timeout: Duration,
    offset: Option<i64>,
}

impl TelegramTransport {
    /// Create a transport for `token` against the default API endpoint
    pub fn new(token: &str) -> Result<Self> {
        Self::with_api_url(token, DEFAULT_API_URL, Duration::from_secs(DEFAULT_POLL_TIMEOUT_SECS))
    }

    /// Create a transport against a custom API endpoint (e.g. a local Bot API server)
    pub fn with_api_url(token: &str, api_url: &str, poll_timeout: Duration) -> Result<Self> {
        let token = token.trim();
        if token.is_empty() {
            return Err(Error::Config("Telegram token is empty".to_string()));
        }

        let base_url = format!("{}/bot{}", api_url.trim_end_matches('/'), token);
        Url::parse(&base_url)
            .map_err(|e| Error::Config(format!("Invalid API URL '{}': {}", api_url, e)))?;

        // The HTTP timeout must outlast the long poll
        let client = Client::builder()
            .timeout(poll_timeout + Duration::from_secs(10))
            .build()
            .map_err(|e| Error::transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            poll_timeout,
            offset: None,
        })
    }

    fn method_url(&self, method: &str) -> Result<Url> {
        Url::parse(&format!("{}/{}", self.base_url, method))
            .map_err(|e| Error::Config(format!("Invalid method '{}': {}", method, e)))
    }

    /// Identify the bot; fails fast on a bad token
    pub fn get_me(&self) -> Result<TelegramUser> {
        let response = self
            .client
            .post(self.method_url("getMe")?)
            .send()
            .map_err(map_request_error)?;
        parse_response(response)
    }

    /// Fetch pending updates, acknowledging everything seen so far
    pub fn get_updates(&mut self) -> Result<Vec<Update>> {
        let mut body = json!({
            "timeout": self.poll_timeout.as_secs(),
            "allowed_updates": ["message"],
        });
        if let Some(offset) = self.offset {
            body["offset"] = json!(offset);
        }

        let response = self
            .client
            .post(self.method_url("getUpdates")?)
            .json(&body)
            .send()
            .map_err(map_request_error)?;
        let updates: Vec<Update> = parse_response(response)?;

        if let Some(last) = updates.iter().map(|u| u.update_id).max() {
            self.offset = Some(last + 1);
        }
        Ok(updates)
    }

    pub fn send_message(&self, chat_id: &str, text: &str) -> Result<()> {
        let response = self
            .client
            .post(self.method_url("sendMessage")?)
            .json(&json!({ "chat_id": chat_id, "text": text }))
            .send()
            .map_err(map_request_error)?;
        parse_response::<serde_json::Value>(response)?;
        Ok(())
    }

    pub fn send_document(
        &self,
        chat_id: &str,
        file_name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<()> {
        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime_type)
            .map_err(|e| Error::transport(format!("Invalid MIME type '{}': {}", mime_type, e)))?;
        let form = Form::new()
            .text("chat_id", chat_id.to_string())
            .part("document", part);

        let response = self
            .client
            .post(self.method_url("sendDocument")?)
            .multipart(form)
            .send()
            .map_err(map_request_error)?;
        parse_response::<serde_json::Value>(response)?;
        Ok(())
    }
}

impl ChatTransport for TelegramTransport {
    fn name(&self) -> &str {
        "telegram"
    }

    fn poll(&mut self) -> Result<Option<Vec<InboundMessage>>> {
        let updates = self.get_updates()?;
        Ok(Some(updates.into_iter().filter_map(Update::into_inbound).collect()))
    }

    fn send(&mut self, chat_id: &str, reply: &Reply) -> Result<()> {
        if !reply.text.is_empty() {
            self.send_message(chat_id, &reply.text)?;
        }
        if let Some(attachment) = &reply.attachment {
            self.send_document(
                chat_id,
                &attachment.file_name,
                &attachment.mime_type,
                attachment.bytes.clone(),
            )?;
        }
        Ok(())
    }
}

/// Map request errors to user-friendly messages
fn map_request_error(error: reqwest::Error) -> Error {
    if error.is_timeout() {
        Error::transport("Telegram request timed out")
    } else if error.is_connect() {
        Error::transport("Unable to connect to the Telegram Bot API")
    } else {
        // reqwest errors can carry the URL, which contains the token
        Error::transport(format!("Telegram request failed: {}", error.without_url()))
    }
}

/// Check response status and unwrap the Bot API envelope
fn parse_response<T: DeserializeOwned>(response: Response) -> Result<T> {
    if matches!(response.status().as_u16(), 401 | 404) {
        return Err(Error::Config(
            "Telegram rejected the bot token. Check the TOKEN environment variable.".to_string(),
        ));
    }

    let status = response.status();
    let envelope: ApiResponse<T> = response.json().map_err(|e| {
        Error::transport(format!(
            "Unexpected Telegram response (HTTP {}): {}",
            status,
            e.without_url()
        ))
    })?;
    unwrap_envelope(envelope, status.as_u16())
}

fn unwrap_envelope<T>(envelope: ApiResponse<T>, status: u16) -> Result<T> {
    if !envelope.ok {
        return Err(Error::transport(format!(
            "Telegram API error (HTTP {}): {}",
            status,
            envelope.description.unwrap_or_else(|| "no description".to_string())
        )));
    }
    envelope
        .result
        .ok_or_else(|| Error::transport("Telegram response without result"))
}
