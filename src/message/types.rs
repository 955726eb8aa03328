use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::queue::{ItemHeader, QueueItem};

pub const DEFAULT_TEXT_CONTENT_TYPE: &str = "text/plain";
pub const DEFAULT_HTML_CONTENT_TYPE: &str = "text/html";

/// Discriminator for the payload carried by an [`OutboundMessage`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Email,
    Generic,
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Email => write!(f, "email"),
            Self::Generic => write!(f, "generic"),
        }
    }
}

/// Kind of content held in a message body
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum BodyType {
    Text,
    Html,
    Other,
}

/// Delivery priority hint passed to the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

/// A mailbox: address plus optional display name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailAddress {
    pub address: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display_name: String,
}

impl MailAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            display_name: String::new(),
        }
    }

    pub fn with_name(address: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            display_name: display_name.into(),
        }
    }
}

impl std::fmt::Display for MailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.display_name.is_empty() {
            write!(f, "{}", self.address)
        } else {
            write!(f, "{} <{}>", self.display_name, self.address)
        }
    }
}

/// An email awaiting delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    /// Queue bookkeeping
    #[serde(flatten)]
    pub header: ItemHeader,
    pub from: MailAddress,
    pub recipients: Vec<MailAddress>,
    pub subject: String,
    /// Bodies keyed by content kind
    #[serde(default)]
    pub bodies: BTreeMap<BodyType, String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default = "default_text_content_type")]
    pub text_content_type: String,
    #[serde(default = "default_html_content_type")]
    pub html_content_type: String,
    /// Whether recipients can see each other (To vs. Bcc)
    #[serde(default)]
    pub recipients_visible: bool,
}

fn default_text_content_type() -> String {
    DEFAULT_TEXT_CONTENT_TYPE.to_string()
}

fn default_html_content_type() -> String {
    DEFAULT_HTML_CONTENT_TYPE.to_string()
}

impl EmailMessage {
    pub fn new(from: MailAddress, recipients: Vec<MailAddress>, subject: impl Into<String>) -> Self {
        Self {
            header: ItemHeader::new(),
            from,
            recipients,
            subject: subject.into(),
            bodies: BTreeMap::new(),
            priority: Priority::default(),
            text_content_type: default_text_content_type(),
            html_content_type: default_html_content_type(),
            recipients_visible: false,
        }
    }

    /// Set the plain text body. Empty bodies are not stored.
    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.set_body(BodyType::Text, body.into());
        self
    }

    /// Set the HTML body. Empty bodies are not stored.
    pub fn html(mut self, body: impl Into<String>) -> Self {
        self.set_body(BodyType::Html, body.into());
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn recipients_visible(mut self, visible: bool) -> Self {
        self.recipients_visible = visible;
        self
    }

    pub fn content_types(mut self, text: impl Into<String>, html: impl Into<String>) -> Self {
        self.text_content_type = text.into();
        self.html_content_type = html.into();
        self
    }

    fn set_body(&mut self, body_type: BodyType, body: String) {
        if body.is_empty() {
            self.bodies.remove(&body_type);
        } else {
            self.bodies.insert(body_type, body);
        }
    }

    pub fn is_html(&self) -> bool {
        self.bodies.contains_key(&BodyType::Html)
    }

    pub fn text_body(&self) -> Option<&str> {
        self.bodies.get(&BodyType::Text).map(String::as_str)
    }

    pub fn html_body(&self) -> Option<&str> {
        self.bodies.get(&BodyType::Html).map(String::as_str)
    }
}

impl QueueItem for EmailMessage {
    fn header(&self) -> &ItemHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut ItemHeader {
        &mut self.header
    }
}

/// Non-email work placed on the shared queue by other producers.
///
/// The email pipeline cannot deliver or persist these; they exist so the
/// queue stays honest about what it holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericMessage {
    #[serde(flatten)]
    pub header: ItemHeader,
    /// Producer-defined channel name (e.g. "sms", "webhook")
    pub channel: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl GenericMessage {
    pub fn new(channel: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            header: ItemHeader::new(),
            channel: channel.into(),
            payload,
        }
    }
}

/// Everything the outbound queue can hold, tagged by [`MessageKind`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum OutboundMessage {
    Email(EmailMessage),
    Generic(GenericMessage),
}

impl OutboundMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Email(_) => MessageKind::Email,
            Self::Generic(_) => MessageKind::Generic,
        }
    }

    pub fn as_email(&self) -> Option<&EmailMessage> {
        match self {
            Self::Email(message) => Some(message),
            _ => None,
        }
    }
}

impl QueueItem for OutboundMessage {
    fn header(&self) -> &ItemHeader {
        match self {
            Self::Email(message) => &message.header,
            Self::Generic(message) => &message.header,
        }
    }

    fn header_mut(&mut self) -> &mut ItemHeader {
        match self {
            Self::Email(message) => &mut message.header,
            Self::Generic(message) => &mut message.header,
        }
    }
}

impl From<EmailMessage> for OutboundMessage {
    fn from(message: EmailMessage) -> Self {
        Self::Email(message)
    }
}

impl From<GenericMessage> for OutboundMessage {
    fn from(message: GenericMessage) -> Self {
        Self::Generic(message)
    }
}
