//! Outbound message model and factory.
//!
//! [`OutboundMessage`] is the item type held by the delivery queue. Each
//! variant carries its own [`ItemHeader`](crate::queue::ItemHeader) and is
//! identified by a [`MessageKind`].

mod factory;
mod types;

pub use factory::{MessageFactory, MessageOptions};
pub use types::{
    BodyType, EmailMessage, GenericMessage, MailAddress, MessageKind, OutboundMessage, Priority,
    DEFAULT_HTML_CONTENT_TYPE, DEFAULT_TEXT_CONTENT_TYPE,
};

use thiserror::Error;

use crate::template::TemplateError;

/// Errors raised while building a message
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("No sender address given and no default sender configured")]
    MissingSender,

    #[error("At least one recipient is required")]
    NoRecipients,

    #[error(transparent)]
    Template(#[from] TemplateError),
}
