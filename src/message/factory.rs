//! Builds email messages from raw bodies or from templates.

use std::collections::HashMap;

use crate::config::Settings;
use crate::template::{replace_tokens, TemplateLoader};

use super::types::{EmailMessage, MailAddress, DEFAULT_HTML_CONTENT_TYPE, DEFAULT_TEXT_CONTENT_TYPE};
use super::MessageError;

/// Delivery options applied to every message a factory creates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageOptions {
    /// Whether recipients see each other; otherwise each gets their own copy
    pub recipients_visible: bool,
    pub text_content_type: String,
    pub html_content_type: String,
}

impl Default for MessageOptions {
    fn default() -> Self {
        Self {
            recipients_visible: false,
            text_content_type: DEFAULT_TEXT_CONTENT_TYPE.to_string(),
            html_content_type: DEFAULT_HTML_CONTENT_TYPE.to_string(),
        }
    }
}

/// Producer-side factory for [`EmailMessage`]s.
///
/// Applies token replacement and falls back to the configured default
/// sender when none is given.
#[derive(Debug, Clone)]
pub struct MessageFactory {
    templates: TemplateLoader,
    default_sender: Option<MailAddress>,
}

impl MessageFactory {
    pub fn new(templates: TemplateLoader, default_sender: Option<MailAddress>) -> Self {
        Self {
            templates,
            default_sender,
        }
    }

    /// Factory reading templates from the configured folder and falling back
    /// to the configured default sender.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            TemplateLoader::new(settings.messaging.template_path()),
            settings.transport.default_sender(),
        )
    }

    pub fn address(&self, address: impl Into<String>, display_name: impl Into<String>) -> MailAddress {
        MailAddress::with_name(address, display_name)
    }

    pub fn default_sender(&self) -> Option<&MailAddress> {
        self.default_sender.as_ref()
    }

    /// Create a message for a list of recipients.
    pub fn create_message(
        &self,
        from: Option<MailAddress>,
        recipients: Vec<MailAddress>,
        subject: &str,
        text_body: &str,
        html_body: &str,
        options: &MessageOptions,
        tokens: Option<&HashMap<String, String>>,
    ) -> Result<EmailMessage, MessageError> {
        let from = self.resolve_sender(from)?;

        if recipients.is_empty() {
            return Err(MessageError::NoRecipients);
        }

        let (text, html) = match tokens {
            Some(tokens) => (replace_tokens(text_body, tokens), replace_tokens(html_body, tokens)),
            None => (text_body.to_string(), html_body.to_string()),
        };

        Ok(EmailMessage::new(from, recipients, subject)
            .text(text)
            .html(html)
            .recipients_visible(options.recipients_visible)
            .content_types(
                options.text_content_type.as_str(),
                options.html_content_type.as_str(),
            ))
    }

    /// Create a message for a single recipient.
    pub fn create_to(
        &self,
        from: Option<MailAddress>,
        to: MailAddress,
        subject: &str,
        text_body: &str,
        html_body: &str,
        options: &MessageOptions,
        tokens: Option<&HashMap<String, String>>,
    ) -> Result<EmailMessage, MessageError> {
        self.create_message(from, vec![to], subject, text_body, html_body, options, tokens)
    }

    /// Create a message whose bodies come from the named template.
    pub async fn create_from_template(
        &self,
        from: Option<MailAddress>,
        recipients: Vec<MailAddress>,
        subject: &str,
        template_name: &str,
        options: &MessageOptions,
        tokens: Option<&HashMap<String, String>>,
    ) -> Result<EmailMessage, MessageError> {
        if recipients.is_empty() {
            return Err(MessageError::NoRecipients);
        }

        let template = self.templates.load(template_name).await?;

        self.create_message(
            from,
            recipients,
            subject,
            &template.text,
            &template.html,
            options,
            tokens,
        )
    }

    fn resolve_sender(&self, from: Option<MailAddress>) -> Result<MailAddress, MessageError> {
        from.or_else(|| self.default_sender.clone())
            .filter(|address| !address.address.trim().is_empty())
            .ok_or(MessageError::MissingSender)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::types::BodyType;
    use crate::queue::{QueueItem, QueueItemState};

    fn factory(folder: &std::path::Path) -> MessageFactory {
        MessageFactory::new(
            TemplateLoader::new(folder),
            Some(MailAddress::with_name("noreply@example.com", "Example")),
        )
    }

    #[test]
    fn test_create_message_with_tokens() {
        let factory = factory(std::path::Path::new("templates"));
        let mut tokens = HashMap::new();
        tokens.insert("name".to_string(), "Alice".to_string());

        let message = factory
            .create_to(
                None,
                MailAddress::new("alice@example.com"),
                "Hi",
                "Hello $NAME$",
                "<b>$NAME$</b>",
                &MessageOptions::default(),
                Some(&tokens),
            )
            .unwrap();

        assert_eq!(message.from.address, "noreply@example.com");
        assert_eq!(message.text_body(), Some("Hello Alice"));
        assert_eq!(message.html_body(), Some("<b>Alice</b>"));
        assert_eq!(message.state(), QueueItemState::New);
        assert!(!message.recipients_visible);
        assert_eq!(message.text_content_type, "text/plain");
        assert_eq!(message.html_content_type, "text/html");
    }

    #[test]
    fn test_create_message_applies_options() {
        let factory = factory(std::path::Path::new("templates"));
        let options = MessageOptions {
            recipients_visible: true,
            text_content_type: "text/plain; charset=utf-8".to_string(),
            html_content_type: "text/html; charset=utf-8".to_string(),
        };

        let message = factory
            .create_message(
                None,
                vec![MailAddress::new("a@example.com"), MailAddress::new("b@example.com")],
                "Team update",
                "text",
                "<p>html</p>",
                &options,
                None,
            )
            .unwrap();

        assert!(message.recipients_visible);
        assert_eq!(message.text_content_type, "text/plain; charset=utf-8");
        assert_eq!(message.html_content_type, "text/html; charset=utf-8");
    }

    #[tokio::test]
    async fn test_from_settings_uses_configured_folder_and_sender() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("NoticeText.txt"), "Notice")
            .await
            .unwrap();

        let mut settings = Settings::default();
        settings.messaging.template_folder = dir.path().to_path_buf();
        settings.transport.default_sender = Some("ops@example.com".to_string());
        settings.transport.default_sender_name = Some("Ops".to_string());

        let factory = MessageFactory::from_settings(&settings);
        let message = factory
            .create_from_template(
                None,
                vec![MailAddress::new("a@example.com")],
                "Notice",
                "Notice",
                &MessageOptions::default(),
                None,
            )
            .await
            .unwrap();

        assert_eq!(message.from, MailAddress::with_name("ops@example.com", "Ops"));
        assert_eq!(message.text_body(), Some("Notice"));
    }

    #[test]
    fn test_create_message_requires_recipients_and_sender() {
        let factory = MessageFactory::new(TemplateLoader::new("templates"), None);

        assert!(matches!(
            factory.create_message(
                None,
                vec![MailAddress::new("a@example.com")],
                "s",
                "b",
                "",
                &MessageOptions::default(),
                None,
            ),
            Err(MessageError::MissingSender)
        ));
        assert!(matches!(
            factory.create_message(
                Some(MailAddress::new("x@example.com")),
                vec![],
                "s",
                "b",
                "",
                &MessageOptions::default(),
                None,
            ),
            Err(MessageError::NoRecipients)
        ));
    }

    #[tokio::test]
    async fn test_create_from_template() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("ResetText.txt"), "Reset for $USERNAME$")
            .await
            .unwrap();
        tokio::fs::write(dir.path().join("ResetHtml.html"), "<p>Reset for $USERNAME$</p>")
            .await
            .unwrap();

        let mut tokens = HashMap::new();
        tokens.insert("USERNAME".to_string(), "bob".to_string());

        let message = factory(dir.path())
            .create_from_template(
                None,
                vec![MailAddress::new("bob@example.com")],
                "Password reset",
                "Reset",
                &MessageOptions::default(),
                Some(&tokens),
            )
            .await
            .unwrap();

        assert_eq!(message.bodies.get(&BodyType::Text).unwrap(), "Reset for bob");
        assert_eq!(message.bodies.get(&BodyType::Html).unwrap(), "<p>Reset for bob</p>");
    }

    #[tokio::test]
    async fn test_create_from_missing_template() {
        let dir = tempfile::tempdir().unwrap();
        let result = factory(dir.path())
            .create_from_template(
                None,
                vec![MailAddress::new("a@example.com")],
                "s",
                "Missing",
                &MessageOptions::default(),
                None,
            )
            .await;

        assert!(matches!(result, Err(MessageError::Template(_))));
    }
}
