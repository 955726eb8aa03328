//! Message templates and token substitution.
//!
//! This module provides:
//! - File-based body templates (`<name>Text.txt`, `<name>Html.html`)
//! - `$TOKEN$` placeholder replacement
//! - Standard token names and date/time token initialization
//!
//! # Example
//!
//! ```ignore
//! let loader = TemplateLoader::new("/srv/app/templates");
//! let template = loader.load("Welcome").await?;
//!
//! let mut tokens = HashMap::new();
//! tokens.insert(tokens::FIRST_NAME.to_string(), "Alice".to_string());
//! initialize_date_time_tokens(&mut tokens);
//!
//! let text = replace_tokens(&template.text, &tokens);
//! ```

pub mod tokens;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{Local, Utc};
use thiserror::Error;

/// Suffix and extension of the plain text variant of a template
pub const TEMPLATE_TEXT_SUFFIX: &str = "Text";
pub const TEMPLATE_TEXT_EXTENSION: &str = "txt";

/// Suffix and extension of the HTML variant of a template
pub const TEMPLATE_HTML_SUFFIX: &str = "Html";
pub const TEMPLATE_HTML_EXTENSION: &str = "html";

/// Template-specific error type
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Template name is required")]
    NameRequired,

    #[error("Invalid template name: {0}")]
    InvalidName(String),

    #[error("Template not found: {0}")]
    NotFound(String),

    #[error("Failed to read template {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for template operations
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Text and HTML bodies loaded for one template name.
///
/// A missing variant loads as an empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageTemplate {
    pub text: String,
    pub html: String,
}

/// Loads templates from a folder on disk
#[derive(Debug, Clone)]
pub struct TemplateLoader {
    folder: PathBuf,
}

impl TemplateLoader {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Load both variants of a template.
    ///
    /// Fails with `NotFound` only when neither variant exists.
    pub async fn load(&self, name: &str) -> TemplateResult<MessageTemplate> {
        validate_name(name)?;

        let text_path = self.variant_path(name, TEMPLATE_TEXT_SUFFIX, TEMPLATE_TEXT_EXTENSION);
        let html_path = self.variant_path(name, TEMPLATE_HTML_SUFFIX, TEMPLATE_HTML_EXTENSION);

        let text = read_optional(&text_path).await?;
        let html = read_optional(&html_path).await?;

        if text.is_none() && html.is_none() {
            return Err(TemplateError::NotFound(name.to_string()));
        }

        tracing::debug!(
            template = %name,
            has_text = text.is_some(),
            has_html = html.is_some(),
            "Template loaded"
        );

        Ok(MessageTemplate {
            text: text.unwrap_or_default(),
            html: html.unwrap_or_default(),
        })
    }

    fn variant_path(&self, name: &str, suffix: &str, extension: &str) -> PathBuf {
        self.folder.join(format!("{}{}.{}", name, suffix, extension))
    }
}

fn validate_name(name: &str) -> TemplateResult<()> {
    if name.trim().is_empty() {
        return Err(TemplateError::NameRequired);
    }

    if !name.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_') {
        return Err(TemplateError::InvalidName(name.to_string()));
    }

    Ok(())
}

async fn read_optional(path: &Path) -> TemplateResult<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(TemplateError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Replace every `$KEY$` placeholder with its value.
///
/// Keys are upper-cased before matching, so `name` fills `$NAME$`.
pub fn replace_tokens(content: &str, tokens: &HashMap<String, String>) -> String {
    let mut result = content.to_string();

    for (key, value) in tokens {
        let pattern = format!("${}$", key.to_uppercase());
        result = result.replace(&pattern, value);
    }

    result
}

/// Add the standard date/time tokens without overwriting caller values.
pub fn initialize_date_time_tokens(tokens: &mut HashMap<String, String>) {
    let utc_now = Utc::now();
    let now = Local::now();

    let defaults = [
        (tokens::UTC_DATE_TIME, utc_now.format("%Y-%m-%d %H:%M:%S").to_string()),
        (tokens::UTC_DATE, utc_now.format("%Y-%m-%d").to_string()),
        (tokens::DATE_TIME, now.format("%Y-%m-%d %H:%M:%S").to_string()),
        (tokens::DATE, now.format("%Y-%m-%d").to_string()),
        (tokens::TIME, now.format("%H:%M").to_string()),
        (tokens::TIME_ZONE, now.format("%:z").to_string()),
    ];

    for (key, value) in defaults {
        tokens.entry(key.to_string()).or_insert(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_replace_tokens() {
        let result = replace_tokens(
            "Hello $FIRSTNAME$, visit $URL$",
            &token_map(&[("firstname", "Alice"), ("URL", "https://example.com")]),
        );
        assert_eq!(result, "Hello Alice, visit https://example.com");
    }

    #[test]
    fn test_replace_tokens_leaves_unknown() {
        let result = replace_tokens("Hi $UNKNOWN$", &token_map(&[("name", "x")]));
        assert_eq!(result, "Hi $UNKNOWN$");
    }

    #[test]
    fn test_date_time_tokens_do_not_overwrite() {
        let mut values = token_map(&[(tokens::DATE, "yesterday")]);
        initialize_date_time_tokens(&mut values);

        assert_eq!(values[tokens::DATE], "yesterday");
        assert!(values.contains_key(tokens::UTC_DATE_TIME));
        assert!(values.contains_key(tokens::TIME));
    }

    #[tokio::test]
    async fn test_load_template_variants() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("WelcomeText.txt"), "Hi $NAME$")
            .await
            .unwrap();

        let loader = TemplateLoader::new(dir.path());
        let template = loader.load("Welcome").await.unwrap();

        assert_eq!(template.text, "Hi $NAME$");
        assert_eq!(template.html, "");
    }

    #[tokio::test]
    async fn test_load_missing_template() {
        let dir = tempfile::tempdir().unwrap();
        let loader = TemplateLoader::new(dir.path());

        assert!(matches!(
            loader.load("Nope").await,
            Err(TemplateError::NotFound(name)) if name == "Nope"
        ));
        assert!(matches!(loader.load("  ").await, Err(TemplateError::NameRequired)));
        assert!(matches!(
            loader.load("../etc/passwd").await,
            Err(TemplateError::InvalidName(_))
        ));
    }
}
