use serde::{Deserialize, Serialize};

/// Single-recipient HTML email handed to a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    /// Unique identifier for this send attempt chain
    pub id: String,
    /// Recipient email address
    pub to: String,
    /// Email subject
    pub subject: String,
    /// HTML body, sent as `text/html; charset=utf-8`
    pub body_html: String,
    /// Identifier of the record that triggered the email, for log correlation
    #[serde(default)]
    pub reference: Option<String>,
}

impl Email {
    /// Create a new email with required fields
    pub fn new(
        to: impl Into<String>,
        subject: impl Into<String>,
        body_html: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            to: to.into(),
            subject: subject.into(),
            body_html: body_html.into(),
            reference: None,
        }
    }

    /// Attach the triggering record id
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_email_gets_unique_id() {
        let a = Email::new("a@example.com", "Hi", "<p>x</p>");
        let b = Email::new("a@example.com", "Hi", "<p>x</p>");
        assert_ne!(a.id, b.id);
        assert!(a.reference.is_none());
    }

    #[test]
    fn test_with_reference() {
        let email = Email::new("a@example.com", "Hi", "body").with_reference("doc-1");
        assert_eq!(email.reference.as_deref(), Some("doc-1"));
    }
}
