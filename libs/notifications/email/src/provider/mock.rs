//! Mock email provider for testing

use super::{EmailProvider, SendResult};
use crate::models::Email;
use async_trait::async_trait;
use eyre::Result;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Mock email provider that records every send attempt
///
/// Sends to addresses registered with [`MockEmailProvider::fail_for`] are
/// recorded and then rejected.
pub struct MockEmailProvider {
    attempts: Arc<Mutex<Vec<Email>>>,
    failing_recipients: HashSet<String>,
    fail_all: Option<String>,
    delay: Option<Duration>,
}

impl MockEmailProvider {
    /// Create a new mock provider
    pub fn new() -> Self {
        Self {
            attempts: Arc::new(Mutex::new(Vec::new())),
            failing_recipients: HashSet::new(),
            fail_all: None,
            delay: None,
        }
    }

    /// Create a mock provider that always fails
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fail_all: Some(message.into()),
            ..Self::new()
        }
    }

    /// Reject sends to this address
    pub fn fail_for(mut self, recipient: impl Into<String>) -> Self {
        self.failing_recipients.insert(recipient.into());
        self
    }

    /// Sleep before answering each send
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every attempted email, failed ones included
    pub async fn attempts(&self) -> Vec<Email> {
        self.attempts.lock().await.clone()
    }

    /// Number of attempts made so far
    pub async fn attempt_count(&self) -> usize {
        self.attempts.lock().await.len()
    }

    /// Emails that were accepted
    pub async fn delivered(&self) -> Vec<Email> {
        self.attempts
            .lock()
            .await
            .iter()
            .filter(|e| self.fail_all.is_none() && !self.failing_recipients.contains(&e.to))
            .cloned()
            .collect()
    }

    /// Check if an email was accepted for a specific address
    pub async fn was_sent_to(&self, address: &str) -> bool {
        self.delivered().await.iter().any(|e| e.to == address)
    }
}

impl Default for MockEmailProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmailProvider for MockEmailProvider {
    async fn send(&self, email: &Email) -> Result<SendResult> {
        self.attempts.lock().await.push(email.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(message) = &self.fail_all {
            return Err(eyre::eyre!(message.clone()));
        }
        if self.failing_recipients.contains(&email.to) {
            return Err(eyre::eyre!("Mailbox unavailable: {}", email.to));
        }

        Ok(SendResult {
            message_id: format!("mock-{}", email.id),
        })
    }

    async fn health_check(&self) -> Result<()> {
        if self.fail_all.is_some() {
            return Err(eyre::eyre!("Mock health check failed"));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_provider_records_delivery() {
        let provider = MockEmailProvider::new();
        let email = Email::new("test@example.com", "Subject", "<p>body</p>");

        assert!(provider.send(&email).await.is_ok());
        assert_eq!(provider.attempt_count().await, 1);
        assert!(provider.was_sent_to("test@example.com").await);
    }

    #[tokio::test]
    async fn test_mock_provider_fails_for_selected_recipient() {
        let provider = MockEmailProvider::new().fail_for("bounce@example.com");

        let ok = Email::new("ok@example.com", "S", "b");
        let bad = Email::new("bounce@example.com", "S", "b");

        assert!(provider.send(&ok).await.is_ok());
        let err = provider.send(&bad).await.unwrap_err();
        assert!(err.to_string().contains("bounce@example.com"));

        assert_eq!(provider.attempt_count().await, 2);
        assert!(!provider.was_sent_to("bounce@example.com").await);
    }

    #[tokio::test]
    async fn test_mock_provider_fails() {
        let provider = MockEmailProvider::failing("Simulated failure");
        let email = Email::new("test@example.com", "Subject", "body");

        let result = provider.send(&email).await;
        assert!(result.unwrap_err().to_string().contains("Simulated failure"));
        assert!(provider.delivered().await.is_empty());
        assert!(provider.health_check().await.is_err());
    }
}
