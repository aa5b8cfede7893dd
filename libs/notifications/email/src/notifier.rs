//! Notifier - the only way the pipeline talks to a mail transport
//!
//! `Notifier::send` never returns an error. Every failure (transport error,
//! malformed address, timeout) is folded into a [`SendOutcome`] so that one
//! recipient's failure cannot cancel a sibling send.

use crate::error::EmailError;
use crate::models::Email;
use crate::provider::EmailProvider;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Timeout and retry policy applied to each recipient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendPolicy {
    /// Upper bound for a single provider call
    pub timeout: Duration,
    /// Total attempts per recipient (1 = no retry)
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles on each further attempt
    pub backoff: Duration,
}

impl Default for SendPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_attempts: 1,
            backoff: Duration::from_secs(1),
        }
    }
}

impl SendPolicy {
    fn backoff_for(&self, failed_attempts: u32) -> Duration {
        let factor = 2u32.saturating_pow(failed_attempts.saturating_sub(1).min(10));
        self.backoff.saturating_mul(factor)
    }
}

/// Result of delivering one message to one recipient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendOutcome {
    pub to: String,
    pub delivered: bool,
    pub attempts: u32,
    pub message_id: Option<String>,
    pub error: Option<String>,
}

/// Provider wrapper enforcing a [`SendPolicy`]
#[derive(Clone)]
pub struct Notifier {
    provider: Arc<dyn EmailProvider>,
    policy: SendPolicy,
}

impl Notifier {
    pub fn new(provider: Arc<dyn EmailProvider>, policy: SendPolicy) -> Self {
        Self { provider, policy }
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Whether the underlying transport is reachable
    pub async fn health_check(&self) -> Result<(), EmailError> {
        self.provider.health_check().await.map_err(EmailError::from)
    }

    /// Send one HTML message to one address.
    ///
    /// `reference` is the id of the triggering record, carried for logs only.
    pub async fn send(
        &self,
        subject: &str,
        body_html: &str,
        to: &str,
        reference: Option<&str>,
    ) -> SendOutcome {
        let mut email = Email::new(to, subject, body_html);
        if let Some(reference) = reference {
            email = email.with_reference(reference);
        }

        let max_attempts = self.policy.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                tokio::time::sleep(self.policy.backoff_for(attempt - 1)).await;
            }

            match self.attempt(&email).await {
                Ok(message_id) => {
                    debug!(to = %to, attempt, message_id = %message_id, "Email delivered");
                    return SendOutcome {
                        to: to.to_string(),
                        delivered: true,
                        attempts: attempt,
                        message_id: Some(message_id),
                        error: None,
                    };
                }
                Err(e) => {
                    warn!(
                        to = %to,
                        attempt,
                        max_attempts,
                        reference = reference.unwrap_or_default(),
                        error = %e,
                        "Failed to send email"
                    );
                    last_error = Some(e.to_string());
                }
            }
        }

        SendOutcome {
            to: to.to_string(),
            delivered: false,
            attempts: max_attempts,
            message_id: None,
            error: last_error,
        }
    }

    async fn attempt(&self, email: &Email) -> Result<String, EmailError> {
        match tokio::time::timeout(self.policy.timeout, self.provider.send(email)).await {
            Ok(Ok(result)) => Ok(result.message_id),
            Ok(Err(e)) => Err(EmailError::from(e)),
            Err(_) => Err(EmailError::Timeout {
                to: email.to.clone(),
                secs: self.policy.timeout.as_secs(),
            }),
        }
    }
}
