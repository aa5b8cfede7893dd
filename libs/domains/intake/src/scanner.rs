//! Scan loop and per-record workflow
//!
//! A record goes through claim → fan-out → finalize. Claiming writes the
//! processed marker before any email leaves, so a record is notified at most
//! once even if the process dies mid-send. Failures before the claim leave
//! the record untouched and it is picked up again on the next scan.

use chrono::{DateTime, Utc};
use email::{Notifier, SendOutcome};
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{IntakeError, IntakeResult};
use crate::messages::{ComposedMessage, MessageComposer};
use crate::models::{Document, EmailStatus, FieldValue, Fields, TrackingFields};
use crate::monitor::{Monitor, MonitorKind};
use crate::recipients::{RecipientResolver, guardian_recipients};
use crate::store::DocumentStore;

/// Routing field of admin notification records
pub const ROUTE_FIELD: &str = "to";

/// What happened to one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Left untouched; selected again by the next scan
    Skipped(String),
    Completed,
    PartialFailure,
    /// Claimed, then aborted; never retried
    Failed(String),
}

/// Summary of one scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub monitor: MonitorKind,
    pub matched: usize,
    pub skipped: usize,
    pub completed: usize,
    pub partial_failures: usize,
    pub failed: usize,
    /// The unprocessed-records query itself failed
    pub query_failed: bool,
}

impl ScanReport {
    pub fn new(monitor: MonitorKind) -> Self {
        Self {
            monitor,
            matched: 0,
            skipped: 0,
            completed: 0,
            partial_failures: 0,
            failed: 0,
            query_failed: false,
        }
    }

    fn record(&mut self, outcome: &RecordOutcome) {
        match outcome {
            RecordOutcome::Skipped(_) => self.skipped += 1,
            RecordOutcome::Completed => self.completed += 1,
            RecordOutcome::PartialFailure => self.partial_failures += 1,
            RecordOutcome::Failed(_) => self.failed += 1,
        }
    }
}

/// Runs scans against one document store
#[derive(Clone)]
pub struct Scanner {
    store: Arc<dyn DocumentStore>,
    notifier: Notifier,
    composer: MessageComposer,
    resolver: Option<RecipientResolver>,
    tracking: TrackingFields,
    record_concurrency: usize,
}

impl Scanner {
    pub fn new(store: Arc<dyn DocumentStore>, notifier: Notifier, composer: MessageComposer) -> Self {
        Self {
            store,
            notifier,
            composer,
            resolver: None,
            tracking: TrackingFields::default(),
            record_concurrency: 1,
        }
    }

    /// Directory routing, required by the contact-message and admin-notification monitors
    pub fn with_resolver(mut self, resolver: RecipientResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_tracking(mut self, tracking: TrackingFields) -> Self {
        self.tracking = tracking;
        self
    }

    /// Records processed at the same time within one scan (minimum 1)
    pub fn with_record_concurrency(mut self, concurrency: usize) -> Self {
        self.record_concurrency = concurrency.max(1);
        self
    }

    /// Query unprocessed records and run the workflow for each.
    ///
    /// Never fails: a query error ends the scan early and is reported in
    /// [`ScanReport::query_failed`].
    #[instrument(skip_all, fields(monitor = %monitor.kind, collection = %monitor.collection))]
    pub async fn scan(&self, monitor: &Monitor) -> ScanReport {
        let mut report = ScanReport::new(monitor.kind);

        let documents = match self
            .store
            .query(&monitor.collection, &monitor.marker.unprocessed_filter())
            .await
        {
            Ok(documents) => documents,
            Err(e) => {
                error!(error = %e, "Failed to query unprocessed records");
                report.query_failed = true;
                return report;
            }
        };

        report.matched = documents.len();
        if documents.is_empty() {
            debug!("No unprocessed records");
            return report;
        }
        info!(count = documents.len(), "Found unprocessed records");

        let outcomes: Vec<RecordOutcome> = stream::iter(documents)
            .map(|document| self.process(monitor, document))
            .buffer_unordered(self.record_concurrency)
            .collect()
            .await;

        for outcome in &outcomes {
            report.record(outcome);
        }

        info!(
            completed = report.completed,
            partial_failures = report.partial_failures,
            failed = report.failed,
            skipped = report.skipped,
            "Scan finished"
        );
        report
    }

    /// Per-record workflow: compose, resolve, claim, fan out, finalize
    #[instrument(skip_all, fields(monitor = %monitor.kind, record_id = %document.id))]
    pub async fn process(&self, monitor: &Monitor, document: Document) -> RecordOutcome {
        let message = match self.composer.compose(monitor.kind, &document) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "Could not compose message, will retry");
                return RecordOutcome::Skipped(e.to_string());
            }
        };

        let recipients = match self.recipients(monitor.kind, &document).await {
            Ok(recipients) if recipients.is_empty() => {
                info!("No recipients yet, will retry");
                return RecordOutcome::Skipped("no recipients".to_string());
            }
            Ok(recipients) => recipients,
            Err(e) => {
                warn!(error = %e, "Could not resolve recipients, will retry");
                return RecordOutcome::Skipped(e.to_string());
            }
        };

        let claimed_at = Utc::now();
        if let Err(e) = self.claim(monitor, &document.id, claimed_at).await {
            return self.mark_failed(monitor, &document.id, claimed_at, &e).await;
        }

        let outcomes = self.fan_out(&message, &recipients, &document.id).await;

        match self.finalize(monitor, &document.id, &outcomes).await {
            Ok(outcome) => outcome,
            Err(e) => self.mark_failed(monitor, &document.id, claimed_at, &e).await,
        }
    }

    async fn recipients(&self, kind: MonitorKind, document: &Document) -> IntakeResult<Vec<String>> {
        match kind {
            MonitorKind::Enrollment => Ok(guardian_recipients(document)),
            MonitorKind::ContactMessages => self.resolver()?.admin_recipients().await,
            MonitorKind::AdminNotifications => {
                self.resolver()?
                    .routed_recipients(document.get_str(ROUTE_FIELD))
                    .await
            }
        }
    }

    fn resolver(&self) -> IntakeResult<&RecipientResolver> {
        self.resolver
            .as_ref()
            .ok_or_else(|| IntakeError::Config("no recipient resolver configured".to_string()))
    }

    async fn claim(&self, monitor: &Monitor, id: &str, claimed_at: DateTime<Utc>) -> IntakeResult<()> {
        let mut fields = Fields::new();
        fields.insert(
            monitor.marker.field().to_string(),
            monitor.marker.claimed_value(claimed_at),
        );
        fields.insert(self.tracking.status.clone(), EmailStatus::Processing.into());

        self.store.update(&monitor.collection, id, fields).await?;
        debug!("Record claimed");
        Ok(())
    }

    /// One send per recipient, all awaited; no send cancels another
    async fn fan_out(
        &self,
        message: &ComposedMessage,
        recipients: &[String],
        reference: &str,
    ) -> Vec<SendOutcome> {
        join_all(recipients.iter().map(|to| {
            self.notifier
                .send(&message.subject, &message.body_html, to, Some(reference))
        }))
        .await
    }

    async fn finalize(
        &self,
        monitor: &Monitor,
        id: &str,
        outcomes: &[SendOutcome],
    ) -> IntakeResult<RecordOutcome> {
        let failures: Vec<&SendOutcome> = outcomes.iter().filter(|o| !o.delivered).collect();

        let mut fields = Fields::new();
        fields.insert(self.tracking.sent_at.clone(), FieldValue::Timestamp(Utc::now()));

        let outcome = if failures.is_empty() {
            fields.insert(self.tracking.status.clone(), EmailStatus::Completed.into());
            RecordOutcome::Completed
        } else {
            fields.insert(self.tracking.status.clone(), EmailStatus::PartialFailure.into());
            fields.insert(
                self.tracking.error_message.clone(),
                FieldValue::String(describe_failures(&failures)),
            );
            RecordOutcome::PartialFailure
        };

        self.store.update(&monitor.collection, id, fields).await?;

        info!(
            sent = outcomes.len() - failures.len(),
            failed = failures.len(),
            "Record notified"
        );
        Ok(outcome)
    }

    /// Terminal failure after the claim. The marker is written again so the
    /// record stays excluded even if the claim itself was the failing write.
    async fn mark_failed(
        &self,
        monitor: &Monitor,
        id: &str,
        claimed_at: DateTime<Utc>,
        cause: &IntakeError,
    ) -> RecordOutcome {
        let message = cause.to_string();
        error!(error = %message, "Record failed after claim");

        let mut fields = Fields::new();
        fields.insert(
            monitor.marker.field().to_string(),
            monitor.marker.claimed_value(claimed_at),
        );
        fields.insert(self.tracking.status.clone(), EmailStatus::Failed.into());
        fields.insert(
            self.tracking.error_message.clone(),
            FieldValue::String(message.clone()),
        );

        if let Err(e) = self.store.update(&monitor.collection, id, fields).await {
            error!(error = %e, "Could not record failure status");
        }
        RecordOutcome::Failed(message)
    }
}

fn describe_failures(failures: &[&SendOutcome]) -> String {
    let details: Vec<String> = failures
        .iter()
        .map(|o| match &o.error {
            Some(error) => format!("{} ({})", o.to, error),
            None => o.to.clone(),
        })
        .collect();
    format!("Failed to deliver to: {}", details.join("; "))
}
