use serde::{Deserialize, Serialize};
use std::time::Duration;
use strum::{Display, EnumIter, EnumString};

use crate::models::ProcessedMarker;

/// The watched collections
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MonitorKind {
    /// Enrollment applications; guardians get a receipt
    Enrollment,
    /// Contact-form messages; forwarded to every admin
    ContactMessages,
    /// Membership request events; routed by the record's `to` field
    AdminNotifications,
}

/// One watched collection and how to poll it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Monitor {
    pub kind: MonitorKind,
    pub collection: String,
    pub marker: ProcessedMarker,
    pub interval: Duration,
}

impl Monitor {
    pub fn enrollment(collection: impl Into<String>, interval: Duration) -> Self {
        Self {
            kind: MonitorKind::Enrollment,
            collection: collection.into(),
            marker: ProcessedMarker::empty_list("notification"),
            interval,
        }
    }

    pub fn contact_messages(interval: Duration) -> Self {
        Self {
            kind: MonitorKind::ContactMessages,
            collection: "messages".to_string(),
            marker: ProcessedMarker::boolean_flag("read"),
            interval,
        }
    }

    pub fn admin_notifications(interval: Duration) -> Self {
        Self {
            kind: MonitorKind::AdminNotifications,
            collection: "notifications".to_string(),
            marker: ProcessedMarker::boolean_flag("read"),
            interval,
        }
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn name(&self) -> String {
        self.kind.to_string()
    }
}
