//! Recipient derivation
//!
//! Two strategies: guardian contacts embedded in an enrollment record, and
//! routing through the admin user directory.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use strum::{Display, EnumString};
use tracing::{debug, warn};

use crate::directory::IdentityDirectory;
use crate::error::{IntakeError, IntakeResult};
use crate::models::{Document, FieldFilter};
use crate::store::DocumentStore;

/// Field holding the [`RelationshipMode`] of an enrollment record
pub const RELATIONSHIP_FIELD: &str = "educationGuardian";

/// Routing value that expands to every admin in the directory
pub const ADMIN_ROUTE: &str = "admin";

const EMAIL_FIELDS: [&str; 2] = ["email", "alternativeEmail"];

/// Who is responsible for the enrolled student
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RelationshipMode {
    Parents,
    Father,
    Mother,
    Other,
}

impl RelationshipMode {
    /// Sub-records whose email fields are eligible
    fn contact_paths(self) -> &'static [&'static str] {
        match self {
            RelationshipMode::Parents => &["filiation.father", "filiation.mother"],
            RelationshipMode::Father => &["filiation.father"],
            RelationshipMode::Mother => &["filiation.mother"],
            RelationshipMode::Other => &["guardian"],
        }
    }
}

/// Guardian addresses of an enrollment record
///
/// Primary and alternate emails of the contacts selected by the record's
/// relationship mode, trimmed, without empties or exact duplicates. A missing
/// or unknown mode yields no addresses.
pub fn guardian_recipients(document: &Document) -> Vec<String> {
    let Some(mode) = document
        .get_str(RELATIONSHIP_FIELD)
        .and_then(|raw| raw.trim().parse::<RelationshipMode>().ok())
    else {
        return Vec::new();
    };

    let addresses: BTreeSet<String> = mode
        .contact_paths()
        .iter()
        .flat_map(|contact| {
            EMAIL_FIELDS
                .iter()
                .filter_map(move |field| document.get_str(&format!("{}.{}", contact, field)))
        })
        .map(str::trim)
        .filter(|address| !address.is_empty())
        .map(str::to_string)
        .collect();

    addresses.into_iter().collect()
}

/// Directory-based recipient routing
#[derive(Clone)]
pub struct RecipientResolver {
    store: Arc<dyn DocumentStore>,
    directory: Arc<dyn IdentityDirectory>,
    users_collection: String,
    admin_role: String,
}

impl RecipientResolver {
    pub fn new(store: Arc<dyn DocumentStore>, directory: Arc<dyn IdentityDirectory>) -> Self {
        Self {
            store,
            directory,
            users_collection: "users".to_string(),
            admin_role: "admin".to_string(),
        }
    }

    pub fn with_users_collection(mut self, collection: impl Into<String>) -> Self {
        self.users_collection = collection.into();
        self
    }

    /// Email of every directory user whose `role` is admin
    ///
    /// Users missing from the identity provider, or without an email, are
    /// skipped. Any other failure aborts the resolution.
    pub async fn admin_recipients(&self) -> IntakeResult<Vec<String>> {
        let admins = self
            .store
            .query(
                &self.users_collection,
                &FieldFilter::equal("role", self.admin_role.as_str()),
            )
            .await?;

        let mut addresses = Vec::with_capacity(admins.len());
        for admin in admins {
            match self.directory.lookup_user(&admin.id).await {
                Ok(user) => match user.email.as_deref().map(str::trim) {
                    Some(email) if !email.is_empty() => addresses.push(email.to_string()),
                    _ => warn!(uid = %admin.id, "Admin user has no email, skipping"),
                },
                Err(IntakeError::UserNotFound(uid)) => {
                    warn!(uid = %uid, "Admin user missing from identity provider, skipping");
                }
                Err(e) => return Err(e),
            }
        }

        debug!(count = addresses.len(), "Resolved admin recipients");
        Ok(addresses)
    }

    /// Resolve a routing value: `admin` expands to the admin set, anything
    /// else non-empty is a literal address
    pub async fn routed_recipients(&self, route: Option<&str>) -> IntakeResult<Vec<String>> {
        match route.map(str::trim) {
            Some(ADMIN_ROUTE) => self.admin_recipients().await,
            Some(address) if !address.is_empty() => Ok(vec![address.to_string()]),
            _ => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{InMemoryDirectory, MockIdentityDirectory, UserRecord};
    use crate::store::{InMemoryDocumentStore, MockDocumentStore};
    use serde_json::json;

    fn enrollment(value: serde_json::Value) -> Document {
        Document::from_json("enr-1", value)
    }

    #[test]
    fn test_parents_with_all_four_addresses() {
        let doc = enrollment(json!({
            "educationGuardian": "parents",
            "filiation": {
                "father": {"email": "pai@example.com", "alternativeEmail": "pai@work.example.com"},
                "mother": {"email": "mae@example.com", "alternativeEmail": "mae@work.example.com"}
            }
        }));

        let recipients = guardian_recipients(&doc);
        assert_eq!(recipients.len(), 4);
        assert!(recipients.contains(&"pai@work.example.com".to_string()));
        assert!(recipients.contains(&"mae@example.com".to_string()));
    }

    #[test]
    fn test_parents_deduplicates_identical_addresses() {
        let doc = enrollment(json!({
            "educationGuardian": "parents",
            "filiation": {
                "father": {"email": "familia@example.com", "alternativeEmail": "pai@example.com"},
                "mother": {"email": "familia@example.com", "alternativeEmail": ""}
            }
        }));

        assert_eq!(
            guardian_recipients(&doc),
            vec!["familia@example.com".to_string(), "pai@example.com".to_string()]
        );
    }

    #[test]
    fn test_single_side_modes() {
        let filiation = json!({
            "father": {"email": "pai@example.com"},
            "mother": {"email": "mae@example.com", "alternativeEmail": " mae2@example.com "}
        });

        let father = enrollment(json!({"educationGuardian": "father", "filiation": filiation.clone()}));
        assert_eq!(guardian_recipients(&father), vec!["pai@example.com".to_string()]);

        let mother = enrollment(json!({"educationGuardian": "mother", "filiation": filiation}));
        assert_eq!(
            guardian_recipients(&mother),
            vec!["mae2@example.com".to_string(), "mae@example.com".to_string()]
        );
    }

    #[test]
    fn test_other_with_primary_email_only() {
        let doc = enrollment(json!({
            "educationGuardian": "other",
            "guardian": {"email": "tutor@example.com"},
            "filiation": {"father": {"email": "pai@example.com"}}
        }));

        assert_eq!(guardian_recipients(&doc), vec!["tutor@example.com".to_string()]);
    }

    #[test]
    fn test_unknown_or_missing_mode_yields_nothing() {
        let unknown = enrollment(json!({
            "educationGuardian": "grandparents",
            "guardian": {"email": "avo@example.com"}
        }));
        assert!(guardian_recipients(&unknown).is_empty());

        let missing = enrollment(json!({"guardian": {"email": "avo@example.com"}}));
        assert!(guardian_recipients(&missing).is_empty());

        let no_contacts = enrollment(json!({"educationGuardian": "parents"}));
        assert!(guardian_recipients(&no_contacts).is_empty());
    }

    async fn users_store() -> Arc<InMemoryDocumentStore> {
        let store = Arc::new(InMemoryDocumentStore::new());
        store.insert("users", Document::from_json("a1", json!({"role": "admin"}))).await;
        store.insert("users", Document::from_json("a2", json!({"role": "admin"}))).await;
        store.insert("users", Document::from_json("m1", json!({"role": "member"}))).await;
        store
    }

    #[tokio::test]
    async fn test_admin_route_excludes_members() {
        let directory = InMemoryDirectory::new()
            .with_user("a1", "ana@example.com")
            .with_user("a2", "rui@example.com")
            .with_user("m1", "membro@example.com");
        let resolver = RecipientResolver::new(users_store().await, Arc::new(directory));

        let mut recipients = resolver.routed_recipients(Some("admin")).await.unwrap();
        recipients.sort();

        assert_eq!(recipients, vec!["ana@example.com", "rui@example.com"]);
    }

    #[tokio::test]
    async fn test_literal_and_missing_routes() {
        let resolver = RecipientResolver::new(
            Arc::new(InMemoryDocumentStore::new()),
            Arc::new(InMemoryDirectory::new()),
        );

        assert_eq!(
            resolver.routed_recipients(Some("socio@example.com")).await.unwrap(),
            vec!["socio@example.com"]
        );
        assert!(resolver.routed_recipients(Some("  ")).await.unwrap().is_empty());
        assert!(resolver.routed_recipients(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_admin_missing_from_identity_provider_is_skipped() {
        let mut directory = MockIdentityDirectory::new();
        directory.expect_lookup_user().times(2).returning(|uid| {
            if uid == "a1" {
                Ok(UserRecord {
                    uid: uid.to_string(),
                    email: Some("ana@example.com".to_string()),
                })
            } else {
                Err(IntakeError::UserNotFound(uid.to_string()))
            }
        });

        let resolver = RecipientResolver::new(users_store().await, Arc::new(directory));
        assert_eq!(resolver.admin_recipients().await.unwrap(), vec!["ana@example.com"]);
    }

    #[tokio::test]
    async fn test_directory_failure_aborts_resolution() {
        let mut directory = MockIdentityDirectory::new();
        directory
            .expect_lookup_user()
            .returning(|_| Err(IntakeError::Directory("quota exceeded".to_string())));

        let resolver = RecipientResolver::new(users_store().await, Arc::new(directory));
        assert!(matches!(
            resolver.admin_recipients().await,
            Err(IntakeError::Directory(_))
        ));
    }

    #[tokio::test]
    async fn test_users_query_failure_aborts_resolution() {
        let mut store = MockDocumentStore::new();
        store
            .expect_query()
            .withf(|collection, filter| collection == "users" && filter.field_path == "role")
            .returning(|_, _| Err(IntakeError::Store("unavailable".to_string())));

        let resolver = RecipientResolver::new(Arc::new(store), Arc::new(InMemoryDirectory::new()));
        assert!(resolver.routed_recipients(Some("admin")).await.is_err());
    }
}
