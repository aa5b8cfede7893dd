//! Firebase Authentication user lookup (Identity Toolkit REST)

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use crate::directory::{IdentityDirectory, UserRecord};
use crate::error::{IntakeError, IntakeResult};
use crate::google_auth::GoogleTokenSource;

pub const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";

/// [`IdentityDirectory`] backed by a Firebase project's user accounts
#[derive(Clone)]
pub struct FirebaseAuthDirectory {
    project_id: String,
    base_url: String,
    client: Client,
    tokens: GoogleTokenSource,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<AccountInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountInfo {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
}

impl FirebaseAuthDirectory {
    pub fn new(project_id: impl Into<String>, tokens: GoogleTokenSource, client: Client) -> Self {
        Self {
            project_id: project_id.into(),
            base_url: IDENTITY_TOOLKIT_URL.to_string(),
            client,
            tokens,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn lookup_url(&self) -> String {
        format!("{}/projects/{}/accounts:lookup", self.base_url, self.project_id)
    }
}

fn user_from_response(uid: &str, response: LookupResponse) -> IntakeResult<UserRecord> {
    response
        .users
        .into_iter()
        .find(|user| user.local_id == uid)
        .map(|user| UserRecord {
            uid: user.local_id,
            email: user.email.filter(|email| !email.is_empty()),
        })
        .ok_or_else(|| IntakeError::UserNotFound(uid.to_string()))
}

#[async_trait]
impl IdentityDirectory for FirebaseAuthDirectory {
    #[instrument(skip(self), fields(project = %self.project_id))]
    async fn lookup_user(&self, uid: &str) -> IntakeResult<UserRecord> {
        let token = self.tokens.access_token().await?;

        let response = self
            .client
            .post(self.lookup_url())
            .bearer_auth(token)
            .json(&json!({ "localId": [uid] }))
            .send()
            .await
            .map_err(|e| IntakeError::Directory(format!("Lookup request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            if body.contains("USER_NOT_FOUND") {
                return Err(IntakeError::UserNotFound(uid.to_string()));
            }
            return Err(IntakeError::Directory(format!(
                "Lookup of {} failed ({}): {}",
                uid, status, body
            )));
        }

        let parsed: LookupResponse = response
            .json()
            .await
            .map_err(|e| IntakeError::Decode(format!("Invalid lookup response: {}", e)))?;

        user_from_response(uid, parsed)
    }
}
