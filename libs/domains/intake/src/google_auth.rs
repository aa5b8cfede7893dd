//! Google service-account authentication
//!
//! Signs an RS256 JWT assertion with the service-account key and exchanges it
//! at the OAuth2 token endpoint. The access token is cached and reused until
//! one minute before it expires.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{IntakeError, IntakeResult};

pub const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const REFRESH_MARGIN_SECS: i64 = 60;

/// Service-account JSON key as downloaded from the Google Cloud console
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    /// RSA private key, PEM encoded
    pub private_key: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"[REDACTED]")
            .field("project_id", &self.project_id)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

impl ServiceAccountKey {
    pub fn from_json(json: &str) -> IntakeResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| IntakeError::Auth(format!("Failed to parse service account key: {}", e)))
    }

    pub fn from_file(path: impl AsRef<Path>) -> IntakeResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            IntakeError::Auth(format!(
                "Failed to read service account key file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&json)
    }

    /// Key JSON encoded as base64, the form used for environment variables
    pub fn from_base64(encoded: &str) -> IntakeResult<Self> {
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|e| IntakeError::Auth(format!("Failed to decode service account key: {}", e)))?;
        let json = String::from_utf8(bytes)
            .map_err(|e| IntakeError::Auth(format!("Service account key is not UTF-8: {}", e)))?;
        Self::from_json(&json)
    }

    fn token_url(&self) -> &str {
        self.token_uri.as_deref().unwrap_or(TOKEN_URL)
    }
}

#[derive(Debug, Serialize)]
struct JwtClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - Duration::seconds(REFRESH_MARGIN_SECS) > now
    }
}

/// Cached OAuth2 access tokens for one service account
#[derive(Clone)]
pub struct GoogleTokenSource {
    key: Arc<ServiceAccountKey>,
    scope: String,
    client: Client,
    cache: Arc<RwLock<Option<CachedToken>>>,
}

impl GoogleTokenSource {
    pub fn new(key: ServiceAccountKey, client: Client) -> Self {
        Self {
            key: Arc::new(key),
            scope: CLOUD_PLATFORM_SCOPE.to_string(),
            client,
            cache: Arc::new(RwLock::new(None)),
        }
    }

    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    pub fn project_id(&self) -> Option<&str> {
        self.key.project_id.as_deref()
    }

    /// A bearer token valid for at least another minute
    pub async fn access_token(&self) -> IntakeResult<String> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref().filter(|c| c.is_fresh(Utc::now())) {
                return Ok(cached.access_token.clone());
            }
        }

        let mut cache = self.cache.write().await;
        // Another task may have refreshed while we waited for the write lock
        if let Some(cached) = cache.as_ref().filter(|c| c.is_fresh(Utc::now())) {
            return Ok(cached.access_token.clone());
        }

        let token = self.fetch_access_token().await?;
        debug!(
            client_email = %self.key.client_email,
            expires_in = token.expires_in,
            "Fetched Google access token"
        );
        *cache = Some(CachedToken {
            access_token: token.access_token.clone(),
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
        });
        Ok(token.access_token)
    }

    fn claims(&self, now: DateTime<Utc>) -> JwtClaims {
        let iat = now.timestamp();
        JwtClaims {
            iss: self.key.client_email.clone(),
            scope: self.scope.clone(),
            aud: self.key.token_url().to_string(),
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        }
    }

    fn assertion(&self) -> IntakeResult<String> {
        let header = jsonwebtoken::Header::new(jsonwebtoken::Algorithm::RS256);
        let key = jsonwebtoken::EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .map_err(|e| IntakeError::Auth(format!("Invalid private key: {}", e)))?;

        jsonwebtoken::encode(&header, &self.claims(Utc::now()), &key)
            .map_err(|e| IntakeError::Auth(format!("Failed to create JWT: {}", e)))
    }

    async fn fetch_access_token(&self) -> IntakeResult<TokenResponse> {
        let assertion = self.assertion()?;

        let response = self
            .client
            .post(self.key.token_url())
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", &assertion)])
            .send()
            .await
            .map_err(|e| IntakeError::Auth(format!("Token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(IntakeError::Auth(format!(
                "Token exchange failed ({}): {}",
                status, body
            )));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| IntakeError::Auth(format!("Failed to parse token response: {}", e)))
    }
}
