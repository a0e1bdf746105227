//! Service-account authentication
//!
//! Implements the OAuth2 JWT-bearer grant used by Google service accounts:
//! an RS256-signed assertion is exchanged at the key's `token_uri` for a
//! short-lived access token. The token is cached and reused until shortly
//! before it expires.
//!
//! ```http
//! POST https://oauth2.googleapis.com/token
//! Content-Type: application/x-www-form-urlencoded
//!
//! grant_type=urn:ietf:params:oauth:grant-type:jwt-bearer&assertion=<jwt>
//! ```

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use gddns_core::{Error, Result};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::sync::Mutex;

/// OAuth2 scope granting read/write access to Cloud DNS
pub const CLOUD_DNS_SCOPE: &str = "https://www.googleapis.com/auth/ndev.clouddns.readwrite";

/// Token endpoint used when the key file does not name one
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime requested for each signed assertion (Google's maximum)
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Refresh the access token this long before it expires
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Service-account key as downloaded from the Cloud console
///
/// Only the fields needed for the JWT-bearer flow are kept; the rest of
/// the document is ignored.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    /// Service account identity (JWT issuer)
    pub client_email: String,

    /// PEM-encoded RSA private key
    /// ⚠️ NEVER log this value
    pub private_key: String,

    /// Identifier of the private key, sent as the JWT `kid`
    #[serde(default)]
    pub private_key_id: Option<String>,

    /// OAuth2 token endpoint
    #[serde(default = "default_token_uri")]
    pub token_uri: String,

    /// Project the service account belongs to
    #[serde(default)]
    pub project_id: Option<String>,
}

// Custom Debug implementation that hides the private key
impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"<REDACTED>")
            .field("token_uri", &self.token_uri)
            .field("project_id", &self.project_id)
            .finish()
    }
}

impl ServiceAccountKey {
    /// Parse a key from its JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let key: Self = serde_json::from_str(json)
            .map_err(|e| Error::config(format!("Invalid service account key: {}", e)))?;

        if key.client_email.trim().is_empty() {
            return Err(Error::config("Service account key has an empty client_email"));
        }

        Ok(key)
    }

    /// Load a key from a file on disk
    ///
    /// A missing or unreadable file is a configuration error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "Cannot read service account key {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&json)
    }
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// JWT claim set for the assertion
#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + ChronoDuration::seconds(EXPIRY_MARGIN_SECS) < self.expires_at
    }
}

/// Mints and caches access tokens for one service account
pub struct TokenSource {
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    client: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSource")
            .field("client_email", &self.key.client_email)
            .field("access_token", &"<REDACTED>")
            .finish()
    }
}

impl TokenSource {
    /// Create a token source
    ///
    /// Fails with an authentication error when the private key is not a
    /// valid PEM-encoded RSA key.
    pub fn new(key: ServiceAccountKey, client: reqwest::Client) -> Result<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| Error::auth(format!("Invalid service account private key: {}", e)))?;

        Ok(Self {
            key,
            encoding_key,
            client,
            cached: Mutex::new(None),
        })
    }

    /// Service account identity
    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    /// A valid access token, fetching a new one when the cache is stale
    pub async fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref()
            && token.is_fresh(Utc::now())
        {
            return Ok(token.value.clone());
        }

        let token = self.fetch().await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    fn assertion(&self, now: DateTime<Utc>) -> Result<String> {
        let claims = Claims {
            iss: &self.key.client_email,
            scope: CLOUD_DNS_SCOPE,
            aud: &self.key.token_uri,
            iat: now.timestamp(),
            exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();

        jsonwebtoken::encode(&header, &claims, &self.encoding_key)
            .map_err(|e| Error::auth(format!("Failed to sign token request: {}", e)))
    }

    async fn fetch(&self) -> Result<CachedToken> {
        let now = Utc::now();
        let assertion = self.assertion(now)?;

        tracing::debug!(
            "Requesting access token for {} from {}",
            self.key.client_email,
            self.key.token_uri
        );

        let response = self
            .client
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| Error::http(format!("Token request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            return Err(match status.as_u16() {
                // invalid_grant, invalid_client, disabled account
                400 | 401 | 403 => Error::auth(format!(
                    "Token request rejected for {}: {} - {}",
                    self.key.client_email, status, error_text
                )),
                429 => Error::rate_limited(format!("Token endpoint: {}", status)),
                _ => Error::http(format!("Token endpoint error: {} - {}", status, error_text)),
            });
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::malformed(format!("Invalid token response: {}", e)))?;

        tracing::debug!("Access token valid for {} seconds", body.expires_in);

        Ok(CachedToken {
            value: body.access_token,
            expires_at: now + ChronoDuration::seconds(body.expires_in),
        })
    }
}
