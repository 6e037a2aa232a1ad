//! Service-account authentication for the Sheets API.
//!
//! Mints a short-lived RS256 JWT from the service-account key, exchanges it
//! for an access token at the Google OAuth endpoint, and caches the token
//! until shortly before expiry.

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use remindrs_core::{Error, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::sync::Mutex;
use tracing::info;

const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const TOKEN_LIFETIME_SECS: i64 = 3600;
/// Refresh this many seconds before the token actually expires.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// The fields of a Google service-account key file this client needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "ServiceAccountKey::default_token_uri")]
    pub token_uri: String,
}

impl ServiceAccountKey {
    fn default_token_uri() -> String {
        "https://oauth2.googleapis.com/token".to_string()
    }

    /// Load a key from a credentials JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Persistence(format!("cannot read credentials {}: {e}", path.display()))
        })?;
        serde_json::from_str(&content)
            .map_err(|e| Error::Persistence(format!("invalid credentials file: {e}")))
    }
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: i64,
}

/// Caching access-token source for one service account.
pub struct TokenProvider {
    client: Client,
    key: ServiceAccountKey,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenProvider {
    #[must_use]
    pub fn new(client: Client, key: ServiceAccountKey) -> Self {
        Self {
            client,
            key,
            cached: Mutex::new(None),
        }
    }

    /// A valid access token, minting a new one when the cache is stale.
    pub async fn token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;

        let now = Utc::now().timestamp();
        if let Some(token) = cached.as_ref() {
            if token.expires_at - EXPIRY_MARGIN_SECS > now {
                return Ok(token.access_token.clone());
            }
        }

        let token = self.mint(now).await?;
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    async fn mint(&self, now: i64) -> Result<CachedToken> {
        let claims = Claims {
            iss: &self.key.client_email,
            scope: SHEETS_SCOPE,
            aud: &self.key.token_uri,
            iat: now,
            exp: now + TOKEN_LIFETIME_SECS,
        };

        let encoding_key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .map_err(|e| Error::Persistence(format!("invalid service-account key: {e}")))?;
        let assertion = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
            .map_err(|e| Error::Persistence(format!("cannot sign token request: {e}")))?;

        let response = self
            .client
            .post(&self.key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| Error::Persistence(format!("token exchange failed: {e}")))?
            .json::<serde_json::Value>()
            .await
            .map_err(|e| Error::Persistence(format!("invalid token response: {e}")))?;

        let access_token = response["access_token"]
            .as_str()
            .ok_or_else(|| Error::Persistence("token response has no access_token".to_string()))?
            .to_string();
        let expires_in = response["expires_in"].as_i64().unwrap_or(TOKEN_LIFETIME_SECS);

        info!("Minted Sheets access token (expires in {expires_in}s)");
        Ok(CachedToken {
            access_token,
            expires_at: now + expires_in,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn key_file_defaults_token_uri() {
        let key: ServiceAccountKey = serde_json::from_str(
            r#"{"client_email": "bot@example.iam.gserviceaccount.com", "private_key": "pem"}"#,
        )
        .unwrap();
        assert_eq!(key.token_uri, "https://oauth2.googleapis.com/token");
    }

    #[test]
    fn claims_serialize_with_scope() {
        let claims = Claims {
            iss: "bot@example.iam.gserviceaccount.com",
            scope: SHEETS_SCOPE,
            aud: "https://oauth2.googleapis.com/token",
            iat: 1,
            exp: 3601,
        };
        let value = serde_json::to_value(&claims).unwrap();
        assert_eq!(value["scope"], SHEETS_SCOPE);
        assert_eq!(value["iss"], "bot@example.iam.gserviceaccount.com");
    }
}
