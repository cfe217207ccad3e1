//! Google Sheets interaction log
//!
//! Rows are appended with `values:append` (`RAW`, `INSERT_ROWS`). Access
//! tokens come from a service-account key: a signed RS256 JWT is exchanged
//! at the token endpoint and the token is cached until shortly before it
//! expires.

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use parking_lot::Mutex;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use site_inspector_config::Settings;
use site_inspector_core::{InteractionLog, LogEntry, LogError};

use crate::PersistenceError;

const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const TOKEN_LIFETIME_SECS: i64 = 3600;
/// Tokens are refreshed this long before they expire
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Fields of a service-account JSON key that are used here
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl ServiceAccountKey {
    pub fn from_file(path: &Path) -> Result<Self, PersistenceError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PersistenceError::Credentials(format!("cannot read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            PersistenceError::Credentials(format!("invalid key file {}: {}", path.display(), e))
        })
    }
}

/// Source of bearer tokens for the Sheets API
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, PersistenceError>;

    /// Drop any cached token after the API rejected it
    fn invalidate(&self) {}
}

/// Fixed token, for tests and pre-authorised deployments
pub struct StaticToken(pub String);

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> Result<String, PersistenceError> {
        Ok(self.0.clone())
    }
}

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
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    TOKEN_LIFETIME_SECS as u64
}

struct CachedToken {
    token: String,
    refresh_at: Instant,
}

/// JWT-bearer token exchange for a service account
pub struct ServiceAccountTokens {
    client: Client,
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    token_uri: String,
    cache: Mutex<Option<CachedToken>>,
}

impl ServiceAccountTokens {
    /// `token_uri` overrides the one in the key file
    pub fn new(
        key: ServiceAccountKey,
        token_uri: Option<String>,
        timeout: Duration,
    ) -> Result<Self, PersistenceError> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())?;
        let token_uri = token_uri
            .or_else(|| key.token_uri.clone())
            .ok_or_else(|| PersistenceError::Credentials("no token endpoint".to_string()))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PersistenceError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            key,
            encoding_key,
            token_uri,
            cache: Mutex::new(None),
        })
    }

    fn signed_assertion(&self) -> Result<String, PersistenceError> {
        let iat = Utc::now().timestamp();
        let claims = Claims {
            iss: &self.key.client_email,
            scope: SHEETS_SCOPE,
            aud: &self.token_uri,
            iat,
            exp: iat + TOKEN_LIFETIME_SECS,
        };
        let header = Header {
            kid: self.key.private_key_id.clone(),
            ..Header::new(Algorithm::RS256)
        };
        Ok(jsonwebtoken::encode(&header, &claims, &self.encoding_key)?)
    }

    async fn exchange(&self) -> Result<CachedToken, PersistenceError> {
        let assertion = self.signed_assertion()?;
        let response = self
            .client
            .post(&self.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PersistenceError::Auth(format!("token endpoint {}: {}", status, body)));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| PersistenceError::Auth(format!("bad token response: {}", e)))?;

        let lifetime = Duration::from_secs(token.expires_in);
        tracing::debug!(expires_in = token.expires_in, "Obtained Sheets access token");
        Ok(CachedToken {
            token: token.access_token,
            refresh_at: Instant::now() + lifetime.saturating_sub(TOKEN_REFRESH_MARGIN),
        })
    }
}

#[async_trait]
impl TokenSource for ServiceAccountTokens {
    async fn access_token(&self) -> Result<String, PersistenceError> {
        if let Some(cached) = self.cache.lock().as_ref() {
            if Instant::now() < cached.refresh_at {
                return Ok(cached.token.clone());
            }
        }

        let fresh = self.exchange().await?;
        let token = fresh.token.clone();
        *self.cache.lock() = Some(fresh);
        Ok(token)
    }

    fn invalidate(&self) {
        *self.cache.lock() = None;
    }
}

/// Sheets log configuration
#[derive(Debug, Clone)]
pub struct SheetsConfig {
    /// API base, e.g. `https://sheets.googleapis.com/v4`
    pub api_base: String,
    pub spreadsheet_id: String,
    /// A1 range such as `Sheet1!A1`
    pub range: String,
    pub timeout: Duration,
}

impl SheetsConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            api_base: settings.log_sink.sheets_endpoint.clone(),
            spreadsheet_id: settings.log_sink.spreadsheet_id.clone(),
            range: settings.log_sink.sheet_range.clone(),
            timeout: settings.timeouts.log_append(),
        }
    }
}

/// Google Sheets backed [`InteractionLog`]
pub struct SheetsLog {
    client: Client,
    config: SheetsConfig,
    tokens: Arc<dyn TokenSource>,
}

impl SheetsLog {
    pub fn new(config: SheetsConfig, tokens: Arc<dyn TokenSource>) -> Result<Self, PersistenceError> {
        if config.spreadsheet_id.trim().is_empty() {
            return Err(PersistenceError::Configuration(
                "spreadsheet id is not set".to_string(),
            ));
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PersistenceError::Configuration(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            config,
            tokens,
        })
    }

    /// Service-account log from settings
    pub fn from_settings(settings: &Settings) -> Result<Self, PersistenceError> {
        let key = ServiceAccountKey::from_file(Path::new(&settings.log_sink.credentials_file))?;
        let tokens = ServiceAccountTokens::new(
            key,
            Some(settings.log_sink.token_endpoint.clone()),
            settings.timeouts.log_append(),
        )?;
        Self::new(SheetsConfig::from_settings(settings), Arc::new(tokens))
    }

    /// `{base}/spreadsheets/{id}/values/{range}{suffix}`
    fn values_url(&self, suffix: &str) -> Result<Url, PersistenceError> {
        let mut url = Url::parse(self.config.api_base.trim_end_matches('/'))
            .map_err(|e| PersistenceError::Configuration(format!("bad Sheets endpoint: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| PersistenceError::Configuration("Sheets endpoint cannot be a base".to_string()))?
            .pop_if_empty()
            .push("spreadsheets")
            .push(&self.config.spreadsheet_id)
            .push("values")
            .push(&format!("{}{}", self.config.range, suffix));
        Ok(url)
    }

    fn spreadsheet_url(&self) -> Result<Url, PersistenceError> {
        let mut url = Url::parse(self.config.api_base.trim_end_matches('/'))
            .map_err(|e| PersistenceError::Configuration(format!("bad Sheets endpoint: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| PersistenceError::Configuration("Sheets endpoint cannot be a base".to_string()))?
            .pop_if_empty()
            .push("spreadsheets")
            .push(&self.config.spreadsheet_id);
        Ok(url)
    }

    async fn check(&self, response: reqwest::Response) -> Result<reqwest::Response, PersistenceError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            self.tokens.invalidate();
        }
        let message = response.text().await.unwrap_or_default();
        Err(PersistenceError::Http {
            status: status.as_u16(),
            message,
        })
    }

    /// Append one row of cells
    pub async fn append_row(&self, row: Vec<String>) -> Result<(), PersistenceError> {
        let token = self.tokens.access_token().await?;
        let response = self
            .client
            .post(self.values_url(":append")?)
            .query(&[("valueInputOption", "RAW"), ("insertDataOption", "INSERT_ROWS")])
            .bearer_auth(token)
            .json(&json!({ "values": [row] }))
            .send()
            .await?;
        self.check(response).await?;
        Ok(())
    }

    /// Write the column header when the sheet is empty
    pub async fn ensure_header(&self) -> Result<bool, PersistenceError> {
        #[derive(Deserialize)]
        struct ValueRange {
            #[serde(default)]
            values: Vec<Vec<String>>,
        }

        let token = self.tokens.access_token().await?;
        let response = self
            .client
            .get(self.values_url("")?)
            .bearer_auth(token)
            .send()
            .await?;
        let existing: ValueRange = self
            .check(response)
            .await?
            .json()
            .await
            .map_err(|e| PersistenceError::Network(e.to_string()))?;

        if !existing.values.is_empty() {
            return Ok(false);
        }
        self.append_row(LogEntry::COLUMNS.iter().map(|c| c.to_string()).collect())
            .await?;
        tracing::info!(spreadsheet = %self.config.spreadsheet_id, "Wrote log header row");
        Ok(true)
    }
}

#[async_trait]
impl InteractionLog for SheetsLog {
    async fn record(&self, entry: &LogEntry) -> Result<(), LogError> {
        self.append_row(entry.to_row()).await.map_err(LogError::from)
    }

    async fn health_check(&self) -> Result<(), LogError> {
        let token = self.tokens.access_token().await?;
        let response = self
            .client
            .get(self.spreadsheet_url()?)
            .query(&[("fields", "spreadsheetId")])
            .bearer_auth(token)
            .send()
            .await
            .map_err(PersistenceError::from)?;
        self.check(response).await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "google_sheets"
    }
}
