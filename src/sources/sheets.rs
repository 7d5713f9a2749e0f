use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::blocking::Client;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::{OnceCell, RefCell};
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

use super::{worksheet_name, TableSource};
use crate::error::PressError;
use crate::table::LevelTable;

const SCOPES: &str = "https://www.googleapis.com/auth/spreadsheets.readonly \
                      https://www.googleapis.com/auth/drive.readonly";
const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const DRIVE_FILES_API: &str = "https://www.googleapis.com/drive/v3/files";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const TOKEN_LIFETIME_SECS: u64 = 3600;
/// Fetch a new token this long before the old one runs out.
const TOKEN_REFRESH_MARGIN_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpreadsheetRef {
    Id(String),
    /// Looked up through Drive; the sheet must be shared with the service
    /// account.
    Title(String),
}

/// The fields we need from a service-account JSON key.
#[derive(Debug, Clone, Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    fn load(path: &Path) -> Result<Self, PressError> {
        let credentials_error = |reason: String| PressError::Credentials {
            path: path.to_path_buf(),
            reason,
        };
        let content = fs::read_to_string(path).map_err(|e| credentials_error(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| credentials_error(e.to_string()))
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

fn claims_for(key: &ServiceAccountKey, now: u64) -> Claims<'_> {
    Claims {
        iss: &key.client_email,
        scope: SCOPES,
        aud: &key.token_uri,
        iat: now,
        exp: now + TOKEN_LIFETIME_SECS,
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CachedToken {
    value: String,
    expires_at: u64,
}

impl CachedToken {
    fn issued(response: TokenResponse, now: u64) -> Self {
        Self {
            value: response.access_token,
            expires_at: now + response.expires_in.unwrap_or(TOKEN_LIFETIME_SECS),
        }
    }

    fn is_fresh(&self, now: u64) -> bool {
        now + TOKEN_REFRESH_MARGIN_SECS < self.expires_at
    }
}

fn unix_now() -> Result<u64, PressError> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| PressError::Auth(format!("system clock: {}", e)))?
        .as_secs())
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
}

fn cell_text(value: Value) -> String {
    match value {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn drive_query(title: &str) -> String {
    let escaped = title.replace('\\', "\\\\").replace('\'', "\\'");
    format!(
        "name = '{}' and mimeType = 'application/vnd.google-apps.spreadsheet' and trashed = false",
        escaped
    )
}

fn values_url(spreadsheet_id: &str, worksheet: &str) -> Result<Url, PressError> {
    let mut url = Url::parse(SHEETS_API)
        .map_err(|e| PressError::Config(format!("bad sheets endpoint: {}", e)))?;
    url.path_segments_mut()
        .map_err(|_| PressError::Config("bad sheets endpoint".to_string()))?
        .push(spreadsheet_id)
        .push("values")
        .push(worksheet);
    Ok(url)
}

/// Reads worksheets through the Google Sheets v4 API as a service account.
pub struct GoogleSheetsSource {
    client: Client,
    key: ServiceAccountKey,
    signing_key: EncodingKey,
    spreadsheet: SpreadsheetRef,
    worksheet: String,
    token: RefCell<Option<CachedToken>>,
    spreadsheet_id: OnceCell<String>,
}

impl GoogleSheetsSource {
    /// Loads and checks the key file up front so a bad key stops the run
    /// before anything is fetched.
    pub fn new(
        credentials: &Path,
        spreadsheet: SpreadsheetRef,
        worksheet: String,
    ) -> Result<Self, PressError> {
        let key = ServiceAccountKey::load(credentials)?;
        let signing_key =
            EncodingKey::from_rsa_pem(key.private_key.as_bytes()).map_err(|e| {
                PressError::Credentials {
                    path: credentials.to_path_buf(),
                    reason: format!("private key: {}", e),
                }
            })?;
        debug!("loaded service account {}", key.client_email);

        Ok(Self {
            client: Client::new(),
            key,
            signing_key,
            spreadsheet,
            worksheet,
            token: RefCell::new(None),
            spreadsheet_id: OnceCell::new(),
        })
    }

    /// Reuses the cached token until it is close to expiring, so long runs
    /// over many levels keep working past the token lifetime.
    fn access_token(&self) -> Result<String, PressError> {
        let now = unix_now()?;
        if let Some(token) = self.token.borrow().as_ref().filter(|t| t.is_fresh(now)) {
            return Ok(token.value.clone());
        }

        let assertion = encode(
            &Header::new(Algorithm::RS256),
            &claims_for(&self.key, now),
            &self.signing_key,
        )
        .map_err(|e| PressError::Auth(format!("signing token request: {}", e)))?;

        let response = self
            .client
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .map_err(|source| PressError::Fetch {
                what: "access token".to_string(),
                source,
            })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(PressError::Auth(format!("{}: {}", status, body.trim())));
        }
        let response: TokenResponse = response.json().map_err(|source| PressError::Fetch {
            what: "access token".to_string(),
            source,
        })?;

        let token = CachedToken::issued(response, now);
        debug!(
            "obtained access token for {}, valid until {}",
            self.key.client_email, token.expires_at
        );
        let value = token.value.clone();
        *self.token.borrow_mut() = Some(token);
        Ok(value)
    }

    fn spreadsheet_id(&self, token: &str) -> Result<String, PressError> {
        let title = match &self.spreadsheet {
            SpreadsheetRef::Id(id) => return Ok(id.clone()),
            SpreadsheetRef::Title(title) => title,
        };
        if let Some(id) = self.spreadsheet_id.get() {
            return Ok(id.clone());
        }

        let what = format!("spreadsheet '{}'", title);
        let query = drive_query(title);
        let list: FileList = self
            .client
            .get(DRIVE_FILES_API)
            .bearer_auth(token)
            .query(&[
                ("q", query.as_str()),
                ("fields", "files(id,name)"),
                ("supportsAllDrives", "true"),
                ("includeItemsFromAllDrives", "true"),
            ])
            .send()
            .and_then(|response| response.error_for_status())
            .and_then(|response| response.json())
            .map_err(|source| PressError::Fetch { what, source })?;

        let id = list
            .files
            .into_iter()
            .next()
            .map(|file| file.id)
            .ok_or_else(|| PressError::SpreadsheetNotFound(title.clone()))?;
        info!("resolved spreadsheet '{}' to {}", title, id);
        let _ = self.spreadsheet_id.set(id.clone());
        Ok(id)
    }
}

impl TableSource for GoogleSheetsSource {
    fn name(&self) -> String {
        match &self.spreadsheet {
            SpreadsheetRef::Id(id) => format!("sheets:{}", id),
            SpreadsheetRef::Title(title) => format!("sheets:{}", title),
        }
    }

    fn fetch(&self, level: u32) -> Result<LevelTable, PressError> {
        let token = self.access_token()?;
        let spreadsheet_id = self.spreadsheet_id(&token)?;
        let worksheet = worksheet_name(&self.worksheet, level);
        let url = values_url(&spreadsheet_id, &worksheet)?;

        let range: ValueRange = self
            .client
            .get(url)
            .bearer_auth(&token)
            .send()
            .and_then(|response| response.error_for_status())
            .and_then(|response| response.json())
            .map_err(|source| PressError::Fetch {
                what: format!("worksheet '{}'", worksheet),
                source,
            })?;

        let rows: Vec<Vec<String>> = range
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect();
        debug!("worksheet '{}' has {} rows", worksheet, rows.len());
        Ok(LevelTable::new(level, rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> ServiceAccountKey {
        ServiceAccountKey {
            client_email: "press@example.iam.gserviceaccount.com".to_string(),
            private_key: String::new(),
            token_uri: DEFAULT_TOKEN_URI.to_string(),
        }
    }

    #[test]
    fn claims_last_one_hour() {
        let key = key();
        let claims = claims_for(&key, 1_000);
        assert_eq!(claims.iss, "press@example.iam.gserviceaccount.com");
        assert_eq!(claims.aud, DEFAULT_TOKEN_URI);
        assert_eq!(claims.exp - claims.iat, 3600);
        assert!(claims.scope.contains("spreadsheets.readonly"));
    }

    #[test]
    fn cached_token_is_refreshed_before_it_expires() {
        let response: TokenResponse =
            serde_json::from_str(r#"{"access_token": "ya29.a", "expires_in": 3599}"#).unwrap();
        let token = CachedToken::issued(response, 10_000);
        assert_eq!(token.expires_at, 13_599);
        assert!(token.is_fresh(10_000));
        assert!(token.is_fresh(13_298));
        assert!(!token.is_fresh(13_299));
        assert!(!token.is_fresh(20_000));
    }

    #[test]
    fn token_without_lifetime_lasts_one_hour() {
        let response: TokenResponse =
            serde_json::from_str(r#"{"access_token": "ya29.b", "token_type": "Bearer"}"#)
                .unwrap();
        assert_eq!(CachedToken::issued(response, 0).expires_at, 3600);
    }

    #[test]
    fn key_file_defaults_token_uri() {
        let key: ServiceAccountKey = serde_json::from_str(
            r#"{"type": "service_account", "client_email": "a@b.c", "private_key": "pem"}"#,
        )
        .unwrap();
        assert_eq!(key.token_uri, DEFAULT_TOKEN_URI);
    }

    #[test]
    fn unreadable_or_invalid_keys_are_credentials_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("creds.json");
        let open = |path: &Path| {
            GoogleSheetsSource::new(path, SpreadsheetRef::Id("x".into()), "level_{level}".into())
        };
        assert!(matches!(open(&missing), Err(PressError::Credentials { .. })));

        let bad_pem = dir.path().join("bad.json");
        fs::write(
            &bad_pem,
            r#"{"client_email": "a@b.c", "private_key": "not a key"}"#,
        )
        .unwrap();
        match open(&bad_pem) {
            Err(PressError::Credentials { reason, .. }) => {
                assert!(reason.starts_with("private key"))
            }
            Err(other) => panic!("expected Credentials error, got {:?}", other),
            Ok(_) => panic!("expected Credentials error"),
        }
    }

    #[test]
    fn drive_query_escapes_quotes() {
        assert_eq!(
            drive_query("Bob's sheet"),
            "name = 'Bob\\'s sheet' \
             and mimeType = 'application/vnd.google-apps.spreadsheet' \
             and trashed = false"
        );
    }

    #[test]
    fn values_url_encodes_worksheet() {
        let url = values_url("abc", "level 1").unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/abc/values/level%201"
        );
    }

    #[test]
    fn value_range_tolerates_empty_sheet_and_numbers() {
        let empty: ValueRange =
            serde_json::from_str(r#"{"range": "level_1!A1:Z1000"}"#).unwrap();
        assert!(empty.values.is_empty());

        let range: ValueRange =
            serde_json::from_str(r#"{"values": [["Unit", 1, null, true]]}"#).unwrap();
        let row: Vec<String> = range.values[0].iter().cloned().map(cell_text).collect();
        assert_eq!(row, vec!["Unit", "1", "", "true"]);
    }
}
