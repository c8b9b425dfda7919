// API client module: a small blocking HTTP client for the standup
// service's external API. Every request is signed with the caller's
// identity (see `signing`) and answers are mapped onto `ApiError`.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, DATE};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::signing::{DateWindow, SignedHeaders, JSON_CONTENT_TYPE};

pub const DEFAULT_BASE_URL: &str = "https://www.standupmail.com";
pub const TEAMS_PATH: &str = "/api/external/v1/teams";

/// Account id plus the shared secret used to sign requests.
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: u64,
    pub secret: String,
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("id", &self.id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// A team the user belongs to. Only the fields we cache are kept.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Team {
    pub id: u64,
    pub name: String,
}

/// One day of a team digest.
#[derive(Deserialize, Debug, Clone)]
pub struct DigestDay {
    pub date: String,
    #[serde(default)]
    pub messages: Vec<DigestMessage>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct DigestMessage {
    pub user_id: u64,
    pub user_name: String,
    /// Passed through untouched; the service sends `null` for empty entries.
    #[serde(default)]
    pub message: serde_json::Value,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UpdateKind {
    Working,
    Done,
    Blocked,
}

impl UpdateKind {
    pub const ALL: [UpdateKind; 3] = [UpdateKind::Working, UpdateKind::Done, UpdateKind::Blocked];

    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateKind::Working => "working",
            UpdateKind::Done => "done",
            UpdateKind::Blocked => "blocked",
        }
    }
}

#[derive(Serialize, Debug)]
struct UpdateMessage<'a> {
    #[serde(rename = "type")]
    kind: UpdateKind,
    msg: &'a str,
}

#[derive(Serialize, Debug)]
struct UpdateRequest<'a> {
    messages: [UpdateMessage<'a>; 1],
}

/// What the service reports back after an update: the user's current
/// working/done/blocked entries for that team.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct UpdateSummary {
    #[serde(default)]
    pub working: serde_json::Value,
    #[serde(default)]
    pub done: serde_json::Value,
    #[serde(default)]
    pub blocked: serde_json::Value,
}

/// Blocking client bound to one base URL. Cheap to share by reference
/// across worker threads.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a client pointed at `base_url` (no trailing slash).
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        Ok(ApiClient {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Create a client from `STANDUP_API_URL`, falling back to the
    /// public service.
    pub fn from_env() -> Result<Self> {
        let base_url =
            std::env::var("STANDUP_API_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
        Self::new(base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET the list of teams the identity belongs to.
    pub fn teams(&self, identity: &Identity, now: DateTime<Utc>) -> Result<Vec<Team>, ApiError> {
        self.get(TEAMS_PATH, identity, now)
    }

    /// GET a team's digest for the given window.
    pub fn digest(
        &self,
        team_id: u64,
        window: &DateWindow,
        identity: &Identity,
        now: DateTime<Utc>,
    ) -> Result<Vec<DigestDay>, ApiError> {
        let path = format!(
            "{}/{}/digests?start_date={}&end_date={}",
            TEAMS_PATH,
            team_id,
            window.start_param(),
            window.end_param()
        );
        self.get(&path, identity, now)
    }

    /// POST a single status message to a team.
    pub fn send_update(
        &self,
        team_id: u64,
        kind: UpdateKind,
        text: &str,
        identity: &Identity,
        now: DateTime<Utc>,
    ) -> Result<UpdateSummary, ApiError> {
        let path = format!("{}/{}/messages", TEAMS_PATH, team_id);
        let mut headers = signed_headers(JSON_CONTENT_TYPE, &path, identity, now)?;
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
        let body = UpdateRequest {
            messages: [UpdateMessage { kind, msg: text }],
        };

        debug!(%path, kind = kind.as_str(), "sending update");
        let res = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .headers(headers)
            .json(&body)
            .send()?;
        read_json(&path, res)
    }

    fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        identity: &Identity,
        now: DateTime<Utc>,
    ) -> Result<T, ApiError> {
        let headers = signed_headers("", path, identity, now)?;
        debug!(%path, "GET");
        let res = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .headers(headers)
            .send()?;
        read_json(path, res)
    }
}

/// Accept, Date and Authorization for one request, all derived from a
/// single timestamp.
fn signed_headers(
    content_type: &str,
    path: &str,
    identity: &Identity,
    now: DateTime<Utc>,
) -> Result<HeaderMap, ApiError> {
    let signed = SignedHeaders::new(content_type, path, identity.id, &identity.secret, now);
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(JSON_CONTENT_TYPE));
    headers.insert(DATE, HeaderValue::from_str(&signed.date)?);
    headers.insert(AUTHORIZATION, HeaderValue::from_str(&signed.authorization)?);
    Ok(headers)
}

fn read_json<T: DeserializeOwned>(path: &str, res: Response) -> Result<T, ApiError> {
    let status = res.status();
    debug!(%path, %status, "response");
    if status.is_success() {
        return res.json::<T>().map_err(|e| {
            warn!(%path, error = %e, "could not decode response body");
            ApiError::Unknown { status }
        });
    }
    let body = res.text().unwrap_or_default();
    Err(ApiError::from_response(status, body))
}
