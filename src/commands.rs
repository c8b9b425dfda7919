// Command layer: one function per user-facing command. Commands take the
// settings loaded at startup by reference, talk to the API through
// `ApiClient`, and hand structured results back to the UI for printing.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use tracing::{info, warn};

use crate::api::{ApiClient, DigestDay, Identity, Team, UpdateKind, UpdateSummary};
use crate::error::ApiError;
use crate::settings::{Settings, SettingsStore};
use crate::signing::DateWindow;

/// Upper bound on requests in flight during a per-team fan-out.
pub const MAX_IN_FLIGHT: usize = 8;

/// Result of one team's request within a fan-out.
#[derive(Debug)]
pub struct TeamOutcome<T> {
    pub team_id: u64,
    pub result: Result<T, ApiError>,
}

/// A single `{"<user name>": <message>}` entry of a digest day. The
/// message is kept as the service sent it, `null` included.
#[derive(Debug, Clone, PartialEq)]
pub struct UserMessage {
    pub user_name: String,
    pub message: serde_json::Value,
}

impl Serialize for UserMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.user_name, &self.message)?;
        map.end()
    }
}

/// Messages keyed by digest date.
pub type DigestView = BTreeMap<String, Vec<UserMessage>>;

/// Store the identity, then fetch and cache the user's teams. The team
/// cache is only written when the fetch succeeds.
pub fn login(
    client: &ApiClient,
    store: &SettingsStore,
    identity: Identity,
    now: DateTime<Utc>,
) -> Result<Vec<Team>> {
    let mut settings = store.load()?;
    settings.id = Some(identity.id);
    settings.token = Some(identity.secret.clone());
    store.save(&settings)?;

    let teams = client.teams(&identity, now)?;
    info!(count = teams.len(), "fetched teams");
    settings.teams = Some(teams.clone());
    store.save(&settings)?;
    Ok(teams)
}

/// Teams cached at login.
pub fn teams(settings: &Settings) -> Result<&[Team], ApiError> {
    settings.teams.as_deref().ok_or(ApiError::Unauthenticated)
}

/// Identity plus a non-empty team cache: what `show` and `update` need
/// before anything is sent.
pub fn ready(settings: &Settings) -> Result<Identity, ApiError> {
    let identity = settings.identity()?;
    if settings.teams().is_empty() {
        return Err(ApiError::NoTeams);
    }
    Ok(identity)
}

/// Fetch `days` worth of digests for every cached team.
pub fn show(
    client: &ApiClient,
    settings: &Settings,
    days: u32,
    all: bool,
    now: DateTime<Utc>,
) -> Result<Vec<TeamOutcome<DigestView>>, ApiError> {
    let identity = ready(settings)?;
    let window = DateWindow::ending_at(now, days).ok_or(ApiError::InvalidWindow(days))?;
    let team_ids: Vec<u64> = settings.teams().iter().map(|t| t.id).collect();

    Ok(fan_out(&team_ids, |team_id| {
        let digest = client.digest(team_id, &window, &identity, now)?;
        Ok(filter_digest(digest, identity.id, all))
    }))
}

/// Post one update to the selected teams.
pub fn update(
    client: &ApiClient,
    settings: &Settings,
    requested: &[u64],
    kind: UpdateKind,
    text: &str,
    now: DateTime<Utc>,
) -> Result<Vec<TeamOutcome<UpdateSummary>>> {
    let identity = ready(settings)?;
    let team_ids = select_teams(settings.teams(), requested)?;

    Ok(fan_out(&team_ids, |team_id| {
        client.send_update(team_id, kind, text, &identity, now)
    }))
}

/// Resolve which teams an update goes to: every cached team when none
/// are requested, otherwise the requested ids that are actually cached.
pub fn select_teams(cached: &[Team], requested: &[u64]) -> Result<Vec<u64>> {
    if requested.is_empty() {
        return Ok(cached.iter().map(|t| t.id).collect());
    }
    let selected: Vec<u64> = requested
        .iter()
        .copied()
        .filter(|id| cached.iter().any(|t| t.id == *id))
        .collect();
    if selected.is_empty() {
        anyhow::bail!("No valid teams entered.");
    }
    Ok(selected)
}

/// Keep each day's messages, restricted to `user_id` unless `all` is set.
/// Every date key in the response is kept even when it ends up empty.
pub fn filter_digest(days: Vec<DigestDay>, user_id: u64, all: bool) -> DigestView {
    days.into_iter()
        .map(|day| {
            let messages = day
                .messages
                .into_iter()
                .filter(|m| all || m.user_id == user_id)
                .map(|m| UserMessage {
                    user_name: m.user_name.replace('\t', " "),
                    message: m.message,
                })
                .collect();
            (day.date, messages)
        })
        .collect()
}

/// Run `request` once per team on at most `MAX_IN_FLIGHT` scoped worker
/// threads pulling from a shared queue. Every worker is joined before
/// returning and outcomes come back in team order.
fn fan_out<T, F>(team_ids: &[u64], request: F) -> Vec<TeamOutcome<T>>
where
    T: Send,
    F: Fn(u64) -> Result<T, ApiError> + Sync,
{
    let next = AtomicUsize::new(0);
    let slots: Vec<Mutex<Option<Result<T, ApiError>>>> =
        team_ids.iter().map(|_| Mutex::new(None)).collect();
    let workers = team_ids.len().min(MAX_IN_FLIGHT);

    let (next, slots_ref, request) = (&next, &slots, &request);
    thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(move |_| {
                scope.spawn(move || loop {
                    let i = next.fetch_add(1, Ordering::Relaxed);
                    let Some(&team_id) = team_ids.get(i) else {
                        break;
                    };
                    let result = request(team_id);
                    if let Ok(mut slot) = slots_ref[i].lock() {
                        *slot = Some(result);
                    }
                })
            })
            .collect();
        for handle in handles {
            if handle.join().is_err() {
                warn!("fan-out worker panicked");
            }
        }
    });

    // A slot left empty belongs to a request whose worker panicked.
    team_ids
        .iter()
        .zip(slots)
        .map(|(&team_id, slot)| {
            let result = slot
                .into_inner()
                .ok()
                .flatten()
                .unwrap_or(Err(ApiError::WorkerPanicked));
            if let Err(e) = &result {
                warn!(team_id, error = %e, "team request failed");
            }
            TeamOutcome { team_id, result }
        })
        .collect()
}
