//! Capture records as reported by remote client instances.
//!
//! Clients report their full capture history on every poll. A report is
//! treated as a read-only external fact: it is parsed leniently, malformed
//! entries are skipped with an error message, and for each pokemon id only
//! the most recent entry decides whether the id is active.
//!
//! # Resolution
//!
//! 1. Parse each raw JSON entry (skip and record an error if malformed)
//! 2. Drop entries whose action is not `capture` or `favorite`
//! 3. Optionally drop entries at or before a `since` cutoff
//! 4. Keep the most recent entry per pokemon id (timestamp, then list order)
//! 5. Split into active captures and removed ids

use crate::{names, Error, PokemonId, Result, Timestamp, MAX_POKEMON_ID};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Action a client recorded for a pokemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureAction {
    Capture,
    Favorite,
}

impl CaptureAction {
    /// Parse an action string. Unknown actions yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "capture" => Some(Self::Capture),
            "favorite" => Some(Self::Favorite),
            _ => None,
        }
    }
}

/// A single capture record reported by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureRecord {
    /// Client-side record id, used for acknowledgement
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub pokemon_id: PokemonId,
    pub pokemon_name: String,
    pub action: CaptureAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
    #[serde(default)]
    pub removed: bool,
}

impl CaptureRecord {
    /// Parse a raw JSON entry.
    ///
    /// `pokemon_id` and `action` are required. `removed` is read from the top
    /// level or from a nested `metadata` object. A missing name is resolved
    /// from the embedded table.
    pub fn from_value(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| Error::MalformedCapture("expected a JSON object".into()))?;

        let pokemon_id = match obj.get("pokemon_id") {
            Some(v) => parse_pokemon_id(v)?,
            None => return Err(Error::MissingRequiredField("pokemon_id".into())),
        };

        let action_raw = obj
            .get("action")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::MissingRequiredField("action".into()))?;
        let action = CaptureAction::parse(action_raw)
            .ok_or_else(|| Error::UnsupportedAction(action_raw.to_string()))?;

        let pokemon_name = match obj.get("pokemon_name").and_then(Value::as_str) {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => names::pokemon_name(pokemon_id).into_owned(),
        };

        let timestamp = match obj.get("timestamp") {
            None | Some(Value::Null) => None,
            Some(v) => Some(parse_timestamp_value(v).ok_or_else(|| {
                Error::MalformedCapture(format!("unparseable timestamp: {}", v))
            })?),
        };

        let removed = obj
            .get("removed")
            .or_else(|| obj.get("metadata").and_then(|m| m.get("removed")))
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let id = obj
            .get("id")
            .or_else(|| obj.get("capture_id"))
            .and_then(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            });

        Ok(Self {
            id,
            pokemon_id,
            pokemon_name,
            action,
            timestamp,
            removed,
        })
    }

    /// Whether this record is at least as recent as `other`.
    ///
    /// Records without timestamps fall back to report order, so a later
    /// entry in the same report wins.
    fn supersedes(&self, other: &CaptureRecord) -> bool {
        match (self.timestamp, other.timestamp) {
            (Some(mine), Some(theirs)) => mine >= theirs,
            _ => true,
        }
    }
}

/// An active (non-removed) capture ready to merge into the consolidated state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveCapture {
    pub pokemon_id: PokemonId,
    pub pokemon_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
}

impl ActiveCapture {
    /// Create an active capture.
    pub fn new(pokemon_id: PokemonId, pokemon_name: impl Into<String>) -> Self {
        Self {
            pokemon_id,
            pokemon_name: pokemon_name.into(),
            timestamp: None,
        }
    }

    /// Attach a timestamp.
    pub fn at(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Outcome of resolving one client's capture report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptureBatch {
    /// Active captures, one per pokemon id, ordered by id
    pub active: Vec<ActiveCapture>,
    /// Ids whose most recent entry is marked removed
    pub removed_ids: BTreeSet<PokemonId>,
    /// Client record ids consumed by this batch (for acknowledgement)
    pub consumed_ids: Vec<String>,
    /// Entries carrying the removed flag
    pub skipped_removed: usize,
    /// Entries with an action other than capture/favorite
    pub skipped_action: usize,
    /// Entries older than the `since` cutoff
    pub skipped_stale: usize,
    /// One message per malformed entry
    pub errors: Vec<String>,
}

/// Resolve a raw capture report into active captures.
///
/// With `since` set, only entries strictly newer than the cutoff are
/// considered; entries without a timestamp are then treated as stale.
pub fn resolve_captures(raw: &[Value], since: Option<Timestamp>) -> CaptureBatch {
    let mut batch = CaptureBatch::default();
    let mut latest: BTreeMap<PokemonId, CaptureRecord> = BTreeMap::new();

    for (idx, value) in raw.iter().enumerate() {
        let record = match CaptureRecord::from_value(value) {
            Ok(record) => record,
            Err(Error::UnsupportedAction(_)) => {
                batch.skipped_action += 1;
                continue;
            }
            Err(e) => {
                batch.errors.push(format!("capture #{}: {}", idx, e));
                continue;
            }
        };

        if let Some(cutoff) = since {
            match record.timestamp {
                Some(ts) if ts > cutoff => {}
                _ => {
                    batch.skipped_stale += 1;
                    continue;
                }
            }
        }

        if record.removed {
            batch.skipped_removed += 1;
        }
        if let Some(id) = &record.id {
            batch.consumed_ids.push(id.clone());
        }

        match latest.get(&record.pokemon_id) {
            Some(current) if !record.supersedes(current) => {}
            _ => {
                latest.insert(record.pokemon_id, record);
            }
        }
    }

    for (pokemon_id, record) in latest {
        if record.removed {
            batch.removed_ids.insert(pokemon_id);
        } else {
            batch.active.push(ActiveCapture {
                pokemon_id,
                pokemon_name: record.pokemon_name,
                timestamp: record.timestamp,
            });
        }
    }

    batch
}

fn parse_pokemon_id(value: &Value) -> Result<PokemonId> {
    let id = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    id.and_then(|id| PokemonId::try_from(id).ok())
        .filter(|id| (1..=MAX_POKEMON_ID).contains(id))
        .ok_or_else(|| Error::MalformedCapture(format!("invalid pokemon_id: {}", value)))
}

fn parse_timestamp_value(value: &Value) -> Option<Timestamp> {
    match value {
        Value::String(s) => parse_timestamp(s),
        Value::Number(n) => n
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        _ => None,
    }
}

/// Parse an RFC 3339 timestamp, or a naive ISO 8601 timestamp taken as UTC.
pub fn parse_timestamp(value: &str) -> Option<Timestamp> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
}
