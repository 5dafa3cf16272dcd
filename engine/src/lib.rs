//! # Pokesync Engine
//!
//! Deterministic consolidation and ranking logic for the Pokesync pull-sync
//! server.
//!
//! Remote client instances report their full capture history; the server
//! polls them and folds each report into a single authoritative state. This
//! crate holds the pure part of that pipeline.
//!
//! ## Design Principles
//!
//! - **No IO**: the engine never touches files, network or databases
//! - **Deterministic**: same reports in, same state and ranking out
//! - **Full recomputation**: derived counts are always recounted, never patched
//!
//! ## Core Concepts
//!
//! ### Captures
//!
//! [`resolve_captures`] turns a raw JSON capture report into a [`CaptureBatch`]:
//! malformed entries are skipped with an error message, unsupported actions are
//! dropped, and the most recent entry per pokemon id decides whether it is active.
//!
//! ### Consolidated State
//!
//! [`ConsolidatedState`] maps each client id to its set of active pokemon ids and
//! derives how many distinct clients hold each id.
//!
//! ### Ranking
//!
//! [`build_ranking`] turns `(pokemon_id, count)` pairs, ordered by count
//! descending and id ascending, into numbered [`RankingEntry`] rows.
//!
//! ## Quick Start
//!
//! ```rust
//! use pokesync_engine::{build_ranking, resolve_captures, ConsolidatedState};
//! use serde_json::json;
//!
//! let report = vec![
//!     json!({"pokemon_id": 25, "pokemon_name": "pikachu", "action": "capture"}),
//!     json!({"pokemon_id": 6, "pokemon_name": "charizard", "action": "favorite"}),
//!     json!({"pokemon_id": 1, "action": "capture", "removed": true}),
//! ];
//! let batch = resolve_captures(&report, None);
//! assert_eq!(batch.active.len(), 2);
//!
//! let mut state = ConsolidatedState::new();
//! let stats = state.update_client_captures("client-a", &batch.active, chrono::Utc::now());
//! assert_eq!(stats.added_count, 2);
//!
//! let ranking = build_ranking(&state.ranking_data(10));
//! assert_eq!(ranking[0].pokemon_name, "charizard");
//! ```

pub mod capture;
pub mod consolidated;
pub mod error;
pub mod names;
pub mod ranking;

// Re-export main types at crate root
pub use capture::{
    parse_timestamp, resolve_captures, ActiveCapture, CaptureAction, CaptureBatch, CaptureRecord,
};
pub use consolidated::{ConsolidatedState, StorageStats, UpdateStats, STORE_FORMAT_VERSION};
pub use error::{Error, Result};
pub use names::{known_name, pokemon_name};
pub use ranking::{build_ranking, rank_counts, RankingEntry, RankingStats, DEFAULT_RANKING_LIMIT};

/// Type aliases for clarity
pub type ClientId = String;
pub type PokemonId = u32;

/// Largest accepted pokemon id. Ids are stored in signed 32-bit columns.
pub const MAX_POKEMON_ID: PokemonId = i32::MAX as PokemonId;
pub type Timestamp = chrono::DateTime<chrono::Utc>;
