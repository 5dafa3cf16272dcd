//! Consolidation tests for pokesync-engine
//!
//! These cover the full report -> state -> ranking path and the invariants
//! that must hold for arbitrary report sequences.

use pokesync_engine::{
    build_ranking, resolve_captures, ActiveCapture, ConsolidatedState, PokemonId, Timestamp,
};
use proptest::prelude::*;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};

fn now() -> Timestamp {
    chrono::DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
        .unwrap()
        .with_timezone(&chrono::Utc)
}

fn full_recount(state: &ConsolidatedState, clients: &[&str]) -> BTreeMap<PokemonId, u32> {
    let mut counts = BTreeMap::new();
    for client in clients {
        if let Some(set) = state.client_captures(client) {
            for id in set {
                *counts.entry(*id).or_insert(0) += 1;
            }
        }
    }
    counts
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn two_clients_end_to_end() {
    let mut state = ConsolidatedState::new();

    let client_a = resolve_captures(
        &[
            json!({"pokemon_id": 25, "pokemon_name": "pikachu", "action": "capture"}),
            json!({"pokemon_id": 6, "pokemon_name": "charizard", "action": "capture"}),
        ],
        None,
    );
    let client_b = resolve_captures(
        &[json!({"pokemon_id": 25, "pokemon_name": "pikachu", "action": "favorite"})],
        None,
    );

    state.update_client_captures("a", &client_a.active, now());
    state.update_client_captures("b", &client_b.active, now());

    let counts: Vec<_> = state
        .pokemon_counts()
        .iter()
        .map(|(id, count)| (*id, *count))
        .collect();
    assert_eq!(counts, vec![(6, 1), (25, 2)]);

    let ranking = build_ranking(&state.ranking_data(100));
    let ranked: Vec<_> = ranking
        .iter()
        .map(|e| (e.pokemon_id, e.favorite_count))
        .collect();
    assert_eq!(ranked, vec![(25, 2), (6, 1)]);
}

#[test]
fn removal_in_later_report_drops_capture() {
    let mut state = ConsolidatedState::new();

    let first = resolve_captures(
        &[json!({"pokemon_id": 25, "action": "capture", "timestamp": "2024-05-01T10:00:00Z"})],
        None,
    );
    state.update_client_captures("a", &first.active, now());
    assert_eq!(state.pokemon_counts().get(&25), Some(&1));

    let second = resolve_captures(
        &[
            json!({"pokemon_id": 25, "action": "capture", "timestamp": "2024-05-01T10:00:00Z"}),
            json!({"pokemon_id": 25, "action": "capture", "timestamp": "2024-05-01T11:00:00Z", "removed": true}),
        ],
        None,
    );
    let stats = state.update_client_captures("a", &second.active, now());

    assert_eq!(stats.removed_count, 1);
    assert_eq!(state.pokemon_counts().get(&25), None);
    assert!(state.client_captures("a").unwrap().is_empty());
}

#[test]
fn empty_report_keeps_client_with_empty_set() {
    let mut state = ConsolidatedState::new();
    let stats = state.update_client_captures("a", &[], now());

    assert_eq!(stats.total_captures, 0);
    assert_eq!(state.stats().total_clients, 1);
    assert_eq!(state.last_updated(), Some(now()));
    assert!(state.ranking_data(10).is_empty());
}

#[test]
fn round_trip_preserves_state() {
    let mut state = ConsolidatedState::new();
    state.update_client_captures("a", &[ActiveCapture::new(1, "bulbasaur")], now());
    state.update_client_captures("b", &[ActiveCapture::new(1, "bulbasaur")], now());

    let restored = ConsolidatedState::from_json(&state.to_json_pretty().unwrap()).unwrap();
    assert_eq!(restored, state);
}

// ============================================================================
// Properties
// ============================================================================

fn report_strategy() -> impl Strategy<Value = Vec<(usize, Vec<PokemonId>)>> {
    prop::collection::vec(
        (0usize..4, prop::collection::vec(1u32..30, 0..12)),
        1..20,
    )
}

proptest! {
    #[test]
    fn counts_always_match_full_recount(reports in report_strategy()) {
        let clients = ["c0", "c1", "c2", "c3"];
        let mut state = ConsolidatedState::new();

        for (client_idx, ids) in &reports {
            let captures: Vec<_> = ids
                .iter()
                .map(|id| ActiveCapture::new(*id, pokesync_engine::pokemon_name(*id)))
                .collect();
            state.update_client_captures(clients[*client_idx], &captures, now());
            prop_assert_eq!(state.pokemon_counts(), &full_recount(&state, &clients));
        }
    }

    #[test]
    fn repeated_update_is_noop(ids in prop::collection::vec(1u32..200, 0..50)) {
        let captures: Vec<_> = ids.iter().map(|id| ActiveCapture::new(*id, "x")).collect();
        let mut state = ConsolidatedState::new();

        state.update_client_captures("a", &captures, now());
        let snapshot = state.to_json_pretty().unwrap();
        let stats = state.update_client_captures("a", &captures, now() + chrono::Duration::hours(1));

        prop_assert!(stats.is_noop());
        prop_assert_eq!(stats.total_captures, ids.iter().collect::<BTreeSet<_>>().len());
        prop_assert_eq!(state.to_json_pretty().unwrap(), snapshot);
    }

    #[test]
    fn ranking_is_totally_ordered(reports in report_strategy(), limit in 0usize..40) {
        let clients = ["c0", "c1", "c2", "c3"];
        let mut state = ConsolidatedState::new();
        for (client_idx, ids) in &reports {
            let captures: Vec<_> = ids.iter().map(|id| ActiveCapture::new(*id, "x")).collect();
            state.update_client_captures(clients[*client_idx], &captures, now());
        }

        let ranking = state.ranking_data(limit);
        prop_assert!(ranking.len() <= limit);
        for pair in ranking.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            prop_assert!(a.1 > b.1 || (a.1 == b.1 && a.0 < b.0));
        }
    }
}
