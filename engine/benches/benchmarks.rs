//! Performance benchmarks for pokesync-engine

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pokesync_engine::{build_ranking, resolve_captures, ActiveCapture, ConsolidatedState};
use serde_json::json;

fn captures_for(client: u32, per_client: u32) -> Vec<ActiveCapture> {
    (0..per_client)
        .map(|i| {
            let id = (client * 7 + i * 13) % 1000 + 1;
            ActiveCapture::new(id, format!("pokemon_{}", id))
        })
        .collect()
}

fn populated_state(clients: u32, per_client: u32) -> ConsolidatedState {
    let now = chrono::Utc::now();
    let mut state = ConsolidatedState::new();
    for client in 0..clients {
        state.update_client_captures(&format!("client_{}", client), &captures_for(client, per_client), now);
    }
    state
}

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge");

    for clients in [10u32, 50, 200] {
        group.bench_with_input(
            BenchmarkId::new("update_client_captures", clients),
            &clients,
            |b, &clients| {
                let mut state = populated_state(clients, 100);
                let now = chrono::Utc::now();
                let mut round = 0u32;
                b.iter(|| {
                    round += 1;
                    let captures = captures_for(round, 100);
                    state.update_client_captures(black_box("client_0"), black_box(&captures), now)
                })
            },
        );
    }

    group.finish();
}

fn bench_ranking(c: &mut Criterion) {
    let mut group = c.benchmark_group("ranking");

    let state = populated_state(100, 150);
    group.bench_function("ranking_data_100", |b| {
        b.iter(|| state.ranking_data(black_box(100)))
    });

    let pairs = state.ranking_data(100);
    group.bench_function("build_ranking_100", |b| {
        b.iter(|| build_ranking(black_box(&pairs)))
    });

    group.finish();
}

fn bench_resolve(c: &mut Criterion) {
    let report: Vec<_> = (0..500u32)
        .map(|i| {
            json!({
                "id": i,
                "pokemon_id": i % 151 + 1,
                "action": if i % 2 == 0 { "capture" } else { "favorite" },
                "timestamp": format!("2024-05-01T10:{:02}:{:02}Z", (i / 60) % 60, i % 60),
                "removed": i % 11 == 0,
            })
        })
        .collect();

    c.bench_function("resolve_captures_500", |b| {
        b.iter(|| resolve_captures(black_box(&report), None))
    });
}

criterion_group!(benches, bench_merge, bench_ranking, bench_resolve);
criterion_main!(benches);
