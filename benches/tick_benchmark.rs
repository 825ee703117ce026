//! Benchmarks for whole ticks.
//!
//! This benchmarks merge + equilibration + combat on generated boards - the
//! work every due game does once per slot.

#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use sluice::game::{Command, Direction, GameState, Player, PlayerId};
use sluice::lobby::generate_board;
use sluice::notation::EncodedBoard;
use sluice::SimConfig;

/// A generated game where every player tries to open every gate it owns.
fn setup(rows: u16, cols: u16, players: usize) -> (GameState, BTreeMap<PlayerId, Vec<Command>>) {
    let config = SimConfig::default();
    let board = generate_board(42, rows, cols, players, &config).expect("board generation");
    let seats: Vec<Player> = (1..=players)
        .map(|i| {
            let id = PlayerId::try_from(i).expect("seat fits");
            Player::new(id, format!("p{id}@example.org"))
        })
        .collect();
    let mut state = GameState::new(board, seats, 0);

    // Let force spread for a few ticks first
    for _ in 0..5 {
        state.advance(&BTreeMap::new(), &config);
    }

    let mut orders: BTreeMap<PlayerId, Vec<Command>> = BTreeMap::new();
    for (coord, cell) in state.board.grid.iter() {
        if let Some(owner) = cell.owner {
            for dir in [Direction::East, Direction::South] {
                orders.entry(owner).or_default().push(Command::new(coord, dir, true));
            }
        }
    }
    (state, orders)
}

fn bench_tick(c: &mut Criterion) {
    let config = SimConfig::default();
    let mut group = c.benchmark_group("tick");
    for (rows, cols, players) in [(10, 10, 2), (20, 20, 4), (26, 40, 8)] {
        let (state, orders) = setup(rows, cols, players);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{rows}x{cols}_{players}p")),
            &(state, orders),
            |b, (state, orders)| {
                b.iter(|| {
                    let mut state = state.clone();
                    black_box(state.advance(black_box(orders), &config))
                });
            },
        );
    }
    group.finish();
}

fn bench_notation(c: &mut Criterion) {
    let config = SimConfig::default();
    let board = generate_board(7, 26, 40, 8, &config).expect("board generation");
    let encoded = EncodedBoard::encode(&board);

    c.bench_function("encode_26x40", |b| {
        b.iter(|| black_box(EncodedBoard::encode(black_box(&board))));
    });
    c.bench_function("decode_26x40", |b| {
        b.iter(|| black_box(encoded.decode()));
    });
}

criterion_group!(benches, bench_tick, bench_notation);
criterion_main!(benches);
