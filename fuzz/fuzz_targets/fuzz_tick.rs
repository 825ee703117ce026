#![no_main]

//! Full tick fuzzer.
//!
//! This fuzz target exercises the complete tick sequence:
//! 1. Parse and validate submitted command text
//! 2. Merge gate commands
//! 3. Equilibrate force through open gates
//! 4. Resolve combat and eliminations
//!
//! This catches integration bugs that individual component fuzzers miss.

use std::collections::BTreeMap;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sluice::game::{check_invariants, check_submission, GameState, Player, PlayerId};
use sluice::lobby::generate_board;
use sluice::SimConfig;

/// Structured input for full tick fuzzing.
#[derive(Arbitrary, Debug)]
struct TickInput {
    /// Board seed.
    seed: u64,
    /// Board size selector.
    size: u8,
    /// Raw submissions per tick, one per player.
    ticks: Vec<[String; 3]>,
}

fuzz_target!(|input: TickInput| {
    let config = SimConfig::default();
    let side = 4 + u16::from(input.size % 8);
    let Ok(board) = generate_board(input.seed, side, side, 3, &config) else {
        return;
    };
    let players: Vec<Player> = (1..=3)
        .map(|id| Player::new(id, format!("p{id}@example.org")))
        .collect();
    let mut state = GameState::new(board, players, 0);

    for texts in input.ticks.iter().take(16) {
        let mut submissions = BTreeMap::new();
        for (seat, text) in (1..).zip(texts) {
            let seat: PlayerId = seat;
            // Rejected submissions are simply not played
            if let Ok(commands) = check_submission(text, &state.board.grid, seat, 10) {
                submissions.insert(seat, commands);
            }
        }

        let outcome = state.advance(&submissions, &config);
        let violations = check_invariants(&state, &config);
        assert!(
            violations.is_empty(),
            "Invariants violated after tick {}: {:?}",
            outcome.tick,
            violations
        );
        if outcome.game_over {
            break;
        }
    }
});
