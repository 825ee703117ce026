#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sluice::game::{resolve_contest, Contestant};
use sluice::SimConfig;

/// Structured input for combat fuzzing.
#[derive(Arbitrary, Debug)]
struct CombatInput {
    /// Force per side; side 0 is the neutral resident.
    forces: Vec<u16>,
    /// Index of the side that held the cell before the tick.
    defender: Option<u8>,
    /// Combat exponent in tenths, offset from 1.0.
    exponent_tenths: u8,
    /// Defender penalty in percent.
    penalty_percent: u8,
}

fuzz_target!(|input: CombatInput| {
    let config = SimConfig {
        combat_exponent: 1.1 + f64::from(input.exponent_tenths % 40) / 10.0,
        defender_penalty: f64::from(input.penalty_percent % 100 + 1) / 100.0,
        ..SimConfig::default()
    };

    // Cap inputs to the board's range
    let contestants: Vec<Contestant> = input
        .forces
        .iter()
        .take(9)
        .enumerate()
        .map(|(i, &force)| Contestant {
            owner: u8::try_from(i).ok().filter(|&id| id > 0),
            force: u32::from(force).min(config.max_quantity),
        })
        .collect();
    let defender = input
        .defender
        .and_then(|d| contestants.get(usize::from(d)))
        .and_then(|c| c.owner);

    // Must not panic
    let result = resolve_contest(&contestants, defender, &config);

    // Survivors never exceed the cap or what the winner brought
    assert!(result.remaining <= config.max_quantity);
    match result.winner {
        Some(winner) => {
            let brought = contestants
                .iter()
                .find(|c| c.owner == Some(winner))
                .map_or(0, |c| c.force);
            assert!(
                result.remaining <= brought,
                "winner {winner} kept {} of {brought}",
                result.remaining
            );
        }
        None => {
            let neutral = contestants.iter().find(|c| c.owner.is_none()).map_or(0, |c| c.force);
            assert!(result.remaining <= neutral);
        }
    }
});
