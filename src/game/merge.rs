//! Command merge: folds every player's gate commands into the topology.

use std::collections::BTreeMap;

use crate::config::SimConfig;
use crate::game::{Command, GateKey, Gates, Grid, PlayerId, Pressure};

/// What the merge did to the gates. Every list holds canonical keys in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Gates that went from closed to open.
    pub opened: Vec<GateKey>,
    /// Gates that went from open to closed.
    pub closed: Vec<GateKey>,
    /// Gates both opened and closed by someone; left as they were.
    pub conflicts: Vec<GateKey>,
    /// Commands that could not be applied to the current board.
    pub skipped: Vec<GateKey>,
}

impl MergeReport {
    /// Whether the merge changed nothing and reported nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.opened.is_empty()
            && self.closed.is_empty()
            && self.conflicts.is_empty()
            && self.skipped.is_empty()
    }
}

#[derive(Default)]
struct Requests {
    open: bool,
    close: bool,
}

/// Apply all submissions to `grid` and `gates`.
///
/// Commands are grouped by physical gate, so two players naming the same
/// gate from opposite cells land in one group. A group asking for both
/// states is a conflict. A command whose cell changed hands since it was
/// submitted is skipped.
pub fn merge_commands(
    grid: &mut Grid,
    gates: &mut Gates,
    pressure: &Pressure,
    submissions: &BTreeMap<PlayerId, Vec<Command>>,
    config: &SimConfig,
) -> MergeReport {
    let mut report = MergeReport::default();
    let mut groups: BTreeMap<GateKey, Requests> = BTreeMap::new();

    for (&player, commands) in submissions {
        for command in commands {
            let owned = grid
                .get(command.coord)
                .is_some_and(|cell| cell.owner == Some(player));
            let Some((key, _)) = command.key().canonical(grid).filter(|_| owned) else {
                report.skipped.push(command.key());
                continue;
            };
            let requests = groups.entry(key).or_default();
            if command.open {
                requests.open = true;
            } else {
                requests.close = true;
            }
        }
    }

    for (key, requests) in groups {
        if requests.open && requests.close {
            report.conflicts.push(key);
            continue;
        }
        let open = requests.open;
        match grid.set_gate(key.coord, key.dir, open) {
            Ok(false) => {}
            Ok(true) if open => {
                gates.open(grid, pressure, key, config);
                report.opened.push(key);
            }
            Ok(true) => {
                gates.close(grid, key);
                report.closed.push(key);
            }
            Err(_) => report.skipped.push(key),
        }
    }

    report.skipped.sort();
    report.skipped.dedup();
    report
}
