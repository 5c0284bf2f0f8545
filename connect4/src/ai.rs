//! One-ply heuristic for the computer player: win if possible, otherwise
//! block the opponent's immediate win, otherwise drop into a random column.
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{Grid, Player, Position, WINDOW};

/// Immediate winning cells found by [`scan_threats`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assessment {
    /// Where the opponent completes four on their next drop.
    pub threat: Option<Position>,
    /// Where the AI completes four right now.
    pub opportunity: Option<Position>,
}

/// Looks at the landing cell of every non-full column and checks each
/// 4-window through it: three opponent pieces make it a threat, three of the
/// AI's own make it an opportunity. Later columns overwrite earlier hits.
pub fn scan_threats(grid: &Grid, ai: Player) -> Assessment {
    let own = ai.cell();
    let opponent = ai.opponent().cell();
    let mut assessment = Assessment::default();

    for pos in grid.possible_positions() {
        for line in grid.lines_through(pos) {
            if line.len() < WINDOW {
                continue;
            }
            let Some(at) = line.iter().position(|&p| p == pos) else {
                continue;
            };
            let values = grid.values(&line);
            let first = at.saturating_sub(WINDOW - 1);
            let last = at.min(line.len() - WINDOW);
            for start in first..=last {
                let others = (start..start + WINDOW)
                    .filter(|&i| i != at)
                    .map(|i| values[i]);
                let mut others = others.peekable();
                let Some(&head) = others.peek() else {
                    continue;
                };
                if !others.all(|cell| cell == head) {
                    continue;
                }
                if head == opponent {
                    assessment.threat = Some(pos);
                } else if head == own {
                    assessment.opportunity = Some(pos);
                }
            }
        }
    }
    assessment
}

/// Picks the AI's column. An opportunity always beats a threat.
pub fn choose_column<R>(assessment: &Assessment, legal: &[usize], rng: &mut R) -> Option<usize>
where
    R: Rng + ?Sized,
{
    if let Some(pos) = assessment.opportunity {
        return Some(pos.column);
    }
    if let Some(pos) = assessment.threat {
        return Some(pos.column);
    }
    legal.choose(rng).copied()
}
