use chrono::{DateTime, Utc};

use crate::models::game::{Color, Game, GameStatus};

/// Logical clock over the persisted per-side seconds: the active side's
/// remaining time is the stored value minus the wall time elapsed since the
/// turn started (`updated_at` is rewritten on every accepted move and on game
/// start). Correctness does not depend on any timer firing while a tab is
/// backgrounded; a tick only has to *observe* the clock.
pub fn remaining_seconds(game: &Game, side: Color, now: DateTime<Utc>) -> i64 {
    let stored = game.time_remaining(side) as i64;
    if game.status != GameStatus::InProgress || game.current_turn != side {
        return stored;
    }
    let elapsed = (now - game.updated_at).num_seconds().max(0);
    stored - elapsed
}

/// The side whose flag has fallen, if any.
pub fn flagged_side(game: &Game, now: DateTime<Utc>) -> Option<Color> {
    if game.status != GameStatus::InProgress {
        return None;
    }
    let active = game.current_turn;
    if remaining_seconds(game, active, now) <= 0 {
        Some(active)
    } else {
        None
    }
}
