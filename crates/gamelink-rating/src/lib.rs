//! Elo rating computation for Gamelink.
//!
//! A single pure function, [`rate`], computes both participants' updated
//! ratings from a completed session's outcome. No I/O, no global state;
//! the coordinator calls it inside its termination pipeline and persists
//! the result, and tests can exercise it exhaustively without a runtime.
//!
//! # Algorithm
//!
//! Standard Elo with a fixed K-factor of 32:
//!
//! ```text
//! expected_a = 1 / (1 + 10^((rb - ra) / 400))
//! new_a      = round(ra + K * (score_a - expected_a))
//! ```
//!
//! where `score` is 1 for a win, 0 for a loss, and 0.5 each for a draw.
//! Rounding is `f64::round` (half away from zero), so a +0.5 delta moves
//! a rating by a full point in the winner's direction.

use serde::{Deserialize, Serialize};

/// Every user starts here; also the fallback when a rating is missing.
pub const DEFAULT_RATING: i32 = 1200;

/// Maximum rating swing per game. 32 is the classic "provisional" K used
/// by the platform; generous movement so casual players see progress.
pub const K_FACTOR: f64 = 32.0;

/// The outcome of a session, from player one's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    PlayerOneWins,
    PlayerTwoWins,
    Draw,
}

impl Outcome {
    /// The outcome with the participants' seats swapped. Used by the
    /// symmetry tests: `rate(a, b, o)` and `rate(b, a, o.swapped())`
    /// must agree.
    pub fn swapped(self) -> Self {
        match self {
            Self::PlayerOneWins => Self::PlayerTwoWins,
            Self::PlayerTwoWins => Self::PlayerOneWins,
            Self::Draw => Self::Draw,
        }
    }

    fn score_for_player_one(self) -> f64 {
        match self {
            Self::PlayerOneWins => 1.0,
            Self::PlayerTwoWins => 0.0,
            Self::Draw => 0.5,
        }
    }
}

/// One participant's rating before and after a game.
///
/// The `before` value is what the history ledger records; `after` is what
/// gets written back to the user's profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingChange {
    pub before: i32,
    pub after: i32,
}

impl RatingChange {
    /// Signed movement, `after - before`.
    pub fn delta(&self) -> i32 {
        self.after - self.before
    }
}

/// The expected score for a player rated `ra` against one rated `rb`.
///
/// Always in `(0, 1)`; 0.5 exactly when the ratings are equal.
pub fn expected_score(ra: i32, rb: i32) -> f64 {
    1.0 / (1.0 + 10f64.powf(f64::from(rb - ra) / 400.0))
}

/// Computes both participants' new ratings for the given outcome.
///
/// Symmetric by construction: player two's expected score is
/// `1 - expected_one` and their actual score is `1 - score_one`, so the
/// two deltas are exact negations before rounding, and `f64::round`
/// treats `x` and `-x` alike.
pub fn rate(
    player_one: i32,
    player_two: i32,
    outcome: Outcome,
) -> (RatingChange, RatingChange) {
    let expected_one = expected_score(player_one, player_two);
    let score_one = outcome.score_for_player_one();

    let delta_one = K_FACTOR * (score_one - expected_one);
    let delta_two = K_FACTOR * ((1.0 - score_one) - (1.0 - expected_one));

    let one = RatingChange {
        before: player_one,
        after: apply(player_one, delta_one),
    };
    let two = RatingChange {
        before: player_two,
        after: apply(player_two, delta_two),
    };
    (one, two)
}

fn apply(rating: i32, delta: f64) -> i32 {
    (f64::from(rating) + delta).round() as i32
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_equal_ratings_winner_gains_sixteen() {
        // Equal ratings mean expected = 0.5 for both, so the winner moves
        // by K * 0.5 = 16 and the loser by -16.
        let (one, two) = rate(1200, 1200, Outcome::PlayerOneWins);
        assert_eq!(one.after, 1216);
        assert_eq!(two.after, 1184);
        assert_eq!(one.before, 1200);
        assert_eq!(two.before, 1200);
    }

    #[test]
    fn test_rate_equal_ratings_draw_changes_nothing() {
        let (one, two) = rate(1200, 1200, Outcome::Draw);
        assert_eq!(one.after, 1200);
        assert_eq!(two.after, 1200);
    }

    #[test]
    fn test_rate_underdog_win_pays_more() {
        // A 1000-rated player beating a 1400-rated player should gain far
        // more than 16, and the favorite should lose the same amount.
        let (one, two) = rate(1000, 1400, Outcome::PlayerOneWins);
        assert!(one.delta() > 16, "underdog delta was {}", one.delta());
        assert_eq!(one.delta(), -two.delta());
    }

    #[test]
    fn test_rate_favorite_win_pays_less() {
        let (one, two) = rate(1400, 1000, Outcome::PlayerOneWins);
        assert!(one.delta() < 16, "favorite delta was {}", one.delta());
        assert!(one.delta() >= 1, "a win never loses points");
        assert_eq!(two.delta(), -one.delta());
    }

    #[test]
    fn test_rate_symmetry_under_seat_swap() {
        // Swapping A and B and swapping the outcome must yield the same
        // pair of results, just in the other order.
        let cases = [
            (1200, 1200, Outcome::PlayerOneWins),
            (1350, 1100, Outcome::PlayerTwoWins),
            (987, 1420, Outcome::Draw),
            (1500, 1499, Outcome::PlayerOneWins),
            (800, 2200, Outcome::PlayerTwoWins),
        ];
        for (ra, rb, outcome) in cases {
            let (one, two) = rate(ra, rb, outcome);
            let (two_swapped, one_swapped) =
                rate(rb, ra, outcome.swapped());
            assert_eq!(one, one_swapped, "({ra}, {rb}, {outcome:?})");
            assert_eq!(two, two_swapped, "({ra}, {rb}, {outcome:?})");
        }
    }

    #[test]
    fn test_rate_deltas_negate_exactly() {
        // Zero-sum before rounding, and rounding is symmetric (half away
        // from zero), so the integer deltas negate exactly as well.
        for (ra, rb) in [(1200, 1300), (1111, 1112), (1000, 2000)] {
            for outcome in
                [Outcome::PlayerOneWins, Outcome::PlayerTwoWins, Outcome::Draw]
            {
                let (one, two) = rate(ra, rb, outcome);
                assert_eq!(
                    one.delta(),
                    -two.delta(),
                    "({ra}, {rb}, {outcome:?})"
                );
            }
        }
    }

    #[test]
    fn test_rounding_is_half_away_from_zero() {
        // Documents the rounding rule: `f64::round` rounds half away from
        // zero, not banker's rounding. 2.5 → 3 and -2.5 → -3.
        assert_eq!(2.5f64.round(), 3.0);
        assert_eq!((-2.5f64).round(), -3.0);
        assert_eq!(3.5f64.round(), 4.0);
    }

    #[test]
    fn test_expected_score_bounds_and_midpoint() {
        assert_eq!(expected_score(1200, 1200), 0.5);
        let long_shot = expected_score(800, 2400);
        assert!(long_shot > 0.0 && long_shot < 0.01);
        let heavy_favorite = expected_score(2400, 800);
        assert!(heavy_favorite > 0.99 && heavy_favorite < 1.0);
    }

    #[test]
    fn test_expected_scores_sum_to_one() {
        for (ra, rb) in [(1200, 1300), (900, 1800), (1450, 1450)] {
            let sum = expected_score(ra, rb) + expected_score(rb, ra);
            assert!((sum - 1.0).abs() < 1e-12, "({ra}, {rb}) summed {sum}");
        }
    }

    #[test]
    fn test_rate_draw_between_unequal_ratings_converges() {
        // A draw should pull the ratings toward each other: the favorite
        // drops, the underdog rises.
        let (one, two) = rate(1400, 1000, Outcome::Draw);
        assert!(one.delta() < 0);
        assert!(two.delta() > 0);
        assert_eq!(one.delta(), -two.delta());
    }
}
