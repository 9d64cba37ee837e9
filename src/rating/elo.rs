use super::types::{EloParams, EloUpdate, Outcome, RatingValue};

/// Expected score of `rating` against `opponent` on the logistic curve.
pub fn expected_score(rating: RatingValue, opponent: RatingValue) -> f64 {
    1.0 / (1.0 + 10.0_f64.powf((opponent - rating) as f64 / 400.0))
}

/// Computes new ratings after a completed match.
///
/// The swing is computed once from the winner's side, so swapping the players
/// and the outcome yields exactly swapped results and the deltas cancel out
/// unless a rating hits the floor. A BYE leaves both ratings untouched.
pub fn apply_result(
    first: RatingValue,
    second: RatingValue,
    outcome: Outcome,
    params: &EloParams,
) -> EloUpdate {
    let (winner, loser) = match outcome {
        Outcome::FirstWins => (first, second),
        Outcome::SecondWins => (second, first),
        Outcome::ByeForFirst => {
            return EloUpdate {
                first_rating: first,
                second_rating: second,
                first_delta: 0,
                second_delta: 0,
            };
        }
    };

    let swing = winner_gain(winner, loser, params.k_factor);
    let new_winner = (winner + swing).max(params.rating_floor);
    let new_loser = (loser - swing).max(params.rating_floor);

    let (first_rating, second_rating) = match outcome {
        Outcome::FirstWins => (new_winner, new_loser),
        _ => (new_loser, new_winner),
    };

    EloUpdate {
        first_rating,
        second_rating,
        first_delta: first_rating - first,
        second_delta: second_rating - second,
    }
}

fn winner_gain(winner: RatingValue, loser: RatingValue, k_factor: f64) -> RatingValue {
    let expected = expected_score(winner, loser);
    (k_factor * (1.0 - expected)).round() as RatingValue
}
