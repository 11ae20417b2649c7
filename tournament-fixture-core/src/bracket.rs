//! The single elimination bracket following the accommodation rounds.
use std::ops::Range;

use crate::fixture::Feed;
use crate::{Fixture, FixtureMatch, Link, Round, Slot};

/// Creates all bracket rounds in `fixture` and places `entrants` into the first round.
///
/// The bracket is padded to the next power of two and entrant `j` takes the spot of seed
/// `j + 1` in the standard seeding order, so the first two entrants can only meet in the
/// final, the first four not before the semifinals and so on. Missing seeds are byes.
///
/// An entrant fed by the loser of a match never opens against the winner of that same
/// match. If seeding would pair them, the last two entrants trade spots.
///
/// Returns the range of indexes of the first bracket round.
pub(crate) fn build(fixture: &mut Fixture, entrants: &[Feed]) -> Range<usize> {
    let size = entrants.len().next_power_of_two().max(2);
    let num_rounds = size.trailing_zeros();

    log::debug!(
        "Building bracket of size {} for {} entrants",
        size,
        entrants.len()
    );

    // Create all matches before linking any of them.
    let mut rounds: Vec<Range<usize>> = Vec::with_capacity(num_rounds as usize);
    let mut num_matches = size / 2;
    for depth in (1..=num_rounds).rev() {
        let start = fixture.len();

        for number in 1..=num_matches {
            fixture.push(FixtureMatch::new(Round::Bracket { depth }, number as u32));
        }

        rounds.push(start..fixture.len());
        num_matches /= 2;
    }

    for window in rounds.windows(2) {
        let (current, next) = (&window[0], &window[1]);

        for (position, index) in current.clone().enumerate() {
            let target = Link::new(next.start + position / 2, Slot::from_parity(position));
            fixture.feed(Feed::Winner(index), target);
        }
    }

    let first_round = rounds[0].clone();

    let order = seed_order(size);
    let mut positions = vec![0; size];
    for (position, seed) in order.iter().enumerate() {
        positions[*seed] = position;
    }

    if let [.., Feed::Loser(source)] = entrants {
        let last = entrants.len() - 1;
        let opponent = order[positions[last] ^ 1];

        if entrants.get(opponent) == Some(&Feed::Winner(*source)) {
            log::trace!("Moving entrant {} away from a rematch", last);
            positions.swap(last, last - 1);
        }
    }

    for (seed, feed) in entrants.iter().enumerate() {
        let position = positions[seed];
        let target = Link::new(first_round.start + position / 2, Slot::from_parity(position));

        fixture.feed(*feed, target);
    }

    first_round
}

/// Returns the zero-based seed at every first round position of a bracket of `size`.
///
/// Every round doubles the order, pairing each seed `s` with `2 * len - 1 - s`:
/// `[0, 1]`, `[0, 3, 1, 2]`, `[0, 7, 3, 4, 1, 6, 2, 5]`.
fn seed_order(size: usize) -> Vec<usize> {
    let mut order = vec![0];

    while order.len() < size {
        let len = order.len();
        order = order
            .iter()
            .flat_map(|seed| [*seed, 2 * len - 1 - seed])
            .collect();
    }

    order
}

#[cfg(test)]
mod tests {
    use super::{build, seed_order};
    use crate::fixture::Feed;
    use crate::{Fixture, FixtureMatch, Link, PairId, Round, Slot};

    fn placeholders(fixture: &mut Fixture, n: usize) -> Vec<Feed> {
        (0..n)
            .map(|i| Feed::Winner(fixture.push(FixtureMatch::new(Round::R1, i as u32 + 1))))
            .collect()
    }

    #[test]
    fn test_build_two_entrants() {
        let mut fixture = Fixture::new();
        let entrants = placeholders(&mut fixture, 2);

        let first_round = build(&mut fixture, &entrants);
        assert_eq!(first_round, 2..3);
        assert_eq!(fixture[2].round, Round::FINAL);
        assert_eq!(fixture[0].next_winner, Some(Link::new(2, Slot::First)));
        assert_eq!(fixture[1].next_winner, Some(Link::new(2, Slot::Second)));
    }

    #[test]
    fn test_build_rounds() {
        let mut fixture = Fixture::new();
        let entrants = placeholders(&mut fixture, 11);

        let first_round = build(&mut fixture, &entrants);
        assert_eq!(first_round, 11..19);

        // 11 entrants are padded to 16: 8 + 4 + 2 + 1 matches.
        assert_eq!(fixture.len(), 11 + 15);

        let count = |label: &str| {
            fixture.matches()[11..]
                .iter()
                .filter(|m| m.round.to_string() == label)
                .count()
        };

        assert_eq!(count("OCTAVOS"), 8);
        assert_eq!(count("CUARTOS"), 4);
        assert_eq!(count("SEMIFINAL"), 2);
        assert_eq!(count("FINAL"), 1);

        // Match i of a round feeds match i / 2 of the next round.
        for (position, index) in (11..19).enumerate() {
            assert_eq!(
                fixture[index].next_winner,
                Some(Link::new(19 + position / 2, Slot::from_parity(position)))
            );
        }

        assert_eq!(fixture[23].round, Round::SEMIFINAL);
        assert_eq!(fixture[23].next_winner, Some(Link::new(25, Slot::First)));
        assert_eq!(fixture[24].next_winner, Some(Link::new(25, Slot::Second)));

        assert_eq!(fixture[25].round, Round::FINAL);
        assert_eq!(fixture[25].next_winner, None);
    }

    #[test]
    fn test_seed_order() {
        assert_eq!(seed_order(1), [0]);
        assert_eq!(seed_order(2), [0, 1]);
        assert_eq!(seed_order(4), [0, 3, 1, 2]);
        assert_eq!(seed_order(8), [0, 7, 3, 4, 1, 6, 2, 5]);

        // Top seeds sit in opposite halves and quarters.
        let order = seed_order(32);
        let half = |seed| order.iter().position(|s| *s == seed).unwrap() / 16;
        let quarter = |seed| order.iter().position(|s| *s == seed).unwrap() / 8;
        assert_ne!(half(0), half(1));
        assert_ne!(quarter(0), quarter(2));
        assert_ne!(quarter(1), quarter(3));
        assert_ne!(quarter(2), quarter(3));
    }

    #[test]
    fn test_build_placement() {
        let mut fixture = Fixture::new();
        let mut entrants = placeholders(&mut fixture, 4);
        entrants.push(Feed::Pair(PairId(9)));

        // 5 entrants in a bracket of 8 with seeds 1 8 4 5 2 7 3 6.
        let first_round = build(&mut fixture, &entrants);
        assert_eq!(first_round, 4..8);

        assert_eq!(fixture[0].next_winner, Some(Link::new(4, Slot::First)));
        assert_eq!(fixture[3].next_winner, Some(Link::new(5, Slot::First)));
        assert_eq!(fixture[5].pair(Slot::Second), Some(PairId(9)));
        assert_eq!(fixture[1].next_winner, Some(Link::new(6, Slot::First)));
        assert_eq!(fixture[2].next_winner, Some(Link::new(7, Slot::First)));

        for i in [4, 6, 7] {
            assert_eq!(fixture[i].pairs, [None, None]);
        }
    }

    #[test]
    fn test_build_avoids_rematch() {
        let mut fixture = Fixture::new();
        let mut entrants = placeholders(&mut fixture, 5);
        entrants.push(Feed::Loser(2));

        // Seed 6 would open against seed 3, the winner of the same match.
        let first_round = build(&mut fixture, &entrants);
        assert_eq!(first_round, 5..9);

        assert_eq!(fixture[2].next_winner, Some(Link::new(8, Slot::First)));
        assert_eq!(fixture[2].next_loser, Some(Link::new(6, Slot::Second)));
        assert_eq!(fixture[3].next_winner, Some(Link::new(6, Slot::First)));
        assert_eq!(fixture[4].next_winner, Some(Link::new(8, Slot::Second)));
    }
}
