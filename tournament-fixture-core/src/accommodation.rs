//! The two accommodation rounds played before the elimination bracket.
//!
//! In `R1` the seeded pairs are paired from both ends of the list: seed 1 plays seed N,
//! seed 2 plays seed N-1 and so on. With an odd number of pairs the middle seed has a bye
//! straight into `R2`. `R2` is played by the pairs with an `R1` bye and all losers of `R1`.
use crate::fixture::Feed;
use crate::{Fixture, FixtureMatch, Link, PairId, Round, Slot};

/// Creates `R1` and `R2` in `fixture` and links the losers of `R1` into `R2`.
///
/// Returns the entrants of the elimination bracket in the order they should be placed:
/// all `R1` winners, then all `R2` winners, then the overflow pair if `R2` had an odd number
/// of entrants.
pub(crate) fn build(fixture: &mut Fixture, pairs: &[PairId]) -> Vec<Feed> {
    let num_pairs = pairs.len();
    let r1_len = num_pairs / 2;

    let bye = if num_pairs % 2 == 1 {
        Some(pairs[r1_len])
    } else {
        None
    };

    let r1: Vec<usize> = (0..r1_len)
        .map(|i| {
            let mut m = FixtureMatch::new(Round::R1, i as u32 + 1);
            m.pairs = [Some(pairs[i]), Some(pairs[num_pairs - 1 - i])];
            fixture.push(m)
        })
        .collect();

    // Pairs that did not play yet take the first spots of R2 so that they never get a
    // second free pass.
    let mut r2_entrants: Vec<Feed> = bye
        .map(Feed::Pair)
        .into_iter()
        .chain(r1.iter().map(|index| Feed::Loser(*index)))
        .collect();

    // With an odd number of entrants the last R1 loser skips R2 and goes straight into the
    // bracket. That pair has played only one match before the bracket.
    let overflow = if r2_entrants.len() % 2 == 1 {
        r2_entrants.pop()
    } else {
        None
    };

    let r2: Vec<usize> = (0..r2_entrants.len() / 2)
        .map(|i| fixture.push(FixtureMatch::new(Round::R2, i as u32 + 1)))
        .collect();

    for (position, feed) in r2_entrants.into_iter().enumerate() {
        let target = Link::new(r2[position / 2], Slot::from_parity(position));
        fixture.feed(feed, target);
    }

    log::debug!(
        "Built accommodation rounds: {} R1 matches, {} R2 matches, bye: {:?}, overflow: {:?}",
        r1.len(),
        r2.len(),
        bye,
        overflow
    );

    r1.into_iter()
        .map(Feed::Winner)
        .chain(r2.into_iter().map(Feed::Winner))
        .chain(overflow)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::build;
    use crate::fixture::Feed;
    use crate::{Fixture, Link, PairId, Round, Slot};

    fn ids(n: u64) -> Vec<PairId> {
        (1..=n).map(PairId).collect()
    }

    #[test]
    fn test_build_three_pairs() {
        let mut fixture = Fixture::new();
        let entrants = build(&mut fixture, &ids(3));

        assert_eq!(fixture.len(), 2);
        assert_eq!(fixture[0].round, Round::R1);
        assert_eq!(fixture[0].pairs, [Some(PairId(1)), Some(PairId(3))]);

        // Seed 2 waits in R2 for the loser of seed 1 vs seed 3.
        assert_eq!(fixture[1].round, Round::R2);
        assert_eq!(fixture[1].pairs, [Some(PairId(2)), None]);
        assert_eq!(fixture[0].next_loser, Some(Link::new(1, Slot::Second)));

        assert_eq!(entrants, [Feed::Winner(0), Feed::Winner(1)]);
    }

    #[test]
    fn test_build_four_pairs() {
        let mut fixture = Fixture::new();
        let entrants = build(&mut fixture, &ids(4));

        assert_eq!(fixture.len(), 3);
        assert_eq!(fixture[0].pairs, [Some(PairId(1)), Some(PairId(4))]);
        assert_eq!(fixture[1].pairs, [Some(PairId(2)), Some(PairId(3))]);
        assert_eq!(fixture[2].pairs, [None, None]);

        assert_eq!(fixture[0].next_loser, Some(Link::new(2, Slot::First)));
        assert_eq!(fixture[1].next_loser, Some(Link::new(2, Slot::Second)));

        assert_eq!(
            entrants,
            [Feed::Winner(0), Feed::Winner(1), Feed::Winner(2)]
        );
    }

    #[test]
    fn test_build_odd_overflow() {
        // 5 pairs: R1 is 1-5 and 2-4, seed 3 has a bye. R2 has 3 entrants: seed 3 plays the
        // loser of 1-5 and the loser of 2-4 goes straight into the bracket.
        let mut fixture = Fixture::new();
        let entrants = build(&mut fixture, &ids(5));

        assert_eq!(fixture.len(), 3);
        assert_eq!(fixture[0].pairs, [Some(PairId(1)), Some(PairId(5))]);
        assert_eq!(fixture[1].pairs, [Some(PairId(2)), Some(PairId(4))]);
        assert_eq!(fixture[2].pairs, [Some(PairId(3)), None]);

        assert_eq!(fixture[0].next_loser, Some(Link::new(2, Slot::Second)));
        assert_eq!(fixture[1].next_loser, None);

        assert_eq!(
            entrants,
            [
                Feed::Winner(0),
                Feed::Winner(1),
                Feed::Winner(2),
                Feed::Loser(1)
            ]
        );
    }

    #[test]
    fn test_build_r1_coverage() {
        for n in 3..=25u64 {
            let mut fixture = Fixture::new();
            let entrants = build(&mut fixture, &ids(n));

            let r1 = fixture.round(Round::R1);
            let r2 = fixture.round(Round::R2);
            let r2_entrants = n as usize / 2 + n as usize % 2;

            assert_eq!(r1.len(), n as usize / 2);
            assert_eq!(r2.len(), r2_entrants / 2);

            // At most one pair is waiting for R2 without having played.
            let byes = r2
                .iter()
                .flat_map(|index| fixture[*index].pairs)
                .flatten()
                .count();
            assert_eq!(byes, n as usize % 2);

            let overflow = entrants
                .iter()
                .filter(|feed| matches!(feed, Feed::Loser(_)))
                .count();
            assert_eq!(overflow, r2_entrants % 2);
            assert_eq!(entrants.len(), r1.len() + r2.len() + overflow);
        }
    }
}
