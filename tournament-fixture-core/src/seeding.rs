//! Ordering of pairs by strength.
//!
//! The strength of a pair is the sum of the global ranking points of both players. A player
//! without ranking points (unranked, or a placeholder that is not registered at all) adds
//! nothing. Ranked pairs are ordered by descending strength, unranked pairs are shuffled and
//! placed after all ranked pairs.
use rand::seq::SliceRandom;
use rand::Rng;

use crate::PairId;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A pair entering the draw together with the ranking points of both players.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RankedPair {
    pub id: PairId,
    pub points: [Option<u32>; 2],
}

impl RankedPair {
    #[inline]
    pub fn new(id: PairId, points: [Option<u32>; 2]) -> Self {
        Self { id, points }
    }

    /// Returns the combined ranking points of both players.
    #[inline]
    pub fn strength(&self) -> u64 {
        self.points
            .iter()
            .map(|points| u64::from(points.unwrap_or(0)))
            .sum()
    }
}

/// A pair with its assigned seed. Seed 1 is the strongest pair.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SeededPair {
    pub id: PairId,
    pub seed: u32,
    pub strength: u64,
}

/// Seeds the given `pairs`.
///
/// Pairs with a strength greater than 0 are sorted by descending strength. Pairs with equal
/// strength keep the order in which they were given. All pairs with a strength of 0 are
/// shuffled using `rng` and appended.
pub fn seed<I, R>(pairs: I, rng: &mut R) -> Vec<SeededPair>
where
    I: IntoIterator<Item = RankedPair>,
    R: Rng + ?Sized,
{
    let (mut ranked, mut unranked): (Vec<_>, Vec<_>) = pairs
        .into_iter()
        .map(|pair| (pair.id, pair.strength()))
        .partition(|(_, strength)| *strength > 0);

    ranked.sort_by(|(_, lhs), (_, rhs)| rhs.cmp(lhs));
    unranked.shuffle(rng);

    log::debug!(
        "Seeding {} ranked and {} unranked pairs",
        ranked.len(),
        unranked.len()
    );

    ranked
        .into_iter()
        .chain(unranked)
        .zip(1..)
        .map(|((id, strength), seed)| SeededPair { id, seed, strength })
        .collect()
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::{seed, RankedPair};
    use crate::PairId;

    fn pair(id: u64, points: [Option<u32>; 2]) -> RankedPair {
        RankedPair::new(PairId(id), points)
    }

    #[test]
    fn test_strength() {
        assert_eq!(pair(1, [Some(100), Some(50)]).strength(), 150);
        assert_eq!(pair(1, [Some(100), None]).strength(), 100);
        assert_eq!(pair(1, [None, None]).strength(), 0);
        assert_eq!(
            pair(1, [Some(u32::MAX), Some(u32::MAX)]).strength(),
            2 * u64::from(u32::MAX)
        );
    }

    #[test]
    fn test_seed_ranked() {
        let mut rng = StdRng::seed_from_u64(7);

        let pairs = vec![
            pair(1, [Some(10), Some(20)]),
            pair(2, [Some(500), None]),
            pair(3, [Some(40), Some(40)]),
            pair(4, [Some(1), Some(0)]),
        ];

        let seeded = seed(pairs, &mut rng);

        let ids: Vec<u64> = seeded.iter().map(|p| p.id.0).collect();
        assert_eq!(ids, [2, 3, 1, 4]);

        let seeds: Vec<u32> = seeded.iter().map(|p| p.seed).collect();
        assert_eq!(seeds, [1, 2, 3, 4]);

        assert_eq!(seeded[0].strength, 500);
        assert_eq!(seeded[3].strength, 1);
    }

    #[test]
    fn test_seed_equal_strength_keeps_order() {
        let mut rng = StdRng::seed_from_u64(0);

        let pairs = vec![
            pair(1, [Some(50), None]),
            pair(2, [Some(80), None]),
            pair(3, [Some(30), Some(20)]),
        ];

        let ids: Vec<u64> = seed(pairs, &mut rng).iter().map(|p| p.id.0).collect();
        assert_eq!(ids, [2, 1, 3]);
    }

    #[test]
    fn test_seed_unranked_after_ranked() {
        let pairs: Vec<RankedPair> = (1..=12)
            .map(|id| {
                if id % 3 == 0 {
                    pair(id, [Some(id as u32 * 10), None])
                } else {
                    pair(id, [None, Some(0)])
                }
            })
            .collect();

        for rng_seed in 0..8 {
            let mut rng = StdRng::seed_from_u64(rng_seed);
            let seeded = seed(pairs.clone(), &mut rng);

            assert_eq!(seeded.len(), 12);

            let head: Vec<u64> = seeded[..4].iter().map(|p| p.id.0).collect();
            assert_eq!(head, [12, 9, 6, 3]);

            let mut tail: Vec<u64> = seeded[4..].iter().map(|p| p.id.0).collect();
            assert!(seeded[4..].iter().all(|p| p.strength == 0));
            tail.sort_unstable();
            assert_eq!(tail, [1, 2, 4, 5, 7, 8, 10, 11]);
        }
    }

    #[test]
    fn test_seed_deterministic_with_same_rng() {
        let pairs: Vec<RankedPair> = (1..=10).map(|id| pair(id, [None, None])).collect();

        let first = seed(pairs.clone(), &mut StdRng::seed_from_u64(42));
        let second = seed(pairs, &mut StdRng::seed_from_u64(42));

        assert_eq!(first, second);
    }
}
