//! Mapping of rounds to the days of a tournament.
//!
//! The plan only expresses preferences. The allocator tries the preferred days of a round
//! first, then its fallback days and finally every other day of the tournament.
use chrono::NaiveDate;

use crate::Round;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The days a round should be played on.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DayPreference {
    pub preferred: Vec<NaiveDate>,
    pub fallback: Vec<NaiveDate>,
}

impl DayPreference {
    fn new(preferred: Vec<NaiveDate>, fallback: Vec<NaiveDate>) -> Self {
        Self {
            preferred,
            fallback,
        }
    }

    /// Returns the tier of `date`: `0` for a preferred day, `1` for a fallback day and `2`
    /// for any other day.
    pub fn tier(&self, date: NaiveDate) -> u8 {
        if self.preferred.contains(&date) {
            0
        } else if self.fallback.contains(&date) {
            1
        } else {
            2
        }
    }
}

/// The distinct days of a tournament.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DayPlan {
    days: Vec<NaiveDate>,
}

impl DayPlan {
    /// Creates a new `DayPlan` from the dates of all availability windows. Duplicates are
    /// removed.
    pub fn new<I>(dates: I) -> Self
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        let mut days: Vec<NaiveDate> = dates.into_iter().collect();
        days.sort_unstable();
        days.dedup();

        Self { days }
    }

    #[inline]
    pub fn days(&self) -> &[NaiveDate] {
        &self.days
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.days.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Returns the preferred and fallback days for `round`.
    ///
    /// The accommodation rounds are placed at the start of the tournament, the semifinals
    /// and the final at the end. All other bracket rounds are spread over the days in
    /// between, deeper rounds earlier.
    pub fn days_for(&self, round: &Round) -> DayPreference {
        let n = self.days.len();
        let day = |index: usize| self.days[index];
        let days = |indexes: &[usize]| -> Vec<NaiveDate> {
            indexes.iter().map(|i| self.days[*i]).collect()
        };

        match n {
            0 => DayPreference::default(),
            1 => DayPreference::new(vec![day(0)], vec![]),
            2 => match round {
                Round::R1 | Round::R2 => DayPreference::new(vec![day(0)], vec![day(1)]),
                r if *r >= Round::SEMIFINAL => DayPreference::new(vec![day(1)], vec![]),
                _ => DayPreference::new(vec![day(1)], vec![day(0)]),
            },
            3 => match round {
                Round::R1 | Round::R2 => DayPreference::new(vec![day(0)], vec![day(1)]),
                r if *r == Round::FINAL => DayPreference::new(vec![day(2)], vec![]),
                r if *r == Round::SEMIFINAL => DayPreference::new(vec![day(2)], vec![day(1)]),
                _ => DayPreference::new(vec![day(1)], vec![day(2)]),
            },
            4 => match round {
                Round::R1 => DayPreference::new(vec![day(0)], vec![day(1)]),
                Round::R2 => DayPreference::new(vec![day(1)], vec![day(0)]),
                r if *r == Round::FINAL => DayPreference::new(vec![day(3)], vec![]),
                r if *r == Round::SEMIFINAL => DayPreference::new(vec![day(3)], vec![day(2)]),
                _ => DayPreference::new(days(&[1, 2]), vec![day(3)]),
            },
            n => match round {
                Round::R1 => DayPreference::new(vec![day(0)], vec![day(1)]),
                Round::R2 => DayPreference::new(vec![day(1)], days(&[0, 2])),
                r if *r == Round::FINAL => DayPreference::new(vec![day(n - 1)], vec![]),
                r if *r == Round::SEMIFINAL => {
                    DayPreference::new(vec![day(n - 1)], vec![day(n - 2)])
                }
                Round::Bracket { depth } => {
                    // The quarterfinals take the last middle day, every deeper round one day
                    // earlier, never before the third day.
                    let last_middle = n - 2;
                    let earlier = (*depth as usize).saturating_sub(3);
                    let index = last_middle.saturating_sub(earlier).max(2);

                    let neighbours: Vec<usize> = [index - 1, index + 1]
                        .into_iter()
                        .filter(|i| (2..=last_middle).contains(i))
                        .collect();

                    DayPreference::new(vec![day(index)], days(&neighbours))
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{DayPlan, DayPreference};
    use crate::Round;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn plan(n: u32) -> DayPlan {
        DayPlan::new((1..=n).map(date))
    }

    fn pref(preferred: &[u32], fallback: &[u32]) -> DayPreference {
        DayPreference {
            preferred: preferred.iter().copied().map(date).collect(),
            fallback: fallback.iter().copied().map(date).collect(),
        }
    }

    const QUARTERS: Round = Round::Bracket { depth: 3 };
    const EIGHTHS: Round = Round::Bracket { depth: 4 };

    #[test]
    fn test_day_plan_new() {
        let plan = DayPlan::new([date(3), date(1), date(3), date(2), date(1)]);
        assert_eq!(plan.days(), [date(1), date(2), date(3)]);
        assert_eq!(plan.len(), 3);
        assert!(DayPlan::new(Vec::new()).is_empty());
    }

    #[test]
    fn test_days_for_empty_and_single() {
        assert_eq!(DayPlan::default().days_for(&Round::R1), DayPreference::default());

        let plan = plan(1);
        for round in [Round::R1, Round::R2, EIGHTHS, Round::SEMIFINAL, Round::FINAL] {
            assert_eq!(plan.days_for(&round), pref(&[1], &[]));
        }
    }

    #[test]
    fn test_days_for_two_days() {
        let plan = plan(2);
        assert_eq!(plan.days_for(&Round::R1), pref(&[1], &[2]));
        assert_eq!(plan.days_for(&Round::R2), pref(&[1], &[2]));
        assert_eq!(plan.days_for(&QUARTERS), pref(&[2], &[1]));
        assert_eq!(plan.days_for(&Round::SEMIFINAL), pref(&[2], &[]));
        assert_eq!(plan.days_for(&Round::FINAL), pref(&[2], &[]));
    }

    #[test]
    fn test_days_for_three_days() {
        let plan = plan(3);
        assert_eq!(plan.days_for(&Round::R2), pref(&[1], &[2]));
        assert_eq!(plan.days_for(&EIGHTHS), pref(&[2], &[3]));
        assert_eq!(plan.days_for(&Round::SEMIFINAL), pref(&[3], &[2]));
        assert_eq!(plan.days_for(&Round::FINAL), pref(&[3], &[]));
    }

    #[test]
    fn test_days_for_four_days() {
        let plan = plan(4);
        assert_eq!(plan.days_for(&Round::R1), pref(&[1], &[2]));
        assert_eq!(plan.days_for(&Round::R2), pref(&[2], &[1]));
        assert_eq!(plan.days_for(&QUARTERS), pref(&[2, 3], &[4]));
        assert_eq!(plan.days_for(&Round::SEMIFINAL), pref(&[4], &[3]));
        assert_eq!(plan.days_for(&Round::FINAL), pref(&[4], &[]));
    }

    #[test]
    fn test_days_for_many_days() {
        let plan = plan(7);
        assert_eq!(plan.days_for(&Round::R1), pref(&[1], &[2]));
        assert_eq!(plan.days_for(&Round::R2), pref(&[2], &[1, 3]));

        // Middle days are the 3rd to the 6th.
        assert_eq!(plan.days_for(&QUARTERS), pref(&[6], &[5]));
        assert_eq!(plan.days_for(&EIGHTHS), pref(&[5], &[4, 6]));
        assert_eq!(plan.days_for(&Round::Bracket { depth: 5 }), pref(&[4], &[3, 5]));
        assert_eq!(plan.days_for(&Round::Bracket { depth: 6 }), pref(&[3], &[4]));
        assert_eq!(plan.days_for(&Round::Bracket { depth: 9 }), pref(&[3], &[4]));

        assert_eq!(plan.days_for(&Round::SEMIFINAL), pref(&[7], &[6]));
        assert_eq!(plan.days_for(&Round::FINAL), pref(&[7], &[]));
    }

    #[test]
    fn test_days_for_five_days() {
        let plan = plan(5);
        assert_eq!(plan.days_for(&QUARTERS), pref(&[4], &[3]));
        assert_eq!(plan.days_for(&EIGHTHS), pref(&[3], &[4]));
    }

    #[test]
    fn test_tier() {
        let pref = pref(&[2], &[1, 3]);
        assert_eq!(pref.tier(date(2)), 0);
        assert_eq!(pref.tier(date(3)), 1);
        assert_eq!(pref.tier(date(4)), 2);
    }
}
