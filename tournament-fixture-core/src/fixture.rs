use std::fmt::{self, Display, Formatter};
use std::ops::{Index, IndexMut};
use std::str::FromStr;

use crate::schedule::PendingMatch;
use crate::{accommodation, bracket, byes};
use crate::{Error, PairId, Result, Round, MIN_PAIRS};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One of the two spots for a pair in a match.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Slot {
    First,
    Second,
}

impl Slot {
    /// Returns the slot for an even (`First`) or odd (`Second`) position.
    #[inline]
    pub fn from_parity(position: usize) -> Self {
        if position % 2 == 0 {
            Self::First
        } else {
            Self::Second
        }
    }

    /// Returns the 1-based slot number, `1` for `First` and `2` for `Second`.
    #[inline]
    pub fn number(self) -> u8 {
        match self {
            Self::First => 1,
            Self::Second => 2,
        }
    }

    /// Returns the slot for a 1-based slot number.
    #[inline]
    pub fn from_number(number: u8) -> Option<Self> {
        match number {
            1 => Some(Self::First),
            2 => Some(Self::Second),
            _ => None,
        }
    }

    #[inline]
    pub fn other(self) -> Self {
        match self {
            Self::First => Self::Second,
            Self::Second => Self::First,
        }
    }

    #[inline]
    fn index(self) -> usize {
        match self {
            Self::First => 0,
            Self::Second => 1,
        }
    }
}

/// A forward reference to a slot in another match of the same [`Fixture`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Link {
    pub index: usize,
    pub slot: Slot,
}

impl Link {
    #[inline]
    pub fn new(index: usize, slot: Slot) -> Self {
        Self { index, slot }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum MatchState {
    Scheduled,
    InProgress,
    Finished,
    Walkover,
    Cancelled,
}

impl MatchState {
    pub fn to_u8(self) -> u8 {
        match self {
            Self::Scheduled => 0,
            Self::InProgress => 1,
            Self::Finished => 2,
            Self::Walkover => 3,
            Self::Cancelled => 4,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Scheduled),
            1 => Some(Self::InProgress),
            2 => Some(Self::Finished),
            3 => Some(Self::Walkover),
            4 => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Returns `true` if a match in this state still needs a court and time.
    #[inline]
    pub fn needs_slot(self) -> bool {
        !matches!(self, Self::Walkover | Self::Cancelled)
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::InProgress => "in-progress",
            Self::Finished => "finished",
            Self::Walkover => "walkover",
            Self::Cancelled => "cancelled",
        }
    }
}

impl Display for MatchState {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchState {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        [
            Self::Scheduled,
            Self::InProgress,
            Self::Finished,
            Self::Walkover,
            Self::Cancelled,
        ]
        .into_iter()
        .find(|state| state.as_str() == s)
        .ok_or(())
    }
}

/// How a result came about.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Outcome {
    Played,
    Walkover,
}

/// A match within a [`Fixture`].
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FixtureMatch {
    pub round: Round,
    /// The 1-based sequence number within the round.
    pub number: u32,
    pub pairs: [Option<PairId>; 2],
    pub state: MatchState,
    pub winner: Option<PairId>,
    /// The slot the winner of this match advances to.
    pub next_winner: Option<Link>,
    /// The slot the loser of this match advances to.
    pub next_loser: Option<Link>,
}

impl FixtureMatch {
    /// Creates a new empty match in the `Scheduled` state.
    pub fn new(round: Round, number: u32) -> Self {
        Self {
            round,
            number,
            pairs: [None, None],
            state: MatchState::Scheduled,
            winner: None,
            next_winner: None,
            next_loser: None,
        }
    }

    #[inline]
    pub fn pair(&self, slot: Slot) -> Option<PairId> {
        self.pairs[slot.index()]
    }

    #[inline]
    pub fn set_pair(&mut self, slot: Slot, pair: Option<PairId>) {
        self.pairs[slot.index()] = pair;
    }

    /// Returns the losing pair once a winner is known and both pairs are present.
    pub fn loser(&self) -> Option<PairId> {
        let winner = self.winner?;
        let [first, second] = self.pairs;

        match (first?, second?) {
            (first, second) if first == winner => Some(second),
            (first, second) if second == winner => Some(first),
            _ => None,
        }
    }

    #[inline]
    pub fn has_both_pairs(&self) -> bool {
        self.pairs.iter().all(Option::is_some)
    }
}

/// Where a pair entering a match comes from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Feed {
    /// The winner of the match at the index.
    Winner(usize),
    /// The loser of the match at the index.
    Loser(usize),
    /// A pair that is already known.
    Pair(PairId),
}

/// All matches of a single category.
///
/// Matches are stored in an arena and refer to each other by index using [`Link`]s. A
/// fixture is always built in two passes: all matches are created first, then the links
/// between them are set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Fixture {
    matches: Vec<FixtureMatch>,
}

impl Fixture {
    #[inline]
    pub fn new() -> Self {
        Self {
            matches: Vec::new(),
        }
    }

    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            matches: Vec::with_capacity(capacity),
        }
    }

    /// Draws a new fixture for `pairs`, which must be ordered by seed (strongest first).
    ///
    /// The fixture consists of the two accommodation rounds followed by a single elimination
    /// bracket. Byes in the first bracket round are already resolved.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotEnoughPairs`] if less than [`MIN_PAIRS`] pairs are given.
    pub fn draw(pairs: &[PairId]) -> Result<Self> {
        if pairs.len() < MIN_PAIRS {
            return Err(Error::NotEnoughPairs {
                min: MIN_PAIRS,
                found: pairs.len(),
            });
        }

        log::debug!("Drawing fixture for {} pairs", pairs.len());

        let r1 = pairs.len() / 2;
        let r2 = (r1 + pairs.len() % 2) / 2;
        let bracket = (r1 + r2 + (r1 + pairs.len() % 2) % 2).next_power_of_two();

        let mut fixture = Self::with_capacity(r1 + r2 + bracket - 1);

        let entrants = accommodation::build(&mut fixture, pairs);
        let first_round = bracket::build(&mut fixture, &entrants);
        byes::resolve(&mut fixture, first_round);

        log::debug!("Drew fixture with {} matches", fixture.len());

        Ok(fixture)
    }

    /// Resumes a fixture from existing matches.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLink`] if any match links to an index outside of `matches`.
    pub fn resume(matches: Vec<FixtureMatch>) -> Result<Self> {
        let length = matches.len();

        for (index, m) in matches.iter().enumerate() {
            for link in m.next_winner.iter().chain(m.next_loser.iter()) {
                if link.index >= length {
                    return Err(Error::InvalidLink {
                        index,
                        target: link.index,
                        length,
                    });
                }
            }
        }

        Ok(Self { matches })
    }

    #[inline]
    pub fn matches(&self) -> &[FixtureMatch] {
        &self.matches
    }

    #[inline]
    pub fn into_matches(self) -> Vec<FixtureMatch> {
        self.matches
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Returns the indexes of all matches in `round`, ordered by their sequence number.
    pub fn round(&self, round: Round) -> Vec<usize> {
        let mut indexes: Vec<usize> = (0..self.len())
            .filter(|index| self.matches[*index].round == round)
            .collect();

        indexes.sort_by_key(|index| self.matches[*index].number);
        indexes
    }

    /// Returns the indexes of all matches that send a pair into `target`.
    pub fn feeders(&self, target: Link) -> impl Iterator<Item = usize> + '_ {
        self.matches
            .iter()
            .enumerate()
            .filter(move |(_, m)| m.next_winner == Some(target) || m.next_loser == Some(target))
            .map(|(index, _)| index)
    }

    /// Returns `true` if any match sends a pair into `target`.
    #[inline]
    pub fn is_fed(&self, target: Link) -> bool {
        self.feeders(target).next().is_some()
    }

    /// Returns all matches that still need a court and time.
    pub fn pending(&self) -> Vec<PendingMatch<usize>> {
        self.matches
            .iter()
            .enumerate()
            .filter(|(_, m)| m.state.needs_slot() && m.winner.is_none())
            .map(|(index, m)| PendingMatch::new(index, m.round, m.number))
            .collect()
    }

    /// Returns the indexes of the opening matches: first round accommodation matches with
    /// both pairs known.
    pub fn opening_matches(&self) -> Vec<usize> {
        self.round(Round::R1)
            .into_iter()
            .filter(|index| self.matches[*index].has_both_pairs())
            .collect()
    }

    /// Records the result of the match at `index` and advances the winner and loser into
    /// their next matches. Returns the indexes of all matches that were changed, starting
    /// with `index`.
    ///
    /// Byes that were waiting for the winner or loser are resolved immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if the match does not exist, is not waiting for a result, does not
    /// have both pairs yet, or if `winner` does not play in the match.
    pub fn record_result(
        &mut self,
        index: usize,
        winner: PairId,
        outcome: Outcome,
    ) -> Result<Vec<usize>> {
        let m = self.matches.get_mut(index).ok_or(Error::NoSuchMatch(index))?;

        if !matches!(m.state, MatchState::Scheduled | MatchState::InProgress) {
            return Err(Error::NotPlayable {
                index,
                state: m.state,
            });
        }

        if !m.has_both_pairs() {
            return Err(Error::WaitingForPair { index });
        }

        if !m.pairs.contains(&Some(winner)) {
            return Err(Error::NotAParticipant {
                index,
                pair: winner,
            });
        }

        m.winner = Some(winner);
        m.state = match outcome {
            Outcome::Played => MatchState::Finished,
            Outcome::Walkover => MatchState::Walkover,
        };

        let loser = m.loser();
        let next_winner = m.next_winner;
        let next_loser = m.next_loser;

        log::debug!(
            "Match {} won by {}, next winner match: {:?}, next loser match: {:?}",
            index,
            winner,
            next_winner,
            next_loser
        );

        let mut changed = vec![index];

        if let Some(link) = next_winner {
            self.advance(winner, link, &mut changed);
        }

        if let (Some(loser), Some(link)) = (loser, next_loser) {
            self.advance(loser, link, &mut changed);
        }

        Ok(changed)
    }

    /// Places `pair` into `link`. If the target is a bye waiting for its only pair, the pair
    /// wins it and keeps advancing.
    pub(crate) fn advance(&mut self, pair: PairId, mut link: Link, changed: &mut Vec<usize>) {
        loop {
            self.matches[link.index].set_pair(link.slot, Some(pair));
            changed.push(link.index);

            let other = Link::new(link.index, link.slot.other());
            let target = &self.matches[link.index];

            let is_bye = target.state == MatchState::Walkover
                && target.winner.is_none()
                && target.pair(other.slot).is_none()
                && !self.is_fed(other);

            if !is_bye {
                return;
            }

            log::debug!("Pair {} wins bye in match {}", pair, link.index);

            let target = &mut self.matches[link.index];
            target.winner = Some(pair);

            match target.next_winner {
                Some(next) => link = next,
                None => return,
            }
        }
    }

    /// Pushes a new match and returns its index.
    #[inline]
    pub(crate) fn push(&mut self, m: FixtureMatch) -> usize {
        self.matches.push(m);
        self.matches.len() - 1
    }

    /// Connects `feed` to `target`. Known pairs are placed directly, matches get a link.
    pub(crate) fn feed(&mut self, feed: Feed, target: Link) {
        match feed {
            Feed::Winner(index) => self.matches[index].next_winner = Some(target),
            Feed::Loser(index) => self.matches[index].next_loser = Some(target),
            Feed::Pair(pair) => self.matches[target.index].set_pair(target.slot, Some(pair)),
        }
    }
}

impl Index<usize> for Fixture {
    type Output = FixtureMatch;

    #[inline]
    fn index(&self, index: usize) -> &Self::Output {
        &self.matches[index]
    }
}

impl IndexMut<usize> for Fixture {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.matches[index]
    }
}
