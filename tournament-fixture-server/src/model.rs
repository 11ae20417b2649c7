//! Entities stored by the server and the bodies of all responses.
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tournament_fixture_core::{
    CourtId, FixtureMatch, Link, MatchState, PairId, Round, SeededPair, Slot, TimeOfDay, TimeSlot,
};

use crate::Error;

macro_rules! id {
    ($($name:ident),* $(,)?) => {
        $(
            #[derive(
                Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
                Deserialize,
            )]
            #[serde(transparent)]
            pub struct $name(pub u64);

            impl Display for $name {
                #[inline]
                fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                    self.0.fmt(f)
                }
            }

            impl FromStr for $name {
                type Err = <u64 as FromStr>::Err;

                #[inline]
                fn from_str(s: &str) -> Result<Self, Self::Err> {
                    s.parse().map(Self)
                }
            }
        )*
    };
}

id!(TournamentId, CategoryId, MatchId, RegistrationId, PlayerId);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TournamentState {
    Draft,
    Published,
    InProgress,
    Finished,
}

impl TournamentState {
    pub fn to_u8(self) -> u8 {
        match self {
            Self::Draft => 0,
            Self::Published => 1,
            Self::InProgress => 2,
            Self::Finished => 3,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Draft),
            1 => Some(Self::Published),
            2 => Some(Self::InProgress),
            3 => Some(Self::Finished),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CategoryState {
    /// Registrations are open, no fixture exists yet.
    Open,
    /// A fixture was drawn but not published. It may be drawn again.
    Drafted,
    Published,
}

impl CategoryState {
    pub fn to_u8(self) -> u8 {
        match self {
            Self::Open => 0,
            Self::Drafted => 1,
            Self::Published => 2,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Open),
            1 => Some(Self::Drafted),
            2 => Some(Self::Published),
            _ => None,
        }
    }
}

impl Display for CategoryState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Open => "open",
            Self::Drafted => "drafted",
            Self::Published => "published",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tournament {
    pub id: TournamentId,
    pub name: String,
    pub state: TournamentState,
    /// Overrides the configured match duration in minutes.
    pub match_duration: Option<u16>,
    /// Overrides the configured buffer between matches in minutes.
    pub buffer: Option<u16>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub tournament_id: TournamentId,
    pub name: String,
    pub state: CategoryState,
}

/// A confirmed registration of two players for a category.
///
/// The second player may only be known by name. Such a player has no ranking points.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entrant {
    pub registration: RegistrationId,
    pub players: [Option<PlayerId>; 2],
    pub points: [Option<u32>; 2],
}

/// A match as stored, with its position within the fixture of its category.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchRecord {
    pub id: MatchId,
    pub category: CategoryId,
    pub position: usize,
    pub inner: FixtureMatch,
    pub slot: Option<TimeSlot>,
}

impl MatchRecord {
    pub fn entry(&self) -> MatchEntry {
        MatchEntry {
            id: self.id,
            round: self.inner.round,
            number: self.inner.number,
            pairs: self.inner.pairs,
            state: self.inner.state,
            winner: self.inner.winner,
            slot: self.slot,
        }
    }
}

/// The columns of a `matches` row.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MatchRow {
    pub id: u64,
    pub category_id: u64,
    pub position: u32,
    pub round: String,
    pub number: u32,
    pub pair1_id: Option<u64>,
    pub pair2_id: Option<u64>,
    pub state: u8,
    pub winner_id: Option<u64>,
    pub next_winner_position: Option<u32>,
    pub next_winner_slot: Option<u8>,
    pub next_loser_position: Option<u32>,
    pub next_loser_slot: Option<u8>,
    pub court_id: Option<u64>,
    pub date: Option<NaiveDate>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

/// Splits a link into its `position` and `slot` columns.
pub fn link_columns(link: Option<Link>) -> (Option<u32>, Option<u8>) {
    match link {
        Some(link) => (Some(link.index as u32), Some(link.slot.number())),
        None => (None, None),
    }
}

fn link_from_columns(position: Option<u32>, slot: Option<u8>) -> Result<Option<Link>, Error> {
    match (position, slot) {
        (Some(position), Some(slot)) => {
            let slot = Slot::from_number(slot).ok_or(Error::InvalidColumn("slot"))?;
            Ok(Some(Link::new(position as usize, slot)))
        }
        (None, None) => Ok(None),
        _ => Err(Error::InvalidColumn("link")),
    }
}

impl TryFrom<MatchRow> for MatchRecord {
    type Error = Error;

    fn try_from(row: MatchRow) -> Result<Self, Self::Error> {
        let round: Round = row.round.parse()?;
        let state = MatchState::from_u8(row.state).ok_or(Error::InvalidColumn("state"))?;

        let slot = match (row.court_id, row.date, row.start_time, row.end_time) {
            (Some(court), Some(date), Some(start), Some(end)) => Some(TimeSlot {
                court: CourtId(court),
                date,
                start: start.parse::<TimeOfDay>()?,
                end: end.parse::<TimeOfDay>()?,
            }),
            (None, None, None, None) => None,
            _ => return Err(Error::InvalidColumn("slot")),
        };

        let inner = FixtureMatch {
            round,
            number: row.number,
            pairs: [row.pair1_id.map(PairId), row.pair2_id.map(PairId)],
            state,
            winner: row.winner_id.map(PairId),
            next_winner: link_from_columns(row.next_winner_position, row.next_winner_slot)?,
            next_loser: link_from_columns(row.next_loser_position, row.next_loser_slot)?,
        };

        Ok(Self {
            id: MatchId(row.id),
            category: CategoryId(row.category_id),
            position: row.position as usize,
            inner,
            slot,
        })
    }
}

/// A match as it is shown in a fixture listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchEntry {
    pub id: MatchId,
    pub round: Round,
    pub number: u32,
    pub pairs: [Option<PairId>; 2],
    pub state: MatchState,
    pub winner: Option<PairId>,
    pub slot: Option<TimeSlot>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureResult {
    pub tournament: TournamentId,
    pub category: CategoryId,
    pub pairs: Vec<SeededPair>,
    pub matches: usize,
    pub scheduled: usize,
    pub unscheduled: usize,
}

/// Sent to the publication notifier and returned to the caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationResult {
    pub tournament: TournamentId,
    pub category: CategoryId,
    pub tournament_state: TournamentState,
    /// All first round matches with both pairs known.
    pub opening_matches: Vec<MatchEntry>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleResult {
    pub tournament: TournamentId,
    pub scheduled: usize,
    pub unscheduled: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundFixture {
    pub round: Round,
    pub matches: Vec<MatchEntry>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryFixture {
    pub category: CategoryId,
    pub name: String,
    pub state: CategoryState,
    pub rounds: Vec<RoundFixture>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRequest {
    pub winner: PairId,
    #[serde(default)]
    pub walkover: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultResponse {
    pub tournament_state: TournamentState,
    /// The match itself followed by all matches the pairs advanced into.
    pub changed: Vec<MatchEntry>,
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use tournament_fixture_core::{Link, MatchState, PairId, Round, Slot};

    use super::{link_columns, MatchId, MatchRecord, MatchRow, TournamentState};
    use crate::Error;

    fn row() -> MatchRow {
        MatchRow {
            id: 17,
            category_id: 3,
            position: 4,
            round: String::from("SEMIFINAL"),
            number: 2,
            pair1_id: Some(8),
            pair2_id: None,
            state: 0,
            winner_id: None,
            next_winner_position: Some(6),
            next_winner_slot: Some(2),
            next_loser_position: None,
            next_loser_slot: None,
            court_id: Some(1),
            date: NaiveDate::from_ymd_opt(2024, 6, 1),
            start_time: Some(String::from("10:30")),
            end_time: Some(String::from("12:00")),
        }
    }

    #[test]
    fn test_match_record_from_row() {
        let record = MatchRecord::try_from(row()).unwrap();

        assert_eq!(record.id, MatchId(17));
        assert_eq!(record.position, 4);
        assert_eq!(record.inner.round, Round::SEMIFINAL);
        assert_eq!(record.inner.pairs, [Some(PairId(8)), None]);
        assert_eq!(record.inner.state, MatchState::Scheduled);
        assert_eq!(record.inner.next_winner, Some(Link::new(6, Slot::Second)));
        assert_eq!(record.inner.next_loser, None);

        let slot = record.slot.unwrap();
        assert_eq!(slot.start.to_string(), "10:30");
        assert_eq!(slot.end.to_string(), "12:00");
    }

    #[test]
    fn test_match_record_invalid_columns() {
        let mut invalid = row();
        invalid.next_winner_slot = None;
        assert!(matches!(
            MatchRecord::try_from(invalid),
            Err(Error::InvalidColumn("link"))
        ));

        let mut invalid = row();
        invalid.start_time = None;
        assert!(matches!(
            MatchRecord::try_from(invalid),
            Err(Error::InvalidColumn("slot"))
        ));

        let mut invalid = row();
        invalid.state = 9;
        assert!(matches!(
            MatchRecord::try_from(invalid),
            Err(Error::InvalidColumn("state"))
        ));

        let mut invalid = row();
        invalid.round = String::from("QUARTER");
        assert!(matches!(MatchRecord::try_from(invalid), Err(Error::Core(_))));
    }

    #[test]
    fn test_link_columns() {
        assert_eq!(
            link_columns(Some(Link::new(3, Slot::First))),
            (Some(3), Some(1))
        );
        assert_eq!(link_columns(None), (None, None));
    }

    #[test]
    fn test_tournament_state_u8() {
        for state in [
            TournamentState::Draft,
            TournamentState::Published,
            TournamentState::InProgress,
            TournamentState::Finished,
        ] {
            assert_eq!(TournamentState::from_u8(state.to_u8()), Some(state));
        }

        assert_eq!(TournamentState::from_u8(4), None);
    }
}
