//! # tournament-fixture-core
//!
//! This crate contains everything required to turn the confirmed pairs of a tournament
//! category into a playable fixture and to place that fixture on the courts of the
//! tournament. It performs no I/O; persistence is left to the caller.
//!
//! Important types:
//! - [`RankedPair`]: A pair together with the ranking points of both players. Input for
//! [`seeding::seed`].
//! - [`Fixture`]: An arena of [`FixtureMatch`]es. Matches refer to each other using
//! [`Link`]s, which are plain indexes into the arena.
//! - [`Round`]: The round label of a match. The [`Ord`] impl is the order in which rounds
//! are scheduled.
//! - [`TimeOfDay`]: A `HH:MM` wall clock time.
//! - [`DayPlan`]: Maps every round to the days it should preferably be played on.
//! - [`TimeSlot`] and [`OccupiedSlots`]: The building blocks of [`schedule::allocate`].
//!
//! A draw is done in three steps:
//!
//! ```
//! # use rand::SeedableRng;
//! # use tournament_fixture_core::{seeding, Fixture, PairId, RankedPair};
//! let pairs = vec![
//!     RankedPair::new(PairId(1), [Some(300), Some(200)]),
//!     RankedPair::new(PairId(2), [Some(900), None]),
//!     RankedPair::new(PairId(3), [None, None]),
//! ];
//!
//! let mut rng = rand::rngs::StdRng::seed_from_u64(0);
//! let seeded = seeding::seed(pairs, &mut rng);
//!
//! let ids: Vec<PairId> = seeded.iter().map(|pair| pair.id).collect();
//! let fixture = Fixture::draw(&ids).unwrap();
//!
//! assert_eq!(fixture.len(), 3);
//! ```
//!
//! ## Feature Flags
//!
//! `serde`: Adds `Serialize` and `Deserialize` impls to almost all types.
//!
pub mod days;
pub mod schedule;
pub mod seeding;
pub mod time;

mod accommodation;
mod bracket;
mod byes;
mod fixture;
mod round;

pub use days::{DayPlan, DayPreference};
pub use fixture::{Fixture, FixtureMatch, Link, MatchState, Outcome, Slot};
pub use round::Round;
pub use schedule::{
    Allocation, AvailabilityWindow, OccupiedSlots, PendingMatch, SlotKey, SlotLength, TimeSlot,
};
pub use seeding::{RankedPair, SeededPair};
pub use time::TimeOfDay;

use thiserror::Error;

use std::fmt::{self, Display, Formatter};
use std::result;
use std::str::FromStr;

use chrono::NaiveDate;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The smallest number of pairs that can be drawn into a fixture.
pub const MIN_PAIRS: usize = 3;

macro_rules! id {
    ($name:ident, $id:ty) => {
        #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        #[cfg_attr(feature = "serde", serde(transparent))]
        #[repr(transparent)]
        pub struct $name(pub $id);

        impl Display for $name {
            #[inline]
            fn fmt(&self, f: &mut Formatter) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<$id> for $name {
            #[inline]
            fn from(id: $id) -> Self {
                Self(id)
            }
        }

        impl FromStr for $name {
            type Err = <$id as FromStr>::Err;

            #[inline]
            fn from_str(s: &str) -> result::Result<Self, Self::Err> {
                Ok(Self(s.parse::<$id>()?))
            }
        }
    };
}

id!(PairId, u64);
id!(CourtId, u64);

/// An `Result<T>` using [`enum@Error`] as an error type.
pub type Result<T> = result::Result<T, Error>;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("not enough pairs: at least {min} are required, found {found}")]
    NotEnoughPairs { min: usize, found: usize },
    #[error("invalid time \"{0}\": expected HH:MM")]
    InvalidTime(String),
    #[error("unknown round \"{0}\"")]
    UnknownRound(String),
    #[error("invalid window for court {court} on {date}: {start} is not before {end}")]
    InvalidWindow {
        court: CourtId,
        date: NaiveDate,
        start: TimeOfDay,
        end: TimeOfDay,
    },
    #[error("invalid slot length: a match must last at least one minute")]
    InvalidSlotLength,
    #[error("invalid link: match {index} links to {target} but only {length} matches exist")]
    InvalidLink {
        index: usize,
        target: usize,
        length: usize,
    },
    #[error("no match at index {0}")]
    NoSuchMatch(usize),
    #[error("match {index} cannot take a result while {state}")]
    NotPlayable { index: usize, state: MatchState },
    #[error("match {index} is still waiting for a pair")]
    WaitingForPair { index: usize },
    #[error("pair {pair} does not play in match {index}")]
    NotAParticipant { index: usize, pair: PairId },
}
