//! Resolution of byes in the elimination bracket.
//!
//! A bracket that is padded to a power of two contains spots that no pair will ever reach.
//! Each spot of a match is either taken by a known pair, fed by the winner or loser of
//! another match, or open. A match with only one spot that is not open cannot be played:
//!
//! - With a known pair, that pair wins the match and moves on immediately.
//! - With a fed spot, the match becomes a walkover that the arriving pair passes through
//!   once it is known (see [`Fixture::advance`]).
//! - With two open spots, the match disappears and the spot it would feed becomes open.
use std::collections::VecDeque;
use std::ops::Range;

use crate::{Fixture, Link, MatchState, Slot};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Spot {
    Pair,
    Fed,
    Open,
}

fn spot(fixture: &Fixture, link: Link) -> Spot {
    if fixture[link.index].pair(link.slot).is_some() {
        Spot::Pair
    } else if fixture.is_fed(link) {
        Spot::Fed
    } else {
        Spot::Open
    }
}

/// Resolves all byes starting with the matches in `first_round`.
pub(crate) fn resolve(fixture: &mut Fixture, first_round: Range<usize>) {
    let mut queue: VecDeque<usize> = first_round.collect();
    let mut changed = Vec::new();

    while let Some(index) = queue.pop_front() {
        if fixture[index].state != MatchState::Scheduled {
            continue;
        }

        let first = spot(fixture, Link::new(index, Slot::First));
        let second = spot(fixture, Link::new(index, Slot::Second));

        match (first, second) {
            (Spot::Pair, Spot::Open) | (Spot::Open, Spot::Pair) => {
                let slot = if first == Spot::Pair {
                    Slot::First
                } else {
                    Slot::Second
                };

                let m = &mut fixture[index];
                m.state = MatchState::Walkover;

                if let Some(pair) = m.pair(slot) {
                    m.winner = Some(pair);

                    log::debug!("Pair {} advances from match {} without playing", pair, index);

                    if let Some(next) = m.next_winner {
                        fixture.advance(pair, next, &mut changed);
                        queue.push_back(next.index);
                    }
                }
            }
            (Spot::Fed, Spot::Open) | (Spot::Open, Spot::Fed) => {
                log::debug!("Match {} is a bye for its only incoming pair", index);

                fixture[index].state = MatchState::Walkover;
            }
            (Spot::Open, Spot::Open) => {
                log::debug!("Match {} has no pairs and is dropped", index);

                let m = &mut fixture[index];
                m.state = MatchState::Walkover;

                if let Some(next) = m.next_winner.take() {
                    queue.push_back(next.index);
                }
            }
            _ => (),
        }
    }
}
