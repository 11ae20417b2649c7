use std::cmp::Ordering;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use crate::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The round a match belongs to.
///
/// `R1` and `R2` are the two accommodation rounds played before the elimination bracket.
/// Bracket rounds are identified by their depth, counted from the final: the final has a
/// depth of 1, the semifinals a depth of 2 and so on.
///
/// The [`Ord`] impl is the fixed precedence in which rounds are played: both accommodation
/// rounds come first, followed by the bracket rounds from the deepest one up to the final.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Round {
    R1,
    R2,
    Bracket { depth: u32 },
}

impl Round {
    pub const FINAL: Self = Self::Bracket { depth: 1 };
    pub const SEMIFINAL: Self = Self::Bracket { depth: 2 };

    /// Returns `true` if this is one of the two accommodation rounds.
    #[inline]
    pub fn is_accommodation(&self) -> bool {
        matches!(self, Self::R1 | Self::R2)
    }

    fn stage(&self) -> u8 {
        match self {
            Self::R1 => 0,
            Self::R2 => 1,
            Self::Bracket { .. } => 2,
        }
    }
}

impl PartialOrd for Round {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Round {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            // Deeper rounds are played earlier.
            (Self::Bracket { depth: lhs }, Self::Bracket { depth: rhs }) => rhs.cmp(lhs),
            _ => self.stage().cmp(&other.stage()),
        }
    }
}

impl Display for Round {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::R1 => f.write_str("R1"),
            Self::R2 => f.write_str("R2"),
            Self::Bracket { depth } => match depth {
                1 => f.write_str("FINAL"),
                2 => f.write_str("SEMIFINAL"),
                3 => f.write_str("CUARTOS"),
                4 => f.write_str("OCTAVOS"),
                5 => f.write_str("DIECISEISAVOS"),
                // Named after the number of pairs entering the round.
                depth => write!(f, "RONDA_{}", 1u64 << depth),
            },
        }
    }
}

impl FromStr for Round {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let depth = match s {
            "R1" => return Ok(Self::R1),
            "R2" => return Ok(Self::R2),
            "FINAL" => 1,
            "SEMIFINAL" => 2,
            "CUARTOS" => 3,
            "OCTAVOS" => 4,
            "DIECISEISAVOS" => 5,
            s => {
                let entrants: u64 = s
                    .strip_prefix("RONDA_")
                    .and_then(|n| n.parse().ok())
                    .ok_or_else(|| Error::UnknownRound(s.to_owned()))?;

                // Everything below 64 entrants has a proper name.
                if !entrants.is_power_of_two() || entrants < 64 {
                    return Err(Error::UnknownRound(s.to_owned()));
                }

                entrants.trailing_zeros()
            }
        };

        Ok(Self::Bracket { depth })
    }
}

#[cfg(feature = "serde")]
impl Serialize for Round {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for Round {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::Round;
    use crate::Error;

    #[test]
    fn test_round_labels() {
        let labels = [
            (Round::R1, "R1"),
            (Round::R2, "R2"),
            (Round::FINAL, "FINAL"),
            (Round::SEMIFINAL, "SEMIFINAL"),
            (Round::Bracket { depth: 3 }, "CUARTOS"),
            (Round::Bracket { depth: 4 }, "OCTAVOS"),
            (Round::Bracket { depth: 5 }, "DIECISEISAVOS"),
            (Round::Bracket { depth: 6 }, "RONDA_64"),
            (Round::Bracket { depth: 7 }, "RONDA_128"),
        ];

        for (round, label) in labels {
            assert_eq!(round.to_string(), label);
            assert_eq!(label.parse::<Round>(), Ok(round));
        }

        for label in ["", "R3", "final", "RONDA_", "RONDA_32", "RONDA_100"] {
            assert_eq!(
                label.parse::<Round>(),
                Err(Error::UnknownRound(label.to_owned()))
            );
        }
    }

    #[test]
    fn test_round_precedence() {
        let mut rounds = vec![
            Round::FINAL,
            Round::Bracket { depth: 3 },
            Round::R2,
            Round::SEMIFINAL,
            Round::Bracket { depth: 6 },
            Round::R1,
            Round::Bracket { depth: 4 },
        ];
        rounds.sort();

        assert_eq!(
            rounds,
            [
                Round::R1,
                Round::R2,
                Round::Bracket { depth: 6 },
                Round::Bracket { depth: 4 },
                Round::Bracket { depth: 3 },
                Round::SEMIFINAL,
                Round::FINAL,
            ]
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_round_serde() {
        use serde_test::{assert_de_tokens_error, assert_tokens, Token};

        assert_tokens(&Round::R2, &[Token::Str("R2")]);
        assert_tokens(&Round::SEMIFINAL, &[Token::Str("SEMIFINAL")]);
        assert_tokens(&Round::Bracket { depth: 7 }, &[Token::Str("RONDA_128")]);

        // 32 pairs enter the DIECISEISAVOS.
        assert_de_tokens_error::<Round>(
            &[Token::Str("RONDA_32")],
            "unknown round \"RONDA_32\"",
        );
    }
}
