//! Wall clock times used by court availability windows and time slots.
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use crate::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const MINUTES_PER_HOUR: u16 = 60;
const MINUTES_PER_DAY: u16 = 24 * MINUTES_PER_HOUR;

/// A time of day with minute precision, stored as minutes since midnight.
///
/// Valid values range from `00:00` up to and including `24:00`. The latter only exists so
/// that a window can end at midnight.
///
/// # Examples
///
/// ```
/// # use tournament_fixture_core::TimeOfDay;
/// let start: TimeOfDay = "09:30".parse().unwrap();
/// assert_eq!(start.minutes(), 570);
/// assert_eq!(start.to_string(), "09:30");
/// ```
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct TimeOfDay(u16);

impl TimeOfDay {
    pub const MIDNIGHT: Self = Self(0);
    pub const END_OF_DAY: Self = Self(MINUTES_PER_DAY);

    /// Creates a new `TimeOfDay` from minutes since midnight. Returns `None` if `minutes` is
    /// past `24:00`.
    #[inline]
    pub fn from_minutes(minutes: u16) -> Option<Self> {
        if minutes <= MINUTES_PER_DAY {
            Some(Self(minutes))
        } else {
            None
        }
    }

    /// Creates a new `TimeOfDay` from an hour and a minute.
    pub fn from_hm(hour: u16, minute: u16) -> Option<Self> {
        if minute >= MINUTES_PER_HOUR {
            return None;
        }

        Self::from_minutes(hour.checked_mul(MINUTES_PER_HOUR)?.checked_add(minute)?)
    }

    /// Returns the number of minutes since midnight.
    #[inline]
    pub fn minutes(self) -> u16 {
        self.0
    }

    #[inline]
    pub fn hour(self) -> u16 {
        self.0 / MINUTES_PER_HOUR
    }

    #[inline]
    pub fn minute(self) -> u16 {
        self.0 % MINUTES_PER_HOUR
    }

    /// Adds `minutes` to the time. Returns `None` if the result would be past `24:00`.
    #[inline]
    pub fn checked_add(self, minutes: u16) -> Option<Self> {
        Self::from_minutes(self.0.checked_add(minutes)?)
    }

    /// Returns the time a match starting at `self` and lasting `duration` minutes ends.
    #[inline]
    pub fn end_time(self, duration: u16) -> Option<Self> {
        self.checked_add(duration)
    }
}

impl Display for TimeOfDay {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl FromStr for TimeOfDay {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || Error::InvalidTime(s.to_owned());

        let (hour, minute) = s.split_once(':').ok_or_else(err)?;

        // `u16::from_str` would also accept a leading `+`.
        if hour.is_empty()
            || hour.len() > 2
            || minute.len() != 2
            || !hour.bytes().chain(minute.bytes()).all(|b| b.is_ascii_digit())
        {
            return Err(err());
        }

        let hour: u16 = hour.parse().map_err(|_| err())?;
        let minute: u16 = minute.parse().map_err(|_| err())?;

        // 24:00 is the only valid time with an hour of 24.
        if hour > 24 || (hour == 24 && minute != 0) {
            return Err(err());
        }

        Self::from_hm(hour, minute).ok_or_else(err)
    }
}

#[cfg(feature = "serde")]
impl Serialize for TimeOfDay {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::TimeOfDay;
    use crate::Error;

    #[test]
    fn test_time_of_day_parse() {
        assert_eq!("00:00".parse::<TimeOfDay>(), Ok(TimeOfDay::MIDNIGHT));
        assert_eq!("9:05".parse::<TimeOfDay>().unwrap().minutes(), 545);
        assert_eq!("18:45".parse::<TimeOfDay>().unwrap().minutes(), 1125);
        assert_eq!("24:00".parse::<TimeOfDay>(), Ok(TimeOfDay::END_OF_DAY));

        for input in ["", "12", "12:", ":30", "12:5", "24:01", "25:00", "12:60", "-1:00", "1a:00"] {
            assert_eq!(
                input.parse::<TimeOfDay>(),
                Err(Error::InvalidTime(input.to_owned())),
                "{:?} should not parse",
                input
            );
        }
    }

    #[test]
    fn test_time_of_day_display() {
        assert_eq!(TimeOfDay::from_hm(9, 5).unwrap().to_string(), "09:05");
        assert_eq!(TimeOfDay::from_hm(21, 30).unwrap().to_string(), "21:30");
        assert_eq!(TimeOfDay::END_OF_DAY.to_string(), "24:00");
    }

    #[test]
    fn test_time_of_day_end_time() {
        let start = TimeOfDay::from_hm(10, 0).unwrap();
        assert_eq!(start.end_time(90), TimeOfDay::from_hm(11, 30));

        let late = TimeOfDay::from_hm(23, 0).unwrap();
        assert_eq!(late.end_time(60), Some(TimeOfDay::END_OF_DAY));
        assert_eq!(late.end_time(61), None);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_time_of_day_serde() {
        use serde_test::{assert_de_tokens_error, assert_tokens, Token};

        assert_tokens(&TimeOfDay::from_hm(9, 30).unwrap(), &[Token::Str("09:30")]);
        assert_tokens(&TimeOfDay::END_OF_DAY, &[Token::Str("24:00")]);

        assert_de_tokens_error::<TimeOfDay>(
            &[Token::Str("24:01")],
            "invalid time \"24:01\": expected HH:MM",
        );
    }
}
