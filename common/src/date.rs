//! [`Date`]-related definitions.

#[cfg(feature = "postgres")]
use std::error::Error as StdError;
use std::{fmt, str::FromStr};

use derive_more::{Display, Error};
#[cfg(feature = "postgres")]
use postgres_types::{
    accepts, private::BytesMut, to_sql_checked, FromSql, IsNull, ToSql, Type,
};
use time::{
    format_description::BorrowedFormatItem, macros::format_description,
};

/// `YYYY-MM-DD` format of a [`Date`].
const ISO_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]");

/// Civil calendar date without a time component.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Date(time::Date);

impl Date {
    /// Returns the current [`Date`] in UTC.
    #[must_use]
    pub fn today_utc() -> Self {
        Self(time::OffsetDateTime::now_utc().date())
    }

    /// Returns the [`Date`] following this one.
    ///
    /// [`None`] is returned if the following [`Date`] is not representable.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        self.0.next_day().map(Self)
    }

    /// Returns the number of whole days from this [`Date`] until the `until`
    /// one.
    ///
    /// The result is negative if the `until` [`Date`] is earlier than this
    /// one.
    #[must_use]
    pub fn days_until(self, until: Self) -> i64 {
        (until.0 - self.0).whole_days()
    }

    /// Returns an [`Iterator`] over every night of a stay starting on this
    /// [`Date`] and ending on the `until` one (exclusive).
    pub fn nights_until(self, until: Self) -> impl Iterator<Item = Self> {
        let mut night = (self < until).then_some(self);
        std::iter::from_fn(move || {
            let current = night?;
            night = current.next().filter(|n| *n < until);
            Some(current)
        })
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.format(ISO_FORMAT).map_err(|_| fmt::Error)?)
    }
}

impl FromStr for Date {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        time::Date::parse(s, ISO_FORMAT)
            .map(Self)
            .map_err(ParseError)
    }
}

/// Error of parsing a [`Date`] from a string.
#[derive(Clone, Copy, Debug, Display, Error)]
#[display("invalid `YYYY-MM-DD` date: {_0}")]
pub struct ParseError(time::error::Parse);

#[cfg(feature = "postgres")]
impl FromSql<'_> for Date {
    accepts!(DATE);

    fn from_sql(
        ty: &Type,
        raw: &[u8],
    ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        time::Date::from_sql(ty, raw).map(Self)
    }
}

#[cfg(feature = "postgres")]
impl ToSql for Date {
    accepts!(DATE);
    to_sql_checked!();

    fn to_sql(
        &self,
        ty: &Type,
        w: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn StdError + Sync + Send>> {
        self.0.to_sql(ty, w)
    }
}

#[cfg(feature = "serde")]
mod serde {
    //! Module providing integration with [`serde`] crate.

    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    use super::Date;

    impl serde::Serialize for Date {
        fn serialize<S: Serializer>(
            &self,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            serializer.collect_str(self)
        }
    }

    impl<'de> Deserialize<'de> for Date {
        fn deserialize<D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Self, D::Error> {
            String::deserialize(deserializer)?
                .parse()
                .map_err(D::Error::custom)
        }
    }
}

#[cfg(test)]
mod spec {
    use std::str::FromStr as _;

    use super::Date;

    fn date(s: &str) -> Date {
        s.parse().unwrap()
    }

    #[test]
    fn from_str() {
        assert!(Date::from_str("2025-06-01").is_ok());
        assert!(Date::from_str("2025-12-31").is_ok());

        assert!(Date::from_str("2025-13-01").is_err());
        assert!(Date::from_str("2025-02-30").is_err());
        assert!(Date::from_str("01-06-2025").is_err());
        assert!(Date::from_str("2025/06/01").is_err());
        assert!(Date::from_str("not-a-date").is_err());
        assert!(Date::from_str("").is_err());
    }

    #[test]
    fn to_string() {
        assert_eq!(date("2025-06-01").to_string(), "2025-06-01");
        assert_eq!(date("2025-11-30").to_string(), "2025-11-30");
    }

    #[test]
    fn days_until() {
        assert_eq!(date("2025-06-01").days_until(date("2025-06-04")), 3);
        assert_eq!(date("2025-06-01").days_until(date("2025-06-01")), 0);
        assert_eq!(date("2025-06-04").days_until(date("2025-06-01")), -3);
        assert_eq!(date("2025-12-31").days_until(date("2026-01-01")), 1);
    }

    #[test]
    fn nights_until() {
        assert_eq!(
            date("2025-06-01")
                .nights_until(date("2025-06-04"))
                .collect::<Vec<_>>(),
            vec![date("2025-06-01"), date("2025-06-02"), date("2025-06-03")],
        );

        assert_eq!(
            date("2025-02-28")
                .nights_until(date("2025-03-01"))
                .collect::<Vec<_>>(),
            vec![date("2025-02-28")],
        );

        assert_eq!(
            date("2025-06-04")
                .nights_until(date("2025-06-04"))
                .count(),
            0,
        );
        assert_eq!(
            date("2025-06-04")
                .nights_until(date("2025-06-01"))
                .count(),
            0,
        );
    }
}
