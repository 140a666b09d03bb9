//! [`Stay`] definitions.

use common::Date;
use derive_more::{Display, Error};

use super::room;

/// Requested stay in a [`Room`].
///
/// Covers the nights from [`check_in`] (inclusive) up to [`check_out`]
/// (exclusive), since guests don't occupy a [`Room`] the night of departure.
///
/// [`Room`]: room::Room
/// [`check_in`]: Stay::check_in
/// [`check_out`]: Stay::check_out
#[derive(Clone, Copy, Debug)]
pub struct Stay {
    /// [`Date`] of the first night.
    pub check_in: Date,

    /// [`Date`] of departure.
    pub check_out: Date,

    /// Number of guests staying.
    pub guests: Guests,

    /// Number of [`Room`] units requested.
    ///
    /// [`Room`]: room::Room
    pub units: room::Units,
}

impl Stay {
    /// Creates a new [`Stay`] if the provided details form a valid one.
    ///
    /// # Errors
    ///
    /// If the dates don't form a future-or-today range of at least one night,
    /// or any of the counts is zero.
    pub fn new(
        check_in: Date,
        check_out: Date,
        guests: Guests,
        units: room::Units,
    ) -> Result<Self, InvalidStayError> {
        use InvalidStayError as E;

        if guests == 0 {
            return Err(E::NoGuests);
        }
        if units == 0 {
            return Err(E::NoUnits);
        }
        if check_out <= check_in {
            return Err(E::EmptyRange {
                check_in,
                check_out,
            });
        }
        if check_in < Date::today_utc() {
            return Err(E::InPast(check_in));
        }

        Ok(Self {
            check_in,
            check_out,
            guests,
            units,
        })
    }

    /// Returns the number of nights this [`Stay`] is charged for.
    ///
    /// Floored at 1 night, so even a degenerate range charges one night.
    #[must_use]
    pub fn nights(&self) -> u32 {
        let days = self.check_in.days_until(self.check_out).max(1);
        u32::try_from(days).unwrap_or(u32::MAX)
    }

    /// Returns an [`Iterator`] over the nights of this [`Stay`].
    pub fn nights_iter(&self) -> impl Iterator<Item = Date> {
        self.check_in.nights_until(self.check_out)
    }
}

/// Number of guests of a [`Stay`].
pub type Guests = u16;

/// Error of constructing a [`Stay`].
#[derive(Clone, Copy, Debug, Display, Error)]
pub enum InvalidStayError {
    /// `check_out` [`Date`] is not after `check_in` one.
    #[display(
        "`check_out` date `{check_out}` is not after `check_in` date \
         `{check_in}`"
    )]
    EmptyRange {
        /// [`Date`] of the first night.
        check_in: Date,

        /// [`Date`] of departure.
        check_out: Date,
    },

    /// `check_in` [`Date`] is already in the past.
    #[display("`check_in` date `{_0}` is in the past")]
    InPast(#[error(not(source))] Date),

    /// No guests are staying.
    #[display("number of guests must be positive")]
    NoGuests,

    /// No [`Room`] units are requested.
    ///
    /// [`Room`]: room::Room
    #[display("number of room units must be positive")]
    NoUnits,
}

#[cfg(test)]
mod spec {
    use super::{Date, InvalidStayError, Stay};

    fn date(s: &str) -> Date {
        s.parse().unwrap()
    }

    #[test]
    fn counts_nights() {
        let today = Date::today_utc();
        let check_out = today.next().unwrap().next().unwrap().next().unwrap();

        let stay = Stay::new(today, check_out, 2, 1).unwrap();

        assert_eq!(stay.nights(), 3);
        assert_eq!(stay.nights_iter().count(), 3);
    }

    #[test]
    fn accepts_single_night() {
        let today = Date::today_utc();
        let tomorrow = today.next().unwrap();

        let stay = Stay::new(today, tomorrow, 1, 1).unwrap();

        assert_eq!(stay.nights(), 1);
        assert_eq!(stay.nights_iter().collect::<Vec<_>>(), vec![today]);
    }

    #[test]
    fn rejects_empty_range() {
        let today = Date::today_utc();

        assert!(matches!(
            Stay::new(today, today, 2, 1),
            Err(InvalidStayError::EmptyRange { .. }),
        ));
    }

    #[test]
    fn rejects_inverted_range() {
        let today = Date::today_utc();
        let tomorrow = today.next().unwrap();

        assert!(matches!(
            Stay::new(tomorrow, today, 2, 1),
            Err(InvalidStayError::EmptyRange { .. }),
        ));
    }

    #[test]
    fn rejects_past_check_in() {
        assert!(matches!(
            Stay::new(date("2020-01-01"), date("2020-01-05"), 2, 1),
            Err(InvalidStayError::InPast(_)),
        ));
    }

    #[test]
    fn rejects_zero_counts() {
        let today = Date::today_utc();
        let tomorrow = today.next().unwrap();

        assert!(matches!(
            Stay::new(today, tomorrow, 0, 1),
            Err(InvalidStayError::NoGuests),
        ));
        assert!(matches!(
            Stay::new(today, tomorrow, 2, 0),
            Err(InvalidStayError::NoUnits),
        ));
    }
}
