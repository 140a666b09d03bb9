//! [`NightClaim`] definitions.

use std::collections::HashMap;

use common::Date;

use super::{booking, room, stay::Stay};

/// Claim of some [`Room`] units for a single night by a [`Booking`].
///
/// Availability of a [`Room`] for a night is nothing more than the sum of
/// claimed units for that night staying below the [`Room`]'s total unit
/// count. Claims are held by [`Pending`] and [`Paid`] [`Booking`]s and are
/// released whenever a [`Booking`] fails or is cancelled.
///
/// [`Booking`]: booking::Booking
/// [`Paid`]: booking::Status::Paid
/// [`Pending`]: booking::Status::Pending
/// [`Room`]: room::Room
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NightClaim {
    /// ID of the claimed [`Room`].
    ///
    /// [`Room`]: room::Room
    pub room_id: room::Id,

    /// Night the [`Room`] units are claimed for.
    ///
    /// [`Room`]: room::Room
    pub night: Date,

    /// ID of the [`Booking`] holding this claim.
    ///
    /// [`Booking`]: booking::Booking
    pub booking_id: booking::Id,

    /// Number of [`Room`] units claimed.
    ///
    /// [`Room`]: room::Room
    pub units: room::Units,
}

impl NightClaim {
    /// Expands the provided [`Stay`] into per-night [`NightClaim`]s held by
    /// the given [`Booking`].
    ///
    /// The departure night is excluded, since the guest doesn't occupy the
    /// [`Room`] the night of leaving.
    ///
    /// [`Booking`]: booking::Booking
    /// [`Room`]: room::Room
    #[must_use]
    pub fn for_stay(
        room_id: room::Id,
        booking_id: booking::Id,
        stay: &Stay,
    ) -> Vec<Self> {
        stay.nights_iter()
            .map(|night| Self {
                room_id,
                night,
                booking_id,
                units: stay.units,
            })
            .collect()
    }
}

/// Span of nights the [`NightClaim`]s of a single [`Room`] are inspected for.
///
/// [`Room`]: room::Room
#[derive(Clone, Copy, Debug)]
pub struct Span {
    /// ID of the [`Room`] to inspect.
    ///
    /// [`Room`]: room::Room
    pub room_id: room::Id,

    /// First night of the span.
    pub check_in: Date,

    /// First night beyond the span.
    pub check_out: Date,
}

impl Span {
    /// Creates a new [`Span`] covering the provided [`Stay`].
    #[must_use]
    pub fn of(room_id: room::Id, stay: &Stay) -> Self {
        Self {
            room_id,
            check_in: stay.check_in,
            check_out: stay.check_out,
        }
    }
}

/// Number of [`Room`] units already claimed, per night.
///
/// Nights without any claims are simply absent.
///
/// [`Room`]: room::Room
pub type Taken = HashMap<Date, room::Units>;

#[cfg(test)]
mod spec {
    use crate::domain::{booking, room, Stay};

    use super::NightClaim;

    #[test]
    fn expands_stay_into_nights() {
        let today = common::Date::today_utc();
        let check_out = today.next().unwrap().next().unwrap().next().unwrap();
        let stay = Stay::new(today, check_out, 2, 2).unwrap();
        let room_id = room::Id::new();
        let booking_id = booking::Id::new();

        let claims = NightClaim::for_stay(room_id, booking_id, &stay);

        assert_eq!(claims.len(), 3);
        assert!(claims.iter().all(|c| {
            c.room_id == room_id && c.booking_id == booking_id && c.units == 2
        }));
        assert_eq!(claims[0].night, today);
        assert_eq!(claims[2].night, today.next().unwrap().next().unwrap());
    }
}
