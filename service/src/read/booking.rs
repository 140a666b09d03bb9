//! [`Booking`]-related read definitions.
//!
//! [`Booking`]: crate::domain::Booking

use common::{money::Money, Date};

#[cfg(doc)]
use crate::domain::Booking;
use crate::domain::{booking, room};

/// Compact listing projection of a [`Booking`].
#[derive(Clone, Debug)]
pub struct Summary {
    /// ID of the [`Booking`].
    pub id: booking::Id,

    /// Human-readable [`booking::Code`] of the [`Booking`].
    pub code: booking::Code,

    /// ID of the booked [`Room`].
    ///
    /// [`Room`]: crate::domain::Room
    pub room_id: room::Id,

    /// Arrival date of the [`Booking`].
    pub check_in: Date,

    /// Departure date of the [`Booking`].
    pub check_out: Date,

    /// Payment [`booking::Status`] of the [`Booking`].
    pub status: booking::Status,

    /// Total amount payable for the [`Booking`].
    pub total: Money,

    /// [`DateTime`] when the [`Booking`] was created.
    ///
    /// [`DateTime`]: common::datetime::DateTime
    pub created_at: booking::CreationDateTime,
}

pub mod list {
    //! [`Booking`]s list definitions.

    use common::define_pagination;
    use derive_more::{From, Into};

    #[cfg(doc)]
    use crate::domain::Booking;
    use crate::domain::{booking, user};

    use super::Summary;

    define_pagination!(Cursor, Node, Filter);

    /// Node in a [`Connection`].
    pub type Node = Summary;

    /// Cursor pointing to a specific [`Booking`] in a list.
    pub type Cursor = booking::Id;

    /// Filter for [`Selector`].
    #[derive(Clone, Copy, Debug, Default)]
    pub struct Filter {
        /// Owner whose [`Booking`]s to list only.
        pub user_id: Option<user::Id>,
    }

    /// Total count of [`Booking`]s.
    #[derive(Clone, Copy, Debug, Eq, From, Hash, Into, PartialEq)]
    pub struct TotalCount(i32);
}
