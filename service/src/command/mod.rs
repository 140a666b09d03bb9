//! [`Command`] definition.

pub mod authorize_session;
pub mod cancel_booking;
pub mod create_booking;
pub mod settle_booking;

/// [`Command`] of the [`Service`].
///
/// [`Service`]: crate::Service
pub use common::Handler as Command;

pub use self::{
    authorize_session::AuthorizeSession, cancel_booking::CancelBooking,
    create_booking::{CreateBooking, CreatedBooking},
    settle_booking::SettleBooking,
};
