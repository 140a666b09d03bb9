//! Background [`Task`]s definitions.

mod background;
pub mod reap_stale_bookings;

pub use common::Handler as Task;

pub use self::{
    background::Background, reap_stale_bookings::ReapStaleBookings,
};
