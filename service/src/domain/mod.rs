//! Domain definitions.

pub mod booking;
pub mod claim;
pub mod pricing;
pub mod room;
pub mod stay;
pub mod user;

pub use self::{
    booking::Booking, claim::NightClaim, pricing::Quote, room::Room,
    stay::Stay,
};
