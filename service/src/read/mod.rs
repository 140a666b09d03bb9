//! Read entities definitions.

pub mod booking;

pub use self::booking::Summary;
