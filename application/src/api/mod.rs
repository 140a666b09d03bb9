//! REST API definitions.

pub mod booking;
pub mod payment;
pub mod quote;

use crate::define_error;

define_error! {
    enum PaginationError {
        #[code = "INVALID_PAGINATION_ARGUMENTS"]
        #[status = BAD_REQUEST]
        #[message = "Invalid pagination arguments"]
        Invalid,
    }
}
