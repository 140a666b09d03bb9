//! Stay pricing endpoint.

use axum::{extract::Query, Json};
use common::{Date, Money, Percent};
use serde::{Deserialize, Serialize};
use service::{
    domain::{pricing, room, stay},
    query::{self, Query as _},
};

use crate::{define_error, AsError, Context, Error};

/// Parameters of a [`Quote`] request.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct Params {
    /// ID of the room to price the stay in.
    pub room_id: room::Id,

    /// Desired arrival date.
    pub check_in: Date,

    /// Desired departure date.
    pub check_out: Date,

    /// Number of guests to accommodate.
    pub guests: stay::Guests,

    /// Number of room units to occupy.
    pub units: room::Units,
}

/// Priced breakdown of a prospective stay.
#[derive(Clone, Debug, Serialize)]
pub struct Quote {
    /// Price of a single room unit per one night.
    pub price_per_night: Money,

    /// Number of nights charged.
    pub nights: u32,

    /// Price of all the nights and units before the discount.
    pub subtotal: Money,

    /// Discount applied to the [`subtotal`].
    ///
    /// [`subtotal`]: Quote::subtotal
    pub discount: Percent,

    /// Discounted part of the [`subtotal`].
    ///
    /// [`subtotal`]: Quote::subtotal
    pub discount_amount: Money,

    /// Total price to be paid.
    pub total: Money,
}

impl From<pricing::Quote> for Quote {
    fn from(quote: pricing::Quote) -> Self {
        let pricing::Quote {
            price_per_night,
            nights,
            subtotal,
            discount,
            discount_amount,
            total,
        } = quote;
        Self {
            price_per_night,
            nights,
            subtotal,
            discount,
            discount_amount,
            total,
        }
    }
}

/// Prices a prospective stay in a room, without reserving anything.
///
/// # Errors
///
/// Errors if the requested stay is not bookable in the room.
pub async fn quote(
    ctx: Context,
    Query(params): Query<Params>,
) -> Result<Json<Quote>, Error> {
    let Params {
        room_id,
        check_in,
        check_out,
        guests,
        units,
    } = params;

    ctx.service()
        .execute(query::QuoteStay {
            room_id,
            check_in,
            check_out,
            guests,
            units,
        })
        .await
        .map(|quote| Json(quote.into()))
        .map_err(AsError::into_error)
}

impl AsError for query::quote::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "INVALID_STAY"]
                #[status = BAD_REQUEST]
                #[message = "Requested stay is not bookable"]
                InvalidStay,

                #[code = "ROOM_NOT_EXISTS"]
                #[status = NOT_FOUND]
                #[message = "Room with the provided ID does not exist"]
                RoomNotExists,

                #[code = "TOO_MANY_GUESTS"]
                #[status = BAD_REQUEST]
                #[message = "Room cannot accommodate the requested guests"]
                TooManyGuests,
            }
        }

        match self {
            Self::Db(e) => e.try_as_error(),
            Self::InvalidStay(_) => Some(Error::InvalidStay.into()),
            Self::RoomNotExists(_) => Some(Error::RoomNotExists.into()),
            Self::TooManyGuests { .. } => Some(Error::TooManyGuests.into()),
        }
    }
}
