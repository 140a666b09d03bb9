//! Booking endpoints.

use axum::{
    extract::{Path, Query},
    Json,
};
use axum_client_ip::InsecureClientIp;
use common::{Date, Money};
use serde::{Deserialize, Serialize};
use service::{
    command::{self, Command as _},
    domain::{booking, room, stay},
    query::{self, Query as _},
    read,
};

use crate::{define_error, AsError, Context, Error};

use super::{payment, quote::Quote};

/// Default number of bookings in a listed page.
const DEFAULT_PAGE_SIZE: i32 = 10;

/// Maximum number of bookings in a listed page.
const MAX_PAGE_SIZE: i32 = 100;

/// Creates a new booking and initiates its payment.
///
/// # Errors
///
/// Possible error codes:
/// - `AUTHORIZATION_REQUIRED` - the request is not authorized;
/// - `GATEWAY_UNKNOWN` - the `payment_method` names no known provider;
/// - `GATEWAY_NOT_CONFIGURED` - the provider is known, but not configured;
/// - `INVALID_BILLING_CONTACT` - some billing field is malformed;
/// - `INVALID_STAY` - the requested stay is not bookable;
/// - `ROOM_NOT_EXISTS` - the room with the provided ID does not exist;
/// - `TOO_MANY_GUESTS` - the room cannot accommodate the requested guests;
/// - `NO_VACANCY` - the room is sold out on some requested night.
pub async fn create(
    ctx: Context,
    InsecureClientIp(client_ip): InsecureClientIp,
    Json(req): Json<CreateRequest>,
) -> Result<(http::StatusCode, Json<Created>), Error> {
    let session = ctx.current_session().await?;

    let CreateRequest {
        room_id,
        check_in,
        check_out,
        guests,
        units,
        payment_method,
        billing,
    } = req;
    let gateway = payment::parse_kind(&payment_method)?;
    let billing = billing.try_into_contact()?;

    let created = ctx
        .service()
        .execute(command::CreateBooking {
            room_id,
            user_id: session.user_id,
            check_in,
            check_out,
            guests,
            units,
            gateway,
            billing,
            client_ip,
        })
        .await
        .map_err(AsError::into_error)?;

    let command::CreatedBooking { booking, payment } = created;
    Ok((
        http::StatusCode::CREATED,
        Json(Created {
            booking: booking.into(),
            payment: payment.into(),
        }),
    ))
}

/// Returns the booking with the provided ID.
///
/// # Errors
///
/// Possible error codes:
/// - `AUTHORIZATION_REQUIRED` - the request is not authorized;
/// - `BOOKING_NOT_EXISTS` - no booking with the provided ID is owned by the
///                          authenticated guest.
pub async fn get(
    ctx: Context,
    Path(id): Path<booking::Id>,
) -> Result<Json<Booking>, Error> {
    let session = ctx.current_session().await?;

    ctx.service()
        .execute(query::booking::ById::by(id))
        .await
        .map_err(AsError::into_error)?
        // A foreign `Booking` is reported as missing, not as forbidden.
        .filter(|b| b.user_id == session.user_id)
        .map(|b| Json(b.into()))
        .ok_or_else(|| BookingError::NotExists.into())
}

/// Lists bookings of the authenticated guest, newest first.
///
/// # Errors
///
/// Possible error codes:
/// - `AUTHORIZATION_REQUIRED` - the request is not authorized;
/// - `INVALID_PAGINATION_ARGUMENTS` - the pagination arguments are invalid.
pub async fn list(
    ctx: Context,
    Query(params): Query<ListParams>,
) -> Result<Json<Page>, Error> {
    let session = ctx.current_session().await?;

    let ListParams { first, after } = params;
    let arguments = read::booking::list::Arguments::new(
        first,
        after,
        DEFAULT_PAGE_SIZE,
        MAX_PAGE_SIZE,
    )
    .ok_or(super::PaginationError::Invalid)?;
    let filter = read::booking::list::Filter {
        user_id: Some(session.user_id),
    };

    let page = ctx
        .service()
        .execute(query::bookings::List::by(read::booking::list::Selector {
            arguments,
            filter,
        }))
        .await
        .map_err(AsError::into_error)?;
    let total_count = ctx
        .service()
        .execute(query::bookings::TotalCount::by(filter))
        .await
        .map_err(AsError::into_error)?;

    let page_info = page.page_info();
    Ok(Json(Page {
        bookings: page.edges.into_iter().map(|e| e.node.into()).collect(),
        end_cursor: page_info.end_cursor,
        has_next_page: page_info.has_next_page,
        total_count: total_count.into(),
    }))
}

/// Cancels the booking with the provided ID.
///
/// # Errors
///
/// Possible error codes:
/// - `AUTHORIZATION_REQUIRED` - the request is not authorized;
/// - `BOOKING_NOT_EXISTS` - no booking with the provided ID is owned by the
///                          authenticated guest;
/// - `STATE_CONFLICT` - the booking is not awaiting its payment anymore.
pub async fn cancel(
    ctx: Context,
    Path(id): Path<booking::Id>,
) -> Result<Json<Booking>, Error> {
    let session = ctx.current_session().await?;

    ctx.service()
        .execute(command::CancelBooking {
            booking_id: id,
            user_id: Some(session.user_id),
        })
        .await
        .map(|b| Json(b.into()))
        .map_err(AsError::into_error)
}

/// Request body of the [`create()`] endpoint.
#[derive(Clone, Debug, Deserialize)]
pub struct CreateRequest {
    /// ID of the room to book.
    pub room_id: room::Id,

    /// Arrival date.
    pub check_in: Date,

    /// Departure date.
    pub check_out: Date,

    /// Number of guests staying.
    pub guests: stay::Guests,

    /// Number of room units to book.
    pub units: room::Units,

    /// Payment provider to pay through, e.g. `vnpay`.
    pub payment_method: String,

    /// Billing contact of the guest.
    pub billing: Billing,
}

/// Billing contact as submitted by the storefront.
#[derive(Clone, Debug, Deserialize)]
pub struct Billing {
    /// Name of the person to invoice.
    pub name: String,

    /// Email address to send the invoice to.
    pub email: String,

    /// Phone number of the person to invoice.
    pub phone: String,

    /// Street address of the person to invoice.
    pub address: String,

    /// State of the billing address.
    pub state: Option<String>,

    /// ZIP code of the billing address.
    pub zip_code: Option<String>,

    /// Country of the billing address.
    pub country: String,
}

impl Billing {
    /// Validates this [`Billing`] into a domain billing contact.
    fn try_into_contact(self) -> Result<booking::billing::Contact, Error> {
        let Self {
            name,
            email,
            phone,
            address,
            state,
            zip_code,
            country,
        } = self;
        Ok(booking::billing::Contact {
            name: name.parse().map_err(invalid_billing)?,
            email: email.parse().map_err(invalid_billing)?,
            phone: phone.parse().map_err(invalid_billing)?,
            address: address.parse().map_err(invalid_billing)?,
            state: state
                .map(|s| s.parse())
                .transpose()
                .map_err(invalid_billing)?,
            zip_code: zip_code
                .map(|z| z.parse())
                .transpose()
                .map_err(invalid_billing)?,
            country: country.parse().map_err(invalid_billing)?,
        })
    }
}

/// Builds an [`Error`] out of a billing contact validation failure.
fn invalid_billing(reason: &'static str) -> Error {
    Error {
        code: "INVALID_BILLING_CONTACT",
        status_code: http::StatusCode::BAD_REQUEST,
        message: format!("Invalid billing contact: {reason}"),
        backtrace: None,
    }
}

/// Response body of the [`create()`] endpoint.
#[derive(Clone, Debug, Serialize)]
pub struct Created {
    /// Created [`Booking`].
    pub booking: Booking,

    /// Payment the guest must complete to confirm the [`Booking`].
    pub payment: payment::Payment,
}

/// Booking representation.
#[derive(Clone, Debug, Serialize)]
pub struct Booking {
    /// ID of this [`Booking`].
    pub id: booking::Id,

    /// Human-readable confirmation code of this [`Booking`].
    pub code: String,

    /// ID of the booked room.
    pub room_id: room::Id,

    /// Arrival date.
    pub check_in: Date,

    /// Departure date.
    pub check_out: Date,

    /// Number of guests staying.
    pub guests: stay::Guests,

    /// Number of room units booked.
    pub units: room::Units,

    /// Pricing breakdown frozen at the time this [`Booking`] was created.
    pub quote: Quote,

    /// Payment provider this [`Booking`] is paid through.
    pub payment_method: String,

    /// ID of the payment transaction on the provider side, if confirmed.
    pub provider_txn_id: Option<String>,

    /// Payment status of this [`Booking`].
    pub status: String,

    /// RFC 3339 timestamp of when this [`Booking`] was created.
    pub created_at: String,
}

impl From<booking::Booking> for Booking {
    fn from(booking: booking::Booking) -> Self {
        let booking::Booking {
            id,
            code,
            room_id,
            user_id: _,
            check_in,
            check_out,
            guests,
            units,
            quote,
            gateway,
            provider_txn_id,
            status,
            billing: _,
            created_at,
        } = booking;
        Self {
            id,
            code: code.to_string(),
            room_id,
            check_in,
            check_out,
            guests,
            units,
            quote: quote.into(),
            payment_method: gateway.to_string(),
            provider_txn_id: provider_txn_id.map(|id| id.to_string()),
            status: status.to_string(),
            created_at: created_at.to_rfc3339(),
        }
    }
}

/// Compact [`Booking`] representation in a listed [`Page`].
#[derive(Clone, Debug, Serialize)]
pub struct Summary {
    /// ID of the [`Booking`].
    pub id: booking::Id,

    /// Human-readable confirmation code of the [`Booking`].
    pub code: String,

    /// ID of the booked room.
    pub room_id: room::Id,

    /// Arrival date.
    pub check_in: Date,

    /// Departure date.
    pub check_out: Date,

    /// Payment status of the [`Booking`].
    pub status: String,

    /// Total amount payable for the [`Booking`].
    pub total: Money,

    /// RFC 3339 timestamp of when the [`Booking`] was created.
    pub created_at: String,
}

impl From<read::booking::Summary> for Summary {
    fn from(summary: read::booking::Summary) -> Self {
        let read::booking::Summary {
            id,
            code,
            room_id,
            check_in,
            check_out,
            status,
            total,
            created_at,
        } = summary;
        Self {
            id,
            code: code.to_string(),
            room_id,
            check_in,
            check_out,
            status: status.to_string(),
            total,
            created_at: created_at.to_rfc3339(),
        }
    }
}

/// Parameters of the [`list()`] endpoint.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct ListParams {
    /// Number of [`Booking`]s to return.
    pub first: Option<i32>,

    /// Cursor after which the [`Booking`]s should be returned.
    pub after: Option<booking::Id>,
}

/// Page of listed [`Booking`]s.
#[derive(Clone, Debug, Serialize)]
pub struct Page {
    /// [`Summary`]s of the listed [`Booking`]s.
    pub bookings: Vec<Summary>,

    /// Cursor of the last [`Booking`] on this [`Page`].
    pub end_cursor: Option<booking::Id>,

    /// Indicator whether a next [`Page`] exists.
    pub has_next_page: bool,

    /// Total count of [`Booking`]s matching the listing.
    pub total_count: i32,
}

impl AsError for command::create_booking::ExecutionError {
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

                #[code = "NO_VACANCY"]
                #[status = CONFLICT]
                #[message = "Room has no vacant units on some requested \
                             night"]
                NoVacancy,

                #[code = "GATEWAY_NOT_CONFIGURED"]
                #[status = BAD_REQUEST]
                #[message = "Requested payment provider is not configured"]
                GatewayNotConfigured,
            }
        }

        match self {
            Self::Db(e) => e.try_as_error(),
            Self::Gateway(e) => e.try_as_error(),
            Self::InvalidStay(_) => Some(Error::InvalidStay.into()),
            Self::RoomNotExists(_) => Some(Error::RoomNotExists.into()),
            Self::TooManyGuests { .. } => Some(Error::TooManyGuests.into()),
            Self::NoVacancy { .. } => Some(Error::NoVacancy.into()),
            Self::GatewayNotConfigured(_) => {
                Some(Error::GatewayNotConfigured.into())
            }
        }
    }
}

impl AsError for command::cancel_booking::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "STATE_CONFLICT"]
                #[status = CONFLICT]
                #[message = "`Booking` is not awaiting its payment anymore"]
                StateConflict,
            }
        }

        match self {
            Self::Db(e) => e.try_as_error(),
            // A foreign `Booking` is reported as missing, not as forbidden.
            Self::BookingNotExists(_) | Self::NotOwner { .. } => {
                Some(BookingError::NotExists.into())
            }
            Self::StatusConflict { .. } => Some(Error::StateConflict.into()),
        }
    }
}

define_error! {
    enum BookingError {
        #[code = "BOOKING_NOT_EXISTS"]
        #[status = NOT_FOUND]
        #[message = "`Booking` with the provided ID does not exist"]
        NotExists,
    }
}
