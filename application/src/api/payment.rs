//! Payment provider callback endpoints.

use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query},
    Json,
};
use serde::Serialize;
use service::{
    command::{self, Command as _},
    gateway,
};
use tracing as log;

use crate::{define_error, AsError, Context, Error};

use super::booking::Booking;

/// Settles a booking out of a provider redirecting the guest back, with the
/// payment outcome in the query string.
///
/// # Errors
///
/// Possible error codes:
/// - `GATEWAY_UNKNOWN` - the path names no known provider;
/// - `GATEWAY_NOT_CONFIGURED` - the provider is known, but not configured;
/// - `MALFORMED_CALLBACK` - the callback misses required provider fields;
/// - `SIGNATURE_INVALID` - the callback signature is invalid;
/// - `VERIFICATION_REJECTED` - the provider refused to verify the payment;
/// - `PROVIDER_UNAVAILABLE` - the provider could not be reached in time;
/// - `BOOKING_NOT_EXISTS` - the referenced booking does not exist;
/// - `STATE_CONFLICT` - the referenced booking is already settled.
pub async fn callback(
    ctx: Context,
    Path(provider): Path<String>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Result<Json<Booking>, Error> {
    settle(&ctx, &provider, params).await
}

/// Settles a booking out of a storefront echoing the provider's checkout
/// outcome in the request body.
///
/// # Errors
///
/// Same error codes as of the [`callback()`] endpoint.
pub async fn verify(
    ctx: Context,
    Path(provider): Path<String>,
    Json(params): Json<BTreeMap<String, String>>,
) -> Result<Json<Booking>, Error> {
    settle(&ctx, &provider, params).await
}

/// Verifies the provided callback `params` against the `provider` and settles
/// the referenced booking accordingly.
async fn settle(
    ctx: &Context,
    provider: &str,
    params: BTreeMap<String, String>,
) -> Result<Json<Booking>, Error> {
    let gateway = parse_kind(provider)?;

    ctx.service()
        .execute(command::SettleBooking { gateway, params })
        .await
        .map(|b| Json(b.into()))
        .map_err(|e| {
            use command::settle_booking::ExecutionError as E;

            match e.as_ref() {
                E::Gateway(_) => {
                    log::warn!("rejected `{gateway}` callback: {e}");
                }
                E::StatusConflict { .. } => {
                    log::warn!("conflicting `{gateway}` callback: {e}");
                }
                E::Db(_)
                | E::GatewayNotConfigured(_)
                | E::BookingNotExists(_)
                | E::TxnIdMissing(_) => {}
            }
            e.into_error()
        })
}

/// Parses the provided payment `provider` name.
///
/// # Errors
///
/// Errors if the name matches no known provider.
pub(crate) fn parse_kind(provider: &str) -> Result<gateway::Kind, Error> {
    provider
        .to_uppercase()
        .parse()
        .map_err(|_| GatewayError::Unknown.into())
}

/// Payment to be completed by a guest to confirm a booking.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Payment {
    /// Guest must be redirected to the provider's payment page.
    Redirect {
        /// Full URL of the payment page.
        url: String,
    },

    /// Order created on the provider side, to be completed by the storefront.
    Order {
        /// Opaque ID of the order on the provider side.
        order_id: String,

        /// URL of the provider's approval page, if the provider exposes one.
        approval_url: Option<String>,
    },
}

impl From<gateway::PaymentRequest> for Payment {
    fn from(request: gateway::PaymentRequest) -> Self {
        match request {
            gateway::PaymentRequest::Redirect { url } => Self::Redirect { url },
            gateway::PaymentRequest::Order {
                order_id,
                approval_url,
            } => Self::Order {
                order_id,
                approval_url,
            },
        }
    }
}

impl AsError for command::settle_booking::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "GATEWAY_NOT_CONFIGURED"]
                #[status = BAD_REQUEST]
                #[message = "Requested payment provider is not configured"]
                GatewayNotConfigured,

                #[code = "BOOKING_NOT_EXISTS"]
                #[status = NOT_FOUND]
                #[message = "`Booking` referenced by the callback does not \
                             exist"]
                BookingNotExists,

                #[code = "MALFORMED_CALLBACK"]
                #[status = BAD_REQUEST]
                #[message = "Callback misses required provider fields"]
                TxnIdMissing,

                #[code = "STATE_CONFLICT"]
                #[status = CONFLICT]
                #[message = "Reported outcome contradicts the `Booking` \
                             status"]
                StateConflict,
            }
        }

        match self {
            Self::Db(e) => e.try_as_error(),
            Self::Gateway(e) => e.try_as_error(),
            Self::GatewayNotConfigured(_) => {
                Some(Error::GatewayNotConfigured.into())
            }
            Self::BookingNotExists(_) => Some(Error::BookingNotExists.into()),
            Self::TxnIdMissing(_) => Some(Error::TxnIdMissing.into()),
            Self::StatusConflict { .. } => Some(Error::StateConflict.into()),
        }
    }
}

impl AsError for gateway::VerifyError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "MALFORMED_CALLBACK"]
                #[status = BAD_REQUEST]
                #[message = "Callback misses required provider fields"]
                Malformed,

                #[code = "SIGNATURE_INVALID"]
                #[status = UNAUTHORIZED]
                #[message = "Callback signature is invalid"]
                Signature,

                #[code = "VERIFICATION_REJECTED"]
                #[status = UNAUTHORIZED]
                #[message = "Provider refused to verify the reported payment"]
                Rejected,

                #[code = "PROVIDER_UNAVAILABLE"]
                #[status = BAD_GATEWAY]
                #[message = "Payment provider is unavailable"]
                Unavailable,
            }
        }

        match self {
            Self::Field(_) => Some(Error::Malformed.into()),
            Self::Signature => Some(Error::Signature.into()),
            Self::Rejected { .. } => Some(Error::Rejected.into()),
            Self::Unavailable(_) => Some(Error::Unavailable.into()),
        }
    }
}

impl AsError for gateway::CreateError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "PAYMENT_AMOUNT_INVALID"]
                #[status = BAD_REQUEST]
                #[message = "Total amount is not representable by the \
                             provider"]
                Amount,

                #[code = "PROVIDER_UNAVAILABLE"]
                #[status = BAD_GATEWAY]
                #[message = "Payment provider is unavailable"]
                Unavailable,
            }
        }

        match self {
            Self::Amount => Some(Error::Amount.into()),
            Self::Rejected { .. } | Self::Unavailable(_) => {
                Some(Error::Unavailable.into())
            }
        }
    }
}

define_error! {
    enum GatewayError {
        #[code = "GATEWAY_UNKNOWN"]
        #[status = NOT_FOUND]
        #[message = "Requested payment provider is not supported"]
        Unknown,
    }
}
