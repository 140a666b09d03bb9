//! Payment provider integrations.

pub mod paypal;
pub mod razorpay;
pub mod sign;
pub mod stripe;
pub mod vnpay;

use std::{collections::BTreeMap, net::IpAddr};

use common::define_kind;
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::domain::booking;

#[cfg(doc)]
use crate::domain::Booking;

pub use self::{
    paypal::Paypal, razorpay::Razorpay, stripe::Stripe, vnpay::Vnpay,
};

define_kind! {
    #[doc = "Kind of a payment [`Gateway`]."]
    enum Kind {
        #[doc = "[VNPay] signed-redirect gateway.\n\n\
                 [VNPay]: https://vnpay.vn"]
        Vnpay = 1,

        #[doc = "[Razorpay] order gateway.\n\n\
                 [Razorpay]: https://razorpay.com"]
        Razorpay = 2,

        #[doc = "[Stripe Checkout] session gateway.\n\n\
                 [Stripe Checkout]: https://stripe.com/payments/checkout"]
        Stripe = 3,

        #[doc = "[PayPal] order gateway.\n\n\
                 [PayPal]: https://paypal.com"]
        Paypal = 4,
    }
}

/// Payment gateway of a concrete provider.
#[derive(Clone, Debug, From)]
pub enum Gateway {
    /// [VNPay] gateway.
    ///
    /// [VNPay]: https://vnpay.vn
    Vnpay(Vnpay),

    /// [Razorpay] gateway.
    ///
    /// [Razorpay]: https://razorpay.com
    Razorpay(Razorpay),

    /// [Stripe Checkout] gateway.
    ///
    /// [Stripe Checkout]: https://stripe.com/payments/checkout
    Stripe(Stripe),

    /// [PayPal] gateway.
    ///
    /// [PayPal]: https://paypal.com
    Paypal(Paypal),
}

impl Gateway {
    /// Returns the [`Kind`] of this [`Gateway`].
    #[must_use]
    pub const fn kind(&self) -> Kind {
        match self {
            Self::Vnpay(_) => Kind::Vnpay,
            Self::Razorpay(_) => Kind::Razorpay,
            Self::Stripe(_) => Kind::Stripe,
            Self::Paypal(_) => Kind::Paypal,
        }
    }

    /// Creates a [`PaymentRequest`] for the provided [`Booking`] on the
    /// provider side.
    ///
    /// # Errors
    ///
    /// If the provider cannot be reached or refuses the request.
    pub async fn create(
        &self,
        booking: &booking::Booking,
        client_ip: IpAddr,
    ) -> Result<PaymentRequest, Traced<CreateError>> {
        match self {
            Self::Vnpay(g) => {
                g.create(booking, client_ip).map_err(tracerr::wrap!())
            }
            Self::Razorpay(g) => {
                g.create(booking).await.map_err(tracerr::wrap!())
            }
            Self::Stripe(g) => {
                g.create(booking).await.map_err(tracerr::wrap!())
            }
            Self::Paypal(g) => {
                g.create(booking).await.map_err(tracerr::wrap!())
            }
        }
    }

    /// Verifies the provided callback `params` as genuinely coming from the
    /// provider, decoding them into a [`Callback`].
    ///
    /// # Errors
    ///
    /// If the `params` fail authentication, miss required fields, or the
    /// provider cannot be consulted.
    pub async fn verify(
        &self,
        params: &BTreeMap<String, String>,
    ) -> Result<Callback, Traced<VerifyError>> {
        match self {
            Self::Vnpay(g) => g.verify(params).map_err(tracerr::wrap!()),
            Self::Razorpay(g) => {
                g.verify(params).await.map_err(tracerr::wrap!())
            }
            Self::Stripe(g) => g.verify(params).await.map_err(tracerr::wrap!()),
            Self::Paypal(g) => g.verify(params).await.map_err(tracerr::wrap!()),
        }
    }
}

/// Registry of the configured payment [`Gateway`]s.
#[derive(Clone, Debug, Default)]
pub struct Gateways(Vec<Gateway>);

impl Gateways {
    /// Creates a new [`Gateways`] registry of the provided [`Gateway`]s.
    #[must_use]
    pub fn new(gateways: impl IntoIterator<Item = Gateway>) -> Self {
        Self(gateways.into_iter().collect())
    }

    /// Returns the [`Gateway`] of the provided [`Kind`], if configured.
    #[must_use]
    pub fn get(&self, kind: Kind) -> Option<&Gateway> {
        self.0.iter().find(|g| g.kind() == kind)
    }
}

/// Payment request created on a provider side for a [`Booking`].
#[derive(Clone, Debug)]
pub enum PaymentRequest {
    /// Payment page of the provider to redirect the customer to.
    Redirect {
        /// Full URL of the payment page, including the signed query string.
        url: String,
    },

    /// Provider-side order for the customer to complete out-of-band.
    Order {
        /// Opaque ID of the order on the provider side.
        order_id: String,

        /// URL of the provider's approval page, if the provider exposes one.
        approval_url: Option<String>,
    },
}

/// Authenticated and decoded provider callback.
///
/// Fields are extracted from provider-authenticated data only, never from
/// anything a client could forge unchecked.
#[derive(Clone, Debug)]
pub struct Callback {
    /// ID of the [`Booking`] this callback refers to.
    pub booking_id: booking::Id,

    /// ID of the payment transaction on the provider side, if reported.
    pub provider_txn_id: Option<booking::ProviderTxnId>,

    /// Whether the provider reports the payment as completed.
    pub succeeded: bool,

    /// Raw provider-specific response code or status.
    pub response_code: String,
}

/// Error of creating a [`PaymentRequest`].
#[derive(Debug, Display, Error, From)]
pub enum CreateError {
    /// [`Booking`] total is not representable in the provider's wire format.
    #[display("payment amount is not representable by the provider")]
    Amount,

    /// Provider refused to create the payment.
    #[display("provider rejected the request with HTTP status `{status}`")]
    Rejected {
        /// HTTP status of the provider's response.
        status: u16,
    },

    /// Provider could not be reached in time.
    #[display("provider is unavailable: {_0}")]
    #[from]
    Unavailable(reqwest::Error),
}

/// Error of verifying a provider callback.
#[derive(Debug, Display, Error, From)]
pub enum VerifyError {
    /// Required callback field is missing or malformed.
    #[display("callback field `{_0}` is missing or malformed")]
    Field(#[error(not(source))] &'static str),

    /// Provider refused the verification request.
    #[display(
        "provider rejected the verification with HTTP status `{status}`"
    )]
    Rejected {
        /// HTTP status of the provider's response.
        status: u16,
    },

    /// Callback signature doesn't match the recomputed one.
    #[display("callback signature mismatch")]
    Signature,

    /// Provider could not be reached in time.
    #[display("provider is unavailable: {_0}")]
    #[from]
    Unavailable(reqwest::Error),
}
