//! [Razorpay] gateway integration.
//!
//! [Razorpay]: https://razorpay.com

use std::{collections::BTreeMap, time::Duration};

use serde::{Deserialize, Serialize};

use crate::domain::booking::{self, Booking};

use super::{Callback, CreateError, PaymentRequest, VerifyError};

/// Configuration of a [`Razorpay`] gateway.
#[derive(Clone, Debug)]
pub struct Config {
    /// API key ID issued by [Razorpay].
    ///
    /// [Razorpay]: https://razorpay.com
    pub key_id: String,

    /// API key secret issued by [Razorpay].
    ///
    /// [Razorpay]: https://razorpay.com
    pub key_secret: String,

    /// Base URL of the [Razorpay] API.
    ///
    /// [Razorpay]: https://razorpay.com
    pub api_url: String,

    /// Timeout of a single [Razorpay] API request.
    ///
    /// [Razorpay]: https://razorpay.com
    pub timeout: Duration,
}

/// Gateway creating [Razorpay] orders for the customer to pay out-of-band,
/// and verifying client-echoed payments against the [Razorpay] API.
///
/// [Razorpay]: https://razorpay.com
#[derive(Clone, Debug)]
pub struct Razorpay {
    /// Configuration of this gateway.
    config: Config,

    /// HTTP client to call the [Razorpay] API with.
    ///
    /// [Razorpay]: https://razorpay.com
    http: reqwest::Client,
}

impl Razorpay {
    /// Payment status [Razorpay] reports once the money is captured.
    ///
    /// [Razorpay]: https://razorpay.com
    const CAPTURED: &'static str = "captured";

    /// Creates a new [`Razorpay`] gateway out of the provided [`Config`].
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Creates a [Razorpay] order for the provided [`Booking`], returning it
    /// as a [`PaymentRequest::Order`].
    ///
    /// The [`Booking`] ID travels in the order notes, so its payments can be
    /// matched back without trusting any client-supplied field.
    ///
    /// # Errors
    ///
    /// If the [Razorpay] API cannot be reached or refuses the order.
    ///
    /// [Razorpay]: https://razorpay.com
    pub async fn create(
        &self,
        booking: &Booking,
    ) -> Result<PaymentRequest, CreateError> {
        let body = OrderRequest {
            amount: booking
                .quote
                .total
                .to_minor_units()
                .ok_or(CreateError::Amount)?,
            currency: booking.quote.total.currency.to_string(),
            receipt: booking.code.to_string(),
            notes: Notes {
                booking_id: Some(booking.id.to_string()),
            },
        };

        let resp = self
            .http
            .post(format!("{}/v1/orders", self.config.api_url))
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .timeout(self.config.timeout)
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(CreateError::Rejected {
                status: resp.status().as_u16(),
            });
        }
        let order: Order = resp.json().await?;

        Ok(PaymentRequest::Order {
            order_id: order.id,
            approval_url: None,
        })
    }

    /// Verifies the client-echoed payment ID against the [Razorpay] API and
    /// decodes the result into a [`Callback`].
    ///
    /// # Errors
    ///
    /// If the payment ID is missing, the [Razorpay] API cannot be consulted,
    /// or the reported payment doesn't reference a [`Booking`].
    ///
    /// [Razorpay]: https://razorpay.com
    pub async fn verify(
        &self,
        params: &BTreeMap<String, String>,
    ) -> Result<Callback, VerifyError> {
        let payment_id = params
            .get("razorpay_payment_id")
            .ok_or(VerifyError::Field("razorpay_payment_id"))?;

        let resp = self
            .http
            .get(format!(
                "{}/v1/payments/{payment_id}",
                self.config.api_url,
            ))
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .timeout(self.config.timeout)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(VerifyError::Rejected {
                status: resp.status().as_u16(),
            });
        }
        let payment: Payment = resp.json().await?;

        let booking_id = payment
            .notes
            .booking_id
            .as_deref()
            .and_then(|id| id.parse().ok())
            .ok_or(VerifyError::Field("notes.booking_id"))?;

        Ok(Callback {
            booking_id,
            provider_txn_id: booking::ProviderTxnId::new(payment.id),
            succeeded: payment.status == Self::CAPTURED,
            response_code: payment.status,
        })
    }
}

/// Body of a [Razorpay] order-creation request.
///
/// [Razorpay]: https://razorpay.com
#[derive(Debug, Serialize)]
struct OrderRequest {
    /// Amount in the minor units of the currency.
    amount: i64,

    /// ISO 4217 currency code.
    currency: String,

    /// Merchant-side receipt reference.
    receipt: String,

    /// Merchant-defined [`Notes`].
    notes: Notes,
}

/// Merchant-defined notes attached to a [Razorpay] order and inherited by
/// its payments.
///
/// [Razorpay]: https://razorpay.com
#[derive(Debug, Default, Deserialize, Serialize)]
struct Notes {
    /// ID of the [`Booking`] the order was created for.
    #[serde(default)]
    booking_id: Option<String>,
}

/// Relevant part of a [Razorpay] order object.
///
/// [Razorpay]: https://razorpay.com
#[derive(Debug, Deserialize)]
struct Order {
    /// ID of the order.
    id: String,
}

/// Relevant part of a [Razorpay] payment object.
///
/// [Razorpay]: https://razorpay.com
#[derive(Debug, Deserialize)]
struct Payment {
    /// ID of the payment.
    id: String,

    /// Status of the payment.
    status: String,

    /// [`Notes`] inherited from the order.
    #[serde(default)]
    notes: Notes,
}

#[cfg(test)]
mod spec {
    use std::{collections::BTreeMap, time::Duration};

    use crate::gateway::VerifyError;

    use super::{Config, Razorpay};

    #[tokio::test]
    async fn verify_requires_payment_id() {
        let gateway = Razorpay::new(Config {
            key_id: "rzp_test_key".to_owned(),
            key_secret: "rzp_test_secret".to_owned(),
            api_url: "https://api.razorpay.com".to_owned(),
            timeout: Duration::from_secs(10),
        });

        assert!(matches!(
            gateway.verify(&BTreeMap::new()).await,
            Err(VerifyError::Field("razorpay_payment_id")),
        ));
    }
}
