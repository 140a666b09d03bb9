//! [Stripe Checkout] gateway integration.
//!
//! [Stripe Checkout]: https://stripe.com/payments/checkout

use std::{collections::BTreeMap, time::Duration};

use serde::Deserialize;

use crate::domain::booking::{self, Booking};

use super::{Callback, CreateError, PaymentRequest, VerifyError};

/// Configuration of a [`Stripe`] gateway.
#[derive(Clone, Debug)]
pub struct Config {
    /// Secret API key issued by [Stripe].
    ///
    /// [Stripe]: https://stripe.com
    pub secret_key: String,

    /// Base URL of the [Stripe] API.
    ///
    /// [Stripe]: https://stripe.com
    pub api_url: String,

    /// URL of the storefront the customer lands on after paying.
    pub success_url: String,

    /// URL of the storefront the customer lands on after aborting.
    pub cancel_url: String,

    /// Timeout of a single [Stripe] API request.
    ///
    /// [Stripe]: https://stripe.com
    pub timeout: Duration,
}

/// Gateway creating [Stripe Checkout] sessions for the customer to complete
/// out-of-band, and verifying client-echoed sessions against the [Stripe]
/// API.
///
/// [Stripe]: https://stripe.com
/// [Stripe Checkout]: https://stripe.com/payments/checkout
#[derive(Clone, Debug)]
pub struct Stripe {
    /// Configuration of this gateway.
    config: Config,

    /// HTTP client to call the [Stripe] API with.
    ///
    /// [Stripe]: https://stripe.com
    http: reqwest::Client,
}

impl Stripe {
    /// Payment status [Stripe] reports once the session is paid for.
    ///
    /// [Stripe]: https://stripe.com
    const PAID: &'static str = "paid";

    /// Creates a new [`Stripe`] gateway out of the provided [`Config`].
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Creates a [Stripe Checkout] session for the provided [`Booking`],
    /// returning it as a [`PaymentRequest::Order`].
    ///
    /// The [`Booking`] ID travels as the session's `client_reference_id`, so
    /// the session can be matched back without trusting any client-supplied
    /// field.
    ///
    /// # Errors
    ///
    /// If the [Stripe] API cannot be reached or refuses the session.
    ///
    /// [Stripe]: https://stripe.com
    /// [Stripe Checkout]: https://stripe.com/payments/checkout
    pub async fn create(
        &self,
        booking: &Booking,
    ) -> Result<PaymentRequest, CreateError> {
        let amount = booking
            .quote
            .total
            .to_minor_units()
            .ok_or(CreateError::Amount)?;
        let form = [
            ("mode", "payment".to_owned()),
            ("client_reference_id", booking.id.to_string()),
            ("success_url", self.config.success_url.clone()),
            ("cancel_url", self.config.cancel_url.clone()),
            ("line_items[0][quantity]", "1".to_owned()),
            (
                "line_items[0][price_data][currency]",
                booking.quote.total.currency.to_string().to_lowercase(),
            ),
            (
                "line_items[0][price_data][unit_amount]",
                amount.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]",
                format!("Booking {}", booking.code),
            ),
        ];

        let resp = self
            .http
            .post(format!("{}/v1/checkout/sessions", self.config.api_url))
            .bearer_auth(&self.config.secret_key)
            .timeout(self.config.timeout)
            .form(&form)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(CreateError::Rejected {
                status: resp.status().as_u16(),
            });
        }
        let session: Session = resp.json().await?;

        Ok(PaymentRequest::Order {
            order_id: session.id,
            approval_url: session.url,
        })
    }

    /// Verifies the client-echoed session ID against the [Stripe] API and
    /// decodes the result into a [`Callback`].
    ///
    /// # Errors
    ///
    /// If the session ID is missing, the [Stripe] API cannot be consulted,
    /// or the reported session doesn't reference a [`Booking`].
    ///
    /// [Stripe]: https://stripe.com
    pub async fn verify(
        &self,
        params: &BTreeMap<String, String>,
    ) -> Result<Callback, VerifyError> {
        let session_id = params
            .get("session_id")
            .ok_or(VerifyError::Field("session_id"))?;

        let resp = self
            .http
            .get(format!(
                "{}/v1/checkout/sessions/{session_id}",
                self.config.api_url,
            ))
            .bearer_auth(&self.config.secret_key)
            .timeout(self.config.timeout)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(VerifyError::Rejected {
                status: resp.status().as_u16(),
            });
        }
        let session: Session = resp.json().await?;

        let booking_id = session
            .client_reference_id
            .as_deref()
            .and_then(|id| id.parse().ok())
            .ok_or(VerifyError::Field("client_reference_id"))?;
        let txn_id = session
            .payment_intent
            .clone()
            .unwrap_or_else(|| session.id.clone());

        Ok(Callback {
            booking_id,
            provider_txn_id: booking::ProviderTxnId::new(txn_id),
            succeeded: session.payment_status == Self::PAID,
            response_code: session.payment_status,
        })
    }
}

/// Relevant part of a [Stripe Checkout] session object.
///
/// [Stripe Checkout]: https://stripe.com/payments/checkout
#[derive(Debug, Deserialize)]
struct Session {
    /// ID of the session.
    id: String,

    /// URL of the hosted payment page, while the session is open.
    #[serde(default)]
    url: Option<String>,

    /// Payment status of the session.
    #[serde(default)]
    payment_status: String,

    /// ID of the underlying payment intent, once one exists.
    #[serde(default)]
    payment_intent: Option<String>,

    /// Merchant-supplied reference, carrying the [`Booking`] ID.
    #[serde(default)]
    client_reference_id: Option<String>,
}

#[cfg(test)]
mod spec {
    use std::{collections::BTreeMap, time::Duration};

    use crate::gateway::VerifyError;

    use super::{Config, Stripe};

    #[tokio::test]
    async fn verify_requires_session_id() {
        let gateway = Stripe::new(Config {
            secret_key: "sk_test_key".to_owned(),
            api_url: "https://api.stripe.com".to_owned(),
            success_url: "https://hotel.test/payments/stripe/success"
                .to_owned(),
            cancel_url: "https://hotel.test/payments/stripe/cancel".to_owned(),
            timeout: Duration::from_secs(10),
        });

        assert!(matches!(
            gateway.verify(&BTreeMap::new()).await,
            Err(VerifyError::Field("session_id")),
        ));
    }
}
