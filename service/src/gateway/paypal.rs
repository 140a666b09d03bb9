//! [PayPal Orders] gateway integration.
//!
//! [PayPal Orders]: https://developer.paypal.com/docs/api/orders/v2

use std::{collections::BTreeMap, time::Duration};

use derive_more::{Display, Error, From};
use serde::{Deserialize, Serialize};

use crate::domain::booking::{self, Booking};

use super::{Callback, CreateError, PaymentRequest, VerifyError};

/// Configuration of a [`Paypal`] gateway.
#[derive(Clone, Debug)]
pub struct Config {
    /// Client ID of the [PayPal] REST application.
    ///
    /// [PayPal]: https://paypal.com
    pub client_id: String,

    /// Client secret of the [PayPal] REST application.
    ///
    /// [PayPal]: https://paypal.com
    pub client_secret: String,

    /// Base URL of the [PayPal] API.
    ///
    /// [PayPal]: https://paypal.com
    pub api_url: String,

    /// URL of the storefront the customer lands on after approving the
    /// order.
    pub return_url: String,

    /// URL of the storefront the customer lands on after aborting.
    pub cancel_url: String,

    /// Timeout of a single [PayPal] API request.
    ///
    /// [PayPal]: https://paypal.com
    pub timeout: Duration,
}

/// Gateway creating [PayPal Orders] for the customer to approve out-of-band,
/// and verifying client-echoed orders against the [PayPal] API.
///
/// [PayPal]: https://paypal.com
/// [PayPal Orders]: https://developer.paypal.com/docs/api/orders/v2
#[derive(Clone, Debug)]
pub struct Paypal {
    /// Configuration of this gateway.
    config: Config,

    /// HTTP client to call the [PayPal] API with.
    ///
    /// [PayPal]: https://paypal.com
    http: reqwest::Client,
}

impl Paypal {
    /// Status [PayPal] reports once the order is approved and captured.
    ///
    /// [PayPal]: https://paypal.com
    const COMPLETED: &'static str = "COMPLETED";

    /// Creates a new [`Paypal`] gateway out of the provided [`Config`].
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Creates a [PayPal] order for the provided [`Booking`], returning it as
    /// a [`PaymentRequest::Order`] along with its approval link.
    ///
    /// The [`Booking`] ID travels as the purchase unit's `reference_id`, so
    /// the order can be matched back without trusting any client-supplied
    /// field.
    ///
    /// # Errors
    ///
    /// If the [PayPal] API cannot be reached or refuses the order.
    ///
    /// [PayPal]: https://paypal.com
    pub async fn create(
        &self,
        booking: &Booking,
    ) -> Result<PaymentRequest, CreateError> {
        let token = self.access_token().await?;

        let total = booking.quote.total;
        let resp = self
            .http
            .post(format!("{}/v2/checkout/orders", self.config.api_url))
            .bearer_auth(&token)
            .timeout(self.config.timeout)
            .json(&OrderRequest {
                intent: "CAPTURE",
                purchase_units: vec![PurchaseUnitRequest {
                    reference_id: booking.id.to_string(),
                    amount: Amount {
                        currency_code: total.currency.to_string(),
                        value: total
                            .amount
                            .round_dp(total.currency.minor_units())
                            .to_string(),
                    },
                }],
                application_context: ApplicationContext {
                    return_url: self.config.return_url.clone(),
                    cancel_url: self.config.cancel_url.clone(),
                },
            })
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(CreateError::Rejected {
                status: resp.status().as_u16(),
            });
        }
        let order: Order = resp.json().await?;

        let approval_url = order
            .links
            .into_iter()
            .find(|l| l.rel == "approve")
            .map(|l| l.href);
        Ok(PaymentRequest::Order {
            order_id: order.id,
            approval_url,
        })
    }

    /// Verifies the client-echoed order ID against the [PayPal] API and
    /// decodes the result into a [`Callback`].
    ///
    /// Accepts the ID either as `order_id` or as the `token` parameter
    /// [PayPal] appends to return URLs.
    ///
    /// # Errors
    ///
    /// If the order ID is missing, the [PayPal] API cannot be consulted, or
    /// the reported order doesn't reference a [`Booking`].
    ///
    /// [PayPal]: https://paypal.com
    pub async fn verify(
        &self,
        params: &BTreeMap<String, String>,
    ) -> Result<Callback, VerifyError> {
        let order_id = params
            .get("order_id")
            .or_else(|| params.get("token"))
            .ok_or(VerifyError::Field("order_id"))?;
        let token = self.access_token().await?;

        let resp = self
            .http
            .get(format!(
                "{}/v2/checkout/orders/{order_id}",
                self.config.api_url,
            ))
            .bearer_auth(&token)
            .timeout(self.config.timeout)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(VerifyError::Rejected {
                status: resp.status().as_u16(),
            });
        }
        let order: Order = resp.json().await?;

        let booking_id = order
            .purchase_units
            .first()
            .and_then(|u| u.reference_id.as_deref())
            .and_then(|id| id.parse().ok())
            .ok_or(VerifyError::Field("purchase_units.reference_id"))?;

        Ok(Callback {
            booking_id,
            provider_txn_id: booking::ProviderTxnId::new(order.id),
            succeeded: order.status == Self::COMPLETED,
            response_code: order.status,
        })
    }

    /// Obtains a fresh OAuth access token for the [PayPal] API.
    ///
    /// [PayPal]: https://paypal.com
    async fn access_token(&self) -> Result<String, TokenError> {
        let resp = self
            .http
            .post(format!("{}/v1/oauth2/token", self.config.api_url))
            .basic_auth(
                &self.config.client_id,
                Some(&self.config.client_secret),
            )
            .timeout(self.config.timeout)
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(TokenError::Rejected {
                status: resp.status().as_u16(),
            });
        }
        let token: AccessToken = resp.json().await?;
        Ok(token.access_token)
    }
}

/// Error of obtaining a [`Paypal`] OAuth access token.
#[derive(Debug, Display, Error, From)]
enum TokenError {
    /// Token endpoint refused the credentials.
    #[display("token endpoint responded with HTTP status `{status}`")]
    Rejected {
        /// HTTP status of the endpoint's response.
        status: u16,
    },

    /// Token endpoint cannot be reached.
    #[display("token endpoint cannot be reached: {_0}")]
    Unavailable(reqwest::Error),
}

impl From<TokenError> for CreateError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Rejected { status } => Self::Rejected { status },
            TokenError::Unavailable(e) => Self::Unavailable(e),
        }
    }
}

impl From<TokenError> for VerifyError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Rejected { status } => Self::Rejected { status },
            TokenError::Unavailable(e) => Self::Unavailable(e),
        }
    }
}

/// OAuth token response of the [PayPal] API.
///
/// [PayPal]: https://paypal.com
#[derive(Debug, Deserialize)]
struct AccessToken {
    /// Bearer token to authenticate API requests with.
    access_token: String,
}

/// Body of an order creation request.
#[derive(Debug, Serialize)]
struct OrderRequest {
    /// Processing intent of the order.
    intent: &'static str,

    /// Purchase units the order consists of.
    purchase_units: Vec<PurchaseUnitRequest>,

    /// Redirect URLs of the approval flow.
    application_context: ApplicationContext,
}

/// Purchase unit of an [`OrderRequest`].
#[derive(Debug, Serialize)]
struct PurchaseUnitRequest {
    /// Merchant-supplied reference, carrying the [`Booking`] ID.
    reference_id: String,

    /// Amount to be paid for this unit.
    amount: Amount,
}

/// Monetary amount in the [PayPal] wire format.
///
/// [PayPal]: https://paypal.com
#[derive(Debug, Serialize)]
struct Amount {
    /// ISO 4217 code of the currency.
    currency_code: String,

    /// Decimal value in major units of the currency.
    value: String,
}

/// Approval flow URLs of an [`OrderRequest`].
#[derive(Debug, Serialize)]
struct ApplicationContext {
    /// URL to redirect the customer to after approval.
    return_url: String,

    /// URL to redirect the customer to after cancellation.
    cancel_url: String,
}

/// Relevant part of a [PayPal] order object.
///
/// [PayPal]: https://paypal.com
#[derive(Debug, Deserialize)]
struct Order {
    /// ID of the order.
    id: String,

    /// Status of the order.
    #[serde(default)]
    status: String,

    /// HATEOAS links of the order.
    #[serde(default)]
    links: Vec<Link>,

    /// Purchase units of the order.
    #[serde(default)]
    purchase_units: Vec<PurchaseUnit>,
}

/// Link attached to an [`Order`].
#[derive(Debug, Deserialize)]
struct Link {
    /// Relation of the link to the [`Order`].
    rel: String,

    /// Target URL of the link.
    href: String,
}

/// Purchase unit of an [`Order`].
#[derive(Debug, Deserialize)]
struct PurchaseUnit {
    /// Merchant-supplied reference, carrying the [`Booking`] ID.
    #[serde(default)]
    reference_id: Option<String>,
}

#[cfg(test)]
mod spec {
    use std::{collections::BTreeMap, time::Duration};

    use crate::gateway::VerifyError;

    use super::{Config, Paypal};

    #[tokio::test]
    async fn verify_requires_order_id() {
        let gateway = Paypal::new(Config {
            client_id: "client".to_owned(),
            client_secret: "secret".to_owned(),
            api_url: "https://api-m.sandbox.paypal.com".to_owned(),
            return_url: "https://hotel.test/payments/paypal/return".to_owned(),
            cancel_url: "https://hotel.test/payments/paypal/cancel".to_owned(),
            timeout: Duration::from_secs(10),
        });

        assert!(matches!(
            gateway.verify(&BTreeMap::new()).await,
            Err(VerifyError::Field("order_id")),
        ));
    }
}
