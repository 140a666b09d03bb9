//! [`Config`]-related definitions.

use std::time;

use config::{builder::DefaultState, ConfigBuilder, ConfigError};
use serde::Deserialize;
use smart_default::SmartDefault;

/// Application configuration.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: Server,

    /// Service configuration.
    pub service: Service,

    /// Postgres configuration.
    pub postgres: Postgres,

    /// Log configuration.
    pub log: Log,
}

impl Config {
    /// Creates a new [`Config`] by:
    /// - loading it from the provided `path` (if any);
    /// - merging it with the environment variables (if any);
    /// - using default values for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(path: impl AsRef<str>) -> Result<Self, ConfigError> {
        ConfigBuilder::<DefaultState>::default()
            .add_source(config::File::with_name(path.as_ref()).required(false))
            .add_source(config::Environment::with_prefix("CONF").separator("."))
            .build()?
            .try_deserialize()
    }
}

/// Server configuration.
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Server {
    /// Host to bind the server to.
    #[default("0.0.0.0".to_owned())]
    pub host: String,

    /// Port to bind the server to.
    #[default(8080)]
    pub port: u16,

    /// [CORS] configuration.
    ///
    /// [CORS]: https://developer.mozilla.org/en-US/docs/Web/HTTP/CORS
    pub cors: Cors,
}

/// [CORS] configuration.
///
/// [CORS]: https://developer.mozilla.org/en-US/docs/Web/HTTP/CORS
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Cors {
    /// List of allowed origins.
    #[default(vec!["*".to_owned()])]
    pub origins: Vec<String>,
}

/// Service configuration.
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Service {
    /// [JWT] secret verifying guest session tokens.
    ///
    /// [JWT]: https://wikipedia.org/wiki/JSON_Web_Token
    #[default("secret".to_owned())]
    pub jwt_secret: String,

    /// Payment gateways configuration.
    pub gateways: Gateways,

    /// Service tasks configuration.
    pub tasks: Tasks,
}

impl From<Service> for service::Config {
    fn from(value: Service) -> Self {
        let Service {
            jwt_secret,
            gateways,
            tasks: Tasks {
                reap_stale_bookings,
            },
        } = value;
        Self {
            jwt_decoding_key: jsonwebtoken::DecodingKey::from_secret(
                jwt_secret.as_bytes(),
            ),
            gateways: gateways.into(),
            reap_stale_bookings: service::task::reap_stale_bookings::Config {
                interval: reap_stale_bookings.interval,
                timeout: reap_stale_bookings.timeout,
            },
        }
    }
}

/// Payment gateways configuration.
///
/// Only the configured providers are offered to guests.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Gateways {
    /// [VNPay] gateway configuration.
    ///
    /// [VNPay]: https://vnpay.vn
    pub vnpay: Option<Vnpay>,

    /// [Razorpay] gateway configuration.
    ///
    /// [Razorpay]: https://razorpay.com
    pub razorpay: Option<Razorpay>,

    /// [Stripe] gateway configuration.
    ///
    /// [Stripe]: https://stripe.com
    pub stripe: Option<Stripe>,

    /// [PayPal] gateway configuration.
    ///
    /// [PayPal]: https://paypal.com
    pub paypal: Option<Paypal>,
}

impl From<Gateways> for service::gateway::Gateways {
    fn from(value: Gateways) -> Self {
        let Gateways {
            vnpay,
            razorpay,
            stripe,
            paypal,
        } = value;
        Self::new(
            [
                vnpay.map(|c| service::gateway::Vnpay::new(c.into()).into()),
                razorpay
                    .map(|c| service::gateway::Razorpay::new(c.into()).into()),
                stripe.map(|c| service::gateway::Stripe::new(c.into()).into()),
                paypal.map(|c| service::gateway::Paypal::new(c.into()).into()),
            ]
            .into_iter()
            .flatten(),
        )
    }
}

/// [VNPay] gateway configuration.
///
/// [VNPay]: https://vnpay.vn
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Vnpay {
    /// Merchant terminal code issued by [VNPay].
    ///
    /// [VNPay]: https://vnpay.vn
    pub tmn_code: String,

    /// Secret keying request and callback signatures.
    pub hash_secret: String,

    /// URL of the [VNPay] payment page.
    ///
    /// [VNPay]: https://vnpay.vn
    #[default("https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".to_owned())]
    pub payment_url: String,

    /// URL of this backend the customer lands back on after paying.
    #[default("http://127.0.0.1:8080/payments/vnpay/callback".to_owned())]
    pub return_url: String,
}

impl From<Vnpay> for service::gateway::vnpay::Config {
    fn from(value: Vnpay) -> Self {
        let Vnpay {
            tmn_code,
            hash_secret,
            payment_url,
            return_url,
        } = value;
        Self {
            tmn_code,
            hash_secret,
            payment_url,
            return_url,
        }
    }
}

/// [Razorpay] gateway configuration.
///
/// [Razorpay]: https://razorpay.com
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Razorpay {
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
    #[default("https://api.razorpay.com".to_owned())]
    pub api_url: String,

    /// Timeout of a single API request.
    #[default(time::Duration::from_secs(10))]
    #[serde(with = "humantime_serde")]
    pub timeout: time::Duration,
}

impl From<Razorpay> for service::gateway::razorpay::Config {
    fn from(value: Razorpay) -> Self {
        let Razorpay {
            key_id,
            key_secret,
            api_url,
            timeout,
        } = value;
        Self {
            key_id,
            key_secret,
            api_url,
            timeout,
        }
    }
}

/// [Stripe] gateway configuration.
///
/// [Stripe]: https://stripe.com
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Stripe {
    /// Secret API key issued by [Stripe].
    ///
    /// [Stripe]: https://stripe.com
    pub secret_key: String,

    /// Base URL of the [Stripe] API.
    ///
    /// [Stripe]: https://stripe.com
    #[default("https://api.stripe.com".to_owned())]
    pub api_url: String,

    /// URL of the storefront the customer lands on after paying.
    #[default("http://127.0.0.1:3000/payment/success".to_owned())]
    pub success_url: String,

    /// URL of the storefront the customer lands on after aborting.
    #[default("http://127.0.0.1:3000/payment/cancel".to_owned())]
    pub cancel_url: String,

    /// Timeout of a single API request.
    #[default(time::Duration::from_secs(10))]
    #[serde(with = "humantime_serde")]
    pub timeout: time::Duration,
}

impl From<Stripe> for service::gateway::stripe::Config {
    fn from(value: Stripe) -> Self {
        let Stripe {
            secret_key,
            api_url,
            success_url,
            cancel_url,
            timeout,
        } = value;
        Self {
            secret_key,
            api_url,
            success_url,
            cancel_url,
            timeout,
        }
    }
}

/// [PayPal] gateway configuration.
///
/// [PayPal]: https://paypal.com
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Paypal {
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
    #[default("https://api-m.sandbox.paypal.com".to_owned())]
    pub api_url: String,

    /// URL of the storefront the customer lands on after approving the
    /// order.
    #[default("http://127.0.0.1:3000/payment/success".to_owned())]
    pub return_url: String,

    /// URL of the storefront the customer lands on after aborting.
    #[default("http://127.0.0.1:3000/payment/cancel".to_owned())]
    pub cancel_url: String,

    /// Timeout of a single API request.
    #[default(time::Duration::from_secs(10))]
    #[serde(with = "humantime_serde")]
    pub timeout: time::Duration,
}

impl From<Paypal> for service::gateway::paypal::Config {
    fn from(value: Paypal) -> Self {
        let Paypal {
            client_id,
            client_secret,
            api_url,
            return_url,
            cancel_url,
            timeout,
        } = value;
        Self {
            client_id,
            client_secret,
            api_url,
            return_url,
            cancel_url,
            timeout,
        }
    }
}

/// Service tasks configuration.
#[derive(Clone, Copy, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Tasks {
    /// `ReapStaleBookings` task configuration.
    pub reap_stale_bookings: Task,
}

/// Service task configuration.
#[derive(Clone, Copy, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Task {
    /// Task execution interval.
    #[default(time::Duration::from_secs(60))]
    #[serde(with = "humantime_serde")]
    pub interval: time::Duration,

    /// Timeout after which the entities will be considered stale.
    #[default(time::Duration::from_secs(30 * 60))]
    #[serde(with = "humantime_serde")]
    pub timeout: time::Duration,
}

/// Postgres configuration.
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Postgres {
    /// Host to connect to.
    #[default("127.0.0.1".to_owned())]
    pub host: String,

    /// Port to connect to.
    #[default(5432)]
    pub port: u16,

    /// User to connect as.
    #[default("postgres".to_owned())]
    pub user: String,

    /// Password to connect with.
    #[default("postgres".to_owned())]
    pub password: String,

    /// Database name to connect to.
    #[default("postgres".to_owned())]
    pub dbname: String,
}

impl From<Postgres> for service::infra::postgres::Config {
    fn from(value: Postgres) -> Self {
        let Postgres {
            host,
            port,
            user,
            password,
            dbname,
        } = value;

        Self {
            host: Some(host),
            port: Some(port),
            user: Some(user),
            password: Some(password),
            dbname: Some(dbname),
            ..Self::default()
        }
    }
}

/// Log configuration.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Log {
    /// Log level.
    pub level: LogLevel,
}

/// Log level.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    /// Designates very low priority, often extremely verbose, information.
    Trace,

    /// Designates lower priority information.
    Debug,

    /// Designates useful information.
    #[default]
    Info,

    /// Designates hazardous situations.
    Warn,

    /// Designates very serious errors.
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(value: LogLevel) -> Self {
        match value {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}
