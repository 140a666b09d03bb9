//! [VNPay] gateway integration.
//!
//! [VNPay]: https://vnpay.vn

use std::{collections::BTreeMap, net::IpAddr};

use common::{unit, DateTimeOf};
use rust_decimal::{prelude::ToPrimitive as _, Decimal};

use crate::domain::booking::{self, Booking};

use super::{sign, Callback, CreateError, PaymentRequest, VerifyError};

/// Configuration of a [`Vnpay`] gateway.
#[derive(Clone, Debug)]
pub struct Config {
    /// Merchant terminal code issued by [VNPay].
    ///
    /// [VNPay]: https://vnpay.vn
    pub tmn_code: String,

    /// Secret shared with [VNPay], keying the signature of every request and
    /// callback.
    ///
    /// [VNPay]: https://vnpay.vn
    pub hash_secret: String,

    /// URL of the [VNPay] payment page customers are redirected to.
    ///
    /// [VNPay]: https://vnpay.vn
    pub payment_url: String,

    /// URL of this backend the customer lands back on after paying.
    pub return_url: String,
}

/// Gateway redirecting customers to the [VNPay] payment page with a signed
/// query string, and verifying the signed parameters [VNPay] redirects back
/// with.
///
/// [VNPay]: https://vnpay.vn
#[derive(Clone, Debug)]
pub struct Vnpay {
    /// Configuration of this gateway.
    config: Config,

    /// Signing [`Codec`] keyed with the shared secret.
    ///
    /// [`Codec`]: sign::Codec
    codec: sign::Codec,
}

impl Vnpay {
    /// Version of the [VNPay] wire protocol spoken here.
    ///
    /// [VNPay]: https://vnpay.vn
    const VERSION: &'static str = "2.1.0";

    /// Response code [VNPay] reports a completed payment with.
    ///
    /// [VNPay]: https://vnpay.vn
    const SUCCESS_CODE: &'static str = "00";

    /// Creates a new [`Vnpay`] gateway out of the provided [`Config`].
    #[must_use]
    pub fn new(config: Config) -> Self {
        let codec = sign::Codec::new(config.hash_secret.clone());
        Self { config, codec }
    }

    /// Builds a signed [`PaymentRequest::Redirect`] to the [VNPay] payment
    /// page for the provided [`Booking`].
    ///
    /// # Errors
    ///
    /// If the [`Booking`] total cannot be expressed in the [VNPay] wire
    /// format.
    ///
    /// [VNPay]: https://vnpay.vn
    pub fn create(
        &self,
        booking: &Booking,
        client_ip: IpAddr,
    ) -> Result<PaymentRequest, CreateError> {
        // The wire format carries amounts multiplied by 100 regardless of
        // the currency exponent.
        let amount = (booking.quote.total.amount * Decimal::ONE_HUNDRED)
            .round()
            .to_i64()
            .ok_or(CreateError::Amount)?;

        let params = [
            ("vnp_Version", Self::VERSION.to_owned()),
            ("vnp_Command", "pay".to_owned()),
            ("vnp_TmnCode", self.config.tmn_code.clone()),
            ("vnp_Locale", "vn".to_owned()),
            ("vnp_CurrCode", booking.quote.total.currency.to_string()),
            ("vnp_TxnRef", booking.id.to_string()),
            (
                "vnp_OrderInfo",
                format!("Payment for booking {}", booking.code),
            ),
            ("vnp_OrderType", "other".to_owned()),
            ("vnp_Amount", amount.to_string()),
            ("vnp_ReturnUrl", self.config.return_url.clone()),
            ("vnp_IpAddr", client_ip.to_string()),
            ("vnp_CreateDate", RequestDateTime::now().to_compact()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v))
        .collect::<BTreeMap<_, _>>();

        let signature = self.codec.sign(&params);
        let url = format!(
            "{}?{}&vnp_SecureHash={signature}",
            self.config.payment_url,
            sign::Codec::canonicalize(&params),
        );

        Ok(PaymentRequest::Redirect { url })
    }

    /// Verifies the signature of the provided callback `params` and decodes
    /// them into a [`Callback`].
    ///
    /// # Errors
    ///
    /// If the signature is missing or doesn't match, or the parameters don't
    /// reference a [`Booking`].
    pub fn verify(
        &self,
        params: &BTreeMap<String, String>,
    ) -> Result<Callback, VerifyError> {
        let mut params = params.clone();
        let signature = params
            .remove("vnp_SecureHash")
            .ok_or(VerifyError::Signature)?;
        _ = params.remove("vnp_SecureHashType");

        if !self.codec.verify(&params, &signature) {
            return Err(VerifyError::Signature);
        }

        let booking_id = params
            .get("vnp_TxnRef")
            .and_then(|txn_ref| txn_ref.parse().ok())
            .ok_or(VerifyError::Field("vnp_TxnRef"))?;
        let response_code = params
            .get("vnp_ResponseCode")
            .cloned()
            .ok_or(VerifyError::Field("vnp_ResponseCode"))?;
        // `0` is what VNPay reports instead of a transaction number when the
        // payment never went through.
        let provider_txn_id = params
            .get("vnp_TransactionNo")
            .filter(|txn| *txn != "0")
            .and_then(|txn| booking::ProviderTxnId::new(txn.clone()));

        Ok(Callback {
            booking_id,
            provider_txn_id,
            succeeded: response_code == Self::SUCCESS_CODE,
            response_code,
        })
    }
}

/// [`DateTime`] a [`Vnpay`] request is created at.
///
/// [`DateTime`]: common::DateTime
type RequestDateTime = DateTimeOf<(Vnpay, unit::Creation)>;

#[cfg(test)]
mod spec {
    use std::collections::BTreeMap;

    use common::Percent;

    use crate::{
        domain::{booking, pricing::Quote, room, user, Booking},
        gateway::{self, Callback, PaymentRequest, VerifyError},
    };

    use super::{Config, Vnpay};

    fn gateway() -> Vnpay {
        Vnpay::new(Config {
            tmn_code: "DEMO01".to_owned(),
            hash_secret: "hash-secret".to_owned(),
            payment_url: "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html"
                .to_owned(),
            return_url: "https://hotel.test/payments/vnpay/callback"
                .to_owned(),
        })
    }

    fn booking() -> Booking {
        let check_in = common::Date::today_utc().next().unwrap();
        let check_out =
            check_in.next().unwrap().next().unwrap().next().unwrap();
        Booking {
            id: booking::Id::new(),
            code: booking::Code::generate(),
            room_id: room::Id::new(),
            user_id: user::Id::new(),
            check_in,
            check_out,
            guests: 2,
            units: 2,
            quote: Quote {
                price_per_night: "1000000VND".parse().unwrap(),
                nights: 3,
                subtotal: "6000000VND".parse().unwrap(),
                discount: Percent::new(10.into()).unwrap(),
                discount_amount: "600000VND".parse().unwrap(),
                total: "5400000VND".parse().unwrap(),
            },
            gateway: gateway::Kind::Vnpay,
            provider_txn_id: None,
            status: booking::Status::Pending,
            billing: booking::billing::Contact {
                name: "Jane Roe".parse().unwrap(),
                email: "guest@example.com".parse().unwrap(),
                phone: "555-123-4567".parse().unwrap(),
                address: "1 Beach Road".parse().unwrap(),
                state: None,
                zip_code: None,
                country: "Vietnam".parse().unwrap(),
            },
            created_at: booking::CreationDateTime::now(),
        }
    }

    fn callback_params(
        gateway: &Vnpay,
        booking_id: booking::Id,
        response_code: &str,
        txn_no: &str,
    ) -> BTreeMap<String, String> {
        let mut params = [
            ("vnp_TmnCode", "DEMO01".to_owned()),
            ("vnp_Amount", "540000000".to_owned()),
            ("vnp_TxnRef", booking_id.to_string()),
            ("vnp_ResponseCode", response_code.to_owned()),
            ("vnp_TransactionNo", txn_no.to_owned()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v))
        .collect::<BTreeMap<_, _>>();

        let signature = gateway.codec.sign(&params);
        _ = params.insert("vnp_SecureHash".to_owned(), signature);
        params
    }

    #[test]
    fn creates_signed_redirect() {
        let gateway = gateway();
        let booking = booking();

        let request = gateway
            .create(&booking, "203.0.113.7".parse().unwrap())
            .unwrap();

        let PaymentRequest::Redirect { url } = request else {
            panic!("`Vnpay` must create a redirect");
        };
        assert!(url.starts_with(
            "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html?",
        ));
        assert!(url.contains("vnp_Amount=540000000"));
        assert!(url.contains("vnp_Command=pay"));
        assert!(url.contains("vnp_CurrCode=VND"));
        assert!(url.contains("vnp_TmnCode=DEMO01"));
        assert!(url.contains("vnp_Version=2.1.0"));
        assert!(url.contains(&format!("vnp_TxnRef={}", booking.id)));
        assert!(url.contains("&vnp_SecureHash="));
    }

    #[test]
    fn verifies_successful_callback() {
        let gateway = gateway();
        let booking_id = booking::Id::new();

        let params =
            callback_params(&gateway, booking_id, "00", "14226112");
        let callback = gateway.verify(&params).unwrap();

        let Callback {
            booking_id: decoded,
            provider_txn_id,
            succeeded,
            response_code,
        } = callback;
        assert_eq!(decoded, booking_id);
        assert_eq!(provider_txn_id.unwrap().to_string(), "14226112");
        assert!(succeeded);
        assert_eq!(response_code, "00");
    }

    #[test]
    fn decodes_failed_callback() {
        let gateway = gateway();

        let params =
            callback_params(&gateway, booking::Id::new(), "24", "0");
        let callback = gateway.verify(&params).unwrap();

        assert!(!callback.succeeded);
        assert_eq!(callback.response_code, "24");
        assert!(callback.provider_txn_id.is_none());
    }

    #[test]
    fn rejects_tampered_callback() {
        let gateway = gateway();

        let mut params =
            callback_params(&gateway, booking::Id::new(), "00", "14226112");
        _ = params.insert("vnp_Amount".to_owned(), "1".to_owned());

        assert!(matches!(
            gateway.verify(&params),
            Err(VerifyError::Signature),
        ));
    }

    #[test]
    fn rejects_unsigned_callback() {
        let gateway = gateway();

        let mut params =
            callback_params(&gateway, booking::Id::new(), "00", "14226112");
        _ = params.remove("vnp_SecureHash");

        assert!(matches!(
            gateway.verify(&params),
            Err(VerifyError::Signature),
        ));
    }

    #[test]
    fn ignores_legacy_hash_type_field() {
        let gateway = gateway();

        let mut params =
            callback_params(&gateway, booking::Id::new(), "00", "14226112");
        _ = params
            .insert("vnp_SecureHashType".to_owned(), "HMACSHA512".to_owned());

        assert!(gateway.verify(&params).is_ok());
    }
}
