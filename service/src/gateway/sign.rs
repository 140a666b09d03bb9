//! Signing [`Codec`] of redirect-style providers.

use std::collections::BTreeMap;

use hmac::{Hmac, Mac as _};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sha2::Sha512;
use subtle::ConstantTimeEq as _;

/// Characters escaped when a value is percent-encoded into the canonical
/// form.
///
/// Everything outside the RFC 3986 unreserved set is escaped.
const ESCAPED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Codec signing outgoing provider requests and verifying incoming provider
/// callbacks with a keyed hash of their canonical form.
#[derive(Clone, Debug)]
pub struct Codec {
    /// Secret shared with the provider.
    secret: String,
}

impl Codec {
    /// Creates a new [`Codec`] keyed with the provided shared `secret`.
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Folds the provided `params` into their canonical form.
    ///
    /// Pairs are joined as `key=value` with `&` in lexicographic order of the
    /// raw key names, with every value percent-encoded. Signing and
    /// verification must observe byte-identical canonical forms, so any
    /// signature field must be stripped from the `params` before calling
    /// this.
    #[must_use]
    pub fn canonicalize(params: &BTreeMap<String, String>) -> String {
        params
            .iter()
            .map(|(k, v)| format!("{k}={}", utf8_percent_encode(v, ESCAPED)))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Signs the provided `params`, returning a lowercase hex digest of
    /// their canonical form.
    #[must_use]
    pub fn sign(&self, params: &BTreeMap<String, String>) -> String {
        let mut mac = Hmac::<Sha512>::new_from_slice(self.secret.as_bytes())
            .expect("HMAC accepts any key size");
        mac.update(Self::canonicalize(params).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Verifies the provided `signature` against the provided `params`.
    ///
    /// The comparison is constant-time. Any mismatch is a hard rejection.
    #[must_use]
    pub fn verify(
        &self,
        params: &BTreeMap<String, String>,
        signature: &str,
    ) -> bool {
        let expected = self.sign(params);
        let provided = signature.to_ascii_lowercase();
        expected.as_bytes().ct_eq(provided.as_bytes()).into()
    }
}

#[cfg(test)]
mod spec {
    use std::collections::BTreeMap;

    use super::Codec;

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn canonicalizes_sorted_and_encoded() {
        let params = params(&[
            ("vnp_TmnCode", "DEMO01"),
            ("vnp_Amount", "540000000"),
            ("vnp_OrderInfo", "Payment for booking BK-7F3K9QZ2"),
        ]);

        assert_eq!(
            Codec::canonicalize(&params),
            "vnp_Amount=540000000\
             &vnp_OrderInfo=Payment%20for%20booking%20BK-7F3K9QZ2\
             &vnp_TmnCode=DEMO01",
        );
    }

    #[test]
    fn escapes_reserved_characters() {
        let params = params(&[("q", "a=b&c ~d.e_f-g")]);

        assert_eq!(Codec::canonicalize(&params), "q=a%3Db%26c%20~d.e_f-g");
    }

    #[test]
    fn verifies_own_signature() {
        let codec = Codec::new("hash-secret");
        let params = params(&[("vnp_Amount", "100"), ("vnp_TxnRef", "42")]);

        let signature = codec.sign(&params);

        assert_eq!(signature.len(), 128);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(codec.verify(&params, &signature));
    }

    #[test]
    fn accepts_uppercase_hex() {
        let codec = Codec::new("hash-secret");
        let params = params(&[("vnp_Amount", "100")]);

        let signature = codec.sign(&params).to_ascii_uppercase();

        assert!(codec.verify(&params, &signature));
    }

    #[test]
    fn rejects_tampered_params() {
        let codec = Codec::new("hash-secret");
        let params = params(&[("vnp_Amount", "100"), ("vnp_TxnRef", "42")]);

        let signature = codec.sign(&params);
        let tampered = {
            let mut p = params.clone();
            _ = p.insert("vnp_Amount".to_owned(), "1".to_owned());
            p
        };

        assert!(!codec.verify(&tampered, &signature));
    }

    #[test]
    fn rejects_foreign_secret() {
        let params = params(&[("vnp_Amount", "100")]);

        let signature = Codec::new("one-secret").sign(&params);

        assert!(!Codec::new("another-secret").verify(&params, &signature));
    }
}
