//! [`Booking`] definitions.

pub mod billing;

use std::sync::LazyLock;

#[cfg(doc)]
use common::DateTime;
use common::{define_kind, unit, Date, DateTimeOf};
use derive_more::{AsRef, Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use rand::{distributions::Alphanumeric, Rng as _};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::gateway;

use super::{pricing::Quote, room, stay};

/// Reservation of a [`Room`] made by a guest, together with the state of its
/// payment.
///
/// [`Room`]: room::Room
#[derive(Clone, Debug)]
pub struct Booking {
    /// ID of this [`Booking`].
    pub id: Id,

    /// Public-facing [`Code`] of this [`Booking`].
    pub code: Code,

    /// ID of the booked [`Room`].
    ///
    /// [`Room`]: room::Room
    pub room_id: room::Id,

    /// ID of the guest who made this [`Booking`].
    pub user_id: super::user::Id,

    /// [`Date`] of the first night.
    pub check_in: Date,

    /// [`Date`] of departure.
    pub check_out: Date,

    /// Number of guests staying.
    pub guests: stay::Guests,

    /// Number of [`Room`] units booked.
    ///
    /// [`Room`]: room::Room
    pub units: room::Units,

    /// Pricing [`Quote`] frozen at the time this [`Booking`] was created.
    ///
    /// Never recomputed from the live [`Room`] price.
    ///
    /// [`Room`]: room::Room
    pub quote: Quote,

    /// Payment provider this [`Booking`] is paid through.
    pub gateway: gateway::Kind,

    /// ID of the payment transaction on the provider side.
    ///
    /// [`None`] until the provider confirms the payment.
    pub provider_txn_id: Option<ProviderTxnId>,

    /// [`Status`] of this [`Booking`].
    pub status: Status,

    /// Billing [`Contact`] provided by the guest.
    ///
    /// [`Contact`]: billing::Contact
    pub billing: billing::Contact,

    /// [`DateTime`] when this [`Booking`] was created.
    pub created_at: CreationDateTime,
}

/// ID of a [`Booking`].
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Display,
    Eq,
    From,
    FromStr,
    Hash,
    Into,
    PartialEq,
    Serialize,
)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random [`Id`].
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Public-facing code of a [`Booking`].
///
/// Short enough to be read out over the phone, unlike the [`Id`].
#[derive(AsRef, Clone, Debug, Display, Eq, Hash, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Code(String);

impl Code {
    /// Generates a new random [`Code`].
    #[must_use]
    pub fn generate() -> Self {
        let suffix = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(8)
            .map(|b| char::from(b).to_ascii_uppercase())
            .collect::<String>();
        Self(format!("BK-{suffix}"))
    }

    /// Creates a new [`Code`].
    ///
    /// # Safety
    ///
    /// The caller must ensure that the given `code` matches the format.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Creates a new [`Code`] if the given `code` is valid.
    #[must_use]
    pub fn new(code: impl Into<String>) -> Option<Self> {
        let code = code.into();
        Self::check(&code).then_some(Self(code))
    }

    /// Checks whether the given `code` is a valid [`Code`].
    fn check(code: impl AsRef<str>) -> bool {
        /// Regular expression checking [`Code`] format.
        static REGEX: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"^BK-[0-9A-Z]{8}$").expect("valid regex")
        });

        REGEX.is_match(code.as_ref())
    }
}

impl FromStr for Code {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Code`")
    }
}

/// ID of a payment transaction on the provider side.
#[derive(AsRef, Clone, Debug, Display, Eq, Hash, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct ProviderTxnId(String);

impl ProviderTxnId {
    /// Creates a new [`ProviderTxnId`].
    ///
    /// # Safety
    ///
    /// The caller must ensure that the given `id` matches the format.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Creates a new [`ProviderTxnId`] if the given `id` is valid.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        Self::check(&id).then_some(Self(id))
    }

    /// Checks whether the given `id` is a valid [`ProviderTxnId`].
    fn check(id: impl AsRef<str>) -> bool {
        let id = id.as_ref();
        id.trim() == id && !id.is_empty() && id.len() <= 256
    }
}

impl FromStr for ProviderTxnId {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `ProviderTxnId`")
    }
}

define_kind! {
    #[doc = "Status of a [`Booking`]."]
    enum Status {
        #[doc = "Awaits payment confirmation, nights are held."]
        Pending = 1,

        #[doc = "Payment confirmed, nights are held."]
        Paid = 2,

        #[doc = "Payment failed or was rejected, nights are released."]
        Failed = 3,

        #[doc = "Cancelled by the guest or swept as stale, nights are \
                 released."]
        Cancelled = 4,
    }
}

/// Change of a [`Booking`]'s [`Status`], applied only if the [`Booking`] is
/// still in the `from` [`Status`].
///
/// Such compare-and-swap semantics guarantee that concurrent settlements of
/// the same [`Booking`] cannot double-apply.
#[derive(Clone, Debug)]
pub struct StatusChange {
    /// ID of the [`Booking`] to change.
    pub id: Id,

    /// [`Status`] the [`Booking`] is expected to be in.
    pub from: Status,

    /// [`Status`] to transition the [`Booking`] into.
    pub to: Status,

    /// [`ProviderTxnId`] to record along with the change, if any.
    pub provider_txn_id: Option<ProviderTxnId>,
}

/// [`DateTime`] when a [`Booking`] was created.
pub type CreationDateTime = DateTimeOf<(Booking, unit::Creation)>;

#[cfg(test)]
mod spec {
    use super::Code;

    #[test]
    fn generated_code_is_well_formed() {
        for _ in 0..64 {
            let code = Code::generate();

            assert!(
                Code::new(code.to_string()).is_some(),
                "generated `Code` `{code}` must pass validation",
            );
        }
    }

    #[test]
    fn code_validation() {
        assert!(Code::new("BK-7F3K9QZ2").is_some());

        assert!(Code::new("BK-7f3k9qz2").is_none());
        assert!(Code::new("BK-7F3K9QZ").is_none());
        assert!(Code::new("BK-7F3K9QZ22").is_none());
        assert!(Code::new("XX-7F3K9QZ2").is_none());
        assert!(Code::new("").is_none());
    }
}
