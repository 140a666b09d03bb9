//! [`Room`] definitions.

#[cfg(doc)]
use common::DateTime;
use common::{unit, DateTimeOf, Money, Percent};
use derive_more::{AsRef, Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Bookable room category of the hotel.
///
/// A single [`Room`] may be backed by multiple identical physical units, so
/// several guests can hold it for the same night as long as the total count
/// of [`Units`] is not exceeded.
#[derive(Clone, Debug)]
pub struct Room {
    /// ID of this [`Room`].
    pub id: Id,

    /// [`TypeId`] of the catalog type this [`Room`] belongs to.
    pub type_id: TypeId,

    /// [`Name`] of this [`Room`].
    pub name: Name,

    /// Price of this [`Room`] per one night.
    pub price: Money,

    /// Discount applied to the price of this [`Room`].
    pub discount: Percent,

    /// Maximum number of guests a single unit of this [`Room`] accommodates.
    pub max_guests: MaxGuests,

    /// Total count of physical units of this [`Room`].
    pub units: Units,

    /// [`DateTime`] when this [`Room`] was created.
    pub created_at: CreationDateTime,
}

impl Room {
    /// Checks whether the given number of `guests` fits into the given number
    /// of `units` of this [`Room`].
    #[must_use]
    pub fn accommodates(&self, guests: MaxGuests, units: Units) -> bool {
        guests <= self.max_guests.saturating_mul(units)
    }
}

/// ID of a [`Room`].
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

/// ID of the catalog type a [`Room`] belongs to.
///
/// Room types are managed by an external catalog, so only their IDs are
/// carried here.
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
pub struct TypeId(Uuid);

/// Name of a [`Room`].
#[derive(AsRef, Clone, Debug, Display, Eq, Hash, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Name(String);

impl Name {
    /// Creates a new [`Name`].
    ///
    /// # Safety
    ///
    /// The caller must ensure that the given `name` matches the format.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Creates a new [`Name`] if the given `name` is valid.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Option<Self> {
        let name = name.into();
        Self::check(&name).then_some(Self(name))
    }

    /// Checks whether the given `name` is a valid [`Name`].
    fn check(name: impl AsRef<str>) -> bool {
        let name = name.as_ref();
        name.trim() == name && !name.is_empty() && name.len() <= 512
    }
}

impl FromStr for Name {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Name`")
    }
}

/// Maximum number of guests a single unit of a [`Room`] accommodates.
pub type MaxGuests = u16;

/// Count of physical units of a [`Room`].
pub type Units = u16;

/// [`DateTime`] when a [`Room`] was created.
pub type CreationDateTime = DateTimeOf<(Room, unit::Creation)>;
