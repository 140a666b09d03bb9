//! [`Money`]-related definitions.

use std::{fmt, str::FromStr};

use rust_decimal::{prelude::ToPrimitive as _, Decimal};

use crate::define_kind;

/// Amount of money in some [`Currency`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Money {
    /// Amount of this [`Money`].
    pub amount: Decimal,

    /// [`Currency`] of this amount.
    pub currency: Currency,
}

impl Money {
    /// Returns this [`Money`] amount expressed in the minor units of its
    /// [`Currency`] (cents, paise), as payment providers expect it on the
    /// wire.
    ///
    /// Amounts with a fractional part beyond the minor unit are rounded to
    /// the nearest representable value. [`None`] is returned on overflow.
    #[must_use]
    pub fn to_minor_units(&self) -> Option<i64> {
        let factor = Decimal::from(10_i64.pow(self.currency.minor_units()));
        self.amount.checked_mul(factor)?.round().to_i64()
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self { amount, currency } = self;
        if amount.is_integer() {
            write!(f, "{}{currency}", amount.to_i128().expect("integer"))
        } else {
            write!(f, "{amount}{currency}")
        }
    }
}

impl FromStr for Money {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() < 4 {
            return Err("too short");
        }

        let (amount, currency) = s.split_at(s.len() - 3);
        let amount = Decimal::from_str(amount).map_err(|_| "invalid amount")?;
        let currency =
            Currency::from_str(currency).map_err(|_| "invalid currency")?;

        Ok(Self { amount, currency })
    }
}

define_kind! {
    #[doc = "Currency of a [`Money`] amount."]
    enum Currency {
        #[doc = "Vietnamese Dong."]
        Vnd = 1,

        #[doc = "US Dollar."]
        Usd = 2,

        #[doc = "Indian Rupee."]
        Inr = 3,

        #[doc = "Euro."]
        Eur = 4,
    }
}

impl Currency {
    /// Returns the [ISO 4217] minor unit exponent of this [`Currency`].
    ///
    /// [ISO 4217]: https://www.iso.org/iso-4217-currency-codes.html
    #[must_use]
    pub const fn minor_units(self) -> u32 {
        match self {
            Self::Vnd => 0,
            Self::Usd | Self::Inr | Self::Eur => 2,
        }
    }
}

#[cfg(feature = "serde")]
mod serde {
    //! Module providing integration with [`serde`] crate.

    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    use super::Money;

    impl serde::Serialize for Money {
        fn serialize<S: Serializer>(
            &self,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            serializer.collect_str(self)
        }
    }

    impl<'de> Deserialize<'de> for Money {
        fn deserialize<D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Self, D::Error> {
            String::deserialize(deserializer)?
                .parse()
                .map_err(D::Error::custom)
        }
    }
}

#[cfg(test)]
mod spec {
    use std::str::FromStr as _;

    use rust_decimal::Decimal;

    use super::{Currency, Money};

    fn decimal(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn from_str() {
        assert_eq!(
            Money::from_str("5400000VND").unwrap(),
            Money {
                amount: decimal("5400000"),
                currency: Currency::Vnd,
            },
        );

        assert_eq!(
            Money::from_str("123.45USD").unwrap(),
            Money {
                amount: decimal("123.45"),
                currency: Currency::Usd,
            },
        );

        assert_eq!(
            Money::from_str("123.45INR").unwrap(),
            Money {
                amount: decimal("123.45"),
                currency: Currency::Inr,
            },
        );

        assert_eq!(
            Money::from_str("123.45EUR").unwrap(),
            Money {
                amount: decimal("123.45"),
                currency: Currency::Eur,
            },
        );

        assert!(Money::from_str("123.45").is_err());
        assert!(Money::from_str("123.45Us").is_err());
        assert!(Money::from_str("123.45Usdollar").is_err());

        assert!(Money::from_str("123.00USD").is_ok());
        assert!(Money::from_str("123.0USD").is_ok());
        assert!(Money::from_str("123USD").is_ok());
    }

    #[test]
    fn to_string() {
        assert_eq!(
            Money {
                amount: decimal("5400000"),
                currency: Currency::Vnd,
            }
            .to_string(),
            "5400000VND",
        );

        assert_eq!(
            Money {
                amount: decimal("123.45"),
                currency: Currency::Usd,
            }
            .to_string(),
            "123.45USD",
        );

        assert_eq!(
            Money {
                amount: decimal("123.00"),
                currency: Currency::Usd,
            }
            .to_string(),
            "123USD",
        );
        assert_eq!(
            Money {
                amount: decimal("123.0"),
                currency: Currency::Usd,
            }
            .to_string(),
            "123USD",
        );
        assert_eq!(
            Money {
                amount: decimal("123"),
                currency: Currency::Usd,
            }
            .to_string(),
            "123USD",
        );
    }

    #[test]
    fn to_minor_units() {
        assert_eq!(
            Money {
                amount: decimal("5400000"),
                currency: Currency::Vnd,
            }
            .to_minor_units(),
            Some(5_400_000),
        );

        assert_eq!(
            Money {
                amount: decimal("123.45"),
                currency: Currency::Usd,
            }
            .to_minor_units(),
            Some(12_345),
        );

        assert_eq!(
            Money {
                amount: decimal("1999"),
                currency: Currency::Inr,
            }
            .to_minor_units(),
            Some(199_900),
        );

        assert_eq!(
            Money {
                amount: decimal("0.994"),
                currency: Currency::Eur,
            }
            .to_minor_units(),
            Some(99),
        );
    }
}
