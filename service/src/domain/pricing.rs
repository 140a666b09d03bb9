//! Pricing of a [`Stay`].

use common::{Money, Percent};
use rust_decimal::Decimal;

use super::{room::Room, stay::Stay};

/// Priced breakdown of a [`Stay`] in a [`Room`].
///
/// Once embedded into a [`Booking`], a [`Quote`] is frozen: later changes of
/// the [`Room`]'s price or discount never affect already created [`Booking`]s.
///
/// [`Booking`]: super::booking::Booking
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Quote {
    /// Price of a single [`Room`] unit per one night.
    pub price_per_night: Money,

    /// Number of nights charged.
    pub nights: u32,

    /// Price of all the nights and units before the discount.
    pub subtotal: Money,

    /// Discount applied to the [`subtotal`].
    ///
    /// [`subtotal`]: Quote::subtotal
    pub discount: Percent,

    /// Discounted part of the [`subtotal`].
    ///
    /// [`subtotal`]: Quote::subtotal
    pub discount_amount: Money,

    /// Total price to be paid.
    pub total: Money,
}

impl Quote {
    /// Calculates a new [`Quote`] for the provided [`Stay`] in the given
    /// [`Room`], capturing its current price and discount.
    #[must_use]
    pub fn calculate(room: &Room, stay: &Stay) -> Self {
        let currency = room.price.currency;

        let subtotal = room.price.amount
            * Decimal::from(stay.nights())
            * Decimal::from(stay.units);
        let discount_amount = room.discount.of(subtotal);
        let total = subtotal - discount_amount;

        Self {
            price_per_night: room.price,
            nights: stay.nights(),
            subtotal: Money {
                amount: subtotal,
                currency,
            },
            discount: room.discount,
            discount_amount: Money {
                amount: discount_amount,
                currency,
            },
            total: Money {
                amount: total,
                currency,
            },
        }
    }
}

#[cfg(test)]
mod spec {
    use common::Percent;

    use crate::domain::{room, Room, Stay};

    use super::Quote;

    fn room(price: &str, discount: &str) -> Room {
        Room {
            id: room::Id::new(),
            type_id: room::TypeId::default(),
            name: "Deluxe".parse().unwrap(),
            price: price.parse().unwrap(),
            discount: discount.parse().unwrap(),
            max_guests: 3,
            units: 5,
            created_at: room::CreationDateTime::now(),
        }
    }

    fn stay(nights: u8, units: u16) -> Stay {
        let check_in = common::Date::today_utc().next().unwrap();
        let mut check_out = check_in;
        for _ in 0..nights {
            check_out = check_out.next().unwrap();
        }
        Stay::new(check_in, check_out, 2, units).unwrap()
    }

    #[test]
    fn applies_discount_across_nights_and_units() {
        let quote = Quote::calculate(&room("1000000VND", "10"), &stay(3, 2));

        assert_eq!(quote.nights, 3);
        assert_eq!(quote.subtotal, "6000000VND".parse().unwrap());
        assert_eq!(quote.discount_amount, "600000VND".parse().unwrap());
        assert_eq!(quote.total, "5400000VND".parse().unwrap());
    }

    #[test]
    fn zero_discount_keeps_subtotal() {
        let quote = Quote::calculate(&room("123.45USD", "0"), &stay(2, 1));

        assert_eq!(quote.subtotal, "246.90USD".parse().unwrap());
        assert_eq!(quote.discount_amount, "0USD".parse().unwrap());
        assert_eq!(quote.total, "246.90USD".parse().unwrap());
        assert_eq!(quote.discount, Percent::ZERO);
    }

    #[test]
    fn freezes_room_price() {
        let mut room = room("100USD", "25");
        let stay = stay(4, 1);

        let quote = Quote::calculate(&room, &stay);
        room.price = "500USD".parse().unwrap();

        assert_eq!(quote.total, "300USD".parse().unwrap());
        assert_eq!(quote.price_per_night, "100USD".parse().unwrap());
    }
}
