//! [`Booking`]-related [`Database`] implementations.

use common::{
    money::Currency,
    operations::{By, Insert, Lock, Select, Update},
    Money,
};
use itertools::Itertools as _;
use postgres_types::ToSql;
use tracerr::Traced;

use crate::{
    domain::{
        booking::{self, billing},
        Booking, Quote,
    },
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
    read,
};

impl<C> Database<Insert<Booking>> for Postgres<C>
where
    C: Connection + Sync,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(booking): Insert<Booking>,
    ) -> Result<Self::Ok, Self::Err> {
        let Booking {
            id,
            code,
            room_id,
            user_id,
            check_in,
            check_out,
            guests,
            units,
            quote,
            gateway,
            provider_txn_id,
            status,
            billing,
            created_at,
        } = booking;
        let Quote {
            price_per_night,
            nights,
            subtotal,
            discount,
            discount_amount,
            total,
        } = quote;
        let billing::Contact {
            name,
            email,
            phone,
            address,
            state,
            zip_code,
            country,
        } = billing;

        let guests = i32::from(guests);
        let units = i32::from(units);
        let nights = i32::try_from(nights).expect("`nights` overflow");
        let currency = total.currency;

        const SQL: &str = "\
            INSERT INTO bookings (\
                id, code, room_id, user_id, \
                check_in, check_out, guests, units, \
                price_per_night, nights, subtotal, \
                discount, discount_amount, total, currency, \
                gateway, provider_txn_id, status, \
                billing_name, billing_email, billing_phone, billing_address, \
                billing_state, billing_zip_code, billing_country, \
                created_at \
            ) VALUES (\
                $1::UUID, $2::VARCHAR, $3::UUID, $4::UUID, \
                $5::DATE, $6::DATE, $7::INT4, $8::INT4, \
                $9::NUMERIC, $10::INT4, $11::NUMERIC, \
                $12::NUMERIC, $13::NUMERIC, $14::NUMERIC, $15::INT2, \
                $16::INT2, $17::VARCHAR, $18::INT2, \
                $19::VARCHAR, $20::VARCHAR, $21::VARCHAR, $22::VARCHAR, \
                $23::VARCHAR, $24::VARCHAR, $25::VARCHAR, \
                $26::TIMESTAMPTZ \
            )";
        self.exec(
            SQL,
            &[
                &id,
                &code,
                &room_id,
                &user_id,
                &check_in,
                &check_out,
                &guests,
                &units,
                &price_per_night.amount,
                &nights,
                &subtotal.amount,
                &discount,
                &discount_amount.amount,
                &total.amount,
                &currency,
                &gateway,
                &provider_txn_id,
                &status,
                &name,
                &email,
                &phone,
                &address,
                &state,
                &zip_code,
                &country,
                &created_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Select<By<Option<Booking>, booking::Id>>> for Postgres<C>
where
    C: Connection + Sync,
{
    type Ok = Option<Booking>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Booking>, booking::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: booking::Id = by.into_inner();

        const SQL: &str = "\
            SELECT id, code, room_id, user_id, \
                   check_in, check_out, guests, units, \
                   price_per_night, nights, subtotal, \
                   discount, discount_amount, total, currency, \
                   gateway, provider_txn_id, status, \
                   billing_name, billing_email, billing_phone, \
                   billing_address, billing_state, billing_zip_code, \
                   billing_country, \
                   created_at \
            FROM bookings \
            WHERE id = $1::UUID \
            LIMIT 1";
        Ok(self
            .query_opt(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())?
            .map(|row| {
                let currency: Currency = row.get("currency");
                Booking {
                    id: row.get("id"),
                    code: row.get("code"),
                    room_id: row.get("room_id"),
                    user_id: row.get("user_id"),
                    check_in: row.get("check_in"),
                    check_out: row.get("check_out"),
                    guests: u16::try_from(row.get::<_, i32>("guests"))
                        .expect("`guests` overflow"),
                    units: u16::try_from(row.get::<_, i32>("units"))
                        .expect("`units` overflow"),
                    quote: Quote {
                        price_per_night: Money {
                            amount: row.get("price_per_night"),
                            currency,
                        },
                        nights: u32::try_from(row.get::<_, i32>("nights"))
                            .expect("`nights` overflow"),
                        subtotal: Money {
                            amount: row.get("subtotal"),
                            currency,
                        },
                        discount: row.get("discount"),
                        discount_amount: Money {
                            amount: row.get("discount_amount"),
                            currency,
                        },
                        total: Money {
                            amount: row.get("total"),
                            currency,
                        },
                    },
                    gateway: row.get("gateway"),
                    provider_txn_id: row.get("provider_txn_id"),
                    status: row.get("status"),
                    billing: billing::Contact {
                        name: row.get("billing_name"),
                        email: row.get("billing_email"),
                        phone: row.get("billing_phone"),
                        address: row.get("billing_address"),
                        state: row.get("billing_state"),
                        zip_code: row.get("billing_zip_code"),
                        country: row.get("billing_country"),
                    },
                    created_at: row.get("created_at"),
                }
            }))
    }
}

impl<C> Database<Update<booking::StatusChange>> for Postgres<C>
where
    C: Connection + Sync,
{
    type Ok = bool;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(change): Update<booking::StatusChange>,
    ) -> Result<Self::Ok, Self::Err> {
        let booking::StatusChange { id, from, to, provider_txn_id } = change;

        // Compare-and-swap on `status`, so a concurrent transition loses and
        // reports `false` instead of overwriting a terminal state.
        const SQL: &str = "\
            UPDATE bookings \
            SET status = $3::INT2, \
                provider_txn_id = COALESCE($4::VARCHAR, provider_txn_id) \
            WHERE id = $1::UUID \
              AND status = $2::INT2";
        self.exec(SQL, &[&id, &from, &to, &provider_txn_id])
            .await
            .map_err(tracerr::wrap!())
            .map(|rows| rows == 1)
    }
}

impl<C> Database<Lock<By<Booking, booking::Id>>> for Postgres<C>
where
    C: Connection + Sync,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Booking, booking::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: booking::Id = by.into_inner();

        // `DO UPDATE` keeps the row lock held when the row exists already, so
        // concurrent transactions on the same `Booking` serialize here.
        const SQL: &str = "\
            INSERT INTO bookings_lock \
            VALUES ($1::UUID) \
            ON CONFLICT (id) DO UPDATE \
            SET id = EXCLUDED.id";
        self.query(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}

impl<C> Database<Select<By<Vec<booking::Id>, booking::CreationDateTime>>>
    for Postgres<C>
where
    C: Connection + Sync,
{
    type Ok = Vec<booking::Id>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<booking::Id>, booking::CreationDateTime>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let deadline: booking::CreationDateTime = by.into_inner();

        // Only `Pending` bookings are subject to reaping, terminal ones stay
        // for history.
        const SQL: &str = "\
            SELECT id \
            FROM bookings \
            WHERE status = $1::INT2 \
              AND created_at < $2::TIMESTAMPTZ";
        Ok(self
            .query(SQL, &[&booking::Status::Pending, &deadline])
            .await
            .map_err(tracerr::wrap!())?
            .into_iter()
            .map(|row| row.get("id"))
            .collect())
    }
}

impl<C>
    Database<
        Select<By<read::booking::list::Page, read::booking::list::Selector>>,
    > for Postgres<C>
where
    C: Connection + Sync,
{
    type Ok = read::booking::list::Page;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<read::booking::list::Page, read::booking::list::Selector>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let read::booking::list::Selector {
            arguments,
            filter: read::booking::list::Filter { user_id },
        } = by.into_inner();

        let limit = i32::try_from(arguments.limit()).unwrap();

        let mut ps: Vec<&(dyn ToSql + Sync)> = vec![&limit];

        let cursor_idx = arguments.after.as_ref().map(|c| {
            ps.push(c);
            ps.len()
        });
        let user_idx = user_id.as_ref().map(|u| {
            ps.push(u);
            ps.len()
        });

        let sql = format!(
            "SELECT id, code, room_id, check_in, check_out, \
                    status, total, currency, created_at \
             FROM bookings \
             WHERE true \
                   {cursor} \
                   {user_filtering} \
             ORDER BY created_at DESC, \
                      id DESC \
             LIMIT $1::INT4",
            cursor = cursor_idx.into_iter().format_with("", |idx, f| {
                f(&format_args!(
                    "AND (created_at, id) < (SELECT created_at, id \
                                             FROM bookings \
                                             WHERE id = ${idx}::UUID)"
                ))
            }),
            user_filtering = user_idx.into_iter().format_with("", |idx, f| {
                f(&format_args!("AND user_id = ${idx}::UUID"))
            }),
        );
        let rows = self
            .query(&sql, ps.as_slice())
            .await
            .map_err(tracerr::wrap!())?;

        let has_more = rows.len() > arguments.first;
        let edges = rows
            .into_iter()
            .take(arguments.first)
            .map(|row| {
                let id: booking::Id = row.get("id");
                let node = read::booking::Summary {
                    id,
                    code: row.get("code"),
                    room_id: row.get("room_id"),
                    check_in: row.get("check_in"),
                    check_out: row.get("check_out"),
                    status: row.get("status"),
                    total: Money {
                        amount: row.get("total"),
                        currency: row.get("currency"),
                    },
                    created_at: row.get("created_at"),
                };
                (id, node)
            })
            .collect::<Vec<_>>();

        Ok(read::booking::list::Page::new(edges, has_more))
    }
}

impl<C>
    Database<
        Select<
            By<read::booking::list::TotalCount, read::booking::list::Filter>,
        >,
    > for Postgres<C>
where
    C: Connection + Sync,
{
    type Ok = read::booking::list::TotalCount;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<read::booking::list::TotalCount, read::booking::list::Filter>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let read::booking::list::Filter { user_id } = by.into_inner();

        let mut ps: Vec<&(dyn ToSql + Sync)> = vec![];
        let user_idx = user_id.as_ref().map(|u| {
            ps.push(u);
            ps.len()
        });

        let sql = format!(
            "SELECT COUNT(*)::INT4 \
             FROM bookings \
             WHERE true \
                   {user_filtering}",
            user_filtering = user_idx.into_iter().format_with("", |idx, f| {
                f(&format_args!("AND user_id = ${idx}::UUID"))
            }),
        );
        self.query_opt(&sql, ps.as_slice())
            .await
            .map_err(tracerr::wrap!())
            .map(|row| row.expect("always exists").get::<_, i32>(0).into())
    }
}
