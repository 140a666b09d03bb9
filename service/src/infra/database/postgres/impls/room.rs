//! [`Room`]-related [`Database`] implementations.

use common::{
    operations::{By, Lock, Select},
    Money,
};
use tracerr::Traced;

use crate::{
    domain::{room, Room},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
};

impl<C> Database<Select<By<Option<Room>, room::Id>>> for Postgres<C>
where
    C: Connection + Sync,
{
    type Ok = Option<Room>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Room>, room::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: room::Id = by.into_inner();

        const SQL: &str = "\
            SELECT id, type_id, name, \
                   price, currency, discount, \
                   max_guests, units, \
                   created_at \
            FROM rooms \
            WHERE id = $1::UUID \
            LIMIT 1";
        Ok(self
            .query_opt(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())?
            .map(|row| Room {
                id: row.get("id"),
                type_id: row.get("type_id"),
                name: row.get("name"),
                price: Money {
                    amount: row.get("price"),
                    currency: row.get("currency"),
                },
                discount: row.get("discount"),
                max_guests: u16::try_from(row.get::<_, i32>("max_guests"))
                    .expect("`max_guests` overflow"),
                units: u16::try_from(row.get::<_, i32>("units"))
                    .expect("`units` overflow"),
                created_at: row.get("created_at"),
            }))
    }
}

impl<C> Database<Lock<By<Room, room::Id>>> for Postgres<C>
where
    C: Connection + Sync,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Room, room::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: room::Id = by.into_inner();

        // `DO UPDATE` keeps the row lock held when the row exists already, so
        // concurrent transactions on the same `Room` serialize here.
        const SQL: &str = "\
            INSERT INTO rooms_lock \
            VALUES ($1::UUID) \
            ON CONFLICT (id) DO UPDATE \
            SET id = EXCLUDED.id";
        self.query(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}
