//! [`NightClaim`]-related [`Database`] implementations.

use common::operations::{By, Delete, Insert, Select};
use tracerr::Traced;

use crate::{
    domain::{booking, claim, NightClaim},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
};

impl<C> Database<Insert<Vec<NightClaim>>> for Postgres<C>
where
    C: Connection + Sync,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(claims): Insert<Vec<NightClaim>>,
    ) -> Result<Self::Ok, Self::Err> {
        if claims.is_empty() {
            return Ok(());
        }

        let mut room_ids = Vec::with_capacity(claims.len());
        let mut nights = Vec::with_capacity(claims.len());
        let mut booking_ids = Vec::with_capacity(claims.len());
        let mut units = Vec::with_capacity(claims.len());
        for NightClaim { room_id, night, booking_id, units: n } in claims {
            room_ids.push(room_id);
            nights.push(night);
            booking_ids.push(booking_id);
            units.push(i32::from(n));
        }

        const SQL: &str = "\
            INSERT INTO room_night_claims (\
                room_id, night, booking_id, units \
            ) \
            SELECT * \
            FROM unnest($1::UUID[], $2::DATE[], $3::UUID[], $4::INT4[])";
        self.exec(SQL, &[&room_ids, &nights, &booking_ids, &units])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}

impl<C> Database<Delete<By<NightClaim, booking::Id>>> for Postgres<C>
where
    C: Connection + Sync,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Delete(by): Delete<By<NightClaim, booking::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let booking_id: booking::Id = by.into_inner();

        const SQL: &str = "\
            DELETE FROM room_night_claims \
            WHERE booking_id = $1::UUID";
        self.exec(SQL, &[&booking_id])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}

impl<C> Database<Select<By<claim::Taken, claim::Span>>> for Postgres<C>
where
    C: Connection + Sync,
{
    type Ok = claim::Taken;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<claim::Taken, claim::Span>>,
    ) -> Result<Self::Ok, Self::Err> {
        let claim::Span { room_id, check_in, check_out } = by.into_inner();

        // Claims of released bookings are deleted promptly, so every stored
        // row counts toward occupancy.
        const SQL: &str = "\
            SELECT night, SUM(units)::INT4 AS units \
            FROM room_night_claims \
            WHERE room_id = $1::UUID \
              AND night >= $2::DATE \
              AND night < $3::DATE \
            GROUP BY night";
        Ok(self
            .query(SQL, &[&room_id, &check_in, &check_out])
            .await
            .map_err(tracerr::wrap!())?
            .into_iter()
            .map(|row| {
                (
                    row.get("night"),
                    u16::try_from(row.get::<_, i32>("units"))
                        .expect("`units` overflow"),
                )
            })
            .collect())
    }
}
