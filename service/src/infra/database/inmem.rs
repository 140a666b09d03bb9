//! In-memory [`Database`] implementation.

use std::{cmp, collections::HashMap, sync::Arc};

use common::operations::{
    By, Commit, Delete, Insert, Lock, Select, Transact, Update,
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracerr::Traced;
use uuid::Uuid;

use crate::{
    domain::{booking, claim, room, Booking, NightClaim, Room},
    infra::database,
    read,
};

use super::Database;

/// In-memory [`Database`], to be used in tests and local development.
#[derive(Clone, Debug, Default)]
pub struct Inmem {
    /// Shared [`State`] of this [`Database`].
    state: Arc<Mutex<State>>,
}

impl Inmem {
    /// Creates a new empty [`Inmem`] database.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new [`Inmem`] database pre-populated with the provided
    /// [`Room`]s.
    #[must_use]
    pub fn with_rooms(rooms: impl IntoIterator<Item = Room>) -> Self {
        let state = State {
            rooms: rooms.into_iter().map(|r| (r.id, r)).collect(),
            ..State::default()
        };
        Self { state: Arc::new(Mutex::new(state)) }
    }
}

/// Transactional handle of an [`Inmem`] database.
///
/// Holds the whole-database lock until [`Commit`] or drop, so concurrent
/// transactions execute one at a time.
#[derive(Clone, Debug)]
pub struct Tx {
    /// Guard of the locked [`State`].
    guard: Arc<Mutex<Option<OwnedMutexGuard<State>>>>,
}

impl Tx {
    /// Runs the provided function over the locked [`State`].
    async fn with<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        let mut guard = self.guard.lock().await;
        f(guard.as_mut().expect("transaction already committed"))
    }
}

/// State of an [`Inmem`] database.
#[derive(Debug, Default)]
struct State {
    /// Stored [`Room`]s, by their ID.
    rooms: HashMap<room::Id, Room>,

    /// Stored [`Booking`]s, by their ID.
    bookings: HashMap<booking::Id, Booking>,

    /// Active [`NightClaim`]s.
    claims: Vec<NightClaim>,
}

impl State {
    /// Looks up a [`Booking`] by its ID.
    fn booking(&self, id: booking::Id) -> Option<Booking> {
        self.bookings.get(&id).cloned()
    }

    /// Applies the provided [`booking::StatusChange`], returning whether the
    /// expected current status matched.
    fn swap_status(&mut self, change: &booking::StatusChange) -> bool {
        let Some(b) = self.bookings.get_mut(&change.id) else {
            return false;
        };
        if b.status != change.from {
            return false;
        }
        b.status = change.to;
        if let Some(txn) = &change.provider_txn_id {
            b.provider_txn_id = Some(txn.clone());
        }
        true
    }

    /// Sums claimed units per night of the provided [`claim::Span`].
    fn taken(&self, span: &claim::Span) -> claim::Taken {
        let mut taken = claim::Taken::new();
        for c in &self.claims {
            if c.room_id == span.room_id
                && c.night >= span.check_in
                && c.night < span.check_out
            {
                let units = taken.entry(c.night).or_default();
                *units = units.saturating_add(c.units);
            }
        }
        taken
    }

    /// Removes all [`NightClaim`]s of the provided [`Booking`].
    fn release(&mut self, booking_id: booking::Id) {
        self.claims.retain(|c| c.booking_id != booking_id);
    }

    /// Returns IDs of [`booking::Status::Pending`] [`Booking`]s created
    /// before the provided deadline.
    fn stale_pending(
        &self,
        deadline: booking::CreationDateTime,
    ) -> Vec<booking::Id> {
        self.bookings
            .values()
            .filter(|b| {
                b.status == booking::Status::Pending && b.created_at < deadline
            })
            .map(|b| b.id)
            .collect()
    }

    /// Selects a page of [`Booking`]s, newest first.
    fn page(
        &self,
        selector: &read::booking::list::Selector,
    ) -> read::booking::list::Page {
        let mut all = self
            .bookings
            .values()
            .filter(|b| {
                selector.filter.user_id.map_or(true, |u| b.user_id == u)
            })
            .collect::<Vec<_>>();
        all.sort_by_key(|b| {
            (cmp::Reverse(b.created_at), cmp::Reverse(Uuid::from(b.id)))
        });

        let start = selector
            .arguments
            .after
            .and_then(|cursor| {
                all.iter().position(|b| b.id == cursor).map(|i| i + 1)
            })
            .unwrap_or(0);

        let mut edges = Vec::new();
        let mut has_more = false;
        for b in all.into_iter().skip(start) {
            if edges.len() == selector.arguments.first {
                has_more = true;
                break;
            }
            edges.push((b.id, summary(b)));
        }
        read::booking::list::Page::new(edges, has_more)
    }

    /// Counts [`Booking`]s matching the provided filter.
    fn total(
        &self,
        filter: &read::booking::list::Filter,
    ) -> read::booking::list::TotalCount {
        let count = self
            .bookings
            .values()
            .filter(|b| filter.user_id.map_or(true, |u| b.user_id == u))
            .count();
        i32::try_from(count).expect("`Booking`s count overflow").into()
    }
}

/// Projects the provided [`Booking`] into its listing [`Summary`].
///
/// [`Summary`]: read::booking::Summary
fn summary(b: &Booking) -> read::booking::Summary {
    read::booking::Summary {
        id: b.id,
        code: b.code.clone(),
        room_id: b.room_id,
        check_in: b.check_in,
        check_out: b.check_out,
        status: b.status,
        total: b.quote.total,
        created_at: b.created_at,
    }
}

impl Database<Transact> for Inmem {
    type Ok = Tx;
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Transact) -> Result<Self::Ok, Self::Err> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        Ok(Tx { guard: Arc::new(Mutex::new(Some(guard))) })
    }
}

impl Database<Transact> for Tx {
    type Ok = Self;
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Transact) -> Result<Self::Ok, Self::Err> {
        Ok(self.clone())
    }
}

impl Database<Commit> for Tx {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Commit) -> Result<Self::Ok, Self::Err> {
        // Writes apply in place, so committing merely releases the lock.
        drop(self.guard.lock().await.take());
        Ok(())
    }
}

impl Database<Select<By<Option<Room>, room::Id>>> for Inmem {
    type Ok = Option<Room>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Room>, room::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self.state.lock().await.rooms.get(&id).cloned())
    }
}

impl Database<Select<By<Option<Booking>, booking::Id>>> for Inmem {
    type Ok = Option<Booking>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Booking>, booking::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self.state.lock().await.booking(id))
    }
}

impl Database<Select<By<claim::Taken, claim::Span>>> for Inmem {
    type Ok = claim::Taken;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<claim::Taken, claim::Span>>,
    ) -> Result<Self::Ok, Self::Err> {
        let span = by.into_inner();
        Ok(self.state.lock().await.taken(&span))
    }
}

impl Database<Select<By<Vec<booking::Id>, booking::CreationDateTime>>>
    for Inmem
{
    type Ok = Vec<booking::Id>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<booking::Id>, booking::CreationDateTime>>,
    ) -> Result<Self::Ok, Self::Err> {
        let deadline = by.into_inner();
        Ok(self.state.lock().await.stale_pending(deadline))
    }
}

impl
    Database<
        Select<By<read::booking::list::Page, read::booking::list::Selector>>,
    > for Inmem
{
    type Ok = read::booking::list::Page;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<read::booking::list::Page, read::booking::list::Selector>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let selector = by.into_inner();
        Ok(self.state.lock().await.page(&selector))
    }
}

impl
    Database<
        Select<
            By<read::booking::list::TotalCount, read::booking::list::Filter>,
        >,
    > for Inmem
{
    type Ok = read::booking::list::TotalCount;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<read::booking::list::TotalCount, read::booking::list::Filter>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let filter = by.into_inner();
        Ok(self.state.lock().await.total(&filter))
    }
}

impl Database<Lock<By<Room, room::Id>>> for Tx {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(_): Lock<By<Room, room::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // The transaction holds the whole-database lock already.
        Ok(())
    }
}

impl Database<Lock<By<Booking, booking::Id>>> for Tx {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(_): Lock<By<Booking, booking::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // The transaction holds the whole-database lock already.
        Ok(())
    }
}

impl Database<Select<By<Option<Booking>, booking::Id>>> for Tx {
    type Ok = Option<Booking>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Booking>, booking::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self.with(|state| state.booking(id)).await)
    }
}

impl Database<Select<By<claim::Taken, claim::Span>>> for Tx {
    type Ok = claim::Taken;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<claim::Taken, claim::Span>>,
    ) -> Result<Self::Ok, Self::Err> {
        let span = by.into_inner();
        Ok(self.with(|state| state.taken(&span)).await)
    }
}

impl Database<Insert<Booking>> for Tx {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(booking): Insert<Booking>,
    ) -> Result<Self::Ok, Self::Err> {
        self.with(|state| drop(state.bookings.insert(booking.id, booking)))
            .await;
        Ok(())
    }
}

impl Database<Insert<Vec<NightClaim>>> for Tx {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(claims): Insert<Vec<NightClaim>>,
    ) -> Result<Self::Ok, Self::Err> {
        self.with(|state| state.claims.extend(claims)).await;
        Ok(())
    }
}

impl Database<Update<booking::StatusChange>> for Tx {
    type Ok = bool;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(change): Update<booking::StatusChange>,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(self.with(|state| state.swap_status(&change)).await)
    }
}

impl Database<Delete<By<NightClaim, booking::Id>>> for Tx {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Delete(by): Delete<By<NightClaim, booking::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let booking_id = by.into_inner();
        self.with(|state| state.release(booking_id)).await;
        Ok(())
    }
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use common::operations::{By, Commit, Insert, Select, Transact};

    use crate::{
        domain::{booking, claim, room, NightClaim},
        infra::Database as _,
    };

    use super::Inmem;

    #[tokio::test]
    async fn transactions_run_one_at_a_time() {
        let db = Inmem::new();
        let tx = db.execute(Transact).await.unwrap();

        let contender = tokio::spawn({
            let db = db.clone();
            async move { db.execute(Transact).await.unwrap() }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!contender.is_finished());

        tx.execute(Commit).await.unwrap();
        drop(contender.await.unwrap());
    }

    #[tokio::test]
    async fn sums_claimed_units_per_night() {
        let room_id = room::Id::new();
        let first = booking::Id::new();
        let second = booking::Id::new();
        let db = Inmem::new();

        let tx = db.execute(Transact).await.unwrap();
        tx.execute(Insert(vec![
            NightClaim {
                room_id,
                night: "2030-01-01".parse().unwrap(),
                booking_id: first,
                units: 2,
            },
            NightClaim {
                room_id,
                night: "2030-01-01".parse().unwrap(),
                booking_id: second,
                units: 1,
            },
            NightClaim {
                room_id,
                night: "2030-01-02".parse().unwrap(),
                booking_id: first,
                units: 2,
            },
        ]))
        .await
        .unwrap();
        tx.execute(Commit).await.unwrap();

        let taken = db
            .execute(Select(By::new(claim::Span {
                room_id,
                check_in: "2030-01-01".parse().unwrap(),
                check_out: "2030-01-02".parse().unwrap(),
            })))
            .await
            .unwrap();

        assert_eq!(taken.get(&"2030-01-01".parse().unwrap()), Some(&3));
        assert!(!taken.contains_key(&"2030-01-02".parse().unwrap()));
    }
}
