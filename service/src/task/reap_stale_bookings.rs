//! [`ReapStaleBookings`] [`Task`].

use std::{convert::Infallible, error::Error, time};

use common::operations::{By, Perform, Select, Start};
use tokio::time::interval;
use tracerr::Traced;
use tracing as log;

use crate::{
    command::{cancel_booking, CancelBooking},
    domain::{booking, Booking},
    infra::{database, Database},
    Command, Service,
};

use super::Task;

/// Configuration for [`ReapStaleBookings`] [`Task`].
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Interval between sweeps.
    pub interval: time::Duration,

    /// Timeout after which a [`Pending`] [`Booking`] is considered abandoned.
    ///
    /// [`Pending`]: booking::Status::Pending
    pub timeout: time::Duration,
}

/// [`Task`] for sweeping [`Pending`] [`Booking`]s whose payment never
/// arrived, releasing the nights they hold.
///
/// [`Pending`]: booking::Status::Pending
#[derive(Clone, Copy, Debug)]
pub struct ReapStaleBookings<S> {
    /// [`Config`] of this [`Task`].
    config: Config,

    /// [`Service`] instance.
    service: S,
}

impl<Db> Task<Start<By<ReapStaleBookings<Self>, Config>>> for Service<Db>
where
    ReapStaleBookings<Service<Db>>:
        Task<Perform<()>, Ok = (), Err: Error> + Send + Sync + 'static,
    Self: Clone,
    Db: Sync,
{
    type Ok = ();
    type Err = Infallible;

    async fn execute(
        &self,
        Start(by): Start<By<ReapStaleBookings<Self>, Config>>,
    ) -> Result<Self::Ok, Self::Err> {
        let config = by.into_inner();
        let task = ReapStaleBookings {
            config,
            service: self.clone(),
        };

        let mut interval = interval(task.config.interval);
        loop {
            let _ = interval.tick().await;
            _ = task.execute(Perform(())).await.map_err(|e| {
                log::error!("`task::ReapStaleBookings` failed: {e}");
            });
        }
    }
}

impl<Db> Task<Perform<()>> for ReapStaleBookings<Service<Db>>
where
    Db: Database<
            Select<By<Vec<booking::Id>, booking::CreationDateTime>>,
            Ok = Vec<booking::Id>,
            Err = Traced<database::Error>,
        > + Sync,
    Service<Db>: Command<
        CancelBooking,
        Ok = Booking,
        Err = Traced<cancel_booking::ExecutionError>,
    >,
{
    type Ok = ();
    type Err = ExecutionError;

    async fn execute(&self, _: Perform<()>) -> Result<Self::Ok, Self::Err> {
        let deadline = booking::CreationDateTime::now() - self.config.timeout;
        let stale = self
            .service
            .database()
            .execute(Select(By::new(deadline)))
            .await
            .map_err(tracerr::map_from_and_wrap!())?;

        for booking_id in stale {
            // A settlement may slip in between the select and this sweep, in
            // which case the cancellation simply reports a conflict.
            _ = self
                .service
                .execute(CancelBooking { booking_id, user_id: None })
                .await
                .map(drop)
                .map_err(|e| {
                    log::warn!(
                        "failed to sweep stale `Booking(id: {booking_id})`: \
                         {e}",
                    );
                });
        }

        Ok(())
    }
}

/// Error of [`ReapStaleBookings`] execution.
pub type ExecutionError = Traced<database::Error>;

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use common::operations::{By, Perform, Select};

    use crate::{
        command::CreateBooking,
        domain::{booking, room, user, Booking, Room},
        gateway::{self, Gateway, Gateways},
        infra::{Database as _, Inmem},
        Config, Service, Task as _,
    };

    use super::ReapStaleBookings;

    fn service(timeout: Duration) -> Service<Inmem> {
        let vnpay = Gateway::Vnpay(gateway::Vnpay::new(gateway::vnpay::Config {
            tmn_code: "DEMO01".to_owned(),
            hash_secret: "hash-secret".to_owned(),
            payment_url: "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html"
                .to_owned(),
            return_url: "https://hotel.test/payments/vnpay/callback"
                .to_owned(),
        }));
        let config = Config {
            jwt_decoding_key: jsonwebtoken::DecodingKey::from_secret(
                b"test-secret",
            ),
            gateways: Gateways::new([vnpay]),
            reap_stale_bookings: super::Config {
                interval: Duration::from_secs(60),
                timeout,
            },
        };
        let room = Room {
            id: room::Id::default(),
            type_id: room::TypeId::default(),
            name: "Deluxe".parse().unwrap(),
            price: "1000000VND".parse().unwrap(),
            discount: "0".parse().unwrap(),
            max_guests: 2,
            units: 2,
            created_at: room::CreationDateTime::now(),
        };
        Service { config, database: Inmem::with_rooms([room]) }
    }

    async fn create(svc: &Service<Inmem>) -> booking::Id {
        let check_in = common::Date::today_utc().next().unwrap();
        let check_out = check_in.next().unwrap();
        svc.execute(CreateBooking {
            room_id: room::Id::default(),
            user_id: user::Id::new(),
            check_in,
            check_out,
            guests: 2,
            units: 1,
            gateway: gateway::Kind::Vnpay,
            billing: booking::billing::Contact {
                name: "Jane Roe".parse().unwrap(),
                email: "guest@example.com".parse().unwrap(),
                phone: "555-123-4567".parse().unwrap(),
                address: "1 Beach Road".parse().unwrap(),
                state: None,
                zip_code: None,
                country: "Vietnam".parse().unwrap(),
            },
            client_ip: "203.0.113.7".parse().unwrap(),
        })
        .await
        .unwrap()
        .booking
        .id
    }

    async fn stored(svc: &Service<Inmem>, id: booking::Id) -> Booking {
        svc.database()
            .execute(Select(By::<Option<Booking>, _>::new(id)))
            .await
            .unwrap()
            .unwrap()
    }

    fn reaper(svc: &Service<Inmem>) -> ReapStaleBookings<Service<Inmem>> {
        ReapStaleBookings {
            config: svc.config().reap_stale_bookings,
            service: svc.clone(),
        }
    }

    #[tokio::test]
    async fn sweeps_abandoned_pending_bookings() {
        let svc = service(Duration::ZERO);
        let id = create(&svc).await;

        // Lets the sweep deadline pass the creation timestamp.
        tokio::time::sleep(Duration::from_millis(2)).await;
        reaper(&svc).execute(Perform(())).await.unwrap();

        assert_eq!(stored(&svc, id).await.status, booking::Status::Cancelled);
    }

    #[tokio::test]
    async fn keeps_fresh_pending_bookings() {
        let svc = service(Duration::from_secs(1800));
        let id = create(&svc).await;

        reaper(&svc).execute(Perform(())).await.unwrap();

        assert_eq!(stored(&svc, id).await.status, booking::Status::Pending);
    }
}
