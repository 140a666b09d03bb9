//! [`Command`] for creating a new [`Booking`].

use std::net::IpAddr;

use common::{
    operations::{
        By, Commit, Delete, Insert, Lock, Select, Transact, Transacted, Update,
    },
    Date,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        booking::{self, billing},
        claim, room, stay, user, Booking, NightClaim, Quote, Room, Stay,
    },
    gateway,
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for creating a new [`Booking`].
///
/// The created [`Booking`] starts out [`Pending`] with its nights claimed,
/// and carries a [`PaymentRequest`] for the guest to complete.
///
/// [`PaymentRequest`]: gateway::PaymentRequest
/// [`Pending`]: booking::Status::Pending
#[derive(Clone, Debug)]
pub struct CreateBooking {
    /// ID of the [`Room`] to book.
    pub room_id: room::Id,

    /// ID of the guest making the [`Booking`].
    pub user_id: user::Id,

    /// [`Date`] of the first night.
    pub check_in: Date,

    /// [`Date`] of departure.
    pub check_out: Date,

    /// Number of guests staying.
    pub guests: stay::Guests,

    /// Number of [`Room`] units to book.
    pub units: room::Units,

    /// Payment provider to pay through.
    pub gateway: gateway::Kind,

    /// Billing [`Contact`] of the guest.
    ///
    /// [`Contact`]: billing::Contact
    pub billing: billing::Contact,

    /// IP address of the guest, as some providers require it in the payment
    /// request.
    pub client_ip: IpAddr,
}

/// [`Booking`] created by a [`CreateBooking`] [`Command`], along with the
/// [`PaymentRequest`] to complete it.
///
/// [`PaymentRequest`]: gateway::PaymentRequest
#[derive(Clone, Debug)]
pub struct CreatedBooking {
    /// Created [`Booking`].
    pub booking: Booking,

    /// [`PaymentRequest`] created on the provider side.
    ///
    /// [`PaymentRequest`]: gateway::PaymentRequest
    pub payment: gateway::PaymentRequest,
}

impl<Db> Command<CreateBooking> for Service<Db>
where
    Db: Database<Transact, Err = Traced<database::Error>>
        + Database<
            Select<By<Option<Room>, room::Id>>,
            Ok = Option<Room>,
            Err = Traced<database::Error>,
        > + Sync,
    Transacted<Db>: Database<
            Lock<By<Room, room::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<claim::Taken, claim::Span>>,
            Ok = claim::Taken,
            Err = Traced<database::Error>,
        > + Database<Insert<Booking>, Err = Traced<database::Error>>
        + Database<Insert<Vec<NightClaim>>, Err = Traced<database::Error>>
        + Database<
            Update<booking::StatusChange>,
            Ok = bool,
            Err = Traced<database::Error>,
        > + Database<
            Delete<By<NightClaim, booking::Id>>,
            Err = Traced<database::Error>,
        > + Database<Commit, Err = Traced<database::Error>>
        + Send,
{
    type Ok = CreatedBooking;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: CreateBooking) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CreateBooking {
            room_id,
            user_id,
            check_in,
            check_out,
            guests,
            units,
            gateway,
            billing,
            client_ip,
        } = cmd;

        let gw = self
            .config
            .gateways
            .get(gateway)
            .ok_or(E::GatewayNotConfigured(gateway))
            .map_err(tracerr::wrap!())?;

        let stay = Stay::new(check_in, check_out, guests, units)
            .map_err(tracerr::from_and_wrap!(=> E))?;

        let room = self
            .database()
            .execute(Select(By::<Option<Room>, _>::new(room_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::RoomNotExists(room_id))
            .map_err(tracerr::wrap!())?;
        if !room.accommodates(stay.guests, stay.units) {
            return Err(tracerr::new!(E::TooManyGuests {
                room_id,
                guests: stay.guests,
                units: stay.units,
            }));
        }

        let booking = Booking {
            id: booking::Id::new(),
            code: booking::Code::generate(),
            room_id: room.id,
            user_id,
            check_in: stay.check_in,
            check_out: stay.check_out,
            guests: stay.guests,
            units: stay.units,
            quote: Quote::calculate(&room, &stay),
            gateway,
            provider_txn_id: None,
            status: booking::Status::Pending,
            billing,
            created_at: booking::CreationDateTime::now(),
        };

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Avoid concurrent claims upon the same `Room`.
        tx.execute(Lock(By::new(room.id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let taken = tx
            .execute(Select(By::new(claim::Span::of(room.id, &stay))))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        for night in stay.nights_iter() {
            let held = taken.get(&night).copied().unwrap_or(0);
            if held.saturating_add(stay.units) > room.units {
                // Dropping the uncommitted `tx` releases the lock and rolls
                // everything back.
                return Err(tracerr::new!(E::NoVacancy { date: night }));
            }
        }

        tx.execute(Insert(booking.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Insert(NightClaim::for_stay(room.id, booking.id, &stay)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        // The `Booking` must be visible before the provider learns about it,
        // since a callback may arrive at any moment afterwards.
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        match gw.create(&booking, client_ip).await {
            Ok(payment) => Ok(CreatedBooking { booking, payment }),
            Err(e) => {
                self.release_unpayable(booking.id).await?;
                Err(e).map_err(tracerr::map_from_and_wrap!(=> E))
            }
        }
    }
}

impl<Db> Service<Db>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Update<booking::StatusChange>,
            Ok = bool,
            Err = Traced<database::Error>,
        > + Database<
            Delete<By<NightClaim, booking::Id>>,
            Err = Traced<database::Error>,
        > + Database<Commit, Err = Traced<database::Error>>,
{
    /// Fails the provided [`Pending`] [`Booking`] and releases its
    /// [`NightClaim`]s, once no payment can ever arrive for it.
    ///
    /// [`Pending`]: booking::Status::Pending
    async fn release_unpayable(
        &self,
        id: booking::Id,
    ) -> Result<(), Traced<ExecutionError>> {
        use ExecutionError as E;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let failed = tx
            .execute(Update(booking::StatusChange {
                id,
                from: booking::Status::Pending,
                to: booking::Status::Failed,
                provider_txn_id: None,
            }))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if failed {
            tx.execute(Delete(By::new(id)))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;
        }

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)
    }
}

/// Error of [`CreateBooking`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// Requested stay is not a valid one.
    #[display("invalid stay: {_0}")]
    #[from]
    InvalidStay(stay::InvalidStayError),

    /// [`Room`] with the provided ID does not exist.
    #[display("`Room(id: {_0})` does not exist")]
    RoomNotExists(#[error(not(source))] room::Id),

    /// Requested number of guests doesn't fit into the requested number of
    /// [`Room`] units.
    #[display(
        "`{guests}` guests don't fit into `{units}` units of \
         `Room(id: {room_id})`"
    )]
    TooManyGuests {
        /// ID of the requested [`Room`].
        room_id: room::Id,

        /// Requested number of guests.
        guests: stay::Guests,

        /// Requested number of [`Room`] units.
        units: room::Units,
    },

    /// Not enough free [`Room`] units are left for a night of the requested
    /// stay.
    #[display("no free units left for night `{date}`")]
    NoVacancy {
        /// Night missing free [`Room`] units.
        date: Date,
    },

    /// Requested payment provider is not configured.
    #[display("payment gateway `{_0}` is not configured")]
    GatewayNotConfigured(#[error(not(source))] gateway::Kind),

    /// Payment provider failed to create a payment request.
    #[display("payment gateway failed: {_0}")]
    #[from]
    Gateway(gateway::CreateError),
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use common::operations::{By, Select};

    use crate::{
        domain::{booking, room, user, Room},
        gateway::{self, Gateway, Gateways, PaymentRequest},
        infra::{Database as _, Inmem},
        task, Config, Service,
    };

    use super::{Command as _, CreateBooking, ExecutionError};

    fn vnpay() -> Gateway {
        Gateway::Vnpay(gateway::Vnpay::new(gateway::vnpay::Config {
            tmn_code: "DEMO01".to_owned(),
            hash_secret: "hash-secret".to_owned(),
            payment_url: "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html"
                .to_owned(),
            return_url: "https://hotel.test/payments/vnpay/callback"
                .to_owned(),
        }))
    }

    fn unreachable_razorpay() -> Gateway {
        Gateway::Razorpay(gateway::Razorpay::new(gateway::razorpay::Config {
            key_id: "rzp_test".to_owned(),
            key_secret: "secret".to_owned(),
            // Discard port, so every request fails fast.
            api_url: "http://127.0.0.1:9".to_owned(),
            timeout: Duration::from_secs(1),
        }))
    }

    fn service(gateways: Gateways) -> Service<Inmem> {
        let config = Config {
            jwt_decoding_key: jsonwebtoken::DecodingKey::from_secret(
                b"test-secret",
            ),
            gateways,
            reap_stale_bookings: task::reap_stale_bookings::Config {
                interval: Duration::from_secs(60),
                timeout: Duration::from_secs(1800),
            },
        };
        Service { config, database: Inmem::with_rooms([room()]) }
    }

    fn room() -> Room {
        Room {
            id: room::Id::default(),
            type_id: room::TypeId::default(),
            name: "Deluxe".parse().unwrap(),
            price: "1000000VND".parse().unwrap(),
            discount: "10".parse().unwrap(),
            max_guests: 2,
            units: 2,
            created_at: room::CreationDateTime::now(),
        }
    }

    fn cmd() -> CreateBooking {
        let check_in = common::Date::today_utc().next().unwrap();
        let check_out = check_in.next().unwrap().next().unwrap();
        CreateBooking {
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
        }
    }

    async fn stored(svc: &Service<Inmem>, id: booking::Id) -> booking::Booking {
        svc.database()
            .execute(Select(By::<Option<booking::Booking>, _>::new(id)))
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn creates_pending_booking_with_redirect() {
        let svc = service(Gateways::new([vnpay()]));

        let created = svc.execute(cmd()).await.unwrap();

        assert_eq!(created.booking.status, booking::Status::Pending);
        assert_eq!(created.booking.quote.nights, 2);
        assert_eq!(
            created.booking.quote.total,
            "1800000VND".parse().unwrap(),
        );
        assert!(matches!(
            created.payment,
            PaymentRequest::Redirect { .. },
        ));

        let persisted = stored(&svc, created.booking.id).await;
        assert_eq!(persisted.status, booking::Status::Pending);
        assert_eq!(persisted.code, created.booking.code);
    }

    #[tokio::test]
    async fn claims_cap_concurrent_bookings() {
        let svc = service(Gateways::new([vnpay()]));

        // The `Room` has 2 units, so two single-unit bookings fit.
        drop(svc.execute(cmd()).await.unwrap());
        drop(svc.execute(cmd()).await.unwrap());

        let err = svc.execute(cmd()).await.unwrap_err();
        assert!(matches!(
            err.as_ref(),
            ExecutionError::NoVacancy { .. },
        ));
    }

    #[tokio::test]
    async fn rejects_overlapping_nights_only() {
        let svc = service(Gateways::new([vnpay()]));

        drop(svc.execute(CreateBooking { units: 2, ..cmd() }).await.unwrap());

        // Same room, but starting the night the first stay departs.
        let check_in = cmd().check_out;
        let check_out = check_in.next().unwrap();
        assert!(svc
            .execute(CreateBooking {
                check_in,
                check_out,
                ..cmd()
            })
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn rejects_unknown_room() {
        let svc = service(Gateways::new([vnpay()]));

        let err = svc
            .execute(CreateBooking { room_id: room::Id::new(), ..cmd() })
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::RoomNotExists(_),
        ));
    }

    #[tokio::test]
    async fn rejects_too_many_guests() {
        let svc = service(Gateways::new([vnpay()]));

        let err = svc
            .execute(CreateBooking { guests: 5, units: 2, ..cmd() })
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::TooManyGuests { guests: 5, .. },
        ));
    }

    #[tokio::test]
    async fn rejects_unconfigured_gateway() {
        let svc = service(Gateways::new([vnpay()]));

        let err = svc
            .execute(CreateBooking {
                gateway: gateway::Kind::Stripe,
                ..cmd()
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::GatewayNotConfigured(gateway::Kind::Stripe),
        ));
    }

    #[tokio::test]
    async fn releases_nights_when_provider_fails() {
        let svc = service(Gateways::new([vnpay(), unreachable_razorpay()]));

        let err = svc
            .execute(CreateBooking {
                gateway: gateway::Kind::Razorpay,
                units: 2,
                ..cmd()
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::Gateway(_)));

        // The failed attempt must not consume any units.
        assert!(svc
            .execute(CreateBooking { units: 2, ..cmd() })
            .await
            .is_ok());
    }
}
