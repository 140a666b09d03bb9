//! [`Command`] for cancelling a [`Booking`].

use common::operations::{
    By, Commit, Delete, Lock, Select, Transact, Transacted, Update,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{booking, user, Booking, NightClaim},
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for cancelling a [`Pending`] [`Booking`], releasing its
/// claimed nights.
///
/// [`Pending`]: booking::Status::Pending
#[derive(Clone, Copy, Debug)]
pub struct CancelBooking {
    /// ID of the [`Booking`] to cancel.
    pub booking_id: booking::Id,

    /// ID of the guest requesting the cancellation.
    ///
    /// [`None`] means the system itself sweeps the [`Booking`], with no
    /// ownership check applied.
    pub user_id: Option<user::Id>,
}

impl<Db> Command<CancelBooking> for Service<Db>
where
    Db: Database<Transact, Err = Traced<database::Error>> + Sync,
    Transacted<Db>: Database<
            Lock<By<Booking, booking::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Booking>, booking::Id>>,
            Ok = Option<Booking>,
            Err = Traced<database::Error>,
        > + Database<
            Update<booking::StatusChange>,
            Ok = bool,
            Err = Traced<database::Error>,
        > + Database<
            Delete<By<NightClaim, booking::Id>>,
            Err = Traced<database::Error>,
        > + Database<Commit, Err = Traced<database::Error>>
        + Send,
{
    type Ok = Booking;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: CancelBooking) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CancelBooking { booking_id, user_id } = cmd;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Avoid racing a settlement of the same `Booking`.
        tx.execute(Lock(By::new(booking_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let mut booking = tx
            .execute(Select(By::<Option<Booking>, _>::new(booking_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::BookingNotExists(booking_id))
            .map_err(tracerr::wrap!())?;

        if let Some(user_id) = user_id {
            if booking.user_id != user_id {
                return Err(tracerr::new!(E::NotOwner {
                    id: booking_id,
                    user_id,
                }));
            }
        }

        match booking.status {
            booking::Status::Pending => {
                let swapped = tx
                    .execute(Update(booking::StatusChange {
                        id: booking.id,
                        from: booking::Status::Pending,
                        to: booking::Status::Cancelled,
                        provider_txn_id: None,
                    }))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))?;
                if !swapped {
                    return Err(tracerr::new!(E::StatusConflict {
                        id: booking.id,
                        status: booking.status,
                    }));
                }

                tx.execute(Delete(By::new(booking.id)))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))
                    .map(drop)?;

                tx.execute(Commit)
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))
                    .map(drop)?;

                booking.status = booking::Status::Cancelled;
                Ok(booking)
            }

            // Already cancelled, nothing to do.
            booking::Status::Cancelled => Ok(booking),

            booking::Status::Paid | booking::Status::Failed => {
                Err(tracerr::new!(E::StatusConflict {
                    id: booking.id,
                    status: booking.status,
                }))
            }
        }
    }
}

/// Error of [`CancelBooking`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Booking`] with the provided ID does not exist.
    #[display("`Booking(id: {_0})` does not exist")]
    BookingNotExists(#[error(not(source))] booking::Id),

    /// [`Booking`] doesn't belong to the guest requesting the cancellation.
    #[display("`Booking(id: {id})` doesn't belong to `User(id: {user_id})`")]
    NotOwner {
        /// ID of the [`Booking`].
        id: booking::Id,

        /// ID of the guest requesting the cancellation.
        user_id: user::Id,
    },

    /// [`Booking`] status forbids cancellation.
    #[display("`Booking(id: {id})` is `{status}` and cannot be cancelled")]
    StatusConflict {
        /// ID of the [`Booking`].
        id: booking::Id,

        /// Status the [`Booking`] is in.
        status: booking::Status,
    },
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use common::operations::{Commit, Transact, Update};

    use crate::{
        command::CreateBooking,
        domain::{booking, room, user, Booking, Room},
        gateway::{self, Gateway, Gateways},
        infra::{Database as _, Inmem},
        task, Config, Service,
    };

    use super::{CancelBooking, Command as _, ExecutionError};

    fn service() -> Service<Inmem> {
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
            reap_stale_bookings: task::reap_stale_bookings::Config {
                interval: Duration::from_secs(60),
                timeout: Duration::from_secs(1800),
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

    async fn create(svc: &Service<Inmem>, units: room::Units) -> Booking {
        let check_in = common::Date::today_utc().next().unwrap();
        let check_out = check_in.next().unwrap().next().unwrap();
        svc.execute(CreateBooking {
            room_id: room::Id::default(),
            user_id: user::Id::new(),
            check_in,
            check_out,
            guests: 2,
            units,
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
    }

    async fn mark_paid(svc: &Service<Inmem>, id: booking::Id) {
        let tx = svc.database().execute(Transact).await.unwrap();
        assert!(tx
            .execute(Update(booking::StatusChange {
                id,
                from: booking::Status::Pending,
                to: booking::Status::Paid,
                provider_txn_id: None,
            }))
            .await
            .unwrap());
        tx.execute(Commit).await.unwrap();
    }

    #[tokio::test]
    async fn cancels_pending_booking_and_releases_nights() {
        let svc = service();
        let booking = create(&svc, 2).await;

        let cancelled = svc
            .execute(CancelBooking {
                booking_id: booking.id,
                user_id: Some(booking.user_id),
            })
            .await
            .unwrap();
        assert_eq!(cancelled.status, booking::Status::Cancelled);

        // All units must be bookable again.
        drop(create(&svc, 2).await);
    }

    #[tokio::test]
    async fn repeated_cancellation_is_idempotent() {
        let svc = service();
        let booking = create(&svc, 1).await;
        let cmd = CancelBooking {
            booking_id: booking.id,
            user_id: Some(booking.user_id),
        };

        drop(svc.execute(cmd).await.unwrap());
        let again = svc.execute(cmd).await.unwrap();

        assert_eq!(again.status, booking::Status::Cancelled);
    }

    #[tokio::test]
    async fn rejects_foreign_guest() {
        let svc = service();
        let booking = create(&svc, 1).await;

        let err = svc
            .execute(CancelBooking {
                booking_id: booking.id,
                user_id: Some(user::Id::new()),
            })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::NotOwner { .. }));
    }

    #[tokio::test]
    async fn sweep_skips_ownership_check() {
        let svc = service();
        let booking = create(&svc, 1).await;

        let cancelled = svc
            .execute(CancelBooking {
                booking_id: booking.id,
                user_id: None,
            })
            .await
            .unwrap();

        assert_eq!(cancelled.status, booking::Status::Cancelled);
    }

    #[tokio::test]
    async fn paid_booking_cannot_be_cancelled() {
        let svc = service();
        let booking = create(&svc, 1).await;
        mark_paid(&svc, booking.id).await;

        let err = svc
            .execute(CancelBooking {
                booking_id: booking.id,
                user_id: Some(booking.user_id),
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::StatusConflict {
                status: booking::Status::Paid,
                ..
            },
        ));
    }

    #[tokio::test]
    async fn unknown_booking_is_reported() {
        let svc = service();

        let err = svc
            .execute(CancelBooking {
                booking_id: booking::Id::new(),
                user_id: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::BookingNotExists(_),
        ));
    }
}
