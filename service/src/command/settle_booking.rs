//! [`Command`] for settling a [`Booking`] with a payment outcome.

use std::collections::BTreeMap;

use common::operations::{
    By, Commit, Delete, Lock, Select, Transact, Transacted, Update,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{booking, Booking, NightClaim},
    gateway,
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for settling a [`Booking`] with the payment outcome reported
/// by a provider callback.
///
/// The callback `params` are authenticated by the [`Gateway`] itself before
/// anything is read out of them, so spoofed or replayed callbacks can never
/// alter a [`Booking`] beyond what the provider actually reported.
///
/// [`Gateway`]: gateway::Gateway
#[derive(Clone, Debug)]
pub struct SettleBooking {
    /// Payment provider the callback claims to come from.
    pub gateway: gateway::Kind,

    /// Raw callback parameters, exactly as received.
    pub params: BTreeMap<String, String>,
}

impl<Db> Command<SettleBooking> for Service<Db>
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

    async fn execute(&self, cmd: SettleBooking) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let SettleBooking { gateway, params } = cmd;

        let callback = self
            .config
            .gateways
            .get(gateway)
            .ok_or(E::GatewayNotConfigured(gateway))
            .map_err(tracerr::wrap!())?
            .verify(&params)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Avoid concurrent settlements of the same `Booking`.
        tx.execute(Lock(By::new(callback.booking_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let mut booking = tx
            .execute(Select(By::<Option<Booking>, _>::new(callback.booking_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::BookingNotExists(callback.booking_id))
            .map_err(tracerr::wrap!())?;

        match (booking.status, callback.succeeded) {
            (booking::Status::Pending, true) => {
                let txn = callback
                    .provider_txn_id
                    .ok_or(E::TxnIdMissing(booking.id))
                    .map_err(tracerr::wrap!())?;

                let swapped = tx
                    .execute(Update(booking::StatusChange {
                        id: booking.id,
                        from: booking::Status::Pending,
                        to: booking::Status::Paid,
                        provider_txn_id: Some(txn.clone()),
                    }))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))?;
                if !swapped {
                    return Err(tracerr::new!(E::StatusConflict {
                        id: booking.id,
                        status: booking.status,
                    }));
                }

                tx.execute(Commit)
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))
                    .map(drop)?;

                booking.status = booking::Status::Paid;
                booking.provider_txn_id = Some(txn);
                Ok(booking)
            }

            (booking::Status::Pending, false) => {
                let swapped = tx
                    .execute(Update(booking::StatusChange {
                        id: booking.id,
                        from: booking::Status::Pending,
                        to: booking::Status::Failed,
                        provider_txn_id: callback.provider_txn_id.clone(),
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

                booking.status = booking::Status::Failed;
                if callback.provider_txn_id.is_some() {
                    booking.provider_txn_id = callback.provider_txn_id;
                }
                Ok(booking)
            }

            (booking::Status::Paid, true) => {
                // Providers redeliver callbacks, so an exact replay confirms
                // the already settled payment.
                if booking.provider_txn_id == callback.provider_txn_id {
                    Ok(booking)
                } else {
                    Err(tracerr::new!(E::StatusConflict {
                        id: booking.id,
                        status: booking.status,
                    }))
                }
            }

            (booking::Status::Failed, false)
            | (booking::Status::Cancelled, false) => Ok(booking),

            (booking::Status::Paid, false)
            | (booking::Status::Failed, true)
            | (booking::Status::Cancelled, true) => {
                Err(tracerr::new!(E::StatusConflict {
                    id: booking.id,
                    status: booking.status,
                }))
            }
        }
    }
}

/// Error of [`SettleBooking`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// Callback failed authentication or decoding.
    #[display("callback verification failed: {_0}")]
    #[from]
    Gateway(gateway::VerifyError),

    /// Payment provider the callback claims to come from is not configured.
    #[display("payment gateway `{_0}` is not configured")]
    GatewayNotConfigured(#[error(not(source))] gateway::Kind),

    /// [`Booking`] the callback refers to does not exist.
    #[display("`Booking(id: {_0})` does not exist")]
    BookingNotExists(#[error(not(source))] booking::Id),

    /// Provider reported success without a transaction ID.
    #[display(
        "provider reported a successful payment for `Booking(id: {_0})` \
         without a transaction ID"
    )]
    TxnIdMissing(#[error(not(source))] booking::Id),

    /// Reported payment outcome contradicts the current [`Booking`] status.
    #[display(
        "`Booking(id: {id})` is `{status}` and cannot accept the reported \
         payment outcome"
    )]
    StatusConflict {
        /// ID of the [`Booking`].
        id: booking::Id,

        /// Status the [`Booking`] is in.
        status: booking::Status,
    },
}

#[cfg(test)]
mod spec {
    use std::{collections::BTreeMap, time::Duration};

    use common::operations::{By, Select};

    use crate::{
        command::CreateBooking,
        domain::{booking, room, user, Room},
        gateway::{self, sign, Gateway, Gateways},
        infra::{Database as _, Inmem},
        task, Config, Service,
    };

    use super::{Command as _, ExecutionError, SettleBooking};

    const HASH_SECRET: &str = "hash-secret";

    fn service() -> Service<Inmem> {
        let vnpay = Gateway::Vnpay(gateway::Vnpay::new(gateway::vnpay::Config {
            tmn_code: "DEMO01".to_owned(),
            hash_secret: HASH_SECRET.to_owned(),
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

    async fn create(svc: &Service<Inmem>, units: room::Units) -> booking::Id {
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
        .id
    }

    fn signed_params(
        booking_id: booking::Id,
        response_code: &str,
        txn_no: &str,
    ) -> BTreeMap<String, String> {
        let mut params = [
            ("vnp_TmnCode", "DEMO01".to_owned()),
            ("vnp_TxnRef", booking_id.to_string()),
            ("vnp_ResponseCode", response_code.to_owned()),
            ("vnp_TransactionNo", txn_no.to_owned()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v))
        .collect::<BTreeMap<_, _>>();

        let signature = sign::Codec::new(HASH_SECRET).sign(&params);
        _ = params.insert("vnp_SecureHash".to_owned(), signature);
        params
    }

    fn settle(
        booking_id: booking::Id,
        response_code: &str,
        txn_no: &str,
    ) -> SettleBooking {
        SettleBooking {
            gateway: gateway::Kind::Vnpay,
            params: signed_params(booking_id, response_code, txn_no),
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
    async fn settles_pending_booking_as_paid() {
        let svc = service();
        let id = create(&svc, 1).await;

        let settled =
            svc.execute(settle(id, "00", "14226112")).await.unwrap();

        assert_eq!(settled.status, booking::Status::Paid);
        assert_eq!(
            settled.provider_txn_id.as_ref().unwrap().to_string(),
            "14226112",
        );

        let persisted = stored(&svc, id).await;
        assert_eq!(persisted.status, booking::Status::Paid);
        assert!(persisted.provider_txn_id.is_some());
    }

    #[tokio::test]
    async fn replayed_callback_is_idempotent() {
        let svc = service();
        let id = create(&svc, 1).await;

        drop(svc.execute(settle(id, "00", "14226112")).await.unwrap());
        let replayed =
            svc.execute(settle(id, "00", "14226112")).await.unwrap();

        assert_eq!(replayed.status, booking::Status::Paid);
        assert_eq!(stored(&svc, id).await.status, booking::Status::Paid);
    }

    #[tokio::test]
    async fn second_payment_with_other_txn_conflicts() {
        let svc = service();
        let id = create(&svc, 1).await;

        drop(svc.execute(settle(id, "00", "14226112")).await.unwrap());
        let err =
            svc.execute(settle(id, "00", "99999999")).await.unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::StatusConflict { .. },
        ));
        // The original settlement must stay intact.
        assert_eq!(
            stored(&svc, id).await.provider_txn_id.unwrap().to_string(),
            "14226112",
        );
    }

    #[tokio::test]
    async fn failed_payment_releases_nights() {
        let svc = service();
        let id = create(&svc, 2).await;

        let failed = svc.execute(settle(id, "24", "0")).await.unwrap();
        assert_eq!(failed.status, booking::Status::Failed);

        // All units must be bookable again.
        drop(create(&svc, 2).await);
    }

    #[tokio::test]
    async fn failure_after_payment_conflicts() {
        let svc = service();
        let id = create(&svc, 1).await;

        drop(svc.execute(settle(id, "00", "14226112")).await.unwrap());
        let err = svc.execute(settle(id, "24", "0")).await.unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::StatusConflict {
                status: booking::Status::Paid,
                ..
            },
        ));
    }

    #[tokio::test]
    async fn success_without_txn_id_leaves_booking_pending() {
        let svc = service();
        let id = create(&svc, 1).await;

        let err = svc.execute(settle(id, "00", "0")).await.unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::TxnIdMissing(_)));
        assert_eq!(stored(&svc, id).await.status, booking::Status::Pending);
    }

    #[tokio::test]
    async fn unknown_booking_is_reported() {
        let svc = service();

        let err = svc
            .execute(settle(booking::Id::new(), "00", "14226112"))
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::BookingNotExists(_),
        ));
    }

    #[tokio::test]
    async fn tampered_callback_is_rejected() {
        let svc = service();
        let id = create(&svc, 1).await;

        let mut params = signed_params(id, "00", "14226112");
        _ = params.insert("vnp_ResponseCode".to_owned(), "24".to_owned());

        let err = svc
            .execute(SettleBooking {
                gateway: gateway::Kind::Vnpay,
                params,
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::Gateway(gateway::VerifyError::Signature),
        ));
        assert_eq!(stored(&svc, id).await.status, booking::Status::Pending);
    }

    #[tokio::test]
    async fn unconfigured_gateway_is_reported() {
        let svc = service();

        let err = svc
            .execute(SettleBooking {
                gateway: gateway::Kind::Paypal,
                params: BTreeMap::new(),
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::GatewayNotConfigured(gateway::Kind::Paypal),
        ));
    }
}
