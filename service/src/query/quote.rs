//! [`QuoteStay`] query definition.

use common::{
    operations::{By, Select},
    Date,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{pricing::Quote, room, stay, Room, Stay},
    infra::{database, Database},
    Service,
};

use super::Query;

/// [`Query`] pricing a prospective [`Stay`] in a [`Room`], without reserving
/// anything.
#[derive(Clone, Copy, Debug)]
pub struct QuoteStay {
    /// ID of the [`Room`] to price the [`Stay`] in.
    pub room_id: room::Id,

    /// Desired arrival date.
    pub check_in: Date,

    /// Desired departure date.
    pub check_out: Date,

    /// Number of guests to accommodate.
    pub guests: stay::Guests,

    /// Number of [`Room`] units to occupy.
    pub units: room::Units,
}

impl<Db> Query<QuoteStay> for Service<Db>
where
    Db: Database<
            Select<By<Option<Room>, room::Id>>,
            Ok = Option<Room>,
            Err = Traced<database::Error>,
        > + Sync,
{
    type Ok = Quote;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, query: QuoteStay) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let QuoteStay { room_id, check_in, check_out, guests, units } = query;

        let stay = Stay::new(check_in, check_out, guests, units)
            .map_err(tracerr::from_and_wrap!(=> E))?;

        let room = self
            .database()
            .execute(Select(By::new(room_id)))
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

        Ok(Quote::calculate(&room, &stay))
    }
}

/// Error of [`QuoteStay`] [`Query`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// Requested [`Stay`] is not bookable.
    #[display("invalid stay: {_0}")]
    #[from]
    InvalidStay(stay::InvalidStayError),

    /// [`Room`] with the provided ID does not exist.
    #[display("`Room(id: {_0})` does not exist")]
    RoomNotExists(#[error(not(source))] room::Id),

    /// [`Room`] cannot accommodate the requested number of guests.
    #[display(
        "`Room(id: {room_id})` cannot accommodate `{guests}` guest(s) in \
         `{units}` unit(s)"
    )]
    TooManyGuests {
        /// ID of the overcrowded [`Room`].
        room_id: room::Id,

        /// Requested number of guests.
        guests: stay::Guests,

        /// Requested number of [`Room`] units.
        units: room::Units,
    },
}
