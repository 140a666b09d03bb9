//! [`Command`] for authorizing a guest [`Session`].

use derive_more::{Display, Error, From};
use jsonwebtoken::Validation;
use tracerr::Traced;

use crate::{
    domain::user::{self, Session},
    Service,
};

use super::Command;

/// [`Command`] for authorizing a guest [`Session`].
///
/// Guest accounts live in an external identity provider, so the [`Token`]
/// itself is the only thing verified here.
///
/// [`Token`]: user::Token
#[derive(Clone, Debug, From)]
pub struct AuthorizeSession {
    /// [`Session`] token to authorize.
    pub token: user::Token,
}

impl<Db: Sync> Command<AuthorizeSession> for Service<Db> {
    type Ok = Session;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: AuthorizeSession,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let AuthorizeSession { token } = cmd;

        jsonwebtoken::decode::<Session>(
            token.as_ref(),
            &self.config.jwt_decoding_key,
            &Validation::default(),
        )
        .map_err(tracerr::from_and_wrap!(=> E))
        .map(|data| data.claims)
    }
}

/// Error of [`AuthorizeSession`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`jsonwebtoken`] decoding error.
    #[display("Failed to decode a JSON Web Token: {_0}")]
    JsonWebTokenDecodeError(jsonwebtoken::errors::Error),
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use jsonwebtoken::{DecodingKey, EncodingKey, Header};

    use crate::{
        domain::user::{self, Session},
        gateway::Gateways,
        infra::Inmem,
        task, Config, Service,
    };

    use super::{AuthorizeSession, Command as _, ExecutionError};

    const SECRET: &[u8] = b"test-secret";

    fn service() -> Service<Inmem> {
        let config = Config {
            jwt_decoding_key: DecodingKey::from_secret(SECRET),
            gateways: Gateways::default(),
            reap_stale_bookings: task::reap_stale_bookings::Config {
                interval: Duration::from_secs(60),
                timeout: Duration::from_secs(1800),
            },
        };
        Service { config, database: Inmem::new() }
    }

    fn token(session: &Session, secret: &[u8]) -> user::Token {
        let encoded = jsonwebtoken::encode(
            &Header::default(),
            session,
            &EncodingKey::from_secret(secret),
        )
        .unwrap();
        encoded.parse().unwrap()
    }

    #[tokio::test]
    async fn authorizes_valid_token() {
        let svc = service();
        let session = Session {
            user_id: user::Id::new(),
            expires_at: user::ExpirationDateTime::now()
                + Duration::from_secs(3600),
        };

        let authorized = svc
            .execute(AuthorizeSession { token: token(&session, SECRET) })
            .await
            .unwrap();

        assert_eq!(authorized.user_id, session.user_id);
    }

    #[tokio::test]
    async fn rejects_foreign_signature() {
        let svc = service();
        let session = Session {
            user_id: user::Id::new(),
            expires_at: user::ExpirationDateTime::now()
                + Duration::from_secs(3600),
        };

        let err = svc
            .execute(AuthorizeSession {
                token: token(&session, b"other-secret"),
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::JsonWebTokenDecodeError(_),
        ));
    }

    #[tokio::test]
    async fn rejects_expired_token() {
        let svc = service();
        let session = Session {
            user_id: user::Id::new(),
            expires_at: user::ExpirationDateTime::now()
                - Duration::from_secs(3600),
        };

        let err = svc
            .execute(AuthorizeSession { token: token(&session, SECRET) })
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::JsonWebTokenDecodeError(_),
        ));
    }
}
