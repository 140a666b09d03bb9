//! Background environment for running [`Task`]s.

use std::{
    error::Error,
    future::{Future, IntoFuture},
};

use futures::{future::BoxFuture, FutureExt as _, TryFutureExt as _};
use tokio::task::JoinSet;

#[cfg(doc)]
use crate::Task;

/// Background environment for running [`Task`]s.
#[derive(Debug, Default)]
pub struct Background {
    /// Set of spawned tasks.
    set: JoinSet<Result<(), Box<dyn Error + Send + Sync + 'static>>>,
}

impl Background {
    /// Spawns a new [`Task`] inside the [`Background`] environment.
    pub fn spawn<F, E>(&mut self, future: F)
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: Error + Send + Sync + 'static,
    {
        _ = self
            .set
            .spawn(future.map_err(Box::<dyn Error + Send + Sync>::from));
    }
}

impl IntoFuture for Background {
    type Output = Result<(), Box<dyn Error + Send + Sync + 'static>>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        let Self { mut set } = self;
        async move {
            // Resolves only once every spawned task has finished, which for
            // periodic tasks means never, unless one of them fails.
            while let Some(joined) = set.join_next().await {
                match joined {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => return Err(e),
                    Err(e) => return Err(e.into()),
                }
            }
            Ok(())
        }
        .boxed()
    }
}

#[cfg(test)]
mod spec {
    use std::{io, time::Duration};

    use super::Background;

    #[tokio::test]
    async fn propagates_task_failure() {
        let mut bg = Background::default();
        bg.spawn(async { Err::<(), _>(io::Error::other("boom")) });

        assert!(bg.await.is_err());
    }

    #[tokio::test]
    async fn resolves_once_tasks_finish() {
        let mut bg = Background::default();
        bg.spawn(async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok::<_, io::Error>(())
        });

        assert!(bg.await.is_ok());
    }
}
