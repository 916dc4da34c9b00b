use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::future::join_all;
use tokio::{net::TcpListener, sync::broadcast};

use crate::{
    connection::Connection,
    error::ServerError,
    internal,
    policy::Policy,
    Signal,
};

/// Accept loop. Binds where the policy says and runs one [`Connection`]
/// task per client until told to shut down, then waits for live sessions
/// to finish.
pub struct Server {
    policy: Arc<dyn Policy>,
}

impl Server {
    pub fn new(policy: impl Policy + 'static) -> Self {
        Self {
            policy: Arc::new(policy),
        }
    }

    #[must_use]
    pub fn with_policy(policy: Arc<dyn Policy>) -> Self {
        Self { policy }
    }

    /// Serves until the shutdown broadcast fires.
    ///
    /// # Errors
    /// Returns [`ServerError`] if the listen socket cannot be bound or an
    /// accept fails.
    pub async fn serve(self, mut shutdown: broadcast::Receiver<Signal>) -> Result<(), ServerError> {
        let address = SocketAddr::new(self.policy.ip_address(), self.policy.port_number());

        let listener = TcpListener::bind(address)
            .await
            .map_err(|source| ServerError::BindFailed {
                address: address.to_string(),
                source,
            })?;

        internal!(level = INFO, "Listening on {address}");

        let mut sessions = Vec::new();

        loop {
            tokio::select! {
                sig = shutdown.recv() => {
                    if matches!(sig, Ok(Signal::Shutdown) | Err(_)) {
                        internal!(level = INFO, "Shutdown received, finishing {} open sessions ...", sessions.len());
                        join_all(sessions).await;
                        break;
                    }
                }

                connection = listener.accept() => {
                    let (stream, peer) = connection?;
                    let connection = Connection::new(
                        stream,
                        peer,
                        Arc::clone(&self.policy),
                        shutdown.resubscribe(),
                    );

                    sessions.push(tokio::spawn(connection.run()));
                }
            }
        }

        Ok(())
    }
}
