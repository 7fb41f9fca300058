//! Transport seams: the connection handle and the connector that creates them.
//!
//! The manager never speaks a wire protocol itself. It drives connections
//! through these traits and treats every handle as replaceable.

use crate::error::TransportError;
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use tower::{Service, ServiceExt};

/// Opaque, server-issued identifier of a circuit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CircuitId(Arc<str>);

impl CircuitId {
    /// Wraps a server-issued token.
    pub fn new(token: impl Into<Arc<str>>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CircuitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CircuitId {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

impl From<String> for CircuitId {
    fn from(token: String) -> Self {
        Self::new(token)
    }
}

/// A duplex channel to the circuit host.
pub trait Connection: Send + 'static {
    /// Whether the channel is currently open.
    fn is_open(&self) -> bool;

    /// (Re)starts a channel that is not open.
    fn start(&mut self) -> BoxFuture<'_, Result<(), TransportError>>;

    /// Asks the host to reattach `circuit` to this channel.
    ///
    /// `Ok(false)` means the host no longer knows the circuit: its state was
    /// discarded and cannot be resumed.
    fn resume_circuit<'a>(
        &'a mut self,
        circuit: &'a CircuitId,
    ) -> BoxFuture<'a, Result<bool, TransportError>>;

    /// Closes the channel.
    fn close(&mut self) -> BoxFuture<'_, ()>;

    /// Resolves once the channel has closed, with the cause if there was one.
    ///
    /// The returned future must not borrow the handle; the manager watches it
    /// while it keeps using the connection.
    fn closed(&self) -> BoxFuture<'static, Option<TransportError>>;
}

/// Establishes new, started connections.
pub trait Connector: Send + Sync + 'static {
    /// The connection type produced.
    type Connection: Connection;

    /// Opens a new channel for `circuit`.
    fn connect<'a>(
        &'a self,
        circuit: &'a CircuitId,
    ) -> BoxFuture<'a, Result<Self::Connection, TransportError>>;
}

/// Adapts a `tower::Service<CircuitId>` that yields connections into a
/// [`Connector`].
///
/// # Examples
///
/// ```
/// use circuit_resilience_reconnect::{CircuitId, ServiceConnector, TransportError};
/// # use circuit_resilience_reconnect::Connection;
/// # use futures::future::{BoxFuture, FutureExt};
/// # struct Channel;
/// # impl Connection for Channel {
/// #     fn is_open(&self) -> bool { true }
/// #     fn start(&mut self) -> BoxFuture<'_, Result<(), TransportError>> { async { Ok(()) }.boxed() }
/// #     fn resume_circuit<'a>(&'a mut self, _: &'a CircuitId) -> BoxFuture<'a, Result<bool, TransportError>> { async { Ok(true) }.boxed() }
/// #     fn close(&mut self) -> BoxFuture<'_, ()> { async {}.boxed() }
/// #     fn closed(&self) -> BoxFuture<'static, Option<TransportError>> { futures::future::pending().boxed() }
/// # }
///
/// let connector = ServiceConnector::new(tower::service_fn(|_circuit: CircuitId| async {
///     Ok::<_, TransportError>(Channel)
/// }));
/// # let _ = connector;
/// ```
#[derive(Clone, Debug)]
pub struct ServiceConnector<S> {
    inner: S,
}

impl<S> ServiceConnector<S> {
    /// Wraps a connection-producing service.
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    /// Returns a reference to the wrapped service.
    pub fn get_ref(&self) -> &S {
        &self.inner
    }
}

impl<S> Connector for ServiceConnector<S>
where
    S: Service<CircuitId, Error = TransportError> + Clone + Send + Sync + 'static,
    S::Response: Connection,
    S::Future: Send,
{
    type Connection = S::Response;

    fn connect<'a>(
        &'a self,
        circuit: &'a CircuitId,
    ) -> BoxFuture<'a, Result<Self::Connection, TransportError>> {
        Box::pin(self.inner.clone().oneshot(circuit.clone()))
    }
}

/// Result of one attempt to get the circuit back.
pub(crate) enum AttemptOutcome<C> {
    /// A channel is up and the host reattached the circuit.
    Resumed(C),
    /// The host answered but no longer has the circuit.
    Rejected,
    /// The attempt failed before the host could answer.
    Failed(TransportError),
}

/// Tries to resume `circuit`, first on `existing` (if any), then on a fresh
/// connection from `connector`.
pub(crate) async fn attempt_resume<K: Connector>(
    connector: &K,
    circuit: &CircuitId,
    existing: Option<K::Connection>,
) -> AttemptOutcome<K::Connection> {
    let connection = match existing {
        Some(connection) if connection.is_open() => Some(connection),
        Some(mut connection) => match connection.start().await {
            Ok(()) => Some(connection),
            Err(_err) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(circuit = %circuit, error = %_err, "existing connection did not restart");
                None
            }
        },
        None => None,
    };

    let mut connection = match connection {
        Some(connection) => connection,
        None => match connector.connect(circuit).await {
            Ok(connection) => connection,
            Err(err) => return AttemptOutcome::Failed(err),
        },
    };

    match connection.resume_circuit(circuit).await {
        Ok(true) => AttemptOutcome::Resumed(connection),
        Ok(false) => {
            connection.close().await;
            AttemptOutcome::Rejected
        }
        Err(err) => {
            connection.close().await;
            AttemptOutcome::Failed(err)
        }
    }
}
