//! Live feeds: an initial result followed by the changes after it.

use revdb_core::{Applied, ChangeEvent, Document, ReplicaSet, Subscription};
use tracing::{debug, warn};

use crate::error::ServiceError;

/// One item on a [`LiveFeed`].
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceEvent {
    /// The state at subscription time. Always first, exactly once.
    Initial(Vec<Document>),
    /// A change not yet reflected in anything delivered before.
    Change(ChangeEvent),
    /// A failure on the underlying stream. The feed keeps going.
    Error {
        /// Status code.
        code: u16,
        /// What went wrong.
        message: String,
    },
}

impl From<ServiceError> for ServiceEvent {
    fn from(err: ServiceError) -> Self {
        Self::Error {
            code: err.code,
            message: err.message,
        }
    }
}

/// An initial snapshot plus a change stream, with no gap between them.
///
/// The subscription is opened before the initial read, so a change
/// landing between the two shows up in both. Replicas of the delivered
/// documents filter those out: only changes that move a document past
/// what the client has seen are delivered.
#[derive(Debug)]
pub struct LiveFeed {
    initial: Option<Vec<Document>>,
    replicas: ReplicaSet,
    subscription: Subscription,
}

impl LiveFeed {
    pub(crate) fn new(
        subscription: Subscription,
        initial: Vec<Document>,
        replicas: ReplicaSet,
    ) -> Self {
        Self {
            initial: Some(initial),
            replicas,
            subscription,
        }
    }

    /// Waits for the next event.
    ///
    /// Returns `None` once the feed is closed.
    pub async fn next(&mut self) -> Option<ServiceEvent> {
        if let Some(initial) = self.initial.take() {
            return Some(ServiceEvent::Initial(initial));
        }
        loop {
            let event = match self.subscription.next().await? {
                Ok(event) => event,
                Err(err) => return Some(ServiceError::from(err).into()),
            };
            match self.replicas.apply(&event) {
                Ok(Applied::Yes) => return Some(ServiceEvent::Change(event)),
                Ok(Applied::Stale) => {
                    debug!(
                        docid = %event.operation.docid,
                        version = event.operation.version,
                        "skipping change already delivered"
                    );
                }
                Err(err) => {
                    warn!(docid = %event.operation.docid, error = %err, "live feed out of step");
                    return Some(ServiceError::from(err).into());
                }
            }
        }
    }

    /// Documents as of the last delivered event.
    #[must_use]
    pub fn documents(&self) -> &ReplicaSet {
        &self.replicas
    }

    /// Stops the feed. Returns `true` the first time.
    pub fn close(&mut self) -> bool {
        self.subscription.close()
    }

    /// Returns true once closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.subscription.is_closed()
    }
}
