//! Changefeed channel between a store and one subscriber.
//!
//! A changefeed is a bounded [`tokio::sync::mpsc`] channel. The store holds
//! the [`ChangefeedSink`] in a producer task; the subscriber holds the
//! [`Changefeed`]. Closing the consumer half is observed by the producer
//! through [`ChangefeedSink::cancelled`].

use tokio::sync::mpsc;

use crate::error::StoreResult;
use crate::query::Row;

/// A raw change to one row.
///
/// Inserts carry only `new_val`, deletes only `old_val`, replaces both.
/// For filtered feeds a side is omitted when the row is outside the view
/// on that side of the change.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawChange {
    /// Row before the change.
    pub old_val: Option<Row>,
    /// Row after the change.
    pub new_val: Option<Row>,
}

/// Creates a changefeed with room for `buffer` undelivered events.
#[must_use]
pub fn changefeed(buffer: usize) -> (ChangefeedSink, Changefeed) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    (
        ChangefeedSink { tx },
        Changefeed { rx, closed: false },
    )
}

/// Consumer half of a changefeed.
///
/// Dropping the feed closes it.
#[derive(Debug)]
pub struct Changefeed {
    rx: mpsc::Receiver<StoreResult<RawChange>>,
    closed: bool,
}

impl Changefeed {
    /// Waits for the next event.
    ///
    /// Returns `None` once the feed is closed or the producer has stopped.
    pub async fn next(&mut self) -> Option<StoreResult<RawChange>> {
        if self.closed {
            return None;
        }
        self.rx.recv().await
    }

    /// Closes the feed.
    ///
    /// Returns `true` the first time; later calls do nothing and return
    /// `false`. No event is delivered by [`next`](Self::next) after close,
    /// including events already buffered.
    pub fn close(&mut self) -> bool {
        if self.closed {
            return false;
        }
        self.closed = true;
        self.rx.close();
        true
    }

    /// Returns true once [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Producer half of a changefeed.
#[derive(Debug, Clone)]
pub struct ChangefeedSink {
    tx: mpsc::Sender<StoreResult<RawChange>>,
}

impl ChangefeedSink {
    /// Delivers an event, waiting for buffer space.
    ///
    /// Returns `false` if the consumer has closed or dropped the feed.
    pub async fn send(&self, event: StoreResult<RawChange>) -> bool {
        self.tx.send(event).await.is_ok()
    }

    /// Completes when the consumer closes or drops the feed.
    pub async fn cancelled(&self) {
        self.tx.closed().await;
    }

    /// Returns true if the consumer has closed or dropped the feed.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;

    #[tokio::test]
    async fn delivers_in_order() {
        let (sink, mut feed) = changefeed(4);
        assert!(sink.send(Ok(RawChange::default())).await);
        assert!(sink.send(Err(StoreError::Closed)).await);
        assert_eq!(feed.next().await, Some(Ok(RawChange::default())));
        assert_eq!(feed.next().await, Some(Err(StoreError::Closed)));
    }

    #[tokio::test]
    async fn close_is_exactly_once_and_stops_delivery() {
        let (sink, mut feed) = changefeed(4);
        assert!(sink.send(Ok(RawChange::default())).await);

        assert!(feed.close());
        assert!(!feed.close());
        assert!(feed.is_closed());
        assert_eq!(feed.next().await, None);

        assert!(sink.is_cancelled());
        assert!(!sink.send(Ok(RawChange::default())).await);
        sink.cancelled().await;
    }

    #[tokio::test]
    async fn drop_cancels_producer() {
        let (sink, feed) = changefeed(1);
        drop(feed);
        sink.cancelled().await;
        assert!(sink.is_cancelled());
    }

    #[tokio::test]
    async fn producer_drop_ends_feed() {
        let (sink, mut feed) = changefeed(1);
        drop(sink);
        assert_eq!(feed.next().await, None);
        assert!(!feed.is_closed());
    }
}
