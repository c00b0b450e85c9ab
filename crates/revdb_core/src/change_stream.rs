//! Translating raw store changefeeds into operation-shaped events.
//!
//! Two subscription modes share one [`Subscription`] type:
//!
//! - **Document mode** reads a document's operation log feed and yields
//!   each newly appended [`Operation`] as-is.
//! - **Query mode** reads the document table feed filtered by a query and
//!   synthesizes operations from row snapshots, since rows can enter or
//!   leave the view without a matching log entry:
//!
//! | raw change        | emitted                                        |
//! |-------------------|------------------------------------------------|
//! | old and new       | patch `diff(old, new)` at `old.version`        |
//! | new only          | created at version 0, with snapshot            |
//! | old only          | deleted at `old.version`                       |

use chrono::Utc;
use revdb_patch::diff;
use revdb_store::{Changefeed, RawChange};
use tracing::{debug, warn};

use crate::document::Document;
use crate::error::{CoreError, CoreResult};
use crate::operation::Operation;

/// One event on a subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    /// The operation, logged or synthesized.
    pub operation: Operation,
    /// The document after the change, for query-mode creations and patches.
    pub snapshot: Option<Document>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Operations,
    View,
}

/// A live, cancellable stream of [`ChangeEvent`]s.
///
/// Events for one document arrive in strictly increasing version order.
/// Store errors are yielded as `Err` items and the stream continues.
/// Dropping the subscription closes it.
#[derive(Debug)]
pub struct Subscription {
    feed: Changefeed,
    mode: Mode,
    source: String,
}

impl Subscription {
    pub(crate) fn operations(feed: Changefeed, source: String) -> Self {
        Self {
            feed,
            mode: Mode::Operations,
            source,
        }
    }

    pub(crate) fn view(feed: Changefeed, source: String) -> Self {
        Self {
            feed,
            mode: Mode::View,
            source,
        }
    }

    /// Waits for the next event.
    ///
    /// Returns `None` once the subscription is closed or the store ends
    /// the feed.
    pub async fn next(&mut self) -> Option<CoreResult<ChangeEvent>> {
        loop {
            let raw = match self.feed.next().await? {
                Ok(raw) => raw,
                Err(err) => {
                    warn!(source = %self.source, error = %err, "changefeed error");
                    return Some(Err(err.into()));
                }
            };
            let translated = match self.mode {
                Mode::Operations => translate_operation(&self.source, raw),
                Mode::View => translate_view(raw),
            };
            if let Some(event) = translated {
                return Some(event);
            }
        }
    }

    /// Closes the underlying changefeed.
    ///
    /// Returns `true` the first time. Nothing is delivered after close.
    pub fn close(&mut self) -> bool {
        let closed = self.feed.close();
        if closed {
            debug!(source = %self.source, "subscription closed");
        }
        closed
    }

    /// Returns true once [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.feed.is_closed()
    }
}

fn translate_operation(source: &str, raw: RawChange) -> Option<CoreResult<ChangeEvent>> {
    match raw {
        RawChange {
            old_val: None,
            new_val: Some(row),
        } => Some(Operation::from_row(row).map(|operation| ChangeEvent {
            operation,
            snapshot: None,
        })),
        other => {
            warn!(
                source,
                has_old = other.old_val.is_some(),
                has_new = other.new_val.is_some(),
                "ignoring non-insert change on operation log"
            );
            None
        }
    }
}

fn translate_view(raw: RawChange) -> Option<CoreResult<ChangeEvent>> {
    let event = match (raw.old_val.map(Document::from), raw.new_val.map(Document::from)) {
        (Some(old), Some(new)) => {
            let patch = diff(&old.to_value(), &new.to_value());
            synthesized(&old, |docid, version| {
                let when = new.modified().unwrap_or_else(Utc::now);
                Operation::patched(docid, version, when, None, patch)
            })
            .map(|operation| ChangeEvent {
                operation,
                snapshot: Some(new),
            })
        }
        (None, Some(new)) => synthesized(&new, |docid, _| {
            let when = new.created().unwrap_or_else(Utc::now);
            Operation::created(docid, when, None)
        })
        .map(|operation| ChangeEvent {
            operation,
            snapshot: Some(new),
        }),
        (Some(old), None) => synthesized(&old, |docid, version| {
            Operation::deleted(docid, version, Utc::now(), None)
        })
        .map(|operation| ChangeEvent {
            operation,
            snapshot: None,
        }),
        (None, None) => return None,
    };
    Some(event)
}

fn synthesized(
    document: &Document,
    build: impl FnOnce(&str, u64) -> Operation,
) -> CoreResult<Operation> {
    let id = document.id().ok_or(CoreError::MissingId)?;
    let version = document
        .version()
        .ok_or_else(|| CoreError::invalid_document(format!("document {id} has no version")))?;
    Ok(build(id, version))
}
