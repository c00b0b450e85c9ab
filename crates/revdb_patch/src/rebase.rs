//! Rebasing a pending patch over patches applied since it was computed.

use crate::op::{Patch, PatchOp};
use crate::pointer::Pointer;

/// Transforms `pending`, computed against an older base, so that it applies
/// to a base that already has every patch in `applied` applied, in order.
///
/// The transformation is positional and conservative:
///
/// - Array inserts and removals in `applied` shift the indices of pending
///   edits on the same array.
/// - Pending edits inside a value that an applied edit removed or rewrote
///   wholesale are dropped.
/// - A pending edit on exactly the location an applied edit wrote is kept,
///   so the later writer wins.
/// - Edits on disjoint paths pass through unchanged.
///
/// A path token counts as an array index when it is `-` or all digits.
#[must_use]
pub fn rebase(applied: &[Patch], pending: &Patch) -> Patch {
    let mut ops: Vec<PatchOp> = pending.iter().cloned().collect();
    for patch in applied {
        for done in patch {
            ops = ops
                .into_iter()
                .filter_map(|op| transform(done, op))
                .collect();
        }
    }
    ops.into()
}

fn transform(done: &PatchOp, mut op: PatchOp) -> Option<PatchOp> {
    let at = done.path();
    let (Some(parent), Some(last)) = (at.parent(), at.last()) else {
        // The whole document was rewritten.
        return match done {
            PatchOp::Remove { .. } => None,
            _ if op.path().is_root() => Some(op),
            _ => None,
        };
    };

    match (done, index_token(last)) {
        (PatchOp::Add { .. }, Some(ArrayIndex::At(index))) => {
            shift(&mut op, &parent, |current| (current >= index).then(|| current + 1));
            Some(op)
        }
        (PatchOp::Add { .. }, Some(ArrayIndex::End)) => Some(op),
        (PatchOp::Remove { .. }, Some(ArrayIndex::At(index))) => {
            if op.path().is_beneath(at) {
                return None;
            }
            if op.path() == at {
                return match op {
                    add @ PatchOp::Add { .. } => Some(add),
                    _ => None,
                };
            }
            shift(&mut op, &parent, |current| {
                (current > index).then(|| current - 1)
            });
            Some(op)
        }
        (PatchOp::Remove { .. }, _) => {
            if op.path().is_beneath(at) {
                return None;
            }
            if op.path() != at {
                return Some(op);
            }
            match op {
                PatchOp::Remove { .. } => None,
                PatchOp::Replace { path, value } => Some(PatchOp::Add { path, value }),
                add @ PatchOp::Add { .. } => Some(add),
            }
        }
        _ => (!op.path().is_beneath(at)).then_some(op),
    }
}

enum ArrayIndex {
    At(usize),
    End,
}

fn index_token(token: &str) -> Option<ArrayIndex> {
    if token == "-" {
        return Some(ArrayIndex::End);
    }
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok().map(ArrayIndex::At)
}

/// Rewrites the array index `op` uses directly beneath `array`, if any.
fn shift(op: &mut PatchOp, array: &Pointer, adjust: impl Fn(usize) -> Option<usize>) {
    let position = array.len();
    let path = op.path();
    if !path.is_beneath(array) {
        return;
    }
    let Some(ArrayIndex::At(current)) = index_token(&path.tokens()[position]) else {
        return;
    };
    if let Some(next) = adjust(current) {
        op.path_mut().set_token(position, next.to_string());
    }
}
