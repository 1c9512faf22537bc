//! Thread-local context stack
//!
//! `contextualize` pushes a map of extra fields for the current thread and
//! returns an RAII guard that pops it. Emission merges the engine's bound
//! context, then the stack bottom-up (innermost scope wins), then any
//! per-call extras on top.

use std::cell::RefCell;
use std::sync::Arc;

use super::record::{empty_extra, ExtraMap};

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<Arc<ExtraMap>>> = const { RefCell::new(Vec::new()) };
}

/// RAII guard for a scoped context frame. Dropping it removes the frame.
pub struct ContextGuard {
    _private: (),
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Push a context frame for the current thread.
pub(crate) fn push_frame(fields: ExtraMap) -> ContextGuard {
    CONTEXT_STACK.with(|stack| {
        stack.borrow_mut().push(Arc::new(fields));
    });
    ContextGuard { _private: () }
}

/// True when the current thread has no context frames. Lets the emission
/// path skip the merge entirely.
#[inline]
pub(crate) fn stack_is_empty() -> bool {
    CONTEXT_STACK.with(|stack| stack.borrow().is_empty())
}

/// Merge bound context, the thread-local stack and per-call extras into one
/// map. When only the bound context contributes, the existing `Arc` is
/// reused without copying.
pub(crate) fn merged_extra(bound: &Arc<ExtraMap>, call: Option<ExtraMap>) -> Arc<ExtraMap> {
    let stack_empty = stack_is_empty();
    let call_empty = call.as_ref().map_or(true, |c| c.is_empty());

    if stack_empty && call_empty {
        return if bound.is_empty() {
            empty_extra()
        } else {
            Arc::clone(bound)
        };
    }

    let mut merged: ExtraMap = (**bound).clone();
    if !stack_empty {
        CONTEXT_STACK.with(|stack| {
            for frame in stack.borrow().iter() {
                for (key, value) in frame.iter() {
                    merged.insert(key.clone(), value.clone());
                }
            }
        });
    }
    if let Some(call) = call {
        for (key, value) in call {
            merged.insert(key, value);
        }
    }
    Arc::new(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::FieldValue;

    fn map(pairs: &[(&str, &str)]) -> ExtraMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), FieldValue::from(*v)))
            .collect()
    }

    #[test]
    fn test_no_context_reuses_bound_arc() {
        let bound = Arc::new(map(&[("service", "api")]));
        let merged = merged_extra(&bound, None);
        assert!(Arc::ptr_eq(&bound, &merged));
    }

    #[test]
    fn test_guard_pops_on_drop() {
        assert!(stack_is_empty());
        {
            let _guard = push_frame(map(&[("request", "r1")]));
            assert!(!stack_is_empty());

            let bound = Arc::new(map(&[]));
            let merged = merged_extra(&bound, None);
            assert_eq!(
                merged.get("request"),
                Some(&FieldValue::from("r1"))
            );
        }
        assert!(stack_is_empty());
    }

    #[test]
    fn test_inner_frame_wins() {
        let _outer = push_frame(map(&[("id", "outer"), ("keep", "yes")]));
        let _inner = push_frame(map(&[("id", "inner")]));

        let bound = Arc::new(map(&[]));
        let merged = merged_extra(&bound, None);
        assert_eq!(merged.get("id"), Some(&FieldValue::from("inner")));
        assert_eq!(merged.get("keep"), Some(&FieldValue::from("yes")));
    }

    #[test]
    fn test_call_extras_win_over_everything() {
        let _frame = push_frame(map(&[("id", "frame")]));
        let bound = Arc::new(map(&[("id", "bound")]));
        let merged = merged_extra(&bound, Some(map(&[("id", "call")])));
        assert_eq!(merged.get("id"), Some(&FieldValue::from("call")));
    }
}
