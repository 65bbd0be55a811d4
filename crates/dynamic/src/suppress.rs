//! Thread-local suppression of change notifications.
//!
//! Every notifying mutation enters a [`NotifyGuard`] before it calls any
//! listener and holds it until the write is applied. Mutations that happen
//! while a guard is alive (typically from inside a listener) are applied
//! silently, which stops listener feedback loops.

use std::cell::Cell;
use std::marker::PhantomData;

thread_local! {
    static DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Whether a mutation made right now should notify anyone.
pub fn notifications_enabled() -> bool {
    DEPTH.with(|depth| depth.get() == 0)
}

/// Scoped increment of the suppression depth. Dropping it (on any exit path,
/// unwinding included) restores the previous depth.
#[must_use = "notifications are suppressed only while the guard is alive"]
pub struct NotifyGuard {
    // Tied to the thread whose counter it bumped.
    _not_send: PhantomData<*const ()>,
}

impl NotifyGuard {
    pub fn enter() -> Self {
        DEPTH.with(|depth| depth.set(depth.get() + 1));
        Self {
            _not_send: PhantomData,
        }
    }
}

impl Drop for NotifyGuard {
    fn drop(&mut self) {
        DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Run `f` with notifications suppressed on this thread.
pub fn silently<R>(f: impl FnOnce() -> R) -> R {
    let _guard = NotifyGuard::enter();
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_nesting() {
        assert!(notifications_enabled());
        {
            let _outer = NotifyGuard::enter();
            assert!(!notifications_enabled());
            {
                let _inner = NotifyGuard::enter();
                assert!(!notifications_enabled());
            }
            assert!(!notifications_enabled());
        }
        assert!(notifications_enabled());
    }

    #[test]
    fn test_guard_released_on_unwind() {
        let result = std::panic::catch_unwind(|| {
            let _guard = NotifyGuard::enter();
            panic!("listener failed");
        });
        assert!(result.is_err());
        assert!(notifications_enabled());
    }

    #[test]
    fn test_silently() {
        let seen = silently(notifications_enabled);
        assert!(!seen);
        assert!(notifications_enabled());
    }
}
