use crate::error::{ContextError, Result};
use once_cell::sync::OnceCell;
use parking_lot::ReentrantMutex;
use std::cell::Cell;
use std::fmt;

type Init<T> = Box<dyn Fn() -> Result<T> + Send + Sync>;

/// A value computed on first access.
///
/// Singleton beans hold their instance in a `Lazy`, and autowired
/// parameters may ask for one to defer creation and break dependency
/// cycles.
///
/// Initialization runs at most once successfully. Concurrent callers wait
/// for the first one; a failed initialization leaves the value unset so the
/// next access retries. Asking for the value from inside its own
/// initializer reports a circular dependency instead of deadlocking.
pub struct Lazy<T: Clone + Send + Sync + 'static> {
    value: OnceCell<T>,
    init: Init<T>,
    gate: ReentrantMutex<Cell<bool>>,
}

impl<T: Clone + Send + Sync + 'static> Lazy<T> {
    pub fn new(init: impl Fn() -> Result<T> + Send + Sync + 'static) -> Self {
        Self {
            value: OnceCell::new(),
            init: Box::new(init),
            gate: ReentrantMutex::new(Cell::new(false)),
        }
    }

    /// A lazy that is already initialized.
    pub fn ready(value: T) -> Self {
        let lazy = Self::new(|| Err(ContextError::state("lazy value was never initialized")));
        let _ = lazy.value.set(value);
        lazy
    }

    /// Returns the value, initializing it if needed.
    pub fn get(&self) -> Result<T> {
        if let Some(value) = self.value.get() {
            return Ok(value.clone());
        }
        let running = self.gate.lock();
        if let Some(value) = self.value.get() {
            return Ok(value.clone());
        }
        if running.get() {
            return Err(ContextError::circular(
                "lazy value requested while it is being initialized",
            ));
        }
        running.set(true);
        let result = (self.init)();
        running.set(false);
        let value = result?;
        let _ = self.value.set(value.clone());
        Ok(value)
    }

    /// Returns the value only if it has already been initialized.
    pub fn peek(&self) -> Option<T> {
        self.value.get().cloned()
    }

    pub fn is_initialized(&self) -> bool {
        self.value.get().is_some()
    }
}

impl<T: Clone + Send + Sync + fmt::Debug + 'static> fmt::Debug for Lazy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value.get() {
            Some(value) => f.debug_tuple("Lazy").field(value).finish(),
            None => f.write_str("Lazy(<uninitialized>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, OnceLock};

    #[test]
    fn initializes_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let lazy = Lazy::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(42)
        });

        assert!(!lazy.is_initialized());
        assert_eq!(lazy.get().unwrap(), 42);
        assert_eq!(lazy.get().unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(lazy.peek(), Some(42));
    }

    #[test]
    fn failure_is_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let lazy = Lazy::new(move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(ContextError::wiring("not yet"))
            } else {
                Ok("ready".to_string())
            }
        });

        assert!(lazy.get().is_err());
        assert!(!lazy.is_initialized());
        assert_eq!(lazy.get().unwrap(), "ready");
    }

    #[test]
    fn reentry_is_reported_as_circular() {
        let slot: Arc<OnceLock<Arc<Lazy<u32>>>> = Arc::new(OnceLock::new());
        let inner = Arc::clone(&slot);
        let lazy = Arc::new(Lazy::new(move || {
            let me = inner.get().expect("slot filled");
            me.get().map(|v| v + 1)
        }));
        let _ = slot.set(Arc::clone(&lazy));

        let err = lazy.get().unwrap_err();
        assert!(matches!(err, ContextError::CircularDependency { .. }));
        assert!(!lazy.is_initialized());
    }

    #[test]
    fn ready_values_skip_init() {
        let lazy = Lazy::ready(7u8);
        assert!(lazy.is_initialized());
        assert_eq!(lazy.get().unwrap(), 7);
    }
}
