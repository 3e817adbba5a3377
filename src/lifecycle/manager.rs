//! Lifecycle Manager
//!
//! Tracks created instances so they can be torn down when their context is
//! destroyed.

use super::Destroyable;
use crate::di::Instance;

/// A created instance and the bean it was created for
struct TrackedInstance {
    instance: Instance,
    name: String,
}

/// Records instances in creation order and destroys them in reverse.
///
/// # Example
///
/// ```rust,ignore
/// let mut manager = LifecycleManager::new();
/// manager.register_destroy(database, "database");
/// manager.register_destroy(repository, "userRepository");
///
/// // userRepository is destroyed before database
/// let failed = manager.call_destroy();
/// ```
#[derive(Default)]
pub struct LifecycleManager {
    instances: Vec<TrackedInstance>,
}

impl LifecycleManager {
    /// Create a new LifecycleManager
    pub fn new() -> Self {
        Self::default()
    }

    /// Track an instance created for the bean `name`
    pub fn register_destroy(&mut self, instance: Instance, name: impl Into<String>) {
        self.instances.push(TrackedInstance {
            instance,
            name: name.into(),
        });
    }

    /// Destroy every tracked instance that is [`Destroyable`], in **reverse
    /// order** of registration, and stop tracking all of them.
    ///
    /// A failure is logged and the remaining instances are still destroyed.
    /// Returns the number of failures.
    pub fn call_destroy(&mut self) -> usize {
        tracing::info!("Calling Destroyable hooks...");

        let mut executed = 0;
        let mut failed = 0;
        for tracked in self.instances.drain(..).rev() {
            let Some(destroyable) = tracked.instance.cast::<dyn Destroyable>() else {
                continue;
            };
            executed += 1;
            tracing::debug!("Destroying: {}", tracked.name);
            match destroyable.destroy() {
                Ok(()) => tracing::debug!("Destroyed: {}", tracked.name),
                Err(e) => {
                    // Log error but continue with other hooks
                    failed += 1;
                    tracing::error!("Destroy failed for {}: {}", tracked.name, e);
                }
            }
        }

        tracing::info!(
            "Destroyable complete ({} hooks executed, {} failed)",
            executed,
            failed
        );
        failed
    }

    /// Stop tracking everything without destroying it
    pub fn clear(&mut self) {
        self.instances.clear();
    }

    /// Number of tracked instances
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::di::TypeBindingBuilder;
    use crate::lifecycle::LifecycleError;
    use std::sync::{Arc, Mutex};

    struct OrderedService {
        id: usize,
        fail: bool,
        order: Arc<Mutex<Vec<usize>>>,
    }

    impl Destroyable for OrderedService {
        fn destroy(&self) -> Result<(), LifecycleError> {
            self.order.lock().unwrap().push(self.id);
            if self.fail {
                return Err(LifecycleError::destroy_failed(format!("service {}", self.id)));
            }
            Ok(())
        }
    }

    struct Plain;

    fn tracked(id: usize, fail: bool, order: &Arc<Mutex<Vec<usize>>>) -> Instance {
        let binding = TypeBindingBuilder::<OrderedService>::new("demo.OrderedService")
            .destroyable()
            .build();
        let service = OrderedService {
            id,
            fail,
            order: Arc::clone(order),
        };
        Instance::new(Arc::new(service), binding)
    }

    #[test]
    fn test_destroy_reverse_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut manager = LifecycleManager::new();
        for i in 0..3 {
            manager.register_destroy(tracked(i, false, &order), format!("Service{}", i));
        }

        assert_eq!(manager.call_destroy(), 0);
        assert_eq!(*order.lock().unwrap(), vec![2, 1, 0]);
        assert!(manager.is_empty());
    }

    #[test]
    fn test_failures_are_counted_and_do_not_stop_teardown() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut manager = LifecycleManager::new();
        manager.register_destroy(tracked(0, false, &order), "first");
        manager.register_destroy(tracked(1, true, &order), "second");
        manager.register_destroy(tracked(2, true, &order), "third");

        let binding = TypeBindingBuilder::<Plain>::new("demo.Plain").build();
        manager.register_destroy(Instance::new(Arc::new(Plain), binding), "plain");

        assert_eq!(manager.len(), 4);
        assert_eq!(manager.call_destroy(), 2);
        assert_eq!(*order.lock().unwrap(), vec![2, 1, 0]);
    }
}
