use super::binding::{Object, TypeBinding};
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::{Arc, Weak};

/// A live component together with the binding that produced it.
#[derive(Clone)]
pub struct Instance {
    object: Object,
    binding: Arc<TypeBinding>,
}

impl Instance {
    pub fn new(object: Object, binding: Arc<TypeBinding>) -> Self {
        Self { object, binding }
    }

    pub fn object(&self) -> &Object {
        &self.object
    }

    pub fn binding(&self) -> &Arc<TypeBinding> {
        &self.binding
    }

    /// Qualified name of the bound descriptor.
    pub fn type_name(&self) -> &str {
        self.binding.name()
    }

    /// `TypeId` of the value actually stored.
    pub fn concrete_type_id(&self) -> TypeId {
        (*self.object).type_id()
    }

    /// Whether the stored value is exactly the binding's Rust type.
    pub fn is_exact(&self) -> bool {
        self.concrete_type_id() == self.binding.rust_type_id()
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.object).downcast::<T>().ok()
    }

    /// Views the instance through a capability registered on its binding.
    pub fn cast<U: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<U>> {
        self.binding.cast::<U>(&self.object)
    }

    /// Whether both handles point at the same allocation.
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.object, &other.object)
    }

    pub fn downgrade(&self) -> WeakInstance {
        WeakInstance {
            object: Arc::downgrade(&self.object),
            binding: Arc::clone(&self.binding),
        }
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type", &self.binding.name())
            .field("rust_type", &self.binding.rust_name())
            .finish()
    }
}

/// Non-owning handle handed to self-aware components.
#[derive(Clone)]
pub struct WeakInstance {
    object: Weak<dyn Any + Send + Sync>,
    binding: Arc<TypeBinding>,
}

impl WeakInstance {
    pub fn upgrade(&self) -> Option<Instance> {
        self.object.upgrade().map(|object| Instance {
            object,
            binding: Arc::clone(&self.binding),
        })
    }
}

impl fmt::Debug for WeakInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakInstance")
            .field("type", &self.binding.name())
            .field("alive", &(self.object.strong_count() > 0))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::di::TypeBindingBuilder;

    struct Counter(u32);

    trait Named: Send + Sync {
        fn label(&self) -> String;
    }

    impl Named for Counter {
        fn label(&self) -> String {
            format!("counter-{}", self.0)
        }
    }

    fn instance() -> Instance {
        let binding = TypeBindingBuilder::<Counter>::new("demo.Counter")
            .constructor(|| Counter(3))
            .provides::<dyn Named, _>(|it| it as Arc<dyn Named>)
            .build();
        let object = binding.construct().unwrap();
        Instance::new(object, binding)
    }

    #[test]
    fn test_downcast_and_cast() {
        let instance = instance();
        assert!(instance.is_exact());
        assert_eq!(instance.type_name(), "demo.Counter");
        assert_eq!(instance.downcast::<Counter>().unwrap().0, 3);
        assert!(instance.downcast::<String>().is_none());
        assert_eq!(instance.cast::<dyn Named>().unwrap().label(), "counter-3");
    }

    #[test]
    fn test_exactness_follows_stored_value() {
        let exact = instance();
        assert_eq!(exact.concrete_type_id(), exact.binding().rust_type_id());

        let foreign = Instance::new(Arc::new(String::from("3")), Arc::clone(exact.binding()));
        assert!(!foreign.is_exact());
        assert_eq!(foreign.type_name(), "demo.Counter");
    }

    #[test]
    fn test_identity() {
        let instance = instance();
        let copy = instance.clone();
        assert!(instance.ptr_eq(&copy));
        assert!(!instance.ptr_eq(&self::instance()));
    }

    #[test]
    fn test_weak_handle() {
        let instance = instance();
        let weak = instance.downgrade();
        assert!(weak.upgrade().unwrap().ptr_eq(&instance));
        drop(instance);
        assert!(weak.upgrade().is_none());
    }
}
