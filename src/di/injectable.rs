use super::binding::{TypeBinding, TypeBindingBuilder};
use dashmap::DashMap;
use std::sync::Arc;

/// A Rust type that can back a component descriptor.
///
/// # Example
///
/// ```rust,ignore
/// struct UserService { repository: OnceCell<Arc<UserRepository>> }
///
/// impl Injectable for UserService {
///     const TYPE_NAME: &'static str = "com.acme.UserService";
///
///     fn bind(binding: TypeBindingBuilder<Self>) -> TypeBindingBuilder<Self> {
///         binding
///             .constructor(|| UserService { repository: OnceCell::new() })
///             .autowired("setRepository", |this, args| {
///                 let _ = this.repository.set(args.get::<UserRepository>(0)?);
///                 Ok(())
///             })
///     }
/// }
/// ```
pub trait Injectable: Sized + Send + Sync + 'static {
    /// Qualified name of the descriptor this type implements.
    const TYPE_NAME: &'static str;

    fn bind(binding: TypeBindingBuilder<Self>) -> TypeBindingBuilder<Self>;

    fn binding() -> Arc<TypeBinding> {
        Self::bind(TypeBindingBuilder::new(Self::TYPE_NAME)).build()
    }
}

/// Bindings known to a context, by descriptor name.
#[derive(Clone, Default)]
pub struct TypeRegistry {
    bindings: Arc<DashMap<String, Arc<TypeBinding>>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: Injectable>(&self) -> &Self {
        self.insert(T::binding())
    }

    /// Adds a binding, replacing any earlier one for the same name.
    pub fn insert(&self, binding: Arc<TypeBinding>) -> &Self {
        if let Some(previous) = self.bindings.insert(binding.name().to_string(), binding) {
            tracing::debug!("Replaced binding for {}", previous.name());
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<TypeBinding>> {
        self.bindings.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Registered descriptor names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.bindings.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
