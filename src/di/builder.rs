use super::container::{Context, ContextInner, Registry};
use super::holder::{ContextHolder, LibraryResolver};
use super::injectable::{Injectable, TypeRegistry};
use super::status::Status;
use crate::config::{ConfigService, ContextConfig};
use crate::lifecycle::{ContextLifecycle, LifecycleManager, NoopLifecycle};
use crate::messaging::EventBus;
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use std::sync::Arc;
use std::sync::atomic::AtomicI8;

/// Builder for a [`Context`].
///
/// Everything but the holder is optional. Without an explicit
/// [`ContextConfig`], settings are read from the config service, which
/// defaults to a snapshot of the process environment.
///
/// # Example
///
/// ```rust,ignore
/// let context = ContextBuilder::new(Arc::new(holder))
///     .register::<UserService>()
///     .register::<UserRepository>()
///     .lifecycle(Arc::new(AuditLifecycle::default()))
///     .build();
/// ```
pub struct ContextBuilder {
    holder: Arc<dyn ContextHolder>,
    lifecycle: Arc<dyn ContextLifecycle>,
    library_resolver: Option<Arc<dyn LibraryResolver>>,
    config: Option<ContextConfig>,
    config_service: Option<ConfigService>,
    event_bus: Option<EventBus>,
    types: TypeRegistry,
}

impl ContextBuilder {
    pub fn new(holder: Arc<dyn ContextHolder>) -> Self {
        Self {
            holder,
            lifecycle: Arc::new(NoopLifecycle),
            library_resolver: None,
            config: None,
            config_service: None,
            event_bus: None,
            types: TypeRegistry::new(),
        }
    }

    /// Hooks called around every phase.
    pub fn lifecycle(mut self, lifecycle: Arc<dyn ContextLifecycle>) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    /// Extra libraries to add to the class path at initialization.
    pub fn library_resolver(mut self, resolver: Arc<dyn LibraryResolver>) -> Self {
        self.library_resolver = Some(resolver);
        self
    }

    pub fn config(mut self, config: ContextConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn config_service(mut self, service: ConfigService) -> Self {
        self.config_service = Some(service);
        self
    }

    /// Shares an existing bus, e.g. one owned by the host.
    pub fn event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Uses `types` as the binding registry, keeping bindings already
    /// registered on this builder.
    pub fn types(mut self, types: TypeRegistry) -> Self {
        for name in self.types.names() {
            if let Some(binding) = self.types.get(&name) {
                types.insert(binding);
            }
        }
        self.types = types;
        self
    }

    pub fn register<T: Injectable>(self) -> Self {
        self.types.register::<T>();
        self
    }

    /// Builds the context in `DESTROYED` status.
    pub fn build(self) -> Context {
        let config_service = self.config_service.unwrap_or_else(ConfigService::new);
        let config = self
            .config
            .unwrap_or_else(|| ContextConfig::from_service(&config_service));
        Context::from_inner(Arc::new(ContextInner {
            holder: self.holder,
            lifecycle: self.lifecycle,
            library_resolver: self.library_resolver,
            config,
            config_service,
            event_bus: self.event_bus.unwrap_or_default(),
            types: self.types,
            status: AtomicI8::new(Status::Destroyed.code()),
            gate: ReentrantMutex::new(()),
            registry: RwLock::new(Registry::default()),
            environment: RwLock::new(None),
            class_path: RwLock::new(None),
            caches: Mutex::new(Vec::new()),
            in_progress: Mutex::new(Vec::new()),
            destruction: Mutex::new(LifecycleManager::default()),
        }))
    }
}
