use super::bean::Bean;
use super::holder::{ContextHolder, LibraryResolver};
use super::injectable::{Injectable, TypeRegistry};
use super::markers;
use super::property::ContextProperty;
use super::status::Status;
use crate::config::{ConfigService, ContextConfig};
use crate::descriptor::{Annotated, ClassSource, CompositeSource, DescriptorCache, TypeDescriptor};
use crate::error::{ContextError, Result};
use crate::factory::{
    BeanFactory, ComponentBeanFactory, ConfigurationBeanFactory, SerializationBeanFactory,
};
use crate::lifecycle::{ContextLifecycle, LifecycleManager};
use crate::messaging::{EventBus, StatusChanged};
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicI8, Ordering};
use strum_macros::Display;
use tracing::{debug, error, info, warn};

/// Beans, factories and properties of one context.
#[derive(Default)]
pub(crate) struct Registry {
    pub(crate) factories: HashMap<String, Arc<dyn BeanFactory>>,
    pub(crate) beans: Vec<Arc<Bean>>,
    pub(crate) by_name: HashMap<String, Arc<Bean>>,
    pub(crate) by_marked: HashMap<String, Arc<Bean>>,
    pub(crate) properties: HashMap<String, ContextProperty>,
}

impl Registry {
    pub(crate) fn insert_bean(&mut self, bean: Arc<Bean>) {
        self.by_name
            .insert(bean.name().to_string(), Arc::clone(&bean));
        self.by_marked
            .insert(bean.marked().name().to_string(), Arc::clone(&bean));
        self.beans.push(bean);
    }

    pub(crate) fn remove_beans(&mut self, names: &[String]) {
        self.beans.retain(|bean| !names.iter().any(|name| name == bean.name()));
        for name in names {
            if let Some(bean) = self.by_name.remove(name) {
                let marked = bean.marked().name();
                if self
                    .by_marked
                    .get(marked)
                    .is_some_and(|current| Arc::ptr_eq(current, &bean))
                {
                    self.by_marked.remove(marked);
                }
            }
        }
    }

    pub(crate) fn clear_beans(&mut self) {
        self.beans.clear();
        self.by_name.clear();
        self.by_marked.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub(crate) enum Phase {
    Initialize,
    Load,
    Enable,
    Disable,
    Destroy,
}

impl Phase {
    fn expected(self) -> Status {
        match self {
            Phase::Initialize => Status::Destroyed,
            Phase::Load => Status::Initialized,
            Phase::Enable => Status::Loaded,
            Phase::Disable => Status::Enabled,
            Phase::Destroy => Status::Disabled,
        }
    }
}

pub(crate) struct ContextInner {
    pub(crate) holder: Arc<dyn ContextHolder>,
    pub(crate) lifecycle: Arc<dyn ContextLifecycle>,
    pub(crate) library_resolver: Option<Arc<dyn LibraryResolver>>,
    pub(crate) config: ContextConfig,
    pub(crate) config_service: ConfigService,
    pub(crate) event_bus: EventBus,
    pub(crate) types: TypeRegistry,
    pub(crate) status: AtomicI8,
    pub(crate) gate: ReentrantMutex<()>,
    pub(crate) registry: RwLock<Registry>,
    pub(crate) environment: RwLock<Option<String>>,
    pub(crate) class_path: RwLock<Option<Arc<dyn ClassSource>>>,
    /// Scan caches; descriptors only hold weak links back to them.
    pub(crate) caches: Mutex<Vec<DescriptorCache>>,
    /// Marked types whose instance is being created, in creation order.
    pub(crate) in_progress: Mutex<Vec<String>>,
    pub(crate) destruction: Mutex<LifecycleManager>,
}

/// A component container driven by an explicit lifecycle.
///
/// Cloning is cheap; clones share the same container.
///
/// # Example
///
/// ```rust,ignore
/// let context = ContextBuilder::new(holder)
///     .types(types)
///     .build();
///
/// context.initialize()?;
/// context.load()?;
/// context.enable()?;
///
/// let service = context.get::<UserService>()?.expect("registered");
///
/// context.disable()?;
/// context.destroy()?;
/// ```
#[derive(Clone)]
pub struct Context {
    pub(crate) inner: Arc<ContextInner>,
}

impl Context {
    pub(crate) fn from_inner(inner: Arc<ContextInner>) -> Self {
        Self { inner }
    }

    pub fn name(&self) -> &str {
        self.inner.holder.name()
    }

    pub fn holder(&self) -> &Arc<dyn ContextHolder> {
        &self.inner.holder
    }

    pub fn data_folder(&self) -> &Path {
        self.inner.holder.data_folder()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.inner.event_bus
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.inner.types
    }

    pub fn config(&self) -> &ContextConfig {
        &self.inner.config
    }

    pub fn config_service(&self) -> &ConfigService {
        &self.inner.config_service
    }

    pub fn status(&self) -> Status {
        Status::from_code(self.inner.status.load(Ordering::SeqCst)).unwrap_or(Status::Error)
    }

    /// Whether the context is enabled.
    pub fn is_active(&self) -> bool {
        self.status() == Status::Enabled
    }

    /// Name of the active environment, `""` when none is configured.
    pub fn environment(&self) -> String {
        if let Some(environment) = self.inner.environment.read().as_ref() {
            return environment.clone();
        }
        let environment = self
            .inner
            .config_service
            .lookup(&self.inner.config.environment_key)
            .unwrap_or_default();
        *self.inner.environment.write() = Some(environment.clone());
        environment
    }

    /// Host class path extended with the holder's libraries and any
    /// resolved libraries.
    pub fn class_path(&self) -> Option<Arc<dyn ClassSource>> {
        self.inner.class_path.read().clone()
    }

    pub fn initialize(&self) -> Result<()> {
        self.run_phase(Phase::Initialize)
    }

    pub fn load(&self) -> Result<()> {
        self.run_phase(Phase::Load)
    }

    pub fn enable(&self) -> Result<()> {
        self.run_phase(Phase::Enable)
    }

    pub fn disable(&self) -> Result<()> {
        self.run_phase(Phase::Disable)
    }

    pub fn destroy(&self) -> Result<()> {
        self.run_phase(Phase::Destroy)
    }

    fn set_status(&self, status: Status) {
        self.inner.status.store(status.code(), Ordering::SeqCst);
    }

    fn run_phase(&self, phase: Phase) -> Result<()> {
        let Some(_gate) = self.inner.gate.try_lock_for(self.inner.config.lock_timeout()) else {
            error!(
                "Timed out waiting to {} context '{}', entering error status",
                phase,
                self.name()
            );
            self.set_status(Status::Error);
            return Err(ContextError::state(format!(
                "timed out waiting to {} context '{}'",
                phase,
                self.name()
            )));
        };
        let current = self.status();
        if current != phase.expected() {
            return Err(ContextError::state(format!(
                "cannot {} context '{}' in status {} (expected {})",
                phase,
                self.name(),
                current,
                phase.expected()
            )));
        }

        info!("Calling {} phase of context '{}'...", phase, self.name());
        match self.phase_steps(phase) {
            Ok(()) => {
                let next = current.next();
                self.set_status(next);
                if next == Status::Destroyed {
                    *self.inner.environment.write() = None;
                }
                self.inner.event_bus.publish(StatusChanged {
                    context: self.name().to_string(),
                    from: current,
                    to: next,
                });
                info!("Context '{}' is now {}", self.name(), next);
                Ok(())
            }
            Err(err) => {
                error!("Failed to {} context '{}': {}", phase, self.name(), err);
                self.set_status(Status::Error);
                if phase == Phase::Load {
                    self.inner.registry.write().clear_beans();
                }
                Err(err)
            }
        }
    }

    fn phase_steps(&self, phase: Phase) -> Result<()> {
        let lifecycle = Arc::clone(&self.inner.lifecycle);
        match phase {
            Phase::Initialize => {
                lifecycle.on_initialize(self)?;
                self.do_initialize()?;
                lifecycle.on_initialized(self)?;
            }
            Phase::Load => {
                lifecycle.on_load(self)?;
                self.load_components()?;
                lifecycle.on_loaded(self)?;
            }
            Phase::Enable => {
                lifecycle.on_enable(self)?;
                self.do_enable()?;
                lifecycle.on_enabled(self)?;
            }
            Phase::Disable => {
                lifecycle.on_disable(self)?;
                lifecycle.on_disabled(self)?;
            }
            Phase::Destroy => {
                lifecycle.on_destroy(self)?;
                self.do_destroy()?;
                lifecycle.on_destroyed(self)?;
            }
        }
        Ok(())
    }

    fn do_initialize(&self) -> Result<()> {
        self.reset();
        *self.inner.environment.write() = None;

        let holder = &self.inner.holder;
        let mut sources: Vec<Arc<dyn ClassSource>> = holder.class_path().into_iter().collect();
        sources.extend(holder.libraries());
        if let Some(resolver) = &self.inner.library_resolver {
            let resolved = resolver.resolve(holder.as_ref())?;
            debug!("Resolved {} libraries for '{}'", resolved.len(), self.name());
            sources.extend(resolved);
        }
        let class_path: Option<Arc<dyn ClassSource>> = match sources.len() {
            0 => None,
            1 => sources.pop(),
            _ => Some(Arc::new(CompositeSource::new(sources))),
        };
        *self.inner.class_path.write() = class_path;

        let builtin: [Arc<dyn BeanFactory>; 3] = [
            Arc::new(ComponentBeanFactory::new()),
            Arc::new(SerializationBeanFactory::new()),
            Arc::new(ConfigurationBeanFactory::new()),
        ];
        let mut registry = self.inner.registry.write();
        for factory in builtin {
            registry
                .factories
                .insert(factory.metadata_type().to_string(), factory);
        }
        drop(registry);

        info!(
            "Context '{}' {} (environment '{}')",
            self.name(),
            holder.version(),
            self.environment()
        );
        Ok(())
    }

    fn do_enable(&self) -> Result<()> {
        let beans = self.inner.registry.read().beans.clone();
        let singletons: Vec<_> = beans.iter().filter(|bean| bean.is_singleton()).collect();
        info!("Creating {} singletons...", singletons.len());
        for bean in &singletons {
            bean.instance()?;
        }
        info!(
            "Singletons complete ({} instances created)",
            self.tracked_instances()
        );
        Ok(())
    }

    /// Number of created instances awaiting destruction.
    pub fn tracked_instances(&self) -> usize {
        self.inner.destruction.lock().len()
    }

    fn do_destroy(&self) -> Result<()> {
        let mut tracked = std::mem::take(&mut *self.inner.destruction.lock());
        let failed = tracked.call_destroy();
        self.reset();
        if failed > 0 {
            return Err(ContextError::DestroyFailed { failed });
        }
        Ok(())
    }

    /// Drops every bean, factory, property, cached descriptor and tracked
    /// instance.
    fn reset(&self) {
        *self.inner.registry.write() = Registry::default();
        self.inner.caches.lock().clear();
        self.inner.in_progress.lock().clear();
        self.inner.destruction.lock().clear();
    }

    /// Runs `read` against the registry when the status allows it and the
    /// gate is acquired in time, otherwise returns `default`.
    fn read<R>(&self, what: &str, default: R, read: impl FnOnce(&Registry) -> R) -> R {
        let status = self.status();
        if !status.is_readable() {
            warn!(
                "Cannot read {} of context '{}' in status {}",
                what,
                self.name(),
                status
            );
            return default;
        }
        let Some(_gate) = self.inner.gate.try_lock_for(self.inner.config.lock_timeout()) else {
            warn!("Timed out reading {} of context '{}'", what, self.name());
            return default;
        };
        read(&self.inner.registry.read())
    }

    pub(crate) fn write<R>(
        &self,
        what: &str,
        write: impl FnOnce(&mut Registry) -> Result<R>,
    ) -> Result<R> {
        let status = self.status();
        if !status.is_readable() {
            return Err(ContextError::state(format!(
                "cannot register {} on context '{}' in status {}",
                what,
                self.name(),
                status
            )));
        }
        let Some(_gate) = self.inner.gate.try_lock_for(self.inner.config.lock_timeout()) else {
            error!(
                "Timed out registering {} on context '{}', entering error status",
                what,
                self.name()
            );
            self.set_status(Status::Error);
            return Err(ContextError::state(format!(
                "timed out registering {} on context '{}'",
                what,
                self.name()
            )));
        };
        write(&mut self.inner.registry.write())
    }

    /// Registers `factory` for beans marked with `metadata_type`, replacing
    /// any earlier factory for that marker.
    pub fn register_bean_factory(
        &self,
        metadata_type: &str,
        factory: Arc<dyn BeanFactory>,
    ) -> Result<()> {
        if factory.metadata_type() != metadata_type {
            return Err(ContextError::validation(format!(
                "factory for '{}' cannot serve metadata type '{}'",
                factory.metadata_type(),
                metadata_type
            )));
        }
        self.write("bean factory", |registry| {
            if registry
                .factories
                .insert(metadata_type.to_string(), factory)
                .is_some()
            {
                debug!("Replaced bean factory for '{}'", metadata_type);
            }
            Ok(())
        })
    }

    /// Factory for `metadata_type`. Marker types that are themselves
    /// marked as components fall back to the component factory.
    pub fn bean_factory(&self, metadata_type: &str) -> Option<Arc<dyn BeanFactory>> {
        let direct = self.read("bean factory", None, |registry| {
            registry.factories.get(metadata_type).cloned()
        });
        if direct.is_some() {
            return direct;
        }
        if !self.is_component_marker(metadata_type) {
            return None;
        }
        self.read("bean factory", None, |registry| {
            registry.factories.get(markers::COMPONENT).cloned()
        })
    }

    /// Whether markers of `marker_type` declare components.
    pub(crate) fn is_component_marker(&self, marker_type: &str) -> bool {
        if markers::is_builtin_component(marker_type) {
            return true;
        }
        self.resolve_type(marker_type)
            .is_some_and(|descriptor| descriptor.has_marker(markers::COMPONENT))
    }

    /// Looks a type up in the scan caches, then on the class path.
    pub fn resolve_type(&self, name: &str) -> Option<Arc<TypeDescriptor>> {
        let caches = self.inner.caches.lock().clone();
        for cache in &caches {
            match cache.resolve(name) {
                Ok(descriptor) => return Some(descriptor),
                Err(err) if err.is_not_found() => {}
                Err(err) => {
                    warn!("Failed to resolve {}: {}", name, err);
                    return None;
                }
            }
        }
        None
    }

    pub fn register_property(&self, key: &str, value: &str) -> Result<()> {
        self.write("property", |registry| {
            registry
                .properties
                .insert(key.to_string(), ContextProperty::new(key, value));
            Ok(())
        })
    }

    pub fn property(&self, key: &str) -> Option<ContextProperty> {
        self.read("property", None, |registry| {
            registry.properties.get(key).cloned()
        })
    }

    pub fn has_property(&self, key: &str) -> bool {
        self.property(key).is_some()
    }

    /// All properties, sorted by key.
    pub fn properties(&self) -> Vec<ContextProperty> {
        let mut properties = self.read("properties", Vec::new(), |registry| {
            registry.properties.values().cloned().collect::<Vec<_>>()
        });
        properties.sort_by(|a, b| a.key().cmp(b.key()));
        properties
    }

    /// Bean registered under `name`.
    pub fn bean(&self, name: &str) -> Option<Arc<Bean>> {
        self.read("bean", None, |registry| registry.by_name.get(name).cloned())
    }

    /// Bean registered under `name`, if it is assignable to `type_name`.
    pub fn bean_named(&self, name: &str, type_name: &str) -> Option<Arc<Bean>> {
        self.bean(name)
            .filter(|bean| bean.is_assignable_to(type_name))
    }

    /// The bean whose marked type is exactly `type_name`, else the first
    /// bean in registration order assignable to it.
    pub fn bean_of(&self, type_name: &str) -> Option<Arc<Bean>> {
        self.read("bean", None, |registry| {
            registry.by_marked.get(type_name).cloned().or_else(|| {
                registry
                    .beans
                    .iter()
                    .find(|bean| bean.is_assignable_to(type_name))
                    .cloned()
            })
        })
    }

    /// Every bean assignable to `type_name`, in registration order.
    pub fn beans_of(&self, type_name: &str) -> Vec<Arc<Bean>> {
        self.read("beans", Vec::new(), |registry| {
            registry
                .beans
                .iter()
                .filter(|bean| bean.is_assignable_to(type_name))
                .cloned()
                .collect()
        })
    }

    pub fn beans(&self) -> Vec<Arc<Bean>> {
        self.read("beans", Vec::new(), |registry| registry.beans.clone())
    }

    /// Instance of the bean backing `T`, downcast to `T`.
    pub fn get<T: Injectable>(&self) -> Result<Option<Arc<T>>> {
        self.bean_of(T::TYPE_NAME)
            .map(|bean| downcast_bean::<T>(&bean))
            .transpose()
    }

    /// Instance of the bean named `name`, downcast to `T`.
    pub fn get_named<T: Injectable>(&self, name: &str) -> Result<Option<Arc<T>>> {
        self.bean_named(name, T::TYPE_NAME)
            .map(|bean| downcast_bean::<T>(&bean))
            .transpose()
    }

    /// Every instance assignable to `type_name`, viewed as `U`. Beans whose
    /// binding does not provide `U` are skipped.
    pub fn get_all<U: ?Sized + Send + Sync + 'static>(&self, type_name: &str) -> Result<Vec<Arc<U>>> {
        let mut found = Vec::new();
        for bean in self.beans_of(type_name) {
            match bean.instance()?.cast::<U>() {
                Some(view) => found.push(view),
                None => debug!(
                    "Bean '{}' does not provide {}",
                    bean.name(),
                    std::any::type_name::<U>()
                ),
            }
        }
        Ok(found)
    }
}

fn downcast_bean<T: Injectable>(bean: &Bean) -> Result<Arc<T>> {
    let instance = bean.instance()?;
    instance.downcast::<T>().ok_or_else(|| {
        ContextError::wiring(format!(
            "bean '{}' is a {}, not {}",
            bean.name(),
            instance.binding().rust_name(),
            std::any::type_name::<T>()
        ))
    })
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("name", &self.name())
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}
