//! The load phase: boot markers, archive scan and bean registration.

use super::bean::{Bean, BeanDefinition, DependsOn, Producer, Scope};
use super::container::Context;
use super::create::{public_methods, upgrade};
use super::instance::Instance;
use super::markers;
use crate::descriptor::{
    Annotated, ClassSource, DescriptorCache, DescriptorError, FieldType, MetadataMarker,
    MethodDescriptor, TypeDescriptor,
};
use crate::error::{ContextError, Result};
use crate::factory::{simple_name, BeanFactory};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Configuration read from the entry type's markers and, one level deep,
/// from the markers on those markers' own types.
#[derive(Debug, Default)]
struct Boot {
    packages: Vec<String>,
    properties: Vec<(String, String)>,
    /// `(metadata type, factory type)`
    factories: Vec<(String, String)>,
}

impl Boot {
    fn collect(entry: &TypeDescriptor) -> Self {
        let mut sources: Vec<Arc<MetadataMarker>> = entry.markers().to_vec();
        for marker in entry.markers() {
            match marker.resolve_type() {
                Ok(marker_type) => sources.extend(marker_type.markers().iter().cloned()),
                Err(err) if err.is_not_found() => {}
                Err(err) => warn!("Failed to resolve boot marker {}: {}", marker.type_name(), err),
            }
        }

        let mut boot = Boot::default();
        for marker in &sources {
            match marker.type_name() {
                markers::SCAN => boot.packages.extend(marker.str_list("value")),
                markers::REGISTER_PROPERTY => boot.add_property(marker),
                markers::REGISTER_PROPERTIES => {
                    for property in marker.marker_list("value") {
                        boot.add_property(&property);
                    }
                }
                markers::REGISTER_FACTORY => boot.add_factory(marker),
                markers::REGISTER_FACTORIES => {
                    for factory in marker.marker_list("value") {
                        boot.add_factory(&factory);
                    }
                }
                _ => {}
            }
        }
        boot
    }

    fn add_property(&mut self, marker: &MetadataMarker) {
        match (marker.str_value("key"), marker.str_value("value")) {
            (Some(key), Some(value)) => self.properties.push((key.to_string(), value.to_string())),
            _ => warn!("Ignoring incomplete {}", marker.type_name()),
        }
    }

    fn add_factory(&mut self, marker: &MetadataMarker) {
        let metadata = marker.value("metadata").and_then(|v| v.as_type());
        let factory = marker.value("beanFactory").and_then(|v| v.as_type());
        match (metadata, factory) {
            (Some(metadata), Some(factory)) => self
                .factories
                .push((metadata.name().to_string(), factory.name().to_string())),
            _ => warn!("Ignoring incomplete {}", marker.type_name()),
        }
    }
}

/// A scanned type with the marker that makes it a component.
struct Candidate {
    marked: Arc<TypeDescriptor>,
    metadata: Arc<MetadataMarker>,
    factory: Arc<dyn BeanFactory>,
}

impl Context {
    pub(crate) fn load_components(&self) -> Result<()> {
        let holder = Arc::clone(self.holder());
        let class_path = self.class_path();
        let root = holder.root();
        let root_cache = DescriptorCache::new(Some(Arc::clone(&root)), class_path.clone());
        self.inner.caches.lock().push(root_cache.clone());

        let entry = root_cache.resolve(holder.entry_type())?;
        let boot = Boot::collect(&entry);
        for (key, value) in &boot.properties {
            self.register_property(key, value)?;
            debug!("Property: '{}' = '{}'", key, value);
        }
        for (metadata_type, factory_type) in &boot.factories {
            let factory = holder.factory(factory_type).ok_or_else(|| {
                ContextError::validation(format!(
                    "holder '{}' cannot provide bean factory '{}' for '{}'",
                    holder.name(),
                    factory_type,
                    metadata_type
                ))
            })?;
            self.register_bean_factory(metadata_type, factory)?;
            info!("Bean factory: '{}' -> '{}'", metadata_type, factory_type);
        }

        let mut prefixes: Vec<String> = boot.packages.iter().map(|p| p.replace('.', "/")).collect();
        prefixes.push(entry.package_name().replace('.', "/"));
        prefixes.sort();
        prefixes.dedup();

        let mut caches = vec![root_cache];
        for library in self.scan_libraries(&entry, &root) {
            let cache = DescriptorCache::new(Some(library), class_path.clone());
            self.inner.caches.lock().push(cache.clone());
            caches.push(cache);
        }

        info!("Scanning {} roots for components...", caches.len());
        let mut candidates = self.collect_candidates(&caches, &prefixes, entry.name())?;
        // Codecs first, so configuration beans can find them when validated.
        candidates.sort_by_key(|candidate| candidate.metadata.type_name() != markers::SERIALIZATION);
        for candidate in candidates {
            self.register_candidate(candidate)?;
        }
        self.prune_unresolved();
        info!(
            "Register beans done ({} beans registered)",
            self.inner.registry.read().beans.len()
        );
        Ok(())
    }

    /// Libraries declaring a marker type that itself carries `Scan`.
    fn scan_libraries(
        &self,
        entry: &TypeDescriptor,
        root: &Arc<dyn ClassSource>,
    ) -> Vec<Arc<dyn ClassSource>> {
        let libraries = self.holder().libraries();
        let mut roots: Vec<Arc<dyn ClassSource>> = Vec::new();
        for marker in entry.markers() {
            let Ok(marker_type) = marker.resolve_type() else {
                continue;
            };
            if !marker_type.has_marker(markers::SCAN) {
                continue;
            }
            let path = format!("{}.class", marker_type.name().replace('.', "/"));
            let owner = libraries
                .iter()
                .find(|library| matches!(library.fetch(&path), Ok(Some(_))));
            if let Some(library) = owner {
                let location = library.location();
                if location != root.location() && roots.iter().all(|it| it.location() != location) {
                    debug!("Scan root: {} (via {})", location, marker_type.name());
                    roots.push(Arc::clone(library));
                }
            }
        }
        roots
    }

    fn collect_candidates(
        &self,
        caches: &[DescriptorCache],
        prefixes: &[String],
        entry_type: &str,
    ) -> Result<Vec<Candidate>> {
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        for cache in caches {
            let Some(archive) = cache.archive() else {
                continue;
            };
            let mut entries = archive.entries()?;
            entries.sort();
            for path in entries {
                let Some(stem) = path.strip_suffix(".class") else {
                    continue;
                };
                if stem.ends_with("module-info") || stem.ends_with("package-info") {
                    continue;
                }
                if !prefixes.iter().any(|prefix| in_package(stem, prefix)) {
                    continue;
                }
                let name = stem.replace('/', ".");
                if name == entry_type {
                    continue;
                }
                let marked = match cache.resolve(&name) {
                    Ok(marked) => marked,
                    Err(DescriptorError::NameMismatch { actual, .. }) => {
                        debug!("Entry {} declares {}, skip.", path, actual);
                        continue;
                    }
                    Err(err) => return Err(err.into()),
                };
                let Some((metadata, factory)) = self.select_metadata(&marked)? else {
                    continue;
                };
                if !seen.insert(marked.name().to_string()) {
                    return Err(ContextError::validation(format!(
                        "duplicate class name: '{}'",
                        marked.name()
                    )));
                }
                candidates.push(Candidate {
                    marked,
                    metadata,
                    factory,
                });
            }
        }
        Ok(candidates)
    }

    /// The one marker on `marked` that some factory serves.
    fn select_metadata(
        &self,
        marked: &TypeDescriptor,
    ) -> Result<Option<(Arc<MetadataMarker>, Arc<dyn BeanFactory>)>> {
        let mut qualifying = Vec::new();
        for marker in marked.markers() {
            if let Some(factory) = self.bean_factory(marker.type_name()) {
                qualifying.push((Arc::clone(marker), factory));
            }
        }
        if qualifying.len() > 1 {
            let names: Vec<_> = qualifying.iter().map(|(m, _)| m.type_name()).collect();
            return Err(ContextError::validation(format!(
                "class '{}' has multiple metadata markers: {:?}",
                marked.name(),
                names
            )));
        }
        let Some((metadata, factory)) = qualifying.pop() else {
            return Ok(None);
        };
        if !metadata.is_visible() {
            return Err(ContextError::validation(format!(
                "class '{}' metadata '{}' is invisible",
                marked.name(),
                metadata.type_name()
            )));
        }
        Ok(Some((metadata, factory)))
    }

    fn register_candidate(&self, candidate: Candidate) -> Result<()> {
        let Candidate {
            marked,
            metadata,
            factory,
        } = candidate;
        if !self.environment_allows(marked.as_ref(), marked.name()) {
            return Ok(());
        }
        let name = marked
            .marker(markers::NAMED)
            .and_then(|named| named.str_value("value"))
            .filter(|value| !value.trim().is_empty())
            .unwrap_or(marked.name())
            .to_string();
        self.ensure_unique(&name)?;

        let depends_on = marked.marker(markers::DEPENDS_ON).map(|m| DependsOn::from_marker(m));
        if let Some(depends_on) = &depends_on {
            if let Some(unmet) = self.unmet_precondition(&marked, depends_on) {
                debug!("Skip '{}': {}", name, unmet);
                return Ok(());
            }
        }
        let scope = self.scope_of(marked.as_ref(), &name);
        let definition = BeanDefinition::new(name, scope, metadata, Arc::clone(&marked))
            .with_depends_on(depends_on);
        if !factory.validate(self, &definition)? {
            info!(
                "{}: '{}' rejected by its factory, skip.",
                simple_name(definition.metadata_type()),
                definition.name()
            );
            return Ok(());
        }

        let producer = self.producer(factory, definition.clone());
        let bean = Arc::new(Bean::new(definition, producer, self.building()));
        self.write("bean", |registry| {
            registry.insert_bean(Arc::clone(&bean));
            Ok(())
        })?;
        info!("{}: '{}'.", simple_name(bean.metadata_type()), bean.name());

        if bean.metadata_type() == markers::SUPPLIER {
            self.register_supplies(&bean)?;
        }
        Ok(())
    }

    /// Registers a bean for every named method of a supplier component.
    fn register_supplies(&self, supplier: &Arc<Bean>) -> Result<()> {
        let marked = supplier.marked();
        for (owner, method) in public_methods(marked) {
            let Some(named) = method.marker(markers::NAMED) else {
                continue;
            };
            if method.access().is_static() {
                warn!(
                    "Supplier '{}' supply method '{}' is static, skip.",
                    marked.name(),
                    method.name()
                );
                continue;
            }
            let product_type = match method.return_type() {
                None => {
                    warn!(
                        "Supplier '{}' supply method '{}' returns void, skip.",
                        marked.name(),
                        method.name()
                    );
                    continue;
                }
                Some(FieldType::Object(product_type)) => product_type.clone(),
                Some(other) => {
                    warn!(
                        "Supplier '{}' supply method '{}' returns {}, skip.",
                        marked.name(),
                        method.name(),
                        other
                    );
                    continue;
                }
            };
            if !self.environment_allows(&method, method.name()) {
                continue;
            }
            let name = named
                .str_value("value")
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| {
                    ContextError::validation(format!(
                        "supplier '{}' supply method '{}' must have a valid bean name",
                        marked.name(),
                        method.name()
                    ))
                })?
                .to_string();
            self.ensure_unique(&name)?;

            let depends_on = method.marker(markers::DEPENDS_ON).map(|m| DependsOn::from_marker(m));
            if let Some(depends_on) = &depends_on {
                if let Some(unmet) = self.unmet_precondition(marked, depends_on) {
                    debug!("Skip '{}': {}", name, unmet);
                    continue;
                }
            }
            let product = match marked.cache.resolve(&product_type) {
                Ok(product) => product,
                Err(err) if err.is_not_found() => {
                    warn!("Supply '{}' returns unknown type {}, skip.", name, product_type);
                    continue;
                }
                Err(err) => return Err(err.into()),
            };
            if !self.types().contains(product.name()) {
                warn!("Supply '{}': no type binding for '{}', skip.", name, product.name());
                continue;
            }

            let scope = self.scope_of(&method, &name);
            let definition =
                BeanDefinition::new(name, scope, Arc::clone(supplier.metadata()), product)
                    .with_metadata_type(markers::COMPONENT)
                    .with_depends_on(depends_on);
            let producer = self.supply_producer(Arc::clone(supplier), owner, method, definition.clone());
            let bean = Arc::new(Bean::new(definition, producer, self.building()));
            self.write("bean", |registry| {
                registry.insert_bean(Arc::clone(&bean));
                Ok(())
            })?;
            info!("{}: '{}'.", simple_name(markers::COMPONENT), bean.name());
        }
        Ok(())
    }

    fn supply_producer(
        &self,
        supplier: Arc<Bean>,
        owner: Arc<TypeDescriptor>,
        method: MethodDescriptor,
        definition: BeanDefinition,
    ) -> Producer {
        let context = Arc::downgrade(&self.inner);
        Arc::new(move || {
            let context = upgrade(&context)?;
            context.materialize_dependencies(&definition)?;
            let target = supplier.instance()?;
            let product = context.invoke(&owner, &method, &target)?.ok_or_else(|| {
                ContextError::wiring(format!(
                    "supply method '{}' of '{}' produced nothing",
                    method.name(),
                    supplier.name()
                ))
            })?;
            let product_type = definition.marked().name();
            let binding = context.types().get(product_type).ok_or_else(|| {
                ContextError::wiring(format!("no type binding for '{product_type}'"))
            })?;
            let instance = Instance::new(product, binding);
            if !instance.is_exact() {
                return Err(ContextError::wiring(format!(
                    "supply '{}' produced a value that is not a {}",
                    definition.name(),
                    instance.binding().rust_name()
                )));
            }
            context
                .inner
                .destruction
                .lock()
                .register_destroy(instance.clone(), definition.name());
            Ok(instance)
        })
    }

    fn ensure_unique(&self, name: &str) -> Result<()> {
        if self.inner.registry.read().by_name.contains_key(name) {
            return Err(ContextError::validation(format!(
                "bean name '{name}' is duplicated"
            )));
        }
        Ok(())
    }

    fn environment_allows(&self, annotated: &dyn Annotated, what: &str) -> bool {
        let Some(required) = annotated
            .marker(markers::ENVIRONMENT)
            .and_then(|marker| marker.str_value("value"))
            .filter(|value| !value.is_empty())
        else {
            return true;
        };
        let current = self.environment();
        if required != current {
            debug!(
                "Skip '{}': requires environment '{}', current is '{}'",
                what, required, current
            );
            return false;
        }
        true
    }

    fn scope_of(&self, annotated: &dyn Annotated, what: &str) -> Scope {
        let default = self.config().default_scope;
        match annotated
            .marker(markers::SCOPE)
            .and_then(|marker| marker.str_value("value"))
        {
            None => default,
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                warn!("Unknown scope '{}' on '{}', using {}", raw, what, default);
                default
            }),
        }
    }

    /// Why a `DependsOn` precondition on classes or properties fails.
    fn unmet_precondition(&self, marked: &TypeDescriptor, depends_on: &DependsOn) -> Option<String> {
        for class in &depends_on.classes {
            match marked.cache.resolve(class) {
                Ok(_) => {}
                Err(err) if err.is_not_found() => {
                    return Some(format!("depend class '{class}' not found"));
                }
                Err(err) => return Some(format!("depend class '{class}' unreadable: {err}")),
            }
        }
        for requirement in &depends_on.properties {
            match self.property(&requirement.key) {
                None => return Some(format!("depend property '{}' is not set", requirement.key)),
                Some(property) if requirement.strict && property.value() != requirement.value => {
                    return Some(format!(
                        "depend property '{}' is '{}', not '{}'",
                        requirement.key,
                        property.value(),
                        requirement.value
                    ));
                }
                Some(_) => {}
            }
        }
        None
    }

    /// Drops beans whose `DependsOn` bean names are missing, part of a
    /// cycle, or themselves dropped.
    fn prune_unresolved(&self) {
        let beans = self.inner.registry.read().beans.clone();
        let graph: HashMap<&str, &[String]> = beans
            .iter()
            .map(|bean| (bean.name(), bean.definition().depends_on_beans()))
            .collect();

        let mut marks = HashMap::new();
        for bean in &beans {
            let mut path = Vec::new();
            resolve(bean.name(), &graph, &mut marks, &mut path);
        }
        let dropped: Vec<String> = marks
            .iter()
            .filter(|(_, mark)| **mark == Mark::Done(false))
            .map(|(name, _)| name.to_string())
            .filter(|name| graph.contains_key(name.as_str()))
            .collect();
        if dropped.is_empty() {
            return;
        }
        for name in &dropped {
            warn!("Bean '{}' has unresolved dependencies, removed.", name);
        }
        self.inner.registry.write().remove_beans(&dropped);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done(bool),
}

/// Depth-first check that `name` and everything it depends on exists and
/// is acyclic.
fn resolve<'a>(
    name: &'a str,
    graph: &HashMap<&'a str, &'a [String]>,
    marks: &mut HashMap<&'a str, Mark>,
    path: &mut Vec<&'a str>,
) -> bool {
    let Some(&depends) = graph.get(name) else {
        return false;
    };
    match marks.get(name) {
        Some(Mark::Done(resolved)) => return *resolved,
        Some(Mark::Visiting) => {
            path.push(name);
            error!("Circular bean dependency: {}", path.join(" -> "));
            path.pop();
            return false;
        }
        None => {}
    }
    marks.insert(name, Mark::Visiting);
    path.push(name);
    let mut resolved = true;
    for dependency in depends {
        if !resolve(dependency.as_str(), graph, marks, path) {
            if !graph.contains_key(dependency.as_str()) {
                warn!("Bean '{}' depends on missing bean '{}'", name, dependency);
            }
            resolved = false;
        }
    }
    path.pop();
    marks.insert(name, Mark::Done(resolved));
    resolved
}

/// Whether `stem` (a slash-separated class path without extension) lies in
/// package `prefix` or below it.
fn in_package(stem: &str, prefix: &str) -> bool {
    prefix.is_empty()
        || stem
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}
