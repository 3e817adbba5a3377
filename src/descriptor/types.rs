use super::access::AccessFlags;
use super::cache::CacheHandle;
use super::error::Result;
use super::marker::{Annotated, MetadataMarker};
use super::member::{FieldDescriptor, MethodDescriptor};
use super::signature::ClassSignature;
use dashmap::DashSet;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Immutable view of one compiled type.
///
/// Every textual reference (super type, interfaces, outer and inner types)
/// is captured while parsing, but the referenced descriptors are only
/// fetched from the owning cache when asked for.
pub struct TypeDescriptor {
    pub(crate) name: String,
    pub(crate) access: AccessFlags,
    pub(crate) major_version: u16,
    pub(crate) minor_version: u16,
    pub(crate) super_name: Option<String>,
    pub(crate) interface_names: Vec<String>,
    pub(crate) outer_name: Option<String>,
    pub(crate) inner_names: Vec<String>,
    pub(crate) signature: Option<ClassSignature>,
    pub(crate) source_file: Option<String>,
    pub(crate) fields: Vec<FieldDescriptor>,
    pub(crate) methods: Vec<MethodDescriptor>,
    pub(crate) constructors: Vec<MethodDescriptor>,
    pub(crate) markers: Vec<Arc<MetadataMarker>>,
    pub(crate) cache: CacheHandle,
    assignable: DashSet<String>,
    not_assignable: DashSet<String>,
}

impl TypeDescriptor {
    pub(crate) fn new(
        name: String,
        access: AccessFlags,
        (major_version, minor_version): (u16, u16),
        super_name: Option<String>,
        interface_names: Vec<String>,
        cache: CacheHandle,
    ) -> Self {
        Self {
            name,
            access,
            major_version,
            minor_version,
            super_name,
            interface_names,
            outer_name: None,
            inner_names: Vec::new(),
            signature: None,
            source_file: None,
            fields: Vec::new(),
            methods: Vec::new(),
            constructors: Vec::new(),
            markers: Vec::new(),
            cache,
            assignable: DashSet::new(),
            not_assignable: DashSet::new(),
        }
    }

    /// Fully qualified dotted name; nested types keep their `$` separator.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn simple_name(&self) -> &str {
        let tail = self.name.rsplit('.').next().unwrap_or(&self.name);
        tail.rsplit('$').next().unwrap_or(tail)
    }

    /// Package of the type, empty for the default package.
    pub fn package_name(&self) -> &str {
        self.name.rsplit_once('.').map(|(pkg, _)| pkg).unwrap_or("")
    }

    pub fn access(&self) -> AccessFlags {
        self.access
    }

    /// `(major, minor)` class-file version.
    pub fn version(&self) -> (u16, u16) {
        (self.major_version, self.minor_version)
    }

    pub fn super_name(&self) -> Option<&str> {
        self.super_name.as_deref()
    }

    pub fn interface_names(&self) -> &[String] {
        &self.interface_names
    }

    pub fn outer_name(&self) -> Option<&str> {
        self.outer_name.as_deref()
    }

    pub fn inner_names(&self) -> &[String] {
        &self.inner_names
    }

    pub fn signature(&self) -> Option<&ClassSignature> {
        self.signature.as_ref()
    }

    pub fn source_file(&self) -> Option<&str> {
        self.source_file.as_deref()
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.name() == name)
    }

    /// Declared methods, excluding constructors and the static initializer.
    pub fn methods(&self) -> &[MethodDescriptor] {
        &self.methods
    }

    pub fn method(&self, name: &str, descriptor: &str) -> Option<&MethodDescriptor> {
        self.methods
            .iter()
            .find(|method| method.name() == name && method.descriptor() == descriptor)
    }

    pub fn constructors(&self) -> &[MethodDescriptor] {
        &self.constructors
    }

    /// The public no-argument constructor, if declared.
    pub fn default_constructor(&self) -> Option<&MethodDescriptor> {
        self.constructors
            .iter()
            .find(|ctor| ctor.parameters().is_empty() && ctor.access().is_public())
    }

    pub fn is_interface(&self) -> bool {
        self.access.is_interface()
    }

    pub fn is_annotation(&self) -> bool {
        self.access.is_annotation()
    }

    pub fn is_abstract(&self) -> bool {
        self.access.is_abstract()
    }

    /// Resolves the direct super class.
    pub fn super_type(&self) -> Result<Option<Arc<TypeDescriptor>>> {
        self.super_name
            .as_deref()
            .map(|name| self.cache.resolve(name))
            .transpose()
    }

    /// Resolves the directly implemented interfaces.
    pub fn interfaces(&self) -> Result<Vec<Arc<TypeDescriptor>>> {
        self.interface_names
            .iter()
            .map(|name| self.cache.resolve(name))
            .collect()
    }

    pub fn outer_type(&self) -> Result<Option<Arc<TypeDescriptor>>> {
        self.outer_name
            .as_deref()
            .map(|name| self.cache.resolve(name))
            .transpose()
    }

    pub fn inner_types(&self) -> Result<Vec<Arc<TypeDescriptor>>> {
        self.inner_names
            .iter()
            .map(|name| self.cache.resolve(name))
            .collect()
    }

    /// Super classes from the direct parent upwards, stopping at the first
    /// ancestor that cannot be located.
    pub fn superclass_chain(&self) -> Vec<Arc<TypeDescriptor>> {
        let mut chain = Vec::new();
        let mut seen = HashSet::from([self.name.clone()]);
        let mut next = self.super_name.clone();
        while let Some(name) = next {
            if !seen.insert(name.clone()) {
                break;
            }
            match self.cache.resolve(&name) {
                Ok(parent) => {
                    next = parent.super_name.clone();
                    chain.push(parent);
                }
                Err(err) => {
                    if !err.is_not_found() {
                        tracing::warn!("Failed to resolve super class {} of {}: {}", name, self.name, err);
                    }
                    break;
                }
            }
        }
        chain
    }

    /// Whether `candidate` is this type or transitively extends/implements it.
    ///
    /// Ancestors that cannot be located are treated as leaves, and a
    /// hierarchy that loops back on itself ends the walk. Answers are
    /// memoized per candidate name on this descriptor.
    pub fn is_assignable_from(&self, candidate: &TypeDescriptor) -> bool {
        let mut walk = Walk::default();
        self.walk_assignable(candidate, &mut walk)
    }

    fn walk_assignable(&self, candidate: &TypeDescriptor, walk: &mut Walk) -> bool {
        if candidate.name == self.name || self.assignable.contains(&candidate.name) {
            return true;
        }
        if self.not_assignable.contains(&candidate.name) {
            return false;
        }
        if !walk.visiting.insert(candidate.name.clone()) {
            tracing::warn!("Cyclic hierarchy through {} while checking {}", candidate.name, self.name);
            walk.cyclic = true;
            return false;
        }
        let found = candidate
            .super_name
            .iter()
            .chain(candidate.interface_names.iter())
            .any(|ancestor| {
                if *ancestor == self.name {
                    return true;
                }
                match candidate.cache.resolve(ancestor) {
                    Ok(parent) => self.walk_assignable(&parent, walk),
                    Err(err) => {
                        if !err.is_not_found() {
                            tracing::warn!(
                                "Failed to resolve {} while checking {}: {}",
                                ancestor,
                                candidate.name,
                                err
                            );
                        }
                        false
                    }
                }
            });
        walk.visiting.remove(&candidate.name);
        if found {
            self.assignable.insert(candidate.name.clone());
        } else if !walk.cyclic {
            // negatives below a cut-off cycle are incomplete
            self.not_assignable.insert(candidate.name.clone());
        }
        found
    }

    /// [`is_assignable_from`](Self::is_assignable_from) by name, resolving
    /// the candidate through this descriptor's cache.
    pub fn is_assignable_from_name(&self, candidate: &str) -> bool {
        if candidate == self.name {
            return true;
        }
        match self.cache.resolve(candidate) {
            Ok(candidate) => self.is_assignable_from(&candidate),
            Err(_) => false,
        }
    }

    /// Whether this type is `type_name` or transitively extends/implements
    /// it. Works even when `type_name` itself cannot be located.
    pub fn is_subtype_of(&self, type_name: &str) -> bool {
        if type_name == self.name {
            return true;
        }
        if let Ok(target) = self.cache.resolve(type_name) {
            return target.is_assignable_from(self);
        }
        let mut seen = HashSet::new();
        let mut pending: Vec<String> = self.ancestor_names().cloned().collect();
        while let Some(name) = pending.pop() {
            if name == type_name {
                return true;
            }
            if !seen.insert(name.clone()) {
                continue;
            }
            if let Ok(parent) = self.cache.resolve(&name) {
                pending.extend(parent.ancestor_names().cloned());
            }
        }
        false
    }

    fn ancestor_names(&self) -> impl Iterator<Item = &String> {
        self.super_name.iter().chain(self.interface_names.iter())
    }

    #[cfg(test)]
    pub(crate) fn memoized_negatives(&self) -> usize {
        self.not_assignable.len()
    }
}

impl Annotated for TypeDescriptor {
    fn markers(&self) -> &[Arc<MetadataMarker>] {
        &self.markers
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("access", &self.access)
            .field("super_name", &self.super_name)
            .field("interfaces", &self.interface_names)
            .field("markers", &self.markers)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}


/// Types on the stack of the current assignability walk.
#[derive(Default)]
struct Walk {
    visiting: HashSet<String>,
    cyclic: bool,
}
