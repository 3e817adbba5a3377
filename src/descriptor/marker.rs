//! Metadata markers (annotations) and their attribute values.
//!
//! Values are a closed tagged union. Class-literal values are kept as
//! [`TypeRef`] handles that only touch the descriptor cache when
//! [`TypeRef::resolve`] is called, so walking the markers of a type never
//! cascades into loading the types those markers mention.

use super::cache::CacheHandle;
use super::error::{DescriptorError, Result};
use super::types::TypeDescriptor;
use once_cell::sync::OnceCell;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// An attribute value of a [`MetadataMarker`].
#[derive(Debug, Clone, PartialEq)]
pub enum MarkerValue {
    Bool(bool),
    Char(char),
    /// byte, short, int and long values.
    Int(i64),
    /// float and double values.
    Float(f64),
    Str(String),
    Enum { type_name: String, constant: String },
    Type(TypeRef),
    Marker(Arc<MetadataMarker>),
    List(Vec<MarkerValue>),
}

impl MarkerValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_type(&self) -> Option<&TypeRef> {
        match self {
            Self::Type(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_marker(&self) -> Option<&Arc<MetadataMarker>> {
        match self {
            Self::Marker(value) => Some(value),
            _ => None,
        }
    }

    /// Enum constant name, for enum-valued attributes.
    pub fn as_enum_constant(&self) -> Option<&str> {
        match self {
            Self::Enum { constant, .. } => Some(constant),
            _ => None,
        }
    }

    /// Array attributes; a single value is treated as a one-element array,
    /// which is how the compiler lets array attributes be written.
    pub fn elements(&self) -> Vec<&MarkerValue> {
        match self {
            Self::List(items) => items.iter().collect(),
            other => vec![other],
        }
    }
}

/// A class-literal attribute value, resolved on first use.
#[derive(Clone)]
pub struct TypeRef {
    name: String,
    class_name: Option<String>,
    cache: CacheHandle,
    resolved: OnceCell<Arc<TypeDescriptor>>,
}

impl TypeRef {
    pub(crate) fn new(name: String, class_name: Option<String>, cache: CacheHandle) -> Self {
        Self {
            name,
            class_name,
            cache,
            resolved: OnceCell::new(),
        }
    }

    /// Source-level name: `com.acme.Repo`, `int`, `void`, `java.lang.String[]`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dotted class name when the literal names a class or interface.
    pub fn class_name(&self) -> Option<&str> {
        self.class_name.as_deref()
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.get().is_some()
    }

    /// Resolves the referenced type through the owning descriptor cache.
    pub fn resolve(&self) -> Result<Arc<TypeDescriptor>> {
        self.resolved
            .get_or_try_init(|| match &self.class_name {
                Some(name) => self.cache.resolve(name),
                None => Err(DescriptorError::not_found(&self.name)),
            })
            .cloned()
    }
}

impl PartialEq for TypeRef {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRef")
            .field("name", &self.name)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

/// A declarative tag on a type, member or parameter.
#[derive(Clone)]
pub struct MetadataMarker {
    type_name: String,
    values: BTreeMap<String, MarkerValue>,
    visible: bool,
    cache: CacheHandle,
}

impl MetadataMarker {
    pub(crate) fn new(
        type_name: String,
        values: BTreeMap<String, MarkerValue>,
        visible: bool,
        cache: CacheHandle,
    ) -> Self {
        Self {
            type_name,
            values,
            visible,
            cache,
        }
    }

    /// Dotted name of the marker type.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Whether the marker is retained for runtime visibility.
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Explicitly written attribute value.
    pub fn value(&self, name: &str) -> Option<&MarkerValue> {
        self.values.get(name)
    }

    pub fn values(&self) -> impl Iterator<Item = (&str, &MarkerValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Resolves the descriptor of the marker type itself.
    ///
    /// Independent from attribute values, so a marker type that is tagged
    /// with itself does not recurse.
    pub fn resolve_type(&self) -> Result<Arc<TypeDescriptor>> {
        self.cache.resolve(&self.type_name)
    }

    /// Written value, else the default declared on the marker type.
    ///
    /// The marker type is only resolved when the attribute is absent. A
    /// marker type that cannot be found yields `Ok(None)`.
    pub fn value_or_default(&self, name: &str) -> Result<Option<MarkerValue>> {
        if let Some(value) = self.values.get(name) {
            return Ok(Some(value.clone()));
        }
        let declared = match self.resolve_type() {
            Ok(declared) => declared,
            Err(err) if err.is_not_found() => return Ok(None),
            Err(err) => return Err(err),
        };
        Ok(declared
            .methods()
            .iter()
            .find(|method| method.name() == name && method.parameters().is_empty())
            .and_then(|method| method.default_value().cloned()))
    }

    pub fn str_value(&self, name: &str) -> Option<&str> {
        self.value(name).and_then(MarkerValue::as_str)
    }

    pub fn bool_value(&self, name: &str) -> Option<bool> {
        self.value(name).and_then(MarkerValue::as_bool)
    }

    /// String array attribute; missing attributes read as empty.
    pub fn str_list(&self, name: &str) -> Vec<String> {
        self.value(name)
            .map(|value| {
                value
                    .elements()
                    .into_iter()
                    .filter_map(MarkerValue::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Nested-marker array attribute; missing attributes read as empty.
    pub fn marker_list(&self, name: &str) -> Vec<Arc<MetadataMarker>> {
        self.value(name)
            .map(|value| {
                value
                    .elements()
                    .into_iter()
                    .filter_map(MarkerValue::as_marker)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Class-literal array attribute; missing attributes read as empty.
    pub fn type_list(&self, name: &str) -> Vec<TypeRef> {
        self.value(name)
            .map(|value| {
                value
                    .elements()
                    .into_iter()
                    .filter_map(MarkerValue::as_type)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl PartialEq for MetadataMarker {
    fn eq(&self, other: &Self) -> bool {
        self.type_name == other.type_name
            && self.visible == other.visible
            && self.values == other.values
    }
}

impl fmt::Debug for MetadataMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.type_name)?;
        if !self.values.is_empty() {
            f.debug_map().entries(self.values.iter()).finish()?;
        }
        Ok(())
    }
}

/// Anything that carries metadata markers.
pub trait Annotated {
    fn markers(&self) -> &[Arc<MetadataMarker>];

    /// First directly-declared marker of the given type.
    fn marker(&self, type_name: &str) -> Option<&Arc<MetadataMarker>> {
        self.markers()
            .iter()
            .find(|marker| marker.type_name() == type_name)
    }

    fn has_marker(&self, type_name: &str) -> bool {
        self.marker(type_name).is_some()
    }
}
