use super::instance::Instance;
use super::lazy::Lazy;
use crate::descriptor::{MetadataMarker, TypeDescriptor};
use crate::error::{ContextError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use strum_macros::{Display, EnumString};

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// One shared instance, created on first access.
    #[default]
    Singleton,
    /// A fresh instance on every access.
    Prototype,
}

/// A property a component needs before it is registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyRequirement {
    pub key: String,
    pub value: String,
    /// When set, the property must equal `value`; otherwise presence is
    /// enough.
    pub strict: bool,
}

/// Preconditions declared through the `DependsOn` marker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependsOn {
    /// Types that must be locatable.
    pub classes: Vec<String>,
    pub properties: Vec<PropertyRequirement>,
    /// Beans that must be registered, and are materialized first.
    pub beans: Vec<String>,
}

impl DependsOn {
    pub fn from_marker(marker: &MetadataMarker) -> Self {
        let properties = marker
            .marker_list("properties")
            .into_iter()
            .filter_map(|property| {
                let key = property.str_value("key")?.to_string();
                Some(PropertyRequirement {
                    key,
                    value: property.str_value("value").unwrap_or_default().to_string(),
                    strict: property.bool_value("strict").unwrap_or(false),
                })
            })
            .collect();
        Self {
            classes: marker
                .type_list("classes")
                .iter()
                .map(|class| class.name().to_string())
                .collect(),
            properties,
            beans: marker.str_list("beans"),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty() && self.properties.is_empty() && self.beans.is_empty()
    }
}

/// Everything known about a bean except how to produce it.
#[derive(Clone)]
pub struct BeanDefinition {
    pub(crate) name: String,
    pub(crate) scope: Scope,
    pub(crate) metadata_type: String,
    pub(crate) metadata: Arc<MetadataMarker>,
    pub(crate) marked: Arc<TypeDescriptor>,
    pub(crate) depends_on: Option<DependsOn>,
}

impl BeanDefinition {
    pub fn new(
        name: impl Into<String>,
        scope: Scope,
        metadata: Arc<MetadataMarker>,
        marked: Arc<TypeDescriptor>,
    ) -> Self {
        Self {
            name: name.into(),
            scope,
            metadata_type: metadata.type_name().to_string(),
            metadata,
            marked,
            depends_on: None,
        }
    }

    pub fn with_metadata_type(mut self, metadata_type: impl Into<String>) -> Self {
        self.metadata_type = metadata_type.into();
        self
    }

    pub fn with_depends_on(mut self, depends_on: Option<DependsOn>) -> Self {
        self.depends_on = depends_on.filter(|it| !it.is_empty());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Marker type the bean's factory is registered under.
    pub fn metadata_type(&self) -> &str {
        &self.metadata_type
    }

    pub fn metadata(&self) -> &Arc<MetadataMarker> {
        &self.metadata
    }

    /// Descriptor of the bean's declared type.
    pub fn marked(&self) -> &Arc<TypeDescriptor> {
        &self.marked
    }

    pub fn depends_on(&self) -> Option<&DependsOn> {
        self.depends_on.as_ref()
    }

    pub fn depends_on_beans(&self) -> &[String] {
        self.depends_on
            .as_ref()
            .map(|it| it.beans.as_slice())
            .unwrap_or_default()
    }
}

impl fmt::Debug for BeanDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanDefinition")
            .field("name", &self.name)
            .field("scope", &self.scope)
            .field("metadata_type", &self.metadata_type)
            .field("marked", &self.marked.name())
            .field("depends_on", &self.depends_on)
            .finish()
    }
}

pub(crate) type Producer = Arc<dyn Fn() -> Result<Instance> + Send + Sync>;

/// Whether an instance of the named marked type is being created right now.
pub(crate) type Building = Arc<dyn Fn(&str) -> bool + Send + Sync>;

enum Provider {
    Singleton(Lazy<Instance>),
    Prototype(Producer),
}

/// A registered component: its definition plus its instance provider.
pub struct Bean {
    definition: BeanDefinition,
    provider: Provider,
    building: Building,
}

impl Bean {
    pub(crate) fn new(definition: BeanDefinition, producer: Producer, building: Building) -> Self {
        let provider = match definition.scope {
            Scope::Singleton => Provider::Singleton(Lazy::new(move || producer())),
            Scope::Prototype => Provider::Prototype(producer),
        };
        Self {
            definition,
            provider,
            building,
        }
    }

    pub fn definition(&self) -> &BeanDefinition {
        &self.definition
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn scope(&self) -> Scope {
        self.definition.scope
    }

    pub fn metadata_type(&self) -> &str {
        &self.definition.metadata_type
    }

    pub fn metadata(&self) -> &Arc<MetadataMarker> {
        &self.definition.metadata
    }

    pub fn marked(&self) -> &Arc<TypeDescriptor> {
        &self.definition.marked
    }

    pub fn is_singleton(&self) -> bool {
        self.definition.scope == Scope::Singleton
    }

    /// The singleton instance, or a fresh prototype instance.
    ///
    /// A singleton that is still being created, on this thread or another,
    /// is reported as a circular dependency instead of being waited for.
    pub fn instance(&self) -> Result<Instance> {
        match &self.provider {
            Provider::Singleton(lazy) => {
                if let Some(instance) = lazy.peek() {
                    return Ok(instance);
                }
                let marked = self.definition.marked.name();
                if (self.building)(marked) {
                    return Err(ContextError::circular(format!(
                        "bean '{}' ({}) requested while it is being created",
                        self.definition.name, marked
                    )));
                }
                lazy.get()
            }
            Provider::Prototype(producer) => producer(),
        }
    }

    /// Whether a singleton has already been created.
    pub fn is_materialized(&self) -> bool {
        match &self.provider {
            Provider::Singleton(lazy) => lazy.is_initialized(),
            Provider::Prototype(_) => false,
        }
    }

    /// Whether this bean can stand in for `type_name`.
    pub fn is_assignable_to(&self, type_name: &str) -> bool {
        self.definition.marked.is_subtype_of(type_name)
    }
}

impl fmt::Debug for Bean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bean")
            .field("name", &self.definition.name)
            .field("scope", &self.definition.scope)
            .field("marked", &self.definition.marked.name())
            .field("materialized", &self.is_materialized())
            .finish()
    }
}
