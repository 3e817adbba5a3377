//! Resolution of autowired parameters.
//!
//! A parameter's declared type decides the shape of what it receives:
//!
//! | Declared type     | Value                                      |
//! |-------------------|--------------------------------------------|
//! | `T`               | instance of the first bean assignable to T |
//! | `Bean<T>`         | the bean handle itself                     |
//! | `Lazy<T>`         | a lazy resolving the bean on first access  |
//! | `List<T>`         | every assignable instance, possibly empty  |
//! | `Map<String, T>`  | bean name to instance, possibly empty      |
//!
//! A `Qualifier` marker narrows every shape to the single bean with the
//! qualifier's value, or the parameter's own name when the value is blank.
//! Only parameters marked `NotNull` must resolve.

use super::bean::Bean;
use super::container::Context;
use super::instance::Instance;
use super::lazy::Lazy;
use super::markers;
use crate::descriptor::{
    Annotated, FieldType, GenericType, MethodDescriptor, ParameterDescriptor, TypeArg,
    TypeDescriptor,
};
use crate::error::{ContextError, Result};
use anyhow::anyhow;
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Clone)]
pub enum AutowireValue {
    Absent,
    Instance(Instance),
    Bean(Arc<Bean>),
    Lazy(Arc<Lazy<Instance>>),
    List(Vec<Instance>),
    Map(Vec<(String, Instance)>),
}

impl AutowireValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, AutowireValue::Absent)
    }
}

/// Resolved arguments for one autowired call.
pub struct AutowireArgs {
    owner: String,
    method: String,
    values: Vec<AutowireValue>,
}

impl AutowireArgs {
    pub fn new(owner: impl Into<String>, method: impl Into<String>, values: Vec<AutowireValue>) -> Self {
        Self {
            owner: owner.into(),
            method: method.into(),
            values,
        }
    }

    pub fn empty(owner: impl Into<String>, method: impl Into<String>) -> Self {
        Self::new(owner, method, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn value(&self, index: usize) -> Option<&AutowireValue> {
        self.values.get(index)
    }

    /// Plain parameter that must be present.
    pub fn get<T: Any + Send + Sync>(&self, index: usize) -> anyhow::Result<Arc<T>> {
        self.optional(index)?
            .ok_or_else(|| anyhow!("{}: argument {} is absent", self.location(), index))
    }

    /// Plain parameter that may be absent.
    pub fn optional<T: Any + Send + Sync>(&self, index: usize) -> anyhow::Result<Option<Arc<T>>> {
        match self.slot(index)? {
            AutowireValue::Absent => Ok(None),
            AutowireValue::Instance(instance) => self.downcast(index, instance).map(Some),
            _ => Err(self.shape_error(index, "a plain instance")),
        }
    }

    /// Plain parameter viewed through a capability such as a trait object.
    pub fn cast<U: ?Sized + Send + Sync + 'static>(&self, index: usize) -> anyhow::Result<Arc<U>> {
        match self.slot(index)? {
            AutowireValue::Instance(instance) => instance.cast::<U>().ok_or_else(|| {
                anyhow!(
                    "{}: argument {} ({}) does not provide {}",
                    self.location(),
                    index,
                    instance.type_name(),
                    std::any::type_name::<U>()
                )
            }),
            AutowireValue::Absent => Err(anyhow!("{}: argument {} is absent", self.location(), index)),
            _ => Err(self.shape_error(index, "a plain instance")),
        }
    }

    pub fn list<T: Any + Send + Sync>(&self, index: usize) -> anyhow::Result<Vec<Arc<T>>> {
        match self.slot(index)? {
            AutowireValue::List(items) => items
                .iter()
                .map(|instance| self.downcast(index, instance))
                .collect(),
            AutowireValue::Absent => Ok(Vec::new()),
            _ => Err(self.shape_error(index, "a list")),
        }
    }

    pub fn map<T: Any + Send + Sync>(&self, index: usize) -> anyhow::Result<BTreeMap<String, Arc<T>>> {
        match self.slot(index)? {
            AutowireValue::Map(entries) => entries
                .iter()
                .map(|(name, instance)| Ok((name.clone(), self.downcast(index, instance)?)))
                .collect(),
            AutowireValue::Absent => Ok(BTreeMap::new()),
            _ => Err(self.shape_error(index, "a map")),
        }
    }

    pub fn bean(&self, index: usize) -> anyhow::Result<Option<Arc<Bean>>> {
        match self.slot(index)? {
            AutowireValue::Bean(bean) => Ok(Some(Arc::clone(bean))),
            AutowireValue::Absent => Ok(None),
            _ => Err(self.shape_error(index, "a bean handle")),
        }
    }

    pub fn lazy(&self, index: usize) -> anyhow::Result<Option<Arc<Lazy<Instance>>>> {
        match self.slot(index)? {
            AutowireValue::Lazy(lazy) => Ok(Some(Arc::clone(lazy))),
            AutowireValue::Absent => Ok(None),
            _ => Err(self.shape_error(index, "a lazy")),
        }
    }

    fn slot(&self, index: usize) -> anyhow::Result<&AutowireValue> {
        self.values.get(index).ok_or_else(|| {
            anyhow!(
                "{}: argument {} out of range ({} resolved)",
                self.location(),
                index,
                self.values.len()
            )
        })
    }

    fn downcast<T: Any + Send + Sync>(&self, index: usize, instance: &Instance) -> anyhow::Result<Arc<T>> {
        instance.downcast::<T>().ok_or_else(|| {
            anyhow!(
                "{}: argument {} is {} ({}), not {}",
                self.location(),
                index,
                instance.type_name(),
                instance.binding().rust_name(),
                std::any::type_name::<T>()
            )
        })
    }

    fn shape_error(&self, index: usize, expected: &str) -> anyhow::Error {
        anyhow!("{}: argument {} is not {}", self.location(), index, expected)
    }

    fn location(&self) -> String {
        format!("{}#{}", self.owner, self.method)
    }
}

/// How a parameter wants its dependency delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Wanted {
    Plain(String),
    Bean(String),
    Lazy(String),
    List(String),
    Map(String),
}

impl Wanted {
    fn element(&self) -> &str {
        match self {
            Wanted::Plain(it)
            | Wanted::Bean(it)
            | Wanted::Lazy(it)
            | Wanted::List(it)
            | Wanted::Map(it) => it,
        }
    }
}

/// Works out what `param` asks for. `owner` resolves element types so
/// that raw uses of generic classes can be rejected.
pub(crate) fn analyze(owner: &TypeDescriptor, param: &ParameterDescriptor) -> Result<Wanted> {
    let unsupported = |reason: &str| {
        ContextError::wiring(format!(
            "parameter {} of {}: {}",
            param.index(),
            owner.name(),
            reason
        ))
    };
    let raw = match param.param_type() {
        FieldType::Object(name) => name.as_str(),
        FieldType::Array(_) => return Err(unsupported("array parameters are not supported")),
        FieldType::Primitive(p) => {
            return Err(unsupported(&format!("primitive parameter '{p}' cannot be autowired")));
        }
    };
    if !matches!(raw, markers::BEAN | markers::LAZY | markers::LIST | markers::MAP) {
        return Ok(Wanted::Plain(raw.to_string()));
    }
    let args = param
        .generic_type()
        .map(GenericType::type_args)
        .unwrap_or_default();
    let expected = if raw == markers::MAP { 2 } else { 1 };
    if args.len() != expected {
        return Err(unsupported(&format!("raw use of generic type {raw}")));
    }
    if raw == markers::MAP {
        let key = exact_class(&args[0]).ok_or_else(|| unsupported("map key must be a plain class"))?;
        if !markers::MAP_KEY_TYPES.contains(&key) {
            return Err(unsupported(&format!("map key type {key} cannot hold bean names")));
        }
    }
    let element = exact_class(&args[expected - 1])
        .ok_or_else(|| unsupported("element type must be a plain, non-generic class"))?;
    if let Ok(descriptor) = owner.cache.resolve(element) {
        if descriptor
            .signature()
            .is_some_and(|signature| !signature.type_params.is_empty())
        {
            return Err(unsupported(&format!("raw use of generic type {element}")));
        }
    }
    let element = element.to_string();
    Ok(match raw {
        markers::BEAN => Wanted::Bean(element),
        markers::LAZY => Wanted::Lazy(element),
        markers::LIST => Wanted::List(element),
        _ => Wanted::Map(element),
    })
}

fn exact_class(arg: &TypeArg) -> Option<&str> {
    match arg {
        TypeArg::Exact(GenericType::Class { name, args }) if args.is_empty() => Some(name),
        _ => None,
    }
}

impl Context {
    /// Resolves every parameter of `method`, declared on `owner`.
    pub fn resolve_arguments(
        &self,
        owner: &TypeDescriptor,
        method: &MethodDescriptor,
    ) -> Result<AutowireArgs> {
        let values = method
            .parameters()
            .iter()
            .map(|param| self.resolve_parameter(owner, method, param))
            .collect::<Result<Vec<_>>>()?;
        Ok(AutowireArgs::new(owner.name(), method.name(), values))
    }

    fn resolve_parameter(
        &self,
        owner: &TypeDescriptor,
        method: &MethodDescriptor,
        param: &ParameterDescriptor,
    ) -> Result<AutowireValue> {
        let wanted = analyze(owner, param)?;
        let element = wanted.element();
        let qualifier = match param.marker(markers::QUALIFIER) {
            Some(marker) => {
                let name = marker
                    .str_value("value")
                    .filter(|value| !value.trim().is_empty())
                    .or(param.name())
                    .ok_or_else(|| {
                        ContextError::wiring(format!(
                            "parameter {} of {}#{} is qualified but has no name",
                            param.index(),
                            owner.name(),
                            method.name()
                        ))
                    })?;
                Some(name.to_string())
            }
            None => None,
        };
        let single = || match &qualifier {
            Some(name) => self.bean_named(name, element),
            None => self.bean_of(element),
        };
        let many = || match &qualifier {
            Some(name) => self.bean_named(name, element).into_iter().collect(),
            None => self.beans_of(element),
        };

        let value = match &wanted {
            Wanted::Plain(_) => match single() {
                Some(bean) => AutowireValue::Instance(bean.instance()?),
                None => AutowireValue::Absent,
            },
            Wanted::Bean(_) => single().map_or(AutowireValue::Absent, AutowireValue::Bean),
            Wanted::Lazy(_) => match single() {
                Some(bean) => AutowireValue::Lazy(Arc::new(Lazy::new(move || bean.instance()))),
                None => AutowireValue::Absent,
            },
            Wanted::List(_) => AutowireValue::List(
                many()
                    .iter()
                    .map(|bean| bean.instance())
                    .collect::<Result<_>>()?,
            ),
            Wanted::Map(_) => AutowireValue::Map(
                many()
                    .iter()
                    .map(|bean| Ok((bean.name().to_string(), bean.instance()?)))
                    .collect::<Result<_>>()?,
            ),
        };

        if value.is_absent() && param.has_marker(markers::NOT_NULL) {
            return Err(ContextError::wiring(format!(
                "no bean of type {} for required parameter {} of {}#{}",
                element,
                param.name().unwrap_or("?"),
                owner.name(),
                method.name()
            )));
        }
        Ok(value)
    }
}
