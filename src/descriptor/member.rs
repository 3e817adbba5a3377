//! Field, method and parameter descriptors.
//!
//! Members are owned by their declaring [`TypeDescriptor`](super::TypeDescriptor)
//! and only record names; nothing here resolves other types.

use super::access::AccessFlags;
use super::marker::{Annotated, MarkerValue, MetadataMarker};
use super::signature::{FieldType, GenericType};
use std::sync::Arc;

/// Compile-time constant attached to a static final field.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantValue {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(String),
}

#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub(crate) declaring_type: String,
    pub(crate) name: String,
    pub(crate) access: AccessFlags,
    pub(crate) field_type: FieldType,
    pub(crate) generic_type: Option<GenericType>,
    pub(crate) constant: Option<ConstantValue>,
    pub(crate) markers: Vec<Arc<MetadataMarker>>,
}

impl FieldDescriptor {
    pub fn declaring_type(&self) -> &str {
        &self.declaring_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn access(&self) -> AccessFlags {
        self.access
    }

    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    pub fn generic_type(&self) -> Option<&GenericType> {
        self.generic_type.as_ref()
    }

    pub fn constant(&self) -> Option<&ConstantValue> {
        self.constant.as_ref()
    }
}

impl Annotated for FieldDescriptor {
    fn markers(&self) -> &[Arc<MetadataMarker>] {
        &self.markers
    }
}

#[derive(Debug, Clone)]
pub struct ParameterDescriptor {
    pub(crate) index: usize,
    pub(crate) name: Option<String>,
    pub(crate) param_type: FieldType,
    pub(crate) generic_type: Option<GenericType>,
    pub(crate) markers: Vec<Arc<MetadataMarker>>,
}

impl ParameterDescriptor {
    /// Zero-based position in the declared parameter list.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Source name, when the class was compiled with parameter names or
    /// debug information.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn param_type(&self) -> &FieldType {
        &self.param_type
    }

    pub fn generic_type(&self) -> Option<&GenericType> {
        self.generic_type.as_ref()
    }
}

impl Annotated for ParameterDescriptor {
    fn markers(&self) -> &[Arc<MetadataMarker>] {
        &self.markers
    }
}

/// A method or constructor.
#[derive(Debug, Clone)]
pub struct MethodDescriptor {
    pub(crate) declaring_type: String,
    pub(crate) name: String,
    pub(crate) access: AccessFlags,
    pub(crate) descriptor: String,
    pub(crate) parameters: Vec<ParameterDescriptor>,
    pub(crate) return_type: Option<FieldType>,
    pub(crate) generic_return: Option<GenericType>,
    pub(crate) exceptions: Vec<String>,
    pub(crate) default_value: Option<MarkerValue>,
    pub(crate) markers: Vec<Arc<MetadataMarker>>,
}

impl MethodDescriptor {
    pub fn declaring_type(&self) -> &str {
        &self.declaring_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn access(&self) -> AccessFlags {
        self.access
    }

    /// Raw descriptor, e.g. `(Ljava/lang/String;)V`.
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    pub fn parameters(&self) -> &[ParameterDescriptor] {
        &self.parameters
    }

    /// `None` for void methods and constructors.
    pub fn return_type(&self) -> Option<&FieldType> {
        self.return_type.as_ref()
    }

    pub fn generic_return(&self) -> Option<&GenericType> {
        self.generic_return.as_ref()
    }

    /// Declared checked exception type names.
    pub fn exceptions(&self) -> &[String] {
        &self.exceptions
    }

    /// Default of an annotation-type element.
    pub fn default_value(&self) -> Option<&MarkerValue> {
        self.default_value.as_ref()
    }

    pub fn is_constructor(&self) -> bool {
        self.name == "<init>"
    }

    /// Name plus descriptor; unique within the declaring type.
    pub fn signature_key(&self) -> String {
        format!("{}{}", self.name, self.descriptor)
    }
}

impl Annotated for MethodDescriptor {
    fn markers(&self) -> &[Arc<MetadataMarker>] {
        &self.markers
    }
}
