//! Single forward pass over a class file.
//!
//! Only the parts discovery and wiring need are decoded: hierarchy names,
//! members, generic signatures, parameter names, inner-class links and
//! annotations. Bytecode bodies are skipped.

use super::access::AccessFlags;
use super::cache::CacheHandle;
use super::constant_pool::{Constant, ConstantPool};
use super::error::{DescriptorError, Result};
use super::marker::{MarkerValue, MetadataMarker, TypeRef};
use super::member::{ConstantValue, FieldDescriptor, MethodDescriptor, ParameterDescriptor};
use super::reader::ByteReader;
use super::signature::{ClassSignature, FieldType, GenericType, MethodSignature, MethodType};
use super::types::TypeDescriptor;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

const MAGIC: u32 = 0xCAFE_BABE;

/// Parses class-file bytes into a descriptor linked to `cache`.
pub(crate) fn parse(bytes: &[u8], cache: CacheHandle) -> Result<TypeDescriptor> {
    let mut reader = ByteReader::new(bytes);
    let magic = reader.u32()?;
    if magic != MAGIC {
        return Err(DescriptorError::malformed(format!(
            "bad magic number 0x{magic:08x}"
        )));
    }
    let minor = reader.u16()?;
    let major = reader.u16()?;
    let pool = ConstantPool::parse(&mut reader)?;
    let ctx = Ctx { pool: &pool, cache };

    let access = AccessFlags::new(reader.u16()?);
    let name = pool.class_name(reader.u16()?)?;
    let super_name = pool.optional_class_name(reader.u16()?)?;
    let interfaces = reader.counted(|r| pool.class_name(r.u16()?))?;

    let mut descriptor = TypeDescriptor::new(
        name,
        access,
        (major, minor),
        super_name,
        interfaces,
        ctx.cache.clone(),
    );

    descriptor.fields = reader.counted(|r| ctx.field(r, &descriptor.name))?;

    let methods = reader.counted(|r| ctx.method(r, &descriptor.name))?;
    for method in methods {
        match method.name() {
            "<clinit>" => {}
            "<init>" => descriptor.constructors.push(method),
            _ => descriptor.methods.push(method),
        }
    }

    let this = descriptor.name.clone();
    ctx.attributes(&mut reader, |attr, r| {
        match attr {
            "RuntimeVisibleAnnotations" => descriptor.markers.extend(ctx.markers(r, true)?),
            "RuntimeInvisibleAnnotations" => descriptor.markers.extend(ctx.markers(r, false)?),
            "Signature" => {
                descriptor.signature = Some(ClassSignature::parse(pool.utf8(r.u16()?)?)?);
            }
            "SourceFile" => descriptor.source_file = Some(pool.utf8(r.u16()?)?.to_string()),
            "InnerClasses" => {
                let count = r.u16()?;
                for _ in 0..count {
                    let inner = pool.class_name(r.u16()?)?;
                    let outer = pool.optional_class_name(r.u16()?)?;
                    r.skip(4)?;
                    if inner == this {
                        if outer.is_some() {
                            descriptor.outer_name = outer;
                        }
                    } else if outer.as_deref() == Some(this.as_str()) {
                        descriptor.inner_names.push(inner);
                    }
                }
            }
            "EnclosingMethod" => {
                let outer = pool.class_name(r.u16()?)?;
                descriptor.outer_name.get_or_insert(outer);
            }
            _ => {}
        }
        Ok(())
    })?;

    if reader.remaining() != 0 {
        return Err(DescriptorError::malformed(format!(
            "{} trailing bytes after class {}",
            reader.remaining(),
            descriptor.name
        )));
    }
    Ok(descriptor)
}

struct Ctx<'p> {
    pool: &'p ConstantPool,
    cache: CacheHandle,
}

impl Ctx<'_> {
    /// Runs `visit` for each attribute with a reader bounded to its body.
    fn attributes(
        &self,
        reader: &mut ByteReader<'_>,
        mut visit: impl FnMut(&str, &mut ByteReader<'_>) -> Result<()>,
    ) -> Result<()> {
        let count = reader.u16()?;
        for _ in 0..count {
            let name = self.pool.utf8(reader.u16()?)?;
            let len = reader.u32()? as usize;
            let mut body = ByteReader::new(reader.take(len)?);
            visit(name, &mut body)?;
        }
        Ok(())
    }

    fn field(&self, reader: &mut ByteReader<'_>, declaring: &str) -> Result<FieldDescriptor> {
        let access = AccessFlags::new(reader.u16()?);
        let name = self.pool.utf8(reader.u16()?)?.to_string();
        let field_type = FieldType::parse(self.pool.utf8(reader.u16()?)?)?;
        let mut field = FieldDescriptor {
            declaring_type: declaring.to_string(),
            name,
            access,
            field_type,
            generic_type: None,
            constant: None,
            markers: Vec::new(),
        };
        self.attributes(reader, |attr, r| {
            match attr {
                "ConstantValue" => field.constant = Some(self.constant_value(r.u16()?)?),
                "Signature" => {
                    field.generic_type = Some(GenericType::parse(self.pool.utf8(r.u16()?)?)?);
                }
                "RuntimeVisibleAnnotations" => field.markers.extend(self.markers(r, true)?),
                "RuntimeInvisibleAnnotations" => field.markers.extend(self.markers(r, false)?),
                _ => {}
            }
            Ok(())
        })?;
        Ok(field)
    }

    fn constant_value(&self, index: u16) -> Result<ConstantValue> {
        Ok(match self.pool.get(index)? {
            Constant::Integer(v) => ConstantValue::Int(*v),
            Constant::Long(v) => ConstantValue::Long(*v),
            Constant::Float(v) => ConstantValue::Float(*v),
            Constant::Double(v) => ConstantValue::Double(*v),
            Constant::String(utf8) => ConstantValue::Str(self.pool.utf8(*utf8)?.to_string()),
            other => {
                return Err(DescriptorError::malformed(format!(
                    "unsupported ConstantValue {other:?}"
                )));
            }
        })
    }

    fn method(&self, reader: &mut ByteReader<'_>, declaring: &str) -> Result<MethodDescriptor> {
        let access = AccessFlags::new(reader.u16()?);
        let name = self.pool.utf8(reader.u16()?)?.to_string();
        let descriptor = self.pool.utf8(reader.u16()?)?.to_string();
        let method_type = MethodType::parse(&descriptor)?;

        let mut markers = Vec::new();
        let mut param_markers: Vec<Vec<Arc<MetadataMarker>>> = Vec::new();
        let mut signature = None;
        let mut exceptions = Vec::new();
        let mut default_value = None;
        let mut declared_names: Vec<Option<String>> = Vec::new();
        let mut local_names: HashMap<usize, String> = HashMap::new();

        self.attributes(reader, |attr, r| {
            match attr {
                "Code" => local_names = self.local_variable_names(r)?,
                "Exceptions" => exceptions = r.counted(|r| self.pool.class_name(r.u16()?))?,
                "Signature" => signature = Some(MethodSignature::parse(self.pool.utf8(r.u16()?)?)?),
                "AnnotationDefault" => default_value = Some(self.element_value(r, true)?),
                "RuntimeVisibleAnnotations" => markers.extend(self.markers(r, true)?),
                "RuntimeInvisibleAnnotations" => markers.extend(self.markers(r, false)?),
                "RuntimeVisibleParameterAnnotations" => {
                    merge_param_markers(&mut param_markers, self.parameter_markers(r, true)?)
                }
                "RuntimeInvisibleParameterAnnotations" => {
                    merge_param_markers(&mut param_markers, self.parameter_markers(r, false)?)
                }
                "MethodParameters" => {
                    let count = r.u8()?;
                    declared_names.clear();
                    for _ in 0..count {
                        let name = self.pool.optional_utf8(r.u16()?)?.map(str::to_string);
                        r.skip(2)?;
                        declared_names.push(name);
                    }
                }
                _ => {}
            }
            Ok(())
        })?;

        let total = method_type.params.len();
        let mut slot = if access.is_static() { 0 } else { 1 };
        let mut parameters = Vec::with_capacity(total);
        for (index, param_type) in method_type.params.into_iter().enumerate() {
            let name = declared_names
                .get(index)
                .cloned()
                .flatten()
                .or_else(|| local_names.get(&slot).cloned());
            slot += param_type.slot_size();
            let generic_type = signature
                .as_ref()
                .and_then(|sig| aligned(&sig.params, total, index))
                .cloned();
            let markers = aligned(&param_markers, total, index)
                .cloned()
                .unwrap_or_default();
            parameters.push(ParameterDescriptor {
                index,
                name,
                param_type,
                generic_type,
                markers,
            });
        }

        Ok(MethodDescriptor {
            declaring_type: declaring.to_string(),
            name,
            access,
            descriptor,
            parameters,
            return_type: method_type.ret,
            generic_return: signature.and_then(|sig| sig.ret),
            exceptions,
            default_value,
            markers,
        })
    }

    /// Collects parameter names from the `LocalVariableTable` nested in `Code`.
    fn local_variable_names(&self, reader: &mut ByteReader<'_>) -> Result<HashMap<usize, String>> {
        reader.skip(4)?; // max_stack, max_locals
        let code_length = reader.u32()? as usize;
        reader.skip(code_length)?;
        let handlers = reader.u16()? as usize;
        reader.skip(handlers * 8)?;
        let mut names = HashMap::new();
        self.attributes(reader, |attr, r| {
            if attr == "LocalVariableTable" {
                let count = r.u16()?;
                for _ in 0..count {
                    let start_pc = r.u16()?;
                    r.skip(2)?;
                    let name = self.pool.utf8(r.u16()?)?;
                    r.skip(2)?;
                    let index = r.u16()? as usize;
                    if start_pc == 0 {
                        names.entry(index).or_insert_with(|| name.to_string());
                    }
                }
            }
            Ok(())
        })?;
        Ok(names)
    }

    fn markers(&self, reader: &mut ByteReader<'_>, visible: bool) -> Result<Vec<Arc<MetadataMarker>>> {
        reader.counted(|r| self.marker(r, visible).map(Arc::new))
    }

    fn parameter_markers(
        &self,
        reader: &mut ByteReader<'_>,
        visible: bool,
    ) -> Result<Vec<Vec<Arc<MetadataMarker>>>> {
        let count = reader.u8()?;
        (0..count).map(|_| self.markers(reader, visible)).collect()
    }

    fn marker(&self, reader: &mut ByteReader<'_>, visible: bool) -> Result<MetadataMarker> {
        let type_name = object_name(self.pool.utf8(reader.u16()?)?)?;
        let pairs = reader.u16()?;
        let mut values = BTreeMap::new();
        for _ in 0..pairs {
            let name = self.pool.utf8(reader.u16()?)?.to_string();
            let value = self.element_value(reader, visible)?;
            values.insert(name, value);
        }
        Ok(MetadataMarker::new(type_name, values, visible, self.cache.clone()))
    }

    fn element_value(&self, reader: &mut ByteReader<'_>, visible: bool) -> Result<MarkerValue> {
        let tag = reader.u8()?;
        Ok(match tag {
            b'B' | b'S' | b'I' => MarkerValue::Int(self.pool.integer(reader.u16()?)? as i64),
            b'Z' => MarkerValue::Bool(self.pool.integer(reader.u16()?)? != 0),
            b'C' => {
                let code = self.pool.integer(reader.u16()?)? as u32;
                MarkerValue::Char(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER))
            }
            b'J' => match self.pool.get(reader.u16()?)? {
                Constant::Long(v) => MarkerValue::Int(*v),
                other => return Err(bad_element(tag, other)),
            },
            b'F' => match self.pool.get(reader.u16()?)? {
                Constant::Float(v) => MarkerValue::Float(*v as f64),
                other => return Err(bad_element(tag, other)),
            },
            b'D' => match self.pool.get(reader.u16()?)? {
                Constant::Double(v) => MarkerValue::Float(*v),
                other => return Err(bad_element(tag, other)),
            },
            b's' => MarkerValue::Str(self.pool.utf8(reader.u16()?)?.to_string()),
            b'e' => {
                let type_name = object_name(self.pool.utf8(reader.u16()?)?)?;
                let constant = self.pool.utf8(reader.u16()?)?.to_string();
                MarkerValue::Enum {
                    type_name,
                    constant,
                }
            }
            b'c' => MarkerValue::Type(self.type_ref(self.pool.utf8(reader.u16()?)?)?),
            b'@' => MarkerValue::Marker(Arc::new(self.marker(reader, visible)?)),
            b'[' => MarkerValue::List(reader.counted(|r| self.element_value(r, visible))?),
            other => {
                return Err(DescriptorError::malformed(format!(
                    "unknown element value tag '{}'",
                    other as char
                )));
            }
        })
    }

    fn type_ref(&self, descriptor: &str) -> Result<TypeRef> {
        if descriptor == "V" {
            return Ok(TypeRef::new("void".into(), None, self.cache.clone()));
        }
        let ty = FieldType::parse(descriptor)?;
        Ok(TypeRef::new(
            ty.to_string(),
            ty.class_name().map(str::to_string),
            self.cache.clone(),
        ))
    }
}

/// Lines up per-parameter data that may omit leading synthetic parameters.
fn aligned<T>(items: &[T], total: usize, index: usize) -> Option<&T> {
    let offset = total.checked_sub(items.len())?;
    index.checked_sub(offset).and_then(|i| items.get(i))
}

fn merge_param_markers(
    into: &mut Vec<Vec<Arc<MetadataMarker>>>,
    from: Vec<Vec<Arc<MetadataMarker>>>,
) {
    if into.len() < from.len() {
        into.resize_with(from.len(), Vec::new);
    }
    for (slot, markers) in into.iter_mut().zip(from) {
        slot.extend(markers);
    }
}

fn object_name(descriptor: &str) -> Result<String> {
    match FieldType::parse(descriptor)? {
        FieldType::Object(name) => Ok(name),
        other => Err(DescriptorError::malformed(format!(
            "expected an object type, found {other}"
        ))),
    }
}

fn bad_element(tag: u8, found: &Constant) -> DescriptorError {
    DescriptorError::malformed(format!(
        "element value '{}' points at {found:?}",
        tag as char
    ))
}
