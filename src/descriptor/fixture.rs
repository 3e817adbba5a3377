//! Test-only class-file writer.
//!
//! Produces real class-file bytes so descriptor and container tests run
//! against in-memory fixtures instead of checked-in binaries.

use super::access::AccessFlags;
use super::reader::encode_modified_utf8;
use super::signature::MethodType;
use std::collections::HashMap;

fn internal(name: &str) -> String {
    name.replace('.', "/")
}

fn object_descriptor(name: &str) -> String {
    format!("L{};", internal(name))
}

#[derive(Default)]
struct Pool {
    bytes: Vec<u8>,
    next: u16,
    cache: HashMap<(u8, String), u16>,
}

impl Pool {
    fn new() -> Self {
        Self {
            next: 1,
            ..Self::default()
        }
    }

    fn intern(&mut self, tag: u8, key: String, body: Vec<u8>, slots: u16) -> u16 {
        if let Some(index) = self.cache.get(&(tag, key.clone())) {
            return *index;
        }
        let index = self.next;
        self.bytes.push(tag);
        self.bytes.extend(body);
        self.next += slots;
        self.cache.insert((tag, key), index);
        index
    }

    fn utf8(&mut self, value: &str) -> u16 {
        let encoded = encode_modified_utf8(value);
        let mut body = (encoded.len() as u16).to_be_bytes().to_vec();
        body.extend(encoded);
        self.intern(1, value.to_string(), body, 1)
    }

    fn class(&mut self, dotted: &str) -> u16 {
        let name = self.utf8(&internal(dotted));
        self.intern(7, dotted.to_string(), name.to_be_bytes().to_vec(), 1)
    }

    fn int(&mut self, value: i32) -> u16 {
        self.intern(3, value.to_string(), value.to_be_bytes().to_vec(), 1)
    }

    fn long(&mut self, value: i64) -> u16 {
        self.intern(5, value.to_string(), value.to_be_bytes().to_vec(), 2)
    }

    fn double(&mut self, value: f64) -> u16 {
        self.intern(6, value.to_bits().to_string(), value.to_bits().to_be_bytes().to_vec(), 2)
    }

    fn string(&mut self, value: &str) -> u16 {
        let utf8 = self.utf8(value);
        self.intern(8, value.to_string(), utf8.to_be_bytes().to_vec(), 1)
    }
}

struct Out(Vec<u8>);

impl Out {
    fn new() -> Self {
        Self(Vec::new())
    }

    fn u8(&mut self, v: u8) {
        self.0.push(v);
    }

    fn u16(&mut self, v: u16) {
        self.0.extend(v.to_be_bytes());
    }

    fn u32(&mut self, v: u32) {
        self.0.extend(v.to_be_bytes());
    }

    fn attribute(&mut self, pool: &mut Pool, name: &str, body: Out) {
        let name = pool.utf8(name);
        self.u16(name);
        self.u32(body.0.len() as u32);
        self.0.extend(body.0);
    }
}

/// An annotation attribute value.
#[derive(Clone)]
pub(crate) enum Value {
    Bool(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    Char(char),
    Str(String),
    Enum(String, String),
    Class(String),
    Void,
    Marker(MarkerFixture),
    Array(Vec<Value>),
}

impl Value {
    pub(crate) fn strings(values: &[&str]) -> Self {
        Self::Array(values.iter().map(|v| Self::Str(v.to_string())).collect())
    }

    fn write(&self, pool: &mut Pool, out: &mut Out) {
        match self {
            Self::Bool(v) => {
                out.u8(b'Z');
                out.u16(pool.int(*v as i32));
            }
            Self::Int(v) => {
                out.u8(b'I');
                out.u16(pool.int(*v));
            }
            Self::Long(v) => {
                out.u8(b'J');
                out.u16(pool.long(*v));
            }
            Self::Double(v) => {
                out.u8(b'D');
                out.u16(pool.double(*v));
            }
            Self::Char(v) => {
                out.u8(b'C');
                out.u16(pool.int(*v as i32));
            }
            Self::Str(v) => {
                out.u8(b's');
                out.u16(pool.utf8(v));
            }
            Self::Enum(type_name, constant) => {
                out.u8(b'e');
                out.u16(pool.utf8(&object_descriptor(type_name)));
                out.u16(pool.utf8(constant));
            }
            Self::Class(name) => {
                out.u8(b'c');
                out.u16(pool.utf8(&object_descriptor(name)));
            }
            Self::Void => {
                out.u8(b'c');
                out.u16(pool.utf8("V"));
            }
            Self::Marker(marker) => {
                out.u8(b'@');
                marker.write(pool, out);
            }
            Self::Array(items) => {
                out.u8(b'[');
                out.u16(items.len() as u16);
                for item in items {
                    item.write(pool, out);
                }
            }
        }
    }
}

#[derive(Clone)]
pub(crate) struct MarkerFixture {
    type_name: String,
    values: Vec<(String, Value)>,
    visible: bool,
}

impl MarkerFixture {
    pub(crate) fn value(mut self, name: &str, value: Value) -> Self {
        self.values.push((name.to_string(), value));
        self
    }

    pub(crate) fn invisible(mut self) -> Self {
        self.visible = false;
        self
    }

    fn write(&self, pool: &mut Pool, out: &mut Out) {
        out.u16(pool.utf8(&object_descriptor(&self.type_name)));
        out.u16(self.values.len() as u16);
        for (name, value) in &self.values {
            out.u16(pool.utf8(name));
            value.write(pool, out);
        }
    }
}

/// Starts a marker (annotation) of the given type.
pub(crate) fn marker(type_name: &str) -> MarkerFixture {
    MarkerFixture {
        type_name: type_name.to_string(),
        values: Vec::new(),
        visible: true,
    }
}

fn write_markers(pool: &mut Pool, out: &mut Out, markers: &[MarkerFixture]) {
    for (visible, attr) in [
        (true, "RuntimeVisibleAnnotations"),
        (false, "RuntimeInvisibleAnnotations"),
    ] {
        let selected: Vec<_> = markers.iter().filter(|m| m.visible == visible).collect();
        if selected.is_empty() {
            continue;
        }
        let mut body = Out::new();
        body.u16(selected.len() as u16);
        for marker in selected {
            marker.write(pool, &mut body);
        }
        out.attribute(pool, attr, body);
    }
}

fn count_markers(markers: &[MarkerFixture]) -> u16 {
    let visible = markers.iter().any(|m| m.visible) as u16;
    let invisible = markers.iter().any(|m| !m.visible) as u16;
    visible + invisible
}

pub(crate) struct FieldFixture {
    name: String,
    descriptor: String,
    access: u16,
    constant: Option<Value>,
    signature: Option<String>,
    markers: Vec<MarkerFixture>,
}

impl FieldFixture {
    pub(crate) fn new(name: &str, descriptor: &str) -> Self {
        Self {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            access: AccessFlags::PRIVATE,
            constant: None,
            signature: None,
            markers: Vec::new(),
        }
    }

    pub(crate) fn static_final(mut self) -> Self {
        self.access = AccessFlags::PUBLIC | AccessFlags::STATIC | AccessFlags::FINAL;
        self
    }

    pub(crate) fn constant_int(mut self, value: i32) -> Self {
        self.constant = Some(Value::Int(value));
        self
    }

    pub(crate) fn constant_str(mut self, value: &str) -> Self {
        self.constant = Some(Value::Str(value.to_string()));
        self
    }

    pub(crate) fn signature(mut self, signature: &str) -> Self {
        self.signature = Some(signature.to_string());
        self
    }

    pub(crate) fn marker(mut self, marker: MarkerFixture) -> Self {
        self.markers.push(marker);
        self
    }

    fn write(&self, pool: &mut Pool, out: &mut Out) {
        out.u16(self.access);
        out.u16(pool.utf8(&self.name));
        out.u16(pool.utf8(&self.descriptor));
        let attrs = self.constant.is_some() as u16
            + self.signature.is_some() as u16
            + count_markers(&self.markers);
        out.u16(attrs);
        if let Some(constant) = &self.constant {
            let index = match constant {
                Value::Int(v) => pool.int(*v),
                Value::Str(v) => pool.string(v),
                _ => panic!("unsupported fixture constant"),
            };
            let mut body = Out::new();
            body.u16(index);
            out.attribute(pool, "ConstantValue", body);
        }
        if let Some(signature) = &self.signature {
            let mut body = Out::new();
            body.u16(pool.utf8(signature));
            out.attribute(pool, "Signature", body);
        }
        write_markers(pool, out, &self.markers);
    }
}

pub(crate) struct MethodFixture {
    name: String,
    descriptor: String,
    access: u16,
    markers: Vec<MarkerFixture>,
    param_markers: Vec<(usize, MarkerFixture)>,
    parameter_names: Option<Vec<String>>,
    local_names: Option<Vec<String>>,
    exceptions: Vec<String>,
    default_value: Option<Value>,
    signature: Option<String>,
}

impl MethodFixture {
    pub(crate) fn new(name: &str, descriptor: &str) -> Self {
        Self {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            access: AccessFlags::PUBLIC,
            markers: Vec::new(),
            param_markers: Vec::new(),
            parameter_names: None,
            local_names: None,
            exceptions: Vec::new(),
            default_value: None,
            signature: None,
        }
    }

    pub(crate) fn access(mut self, access: u16) -> Self {
        self.access = access;
        self
    }

    pub(crate) fn static_method(mut self) -> Self {
        self.access |= AccessFlags::STATIC;
        self
    }

    pub(crate) fn abstract_method(mut self) -> Self {
        self.access |= AccessFlags::ABSTRACT;
        self
    }

    pub(crate) fn marker(mut self, marker: MarkerFixture) -> Self {
        self.markers.push(marker);
        self
    }

    pub(crate) fn param_marker(mut self, index: usize, marker: MarkerFixture) -> Self {
        self.param_markers.push((index, marker));
        self
    }

    /// Emits a `MethodParameters` attribute.
    pub(crate) fn parameter_names(mut self, names: &[&str]) -> Self {
        self.parameter_names = Some(names.iter().map(|n| n.to_string()).collect());
        self
    }

    /// Emits a `Code` attribute whose `LocalVariableTable` names slots in order.
    pub(crate) fn local_names(mut self, names: &[&str]) -> Self {
        self.local_names = Some(names.iter().map(|n| n.to_string()).collect());
        self
    }

    pub(crate) fn exception(mut self, name: &str) -> Self {
        self.exceptions.push(name.to_string());
        self
    }

    pub(crate) fn default_value(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    pub(crate) fn signature(mut self, signature: &str) -> Self {
        self.signature = Some(signature.to_string());
        self
    }

    fn write(&self, pool: &mut Pool, out: &mut Out) {
        out.u16(self.access);
        out.u16(pool.utf8(&self.name));
        out.u16(pool.utf8(&self.descriptor));

        let mut attrs: Vec<(&str, Out)> = Vec::new();
        if let Some(names) = &self.local_names {
            let mut code = Out::new();
            code.u16(1);
            code.u16(names.len() as u16);
            code.u32(1);
            code.u8(0xB1);
            code.u16(0);
            let mut table = Out::new();
            table.u16(names.len() as u16);
            for (slot, name) in names.iter().enumerate() {
                table.u16(0);
                table.u16(1);
                table.u16(pool.utf8(name));
                table.u16(pool.utf8("Ljava/lang/Object;"));
                table.u16(slot as u16);
            }
            code.u16(1);
            code.attribute(pool, "LocalVariableTable", table);
            attrs.push(("Code", code));
        }
        if !self.exceptions.is_empty() {
            let mut body = Out::new();
            body.u16(self.exceptions.len() as u16);
            for exception in &self.exceptions {
                body.u16(pool.class(exception));
            }
            attrs.push(("Exceptions", body));
        }
        if let Some(signature) = &self.signature {
            let mut body = Out::new();
            body.u16(pool.utf8(signature));
            attrs.push(("Signature", body));
        }
        if let Some(value) = &self.default_value {
            let mut body = Out::new();
            value.write(pool, &mut body);
            attrs.push(("AnnotationDefault", body));
        }
        if let Some(names) = &self.parameter_names {
            let mut body = Out::new();
            body.u8(names.len() as u8);
            for name in names {
                body.u16(pool.utf8(name));
                body.u16(0);
            }
            attrs.push(("MethodParameters", body));
        }
        let param_count = MethodType::parse(&self.descriptor)
            .map(|m| m.params.len())
            .unwrap_or(0);
        for (visible, attr) in [
            (true, "RuntimeVisibleParameterAnnotations"),
            (false, "RuntimeInvisibleParameterAnnotations"),
        ] {
            if !self.param_markers.iter().any(|(_, m)| m.visible == visible) {
                continue;
            }
            let mut body = Out::new();
            body.u8(param_count as u8);
            for index in 0..param_count {
                let selected: Vec<_> = self
                    .param_markers
                    .iter()
                    .filter(|(i, m)| *i == index && m.visible == visible)
                    .collect();
                body.u16(selected.len() as u16);
                for (_, marker) in selected {
                    marker.write(pool, &mut body);
                }
            }
            attrs.push((attr, body));
        }

        out.u16((attrs.len() as u16) + count_markers(&self.markers));
        for (name, body) in attrs {
            out.attribute(pool, name, body);
        }
        write_markers(pool, out, &self.markers);
    }
}

/// Builder for one class file.
pub(crate) struct ClassFixture {
    name: String,
    access: u16,
    super_name: Option<String>,
    interfaces: Vec<String>,
    fields: Vec<FieldFixture>,
    methods: Vec<MethodFixture>,
    markers: Vec<MarkerFixture>,
    inner_classes: Vec<(String, Option<String>)>,
    enclosing: Option<String>,
    source_file: Option<String>,
    signature: Option<String>,
}

impl ClassFixture {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            access: AccessFlags::PUBLIC | AccessFlags::SYNCHRONIZED,
            super_name: Some("java.lang.Object".to_string()),
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            markers: Vec::new(),
            inner_classes: Vec::new(),
            enclosing: None,
            source_file: None,
            signature: None,
        }
    }

    pub(crate) fn interface(name: &str) -> Self {
        let mut fixture = Self::new(name);
        fixture.access = AccessFlags::PUBLIC | AccessFlags::INTERFACE | AccessFlags::ABSTRACT;
        fixture
    }

    pub(crate) fn annotation(name: &str) -> Self {
        let mut fixture = Self::interface(name);
        fixture.access |= AccessFlags::ANNOTATION;
        fixture.interface_name("java.lang.annotation.Annotation")
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn access(mut self, access: u16) -> Self {
        self.access = access;
        self
    }

    pub(crate) fn super_name(mut self, name: &str) -> Self {
        self.super_name = Some(name.to_string());
        self
    }

    pub(crate) fn interface_name(mut self, name: &str) -> Self {
        self.interfaces.push(name.to_string());
        self
    }

    pub(crate) fn field(mut self, field: FieldFixture) -> Self {
        self.fields.push(field);
        self
    }

    pub(crate) fn method(mut self, method: MethodFixture) -> Self {
        self.methods.push(method);
        self
    }

    /// Adds a public no-argument constructor.
    pub(crate) fn default_constructor(self) -> Self {
        self.method(MethodFixture::new("<init>", "()V"))
    }

    pub(crate) fn marker(mut self, marker: MarkerFixture) -> Self {
        self.markers.push(marker);
        self
    }

    pub(crate) fn inner_class(mut self, inner: &str, outer: Option<&str>) -> Self {
        self.inner_classes
            .push((inner.to_string(), outer.map(str::to_string)));
        self
    }

    pub(crate) fn enclosing_class(mut self, outer: &str) -> Self {
        self.enclosing = Some(outer.to_string());
        self
    }

    pub(crate) fn source_file(mut self, file: &str) -> Self {
        self.source_file = Some(file.to_string());
        self
    }

    pub(crate) fn signature(mut self, signature: &str) -> Self {
        self.signature = Some(signature.to_string());
        self
    }

    pub(crate) fn build(&self) -> Vec<u8> {
        let mut pool = Pool::new();
        let mut body = Out::new();

        body.u16(self.access);
        body.u16(pool.class(&self.name));
        body.u16(self.super_name.as_deref().map(|s| pool.class(s)).unwrap_or(0));
        body.u16(self.interfaces.len() as u16);
        for interface in &self.interfaces {
            body.u16(pool.class(interface));
        }
        body.u16(self.fields.len() as u16);
        for field in &self.fields {
            field.write(&mut pool, &mut body);
        }
        body.u16(self.methods.len() as u16);
        for method in &self.methods {
            method.write(&mut pool, &mut body);
        }

        let mut attrs: Vec<(&str, Out)> = Vec::new();
        if let Some(file) = &self.source_file {
            let mut attr = Out::new();
            attr.u16(pool.utf8(file));
            attrs.push(("SourceFile", attr));
        }
        if let Some(signature) = &self.signature {
            let mut attr = Out::new();
            attr.u16(pool.utf8(signature));
            attrs.push(("Signature", attr));
        }
        if !self.inner_classes.is_empty() {
            let mut attr = Out::new();
            attr.u16(self.inner_classes.len() as u16);
            for (inner, outer) in &self.inner_classes {
                attr.u16(pool.class(inner));
                attr.u16(outer.as_deref().map(|o| pool.class(o)).unwrap_or(0));
                let simple = inner.rsplit('$').next().unwrap_or(inner);
                attr.u16(pool.utf8(simple));
                attr.u16(AccessFlags::PUBLIC);
            }
            attrs.push(("InnerClasses", attr));
        }
        if let Some(outer) = &self.enclosing {
            let mut attr = Out::new();
            attr.u16(pool.class(outer));
            attr.u16(0);
            attrs.push(("EnclosingMethod", attr));
        }
        body.u16(attrs.len() as u16 + count_markers(&self.markers));
        for (name, attr) in attrs {
            body.attribute(&mut pool, name, attr);
        }
        write_markers(&mut pool, &mut body, &self.markers);

        let mut out = Out::new();
        out.u32(0xCAFE_BABE);
        out.u16(0);
        out.u16(52);
        out.u16(pool.next);
        out.0.extend(&pool.bytes);
        out.0.extend(body.0);
        out.0
    }
}
