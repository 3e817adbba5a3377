//! Field descriptors, method descriptors and generic signatures.
//!
//! Descriptors (`Ljava/lang/String;`, `(IJ)V`) give the erased shape of a
//! member. Signatures (`Ljava/util/List<Lcom/acme/Repo;>;`) are only present
//! when generics are involved and are what autowiring uses to find the
//! element type of a `List` or `Map` parameter.

use super::error::{DescriptorError, Result};
use std::fmt;
use strum_macros::{Display, EnumString};

/// A primitive JVM type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Primitive {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Boolean,
}

impl Primitive {
    fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            b'B' => Self::Byte,
            b'C' => Self::Char,
            b'D' => Self::Double,
            b'F' => Self::Float,
            b'I' => Self::Int,
            b'J' => Self::Long,
            b'S' => Self::Short,
            b'Z' => Self::Boolean,
            _ => return None,
        })
    }

    /// Long and double take two local-variable slots.
    pub fn is_wide(self) -> bool {
        matches!(self, Self::Long | Self::Double)
    }
}

/// An erased field or parameter type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    Primitive(Primitive),
    Object(String),
    Array(Box<FieldType>),
}

impl FieldType {
    /// Parses a complete field descriptor such as `[Ljava/lang/String;`.
    pub fn parse(descriptor: &str) -> Result<Self> {
        let mut cursor = Cursor::new(descriptor);
        let ty = cursor.field_type()?;
        cursor.finish()?;
        Ok(ty)
    }

    /// Dotted class name for object types.
    pub fn class_name(&self) -> Option<&str> {
        match self {
            Self::Object(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Self::Array(_))
    }

    pub(crate) fn slot_size(&self) -> usize {
        match self {
            Self::Primitive(p) if p.is_wide() => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(p) => write!(f, "{p}"),
            Self::Object(name) => f.write_str(name),
            Self::Array(component) => write!(f, "{component}[]"),
        }
    }
}

/// Erased parameter and return types of a method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodType {
    pub params: Vec<FieldType>,
    /// `None` for `void`.
    pub ret: Option<FieldType>,
}

impl MethodType {
    pub fn parse(descriptor: &str) -> Result<Self> {
        let mut cursor = Cursor::new(descriptor);
        cursor.expect(b'(')?;
        let mut params = Vec::new();
        while cursor.peek() != Some(b')') {
            params.push(cursor.field_type()?);
        }
        cursor.expect(b')')?;
        let ret = if cursor.peek() == Some(b'V') {
            cursor.bump();
            None
        } else {
            Some(cursor.field_type()?)
        };
        cursor.finish()?;
        Ok(Self { params, ret })
    }
}

/// A type as written in a generic signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GenericType {
    Primitive(Primitive),
    /// `Outer<A>.Inner<B>` is flattened to `Outer$Inner` carrying `B`.
    Class {
        name: String,
        args: Vec<TypeArg>,
    },
    Variable(String),
    Array(Box<GenericType>),
}

impl GenericType {
    pub fn parse(signature: &str) -> Result<Self> {
        let mut cursor = Cursor::new(signature);
        let ty = cursor.java_type()?;
        cursor.finish()?;
        Ok(ty)
    }

    /// Class name with type arguments dropped.
    pub fn raw_name(&self) -> Option<&str> {
        match self {
            Self::Class { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn type_args(&self) -> &[TypeArg] {
        match self {
            Self::Class { args, .. } => args,
            _ => &[],
        }
    }
}

impl fmt::Display for GenericType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(p) => write!(f, "{p}"),
            Self::Class { name, args } => {
                f.write_str(name)?;
                if !args.is_empty() {
                    f.write_str("<")?;
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{arg}")?;
                    }
                    f.write_str(">")?;
                }
                Ok(())
            }
            Self::Variable(name) => f.write_str(name),
            Self::Array(component) => write!(f, "{component}[]"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeArg {
    /// `*`
    Any,
    Exact(GenericType),
    Extends(GenericType),
    Super(GenericType),
}

impl TypeArg {
    /// The concrete type an argument narrows to, if any.
    pub fn bound(&self) -> Option<&GenericType> {
        match self {
            Self::Any => None,
            Self::Exact(ty) | Self::Extends(ty) | Self::Super(ty) => Some(ty),
        }
    }
}

impl fmt::Display for TypeArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("?"),
            Self::Exact(ty) => write!(f, "{ty}"),
            Self::Extends(ty) => write!(f, "? extends {ty}"),
            Self::Super(ty) => write!(f, "? super {ty}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeParameter {
    pub name: String,
    pub bounds: Vec<GenericType>,
}

/// Generic signature of a class declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassSignature {
    pub type_params: Vec<TypeParameter>,
    pub super_class: GenericType,
    pub interfaces: Vec<GenericType>,
}

impl ClassSignature {
    pub fn parse(signature: &str) -> Result<Self> {
        let mut cursor = Cursor::new(signature);
        let type_params = cursor.type_params()?;
        let super_class = cursor.java_type()?;
        let mut interfaces = Vec::new();
        while cursor.peek().is_some() {
            interfaces.push(cursor.java_type()?);
        }
        Ok(Self {
            type_params,
            super_class,
            interfaces,
        })
    }
}

/// Generic signature of a method or constructor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSignature {
    pub type_params: Vec<TypeParameter>,
    pub params: Vec<GenericType>,
    pub ret: Option<GenericType>,
    pub throws: Vec<GenericType>,
}

impl MethodSignature {
    pub fn parse(signature: &str) -> Result<Self> {
        let mut cursor = Cursor::new(signature);
        let type_params = cursor.type_params()?;
        cursor.expect(b'(')?;
        let mut params = Vec::new();
        while cursor.peek() != Some(b')') {
            params.push(cursor.java_type()?);
        }
        cursor.expect(b')')?;
        let ret = if cursor.peek() == Some(b'V') {
            cursor.bump();
            None
        } else {
            Some(cursor.java_type()?)
        };
        let mut throws = Vec::new();
        while cursor.peek() == Some(b'^') {
            cursor.bump();
            throws.push(cursor.java_type()?);
        }
        cursor.finish()?;
        Ok(Self {
            type_params,
            params,
            ret,
            throws,
        })
    }
}

struct Cursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.text.as_bytes().get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn error(&self, message: &str) -> DescriptorError {
        DescriptorError::malformed(format!(
            "{message} at {} in '{}'",
            self.pos, self.text
        ))
    }

    fn expect(&mut self, byte: u8) -> Result<()> {
        if self.bump() == Some(byte) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", byte as char)))
        }
    }

    fn finish(&self) -> Result<()> {
        if self.pos == self.text.len() {
            Ok(())
        } else {
            Err(self.error("trailing characters"))
        }
    }

    /// Reads up to (not including) one of the terminators.
    fn identifier(&mut self, terminators: &[u8]) -> Result<&'a str> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if terminators.contains(&b) {
                break;
            }
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.error("empty identifier"));
        }
        Ok(&self.text[start..self.pos])
    }

    fn field_type(&mut self) -> Result<FieldType> {
        match self.bump() {
            Some(b'L') => {
                let name = self.identifier(b";")?.replace('/', ".");
                self.expect(b';')?;
                Ok(FieldType::Object(name))
            }
            Some(b'[') => Ok(FieldType::Array(Box::new(self.field_type()?))),
            Some(code) => Primitive::from_code(code)
                .map(FieldType::Primitive)
                .ok_or_else(|| self.error("unknown type code")),
            None => Err(self.error("unexpected end of descriptor")),
        }
    }

    fn java_type(&mut self) -> Result<GenericType> {
        match self.peek() {
            Some(b'L') => self.class_type(),
            Some(b'T') => {
                self.bump();
                let name = self.identifier(b";")?.to_string();
                self.expect(b';')?;
                Ok(GenericType::Variable(name))
            }
            Some(b'[') => {
                self.bump();
                Ok(GenericType::Array(Box::new(self.java_type()?)))
            }
            Some(code) => {
                self.bump();
                Primitive::from_code(code)
                    .map(GenericType::Primitive)
                    .ok_or_else(|| self.error("unknown type code"))
            }
            None => Err(self.error("unexpected end of signature")),
        }
    }

    fn class_type(&mut self) -> Result<GenericType> {
        self.expect(b'L')?;
        let mut name = self.identifier(b"<.;")?.replace('/', ".");
        let mut args = self.type_args()?;
        while self.peek() == Some(b'.') {
            self.bump();
            name.push('$');
            name.push_str(self.identifier(b"<.;")?);
            args = self.type_args()?;
        }
        self.expect(b';')?;
        Ok(GenericType::Class { name, args })
    }

    fn type_args(&mut self) -> Result<Vec<TypeArg>> {
        let mut args = Vec::new();
        if self.peek() != Some(b'<') {
            return Ok(args);
        }
        self.bump();
        while self.peek() != Some(b'>') {
            let arg = match self.peek() {
                Some(b'*') => {
                    self.bump();
                    TypeArg::Any
                }
                Some(b'+') => {
                    self.bump();
                    TypeArg::Extends(self.java_type()?)
                }
                Some(b'-') => {
                    self.bump();
                    TypeArg::Super(self.java_type()?)
                }
                _ => TypeArg::Exact(self.java_type()?),
            };
            args.push(arg);
        }
        self.expect(b'>')?;
        Ok(args)
    }

    fn type_params(&mut self) -> Result<Vec<TypeParameter>> {
        let mut params = Vec::new();
        if self.peek() != Some(b'<') {
            return Ok(params);
        }
        self.bump();
        while self.peek() != Some(b'>') {
            let name = self.identifier(b":")?.to_string();
            let mut bounds = Vec::new();
            while self.peek() == Some(b':') {
                self.bump();
                // An empty class bound is legal when only interface bounds follow.
                if matches!(self.peek(), Some(b'L' | b'T' | b'[')) {
                    bounds.push(self.java_type()?);
                }
            }
            params.push(TypeParameter { name, bounds });
        }
        self.expect(b'>')?;
        Ok(params)
    }
}
