//! Constant pool decoding.

use super::error::{DescriptorError, Result};
use super::reader::{ByteReader, decode_modified_utf8};

/// One constant pool entry.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Constant {
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class(u16),
    String(u16),
    FieldRef { class: u16, name_and_type: u16 },
    MethodRef { class: u16, name_and_type: u16 },
    InterfaceMethodRef { class: u16, name_and_type: u16 },
    NameAndType { name: u16, descriptor: u16 },
    MethodHandle { kind: u8, reference: u16 },
    MethodType(u16),
    Dynamic { bootstrap: u16, name_and_type: u16 },
    InvokeDynamic { bootstrap: u16, name_and_type: u16 },
    Module(u16),
    Package(u16),
    /// Second slot of a long or double, and index zero.
    Unusable,
}

#[derive(Debug)]
pub(crate) struct ConstantPool {
    entries: Vec<Constant>,
}

impl ConstantPool {
    pub(crate) fn parse(reader: &mut ByteReader<'_>) -> Result<Self> {
        let count = reader.u16()? as usize;
        let mut entries = Vec::with_capacity(count);
        entries.push(Constant::Unusable);
        while entries.len() < count {
            let tag = reader.u8()?;
            let constant = match tag {
                1 => {
                    let len = reader.u16()? as usize;
                    Constant::Utf8(decode_modified_utf8(reader.take(len)?)?)
                }
                3 => Constant::Integer(reader.i32()?),
                4 => Constant::Float(reader.f32()?),
                5 => Constant::Long(reader.i64()?),
                6 => Constant::Double(reader.f64()?),
                7 => Constant::Class(reader.u16()?),
                8 => Constant::String(reader.u16()?),
                9 => Constant::FieldRef {
                    class: reader.u16()?,
                    name_and_type: reader.u16()?,
                },
                10 => Constant::MethodRef {
                    class: reader.u16()?,
                    name_and_type: reader.u16()?,
                },
                11 => Constant::InterfaceMethodRef {
                    class: reader.u16()?,
                    name_and_type: reader.u16()?,
                },
                12 => Constant::NameAndType {
                    name: reader.u16()?,
                    descriptor: reader.u16()?,
                },
                15 => Constant::MethodHandle {
                    kind: reader.u8()?,
                    reference: reader.u16()?,
                },
                16 => Constant::MethodType(reader.u16()?),
                17 => Constant::Dynamic {
                    bootstrap: reader.u16()?,
                    name_and_type: reader.u16()?,
                },
                18 => Constant::InvokeDynamic {
                    bootstrap: reader.u16()?,
                    name_and_type: reader.u16()?,
                },
                19 => Constant::Module(reader.u16()?),
                20 => Constant::Package(reader.u16()?),
                other => {
                    return Err(DescriptorError::malformed(format!(
                        "unknown constant pool tag {other} at entry {}",
                        entries.len()
                    )));
                }
            };
            let wide = matches!(constant, Constant::Long(_) | Constant::Double(_));
            entries.push(constant);
            if wide {
                entries.push(Constant::Unusable);
            }
        }
        if entries.len() != count {
            return Err(DescriptorError::malformed(
                "wide constant overruns the constant pool",
            ));
        }
        Ok(Self { entries })
    }

    pub(crate) fn get(&self, index: u16) -> Result<&Constant> {
        match self.entries.get(index as usize) {
            Some(Constant::Unusable) | None => Err(DescriptorError::malformed(format!(
                "invalid constant pool index {index}"
            ))),
            Some(constant) => Ok(constant),
        }
    }

    pub(crate) fn utf8(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            Constant::Utf8(value) => Ok(value),
            other => Err(unexpected(index, "Utf8", other)),
        }
    }

    /// Resolves a `CONSTANT_Class` entry to its dotted name.
    pub(crate) fn class_name(&self, index: u16) -> Result<String> {
        match self.get(index)? {
            Constant::Class(name) => Ok(self.utf8(*name)?.replace('/', ".")),
            other => Err(unexpected(index, "Class", other)),
        }
    }

    /// Like [`class_name`](Self::class_name), but index zero means "none".
    pub(crate) fn optional_class_name(&self, index: u16) -> Result<Option<String>> {
        if index == 0 {
            Ok(None)
        } else {
            self.class_name(index).map(Some)
        }
    }

    pub(crate) fn optional_utf8(&self, index: u16) -> Result<Option<&str>> {
        if index == 0 {
            Ok(None)
        } else {
            self.utf8(index).map(Some)
        }
    }

    pub(crate) fn integer(&self, index: u16) -> Result<i32> {
        match self.get(index)? {
            Constant::Integer(value) => Ok(*value),
            other => Err(unexpected(index, "Integer", other)),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

fn unexpected(index: u16, wanted: &str, found: &Constant) -> DescriptorError {
    DescriptorError::malformed(format!(
        "constant pool entry {index} should be {wanted}, found {found:?}"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_bytes() -> Vec<u8> {
        let mut bytes = vec![0x00, 0x06];
        // #1 Utf8 "a/b/C"
        bytes.extend([1, 0, 5]);
        bytes.extend(b"a/b/C");
        // #2 Class -> #1
        bytes.extend([7, 0, 1]);
        // #3 Long (occupies #3 and #4)
        bytes.extend([5, 0, 0, 0, 0, 0, 0, 0, 42]);
        // #5 Integer
        bytes.extend([3, 0, 0, 0, 7]);
        bytes
    }

    #[test]
    fn test_parses_entries_and_wide_slots() {
        let bytes = pool_bytes();
        let pool = ConstantPool::parse(&mut ByteReader::new(&bytes)).unwrap();
        assert_eq!(pool.len(), 6);
        assert_eq!(pool.class_name(2).unwrap(), "a.b.C");
        assert_eq!(pool.get(3).unwrap(), &Constant::Long(42));
        assert!(pool.get(4).is_err());
        assert_eq!(pool.integer(5).unwrap(), 7);
    }

    #[test]
    fn test_type_mismatch_is_malformed() {
        let bytes = pool_bytes();
        let pool = ConstantPool::parse(&mut ByteReader::new(&bytes)).unwrap();
        assert!(pool.utf8(2).is_err());
        assert!(pool.optional_class_name(0).unwrap().is_none());
    }

    #[test]
    fn test_unknown_tag_fails() {
        let bytes = [0x00, 0x02, 99];
        assert!(ConstantPool::parse(&mut ByteReader::new(&bytes)).is_err());
    }
}
