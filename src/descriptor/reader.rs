//! Big-endian cursor over class-file bytes.

use super::error::{DescriptorError, Result};

pub(crate) struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub(crate) fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(DescriptorError::malformed(format!(
                "unexpected end of data at offset {} (wanted {} bytes, {} left)",
                self.pos,
                len,
                self.remaining()
            )));
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub(crate) fn skip(&mut self, len: usize) -> Result<()> {
        self.take(len).map(|_| ())
    }

    pub(crate) fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub(crate) fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub(crate) fn i32(&mut self) -> Result<i32> {
        Ok(self.u32()? as i32)
    }

    pub(crate) fn i64(&mut self) -> Result<i64> {
        let high = self.u32()? as u64;
        let low = self.u32()? as u64;
        Ok(((high << 32) | low) as i64)
    }

    pub(crate) fn f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.u32()?))
    }

    pub(crate) fn f64(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.i64()? as u64))
    }

    /// Reads a `u2`-counted sequence.
    pub(crate) fn counted<T>(
        &mut self,
        mut read: impl FnMut(&mut Self) -> Result<T>,
    ) -> Result<Vec<T>> {
        let count = self.u16()? as usize;
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(read(self)?);
        }
        Ok(items)
    }
}

/// Decodes the JVM's "modified UTF-8" string encoding.
///
/// NUL is written as two bytes and supplementary characters as surrogate
/// pairs, so decoding goes through UTF-16 code units.
pub(crate) fn decode_modified_utf8(bytes: &[u8]) -> Result<String> {
    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let a = bytes[i] as u16;
        if a & 0x80 == 0 {
            units.push(a);
            i += 1;
        } else if a & 0xE0 == 0xC0 {
            let b = continuation(bytes, i + 1)?;
            units.push(((a & 0x1F) << 6) | b);
            i += 2;
        } else if a & 0xF0 == 0xE0 {
            let b = continuation(bytes, i + 1)?;
            let c = continuation(bytes, i + 2)?;
            units.push(((a & 0x0F) << 12) | (b << 6) | c);
            i += 3;
        } else {
            return Err(DescriptorError::malformed(format!(
                "invalid modified UTF-8 lead byte 0x{a:02x} at {i}"
            )));
        }
    }
    Ok(String::from_utf16_lossy(&units))
}

fn continuation(bytes: &[u8], index: usize) -> Result<u16> {
    match bytes.get(index) {
        Some(b) if b & 0xC0 == 0x80 => Ok((b & 0x3F) as u16),
        _ => Err(DescriptorError::malformed(format!(
            "truncated modified UTF-8 sequence at {index}"
        ))),
    }
}

/// Encodes a string the way class files store it.
#[cfg(test)]
pub(crate) fn encode_modified_utf8(value: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len());
    for unit in value.encode_utf16() {
        match unit {
            0x0001..=0x007F => out.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                out.push(0xC0 | ((unit >> 6) & 0x1F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                out.push(0xE0 | ((unit >> 12) & 0x0F) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_big_endian_values() {
        let bytes = [0xCA, 0xFE, 0xBA, 0xBE, 0x00, 0x34, 0xFF];
        let mut reader = ByteReader::new(&bytes);
        assert_eq!(reader.u32().unwrap(), 0xCAFEBABE);
        assert_eq!(reader.u16().unwrap(), 52);
        assert_eq!(reader.u8().unwrap(), 0xFF);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_truncated_input_is_malformed() {
        let mut reader = ByteReader::new(&[0x00]);
        let err = reader.u16().unwrap_err();
        assert!(matches!(err, DescriptorError::Malformed { .. }));
    }

    #[test]
    fn test_modified_utf8_handles_nul_and_supplementary() {
        let text = "a\u{0}é€😀";
        let encoded = encode_modified_utf8(text);
        // NUL never appears as a raw zero byte
        assert!(!encoded.contains(&0));
        assert_eq!(decode_modified_utf8(&encoded).unwrap(), text);
    }

    #[test]
    fn test_rejects_bad_lead_byte() {
        assert!(decode_modified_utf8(&[0xF8]).is_err());
    }
}
