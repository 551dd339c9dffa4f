use log::warn;

use crate::dex::error::DexError;

/// Cursor over one DEX image with endian-aware multi-byte reads.
///
/// The byte order is fixed once from the header's endian tag and applied to
/// every subsequent `read_u2`/`read_u4`.
pub(crate) struct DexReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    swap: bool,
}

impl<'a> DexReader<'a> {
    pub fn new(bytes: &'a [u8]) -> DexReader<'a> {
        DexReader { bytes, pos: 0, swap: false }
    }

    /// Reverse the byte order of all subsequent multi-byte reads.
    pub fn set_swapped(&mut self, swap: bool) {
        self.swap = swap;
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Moves the cursor to an absolute position.
    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn read_u1(&mut self) -> Result<u8, DexError> {
        if self.bytes.len() < self.pos + 1 {
            return Err(DexError::Truncated { wanted: 1, offset: self.pos });
        }
        let result = self.bytes[self.pos];
        self.pos += 1;
        Ok(result)
    }

    pub fn read_x(&mut self, length: usize) -> Result<&'a [u8], DexError> {
        if self.bytes.len() < self.pos + length {
            return Err(DexError::Truncated { wanted: length, offset: self.pos });
        }
        let result = &self.bytes[self.pos..self.pos + length];
        self.pos += length;
        Ok(result)
    }

    pub fn read_u2(&mut self) -> Result<u16, DexError> {
        let b = self.read_x(2)?;
        let v = ((b[1] as u16) << 8) | (b[0] as u16);
        Ok(if self.swap { v.swap_bytes() } else { v })
    }

    pub fn read_u4(&mut self) -> Result<u32, DexError> {
        let b = self.read_x(4)?;
        let v = ((b[3] as u32) << 24) | ((b[2] as u32) << 16) | ((b[1] as u32) << 8) | (b[0] as u32);
        Ok(if self.swap { v.swap_bytes() } else { v })
    }

    /// Reads an unsigned LEB128 value: 7 bits per byte, little-endian group
    /// order, high bit set on all but the last byte. Termination is bounded
    /// only by the end of the image.
    pub fn read_uleb128(&mut self) -> Result<u32, DexError> {
        let mut value: u32 = 0;
        let mut shift: u32 = 0;

        loop {
            let byte = self.read_u1()?;
            let low = (byte & 0x7f) as u32;
            if shift < 32 {
                value = value.wrapping_add(low.wrapping_shl(shift));
            }
            shift = shift.saturating_add(7);
            if byte & 0x80 == 0 {
                break;
            }
        }

        Ok(value)
    }

    /// Reads one `string_data_item`: a ULEB128 UTF-16 length hint followed by
    /// a NUL-terminated MUTF-8 byte run.
    ///
    /// The hint only bounds the scan (3 bytes per UTF-16 unit, worst case);
    /// the terminator decides how many bytes actually belong to the string,
    /// and a missing terminator within the bound is not an error.
    pub fn read_string(&mut self) -> Result<String, DexError> {
        let utf16_size = self.read_uleb128()? as usize;
        let mut v = Vec::with_capacity(utf16_size);

        let mut terminated = false;
        for _ in 0..utf16_size * 3 {
            let u = self.read_u1()?;
            if u == 0 {
                terminated = true;
                break;
            }
            v.push(u);
        }
        if !terminated && utf16_size > 0 {
            warn!(
                "string data at offset {} ran to its {} byte bound without a terminator",
                self.pos - v.len(),
                utf16_size * 3
            );
        }

        Ok(match cesu8::from_java_cesu8(v.as_slice()) {
            Ok(s) => s.to_string(),
            Err(_) => String::from_utf8_lossy(v.as_slice()).to_string(),
        })
    }
}
