use std::fmt;

/// Errors surfaced while decoding a DEX image.
///
/// Any of these aborts the decode of the image it occurred in; no partial
/// tables are returned. `Truncated` and `BadEndianTag` carry the byte offset
/// at which decoding failed to aid diagnosing corrupt input.
#[derive(Debug, PartialEq, Eq)]
pub enum DexError {
    /// The first 8 bytes are not one of the accepted DEX version magics.
    BadMagic([u8; 8]),
    /// The endian tag is neither `ENDIAN_CONSTANT` nor its byte-reversed form.
    BadEndianTag { tag: u32, offset: usize },
    /// The image ended before a requested read completed.
    Truncated { wanted: usize, offset: usize },
    /// An index stored in one table points past the end of the table it
    /// references. Implies a corrupt or truncated image.
    IndexOutOfRange {
        table: &'static str,
        index: usize,
        len: usize,
    },
}

impl fmt::Display for DexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DexError::BadMagic(magic) => {
                write!(f, "bad magic {:02x?} - not a DEX file?", magic)
            }
            DexError::BadEndianTag { tag, offset } => {
                write!(f, "unexpected endian tag {:#010x} at offset {}", tag, offset)
            }
            DexError::Truncated { wanted, offset } => {
                write!(f, "input truncated: {} byte read at offset {}", wanted, offset)
            }
            DexError::IndexOutOfRange { table, index, len } => {
                write!(f, "{} index {} out of range (table has {} entries)", table, index, len)
            }
        }
    }
}

impl std::error::Error for DexError {}

/// Bounds check for an index read from one table against the length of the
/// table it references.
pub(crate) fn check_index(table: &'static str, index: usize, len: usize) -> Result<usize, DexError> {
    if index < len {
        Ok(index)
    } else {
        Err(DexError::IndexOutOfRange { table, index, len })
    }
}
