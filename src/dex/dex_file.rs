/* DEX file structures - header, index tables and the internal/external type classification */

use log::debug;

use crate::dex::error::{check_index, DexError};
use crate::dex::reader::DexReader;

/* Accepted header magics, one per supported format version */
pub const DEX_FILE_MAGIC_V035: [u8; 8] = *b"dex\n035\0";
pub const DEX_FILE_MAGIC_V037: [u8; 8] = *b"dex\n037\0";
pub const DEX_FILE_MAGIC_V038: [u8; 8] = *b"dex\n038\0";
pub const DEX_FILE_MAGIC_V039: [u8; 8] = *b"dex\n039\0";

pub const ENDIAN_CONSTANT: u32 = 0x12345678;
pub const REVERSE_ENDIAN_CONSTANT: u32 = 0x78563412;

/* offset of the endian tag: magic, checksum, signature, file size, header size */
const ENDIAN_TAG_OFF: usize = 8 + 4 + 20 + 4 + 4;

pub(crate) type StringId = usize;
pub(crate) type TypeId = usize;
pub(crate) type ProtoId = usize;

fn verify_magic(magic: &[u8; 8]) -> bool {
    magic == &DEX_FILE_MAGIC_V035
        || magic == &DEX_FILE_MAGIC_V037
        || magic == &DEX_FILE_MAGIC_V038
        || magic == &DEX_FILE_MAGIC_V039
}

/// The interesting bits of a `header_item`: sizes and offsets of the six
/// index tables, plus the endian tag that drives all multi-byte reads.
#[derive(Debug, PartialEq, Eq)]
pub struct Header {
    pub file_size: u32,
    pub header_size: u32,
    pub endian_tag: u32,
    pub string_ids_size: u32,
    pub string_ids_off: u32,
    pub type_ids_size: u32,
    pub type_ids_off: u32,
    pub proto_ids_size: u32,
    pub proto_ids_off: u32,
    pub field_ids_size: u32,
    pub field_ids_off: u32,
    pub method_ids_size: u32,
    pub method_ids_off: u32,
    pub class_defs_size: u32,
    pub class_defs_off: u32,
}

impl Header {
    /// Validates the magic, fixes the reader's byte order from the endian
    /// tag, then decodes the table sizes and offsets.
    pub(crate) fn read(r: &mut DexReader) -> Result<Header, DexError> {
        r.seek(0);
        let magic = <[u8; 8]>::try_from(r.read_x(8)?).unwrap();
        if !verify_magic(&magic) {
            return Err(DexError::BadMagic(magic));
        }

        // Read the endian tag first so everything after it is swapped
        // correctly, including the re-read of the tag itself.
        r.seek(ENDIAN_TAG_OFF);
        let endian_tag = r.read_u4()?;
        match endian_tag {
            ENDIAN_CONSTANT => {}
            REVERSE_ENDIAN_CONSTANT => r.set_swapped(true),
            tag => return Err(DexError::BadEndianTag { tag, offset: ENDIAN_TAG_OFF }),
        }

        r.seek(8 + 4 + 20); // magic, checksum, signature
        let file_size = r.read_u4()?;
        let header_size = r.read_u4()?;
        r.read_u4()?; // endian tag
        r.read_u4()?; // link size
        r.read_u4()?; // link offset
        r.read_u4()?; // map offset

        let header = Header {
            file_size,
            header_size,
            endian_tag,
            string_ids_size: r.read_u4()?,
            string_ids_off: r.read_u4()?,
            type_ids_size: r.read_u4()?,
            type_ids_off: r.read_u4()?,
            proto_ids_size: r.read_u4()?,
            proto_ids_off: r.read_u4()?,
            field_ids_size: r.read_u4()?,
            field_ids_off: r.read_u4()?,
            method_ids_size: r.read_u4()?,
            method_ids_off: r.read_u4()?,
            class_defs_size: r.read_u4()?,
            class_defs_off: r.read_u4()?,
        };
        // data size and data offset trail the index tables; nothing here
        // needs them

        Ok(header)
    }
}

/// A `proto_id_item` plus its resolved parameter type list.
#[derive(Debug, PartialEq, Eq)]
pub struct PrototypeItem {
    pub shorty_idx: StringId,
    pub return_type_idx: TypeId,
    pub parameters: Vec<TypeId>,
}

/// A `field_id_item`.
#[derive(Debug, PartialEq, Eq)]
pub struct FieldItem {
    pub class_idx: TypeId,
    pub type_idx: TypeId,
    pub name_idx: StringId,
}

/// A `method_id_item`.
#[derive(Debug, PartialEq, Eq)]
pub struct MethodItem {
    pub class_idx: TypeId,
    pub proto_idx: ProtoId,
    pub name_idx: StringId,
}

/// The index tables of one decoded DEX image.
///
/// Tables are immutable once loaded; the internal/external classification
/// lives in a parallel flag array built at the end of the load.
#[derive(Debug)]
pub struct DexFile {
    pub header: Header,
    pub strings: Vec<String>,
    pub types: Vec<StringId>,
    pub prototypes: Vec<PrototypeItem>,
    pub fields: Vec<FieldItem>,
    pub methods: Vec<MethodItem>,
    pub class_defs: Vec<TypeId>,
    internal: Vec<bool>,
}

impl DexFile {
    /// Decodes one complete DEX image.
    ///
    /// Tables are loaded in dependency order - strings, types, prototypes,
    /// fields, methods, class defs - with every cross-table index bounds
    /// checked as it is read. Any failure aborts the decode; no partial
    /// result is returned.
    pub fn from_bytes(bytes: &[u8]) -> Result<DexFile, DexError> {
        let mut r = DexReader::new(bytes);
        let header = Header::read(&mut r)?;

        let strings = Self::read_strings(&mut r, &header)?;
        let types = Self::read_type_ids(&mut r, &header, strings.len())?;
        let prototypes = Self::read_proto_ids(&mut r, &header, strings.len(), types.len())?;
        let fields = Self::read_field_ids(&mut r, &header, strings.len(), types.len())?;
        let methods =
            Self::read_method_ids(&mut r, &header, strings.len(), types.len(), prototypes.len())?;
        let class_defs = Self::read_class_defs(&mut r, &header, types.len())?;

        let internal = mark_internal_types(&strings, &types, &class_defs);

        debug!(
            "loaded dex: {} strings, {} types, {} protos, {} fields, {} methods, {} class defs",
            strings.len(),
            types.len(),
            prototypes.len(),
            fields.len(),
            methods.len(),
            class_defs.len()
        );

        Ok(DexFile {
            header,
            strings,
            types,
            prototypes,
            fields,
            methods,
            class_defs,
            internal,
        })
    }

    /// Reads the string pool: all `string_id_item` offsets first, then the
    /// string data each points at. Reading the offsets up front keeps the
    /// data reads close to sequential.
    fn read_strings(r: &mut DexReader, header: &Header) -> Result<Vec<String>, DexError> {
        let count = header.string_ids_size as usize;
        let mut offsets = Vec::with_capacity(count);

        r.seek(header.string_ids_off as usize);
        for _ in 0..count {
            offsets.push(r.read_u4()? as usize);
        }

        let mut strings = Vec::with_capacity(count);
        for offset in offsets {
            r.seek(offset);
            strings.push(r.read_string()?);
        }

        Ok(strings)
    }

    fn read_type_ids(
        r: &mut DexReader,
        header: &Header,
        string_count: usize,
    ) -> Result<Vec<StringId>, DexError> {
        let count = header.type_ids_size as usize;
        let mut types = Vec::with_capacity(count);

        r.seek(header.type_ids_off as usize);
        for _ in 0..count {
            let descriptor_idx = r.read_u4()? as StringId;
            types.push(check_index("string_ids", descriptor_idx, string_count)?);
        }

        Ok(types)
    }

    /// Reads the prototype table in two passes: the fixed-size rows first,
    /// then each non-zero parameter list. The list offsets are unknown until
    /// all rows are in and need not be monotonic, so the passes stay
    /// separate.
    fn read_proto_ids(
        r: &mut DexReader,
        header: &Header,
        string_count: usize,
        type_count: usize,
    ) -> Result<Vec<PrototypeItem>, DexError> {
        let count = header.proto_ids_size as usize;
        let mut rows = Vec::with_capacity(count);

        r.seek(header.proto_ids_off as usize);
        for _ in 0..count {
            let shorty_idx = check_index("string_ids", r.read_u4()? as StringId, string_count)?;
            let return_type_idx = check_index("type_ids", r.read_u4()? as TypeId, type_count)?;
            let parameters_off = r.read_u4()? as usize;
            rows.push((shorty_idx, return_type_idx, parameters_off));
        }

        let mut prototypes = Vec::with_capacity(count);
        for (shorty_idx, return_type_idx, parameters_off) in rows {
            // offset 0 means no parameter list
            let parameters = if parameters_off == 0 {
                vec![]
            } else {
                r.seek(parameters_off);
                let size = r.read_u4()? as usize;
                let mut types = Vec::with_capacity(size);
                for _ in 0..size {
                    types.push(check_index("type_ids", r.read_u2()? as TypeId, type_count)?);
                }
                types
            };
            prototypes.push(PrototypeItem { shorty_idx, return_type_idx, parameters });
        }

        Ok(prototypes)
    }

    fn read_field_ids(
        r: &mut DexReader,
        header: &Header,
        string_count: usize,
        type_count: usize,
    ) -> Result<Vec<FieldItem>, DexError> {
        let count = header.field_ids_size as usize;
        let mut fields = Vec::with_capacity(count);

        r.seek(header.field_ids_off as usize);
        for _ in 0..count {
            fields.push(FieldItem {
                class_idx: check_index("type_ids", r.read_u2()? as TypeId, type_count)?,
                type_idx: check_index("type_ids", r.read_u2()? as TypeId, type_count)?,
                name_idx: check_index("string_ids", r.read_u4()? as StringId, string_count)?,
            });
        }

        Ok(fields)
    }

    fn read_method_ids(
        r: &mut DexReader,
        header: &Header,
        string_count: usize,
        type_count: usize,
        proto_count: usize,
    ) -> Result<Vec<MethodItem>, DexError> {
        let count = header.method_ids_size as usize;
        let mut methods = Vec::with_capacity(count);

        r.seek(header.method_ids_off as usize);
        for _ in 0..count {
            methods.push(MethodItem {
                class_idx: check_index("type_ids", r.read_u2()? as TypeId, type_count)?,
                proto_idx: check_index("proto_ids", r.read_u2()? as ProtoId, proto_count)?,
                name_idx: check_index("string_ids", r.read_u4()? as StringId, string_count)?,
            });
        }

        Ok(methods)
    }

    /// Reads the class def table, keeping only the defining type index of
    /// each row. Access flags, superclass, interfaces, source file,
    /// annotations, class data and static values are out of scope here.
    fn read_class_defs(
        r: &mut DexReader,
        header: &Header,
        type_count: usize,
    ) -> Result<Vec<TypeId>, DexError> {
        let count = header.class_defs_size as usize;
        let mut class_defs = Vec::with_capacity(count);

        r.seek(header.class_defs_off as usize);
        for _ in 0..count {
            let class_idx = check_index("type_ids", r.read_u4()? as TypeId, type_count)?;
            for _ in 0..7 {
                r.read_u4()?;
            }
            class_defs.push(class_idx);
        }

        Ok(class_defs)
    }

    /// The descriptor string of a type, e.g. `Lcom/example/Foo;` or `[I`.
    pub fn type_descriptor(&self, type_idx: TypeId) -> &str {
        &self.strings[self.types[type_idx]]
    }

    /// Whether a type is defined in this DEX (or by the VM, for primitive
    /// and array descriptors) rather than resolved externally.
    pub fn is_internal(&self, type_idx: TypeId) -> bool {
        self.internal[type_idx]
    }
}

/// Classifies every type as internal or external.
///
/// Pass 1 marks the defining type of every class def; pass 2 marks primitive
/// (single-byte) and array (`[`-prefixed) descriptors, which the VM itself
/// defines. Everything else stays external.
pub(crate) fn mark_internal_types(
    strings: &[String],
    types: &[StringId],
    class_defs: &[TypeId],
) -> Vec<bool> {
    let mut internal = vec![false; types.len()];

    for &class_idx in class_defs {
        internal[class_idx] = true;
    }

    for (i, &descriptor_idx) in types.iter().enumerate() {
        let descriptor = &strings[descriptor_idx];
        if descriptor.len() == 1 || descriptor.starts_with('[') {
            internal[i] = true;
        }
    }

    internal
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_magic() {
        let mut bytes = vec![0u8; 0x70];
        bytes[..8].copy_from_slice(b"dex\n036\0");
        assert_eq!(
            DexFile::from_bytes(&bytes).unwrap_err(),
            DexError::BadMagic(*b"dex\n036\0")
        );
    }

    #[test]
    fn rejects_unknown_endian_tag() {
        let mut bytes = vec![0u8; 0x70];
        bytes[..8].copy_from_slice(&DEX_FILE_MAGIC_V035);
        bytes[40..44].copy_from_slice(&0xdeadbeefu32.to_le_bytes());
        assert_eq!(
            DexFile::from_bytes(&bytes).unwrap_err(),
            DexError::BadEndianTag { tag: 0xdeadbeef, offset: 40 }
        );
    }

    #[test]
    fn rejects_truncated_header() {
        let mut bytes = vec![0u8; 48];
        bytes[..8].copy_from_slice(&DEX_FILE_MAGIC_V039);
        bytes[40..44].copy_from_slice(&ENDIAN_CONSTANT.to_le_bytes());
        assert!(matches!(
            DexFile::from_bytes(&bytes),
            Err(DexError::Truncated { .. })
        ));
    }

    #[test]
    fn classification_marks_primitives_arrays_and_defs() {
        let strings = vec![
            "I".to_string(),
            "[Ljava/lang/String;".to_string(),
            "Ljava/lang/Object;".to_string(),
            "Lcom/example/Foo;".to_string(),
        ];
        let types = vec![0, 1, 2, 3];
        let class_defs = vec![3];

        let internal = mark_internal_types(&strings, &types, &class_defs);
        assert_eq!(internal, vec![true, true, false, true]);
    }

    #[test]
    fn classification_is_idempotent() {
        let strings = vec!["J".to_string(), "Lx/Y;".to_string()];
        let types = vec![0, 1];
        let class_defs = vec![1];

        let first = mark_internal_types(&strings, &types, &class_defs);
        let second = mark_internal_types(&strings, &types, &class_defs);
        assert_eq!(first, second);
    }

    #[test]
    fn arrays_are_internal_without_class_defs() {
        let strings = vec!["[I".to_string()];
        let internal = mark_internal_types(&strings, &[0], &[]);
        assert_eq!(internal, vec![true]);
    }
}
