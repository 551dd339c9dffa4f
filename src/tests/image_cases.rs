use std::collections::HashSet;

use crate::dex::{DexError, DexFile};
use crate::tests::synth::{sample_image, DexImageBuilder};

#[test]
fn classifies_primitive_external_and_defined_types() {
    let mut b = DexImageBuilder::new();
    let t_int = b.type_desc("I");
    let t_string = b.type_desc("Ljava/lang/String;");
    let t_foo = b.type_desc("Lcom/example/Foo;");
    b.class_def(t_foo);

    let dex = DexFile::from_bytes(&b.build()).unwrap();

    assert!(dex.is_internal(t_int));
    assert!(!dex.is_internal(t_string));
    assert!(dex.is_internal(t_foo));

    let internal = dex.internal_references();
    let foos: Vec<_> = internal
        .iter()
        .filter(|c| c.name == "Lcom/example/Foo;")
        .collect();
    assert_eq!(foos.len(), 1);
    assert!(internal.iter().all(|c| c.internal));
    assert!(!internal.iter().any(|c| c.name == "Ljava/lang/String;"));
}

#[test]
fn filters_partition_the_reference_set() {
    let dex = DexFile::from_bytes(&sample_image(false)).unwrap();

    let all = dex.references();
    let internal = dex.internal_references();
    let external = dex.external_references();

    assert_eq!(all.len(), internal.len() + external.len());

    let internal_names: HashSet<_> = internal.iter().map(|c| c.name.clone()).collect();
    let external_names: HashSet<_> = external.iter().map(|c| c.name.clone()).collect();
    assert!(internal_names.is_disjoint(&external_names));

    // compaction preserves ascending type-index order
    let all_names: Vec<_> = all.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(
        all_names,
        vec!["I", "V", "Ljava/lang/String;", "Lcom/example/Foo;"]
    );
}

#[test]
fn member_flags_follow_the_declaring_class() {
    let dex = DexFile::from_bytes(&sample_image(false)).unwrap();

    for class in dex.references() {
        for field in &class.fields {
            assert_eq!(field.internal, class.internal, "field {}", field.name);
            assert_eq!(field.class_name, class.name);
        }
        for method in &class.methods {
            assert_eq!(method.internal, class.internal, "method {}", method.name);
            assert_eq!(method.class_name, class.name);
        }
    }
}

#[test]
fn members_attach_to_their_declaring_class() {
    let dex = DexFile::from_bytes(&sample_image(false)).unwrap();
    let all = dex.references();

    let foo = all.iter().find(|c| c.name == "Lcom/example/Foo;").unwrap();
    assert_eq!(foo.fields.len(), 1);
    assert_eq!(foo.fields[0].name, "count");
    assert_eq!(foo.fields[0].field_type, "I");
    assert_eq!(foo.methods.len(), 1);
    assert_eq!(foo.methods[0].name, "run");
    assert_eq!(foo.methods[0].descriptor(), "()V");

    let string = all.iter().find(|c| c.name == "Ljava/lang/String;").unwrap();
    assert!(!string.internal);
    // table-scan order
    let method_names: Vec<_> = string.methods.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(method_names, vec!["length", "concat"]);
    assert_eq!(string.methods[1].descriptor(), "(Ljava/lang/String;)Ljava/lang/String;");
    assert_eq!(
        string.methods[1].argument_types,
        vec!["Ljava/lang/String;".to_string()]
    );
}

#[test]
fn members_of_filtered_out_classes_are_dropped() {
    let dex = DexFile::from_bytes(&sample_image(false)).unwrap();

    let external = dex.external_references();
    let member_names: Vec<_> = external
        .iter()
        .flat_map(|c| c.fields.iter().map(|f| f.name.as_str()))
        .collect();
    // "count" is declared on the internal class and must not leak through
    assert_eq!(member_names, vec!["hash"]);
}

#[test]
fn out_of_range_field_class_index_fails_decode() {
    let mut b = DexImageBuilder::new();
    let t_int = b.type_desc("I");
    b.string("bogus");
    b.raw_field(99, t_int, 1);

    assert_eq!(
        DexFile::from_bytes(&b.build()).unwrap_err(),
        DexError::IndexOutOfRange { table: "type_ids", index: 99, len: 1 }
    );
}

#[test]
fn out_of_range_type_descriptor_index_fails_decode() {
    // a type row pointing past the string pool
    let mut b = DexImageBuilder::new();
    b.string("I");
    b.types_push_raw(7);

    assert_eq!(
        DexFile::from_bytes(&b.build()).unwrap_err(),
        DexError::IndexOutOfRange { table: "string_ids", index: 7, len: 1 }
    );
}

#[test]
fn byte_swapped_image_decodes_identically() {
    let little = DexFile::from_bytes(&sample_image(false)).unwrap();
    let big = DexFile::from_bytes(&sample_image(true)).unwrap();

    assert_eq!(little.header.file_size, big.header.file_size);
    assert_ne!(little.header.endian_tag, big.header.endian_tag);
    assert_eq!(little.references(), big.references());
}

#[test]
fn truncated_table_fails_decode() {
    let image = sample_image(false);
    // cut the image mid string data
    let cut = &image[..image.len() - 10];
    assert!(matches!(
        DexFile::from_bytes(cut),
        Err(DexError::Truncated { .. })
    ));
}

#[test]
fn empty_image_has_no_references() {
    let b = DexImageBuilder::new();
    let dex = DexFile::from_bytes(&b.build()).unwrap();
    assert!(dex.references().is_empty());
}
