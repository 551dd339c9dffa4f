/* Class, field and method references assembled from the index tables */

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::dex::dex_file::{DexFile, ProtoId};

/// A referenced field: declaring class, type and name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRef {
    pub class_name: String,
    pub field_type: String,
    pub name: String,
    pub internal: bool,
}

/// A referenced method: declaring class, argument types, return type and
/// name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodRef {
    pub class_name: String,
    pub argument_types: Vec<String>,
    pub return_type: String,
    pub name: String,
    pub internal: bool,
}

impl MethodRef {
    /// The method descriptor, e.g. `(ILjava/lang/String;)V`.
    pub fn descriptor(&self) -> String {
        let mut s = String::from("(");
        for arg in &self.argument_types {
            s.push_str(arg);
        }
        s.push(')');
        s.push_str(&self.return_type);
        s
    }
}

/// One referenced class and every field and method referenced on it, in
/// table-scan order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassRef {
    pub name: String,
    pub internal: bool,
    pub fields: Vec<FieldRef>,
    pub methods: Vec<MethodRef>,
}

impl ClassRef {
    fn new(name: &str, internal: bool) -> ClassRef {
        ClassRef {
            name: name.to_string(),
            internal,
            fields: vec![],
            methods: vec![],
        }
    }
}

impl DexFile {
    /// All referenced classes, internal and external.
    pub fn references(&self) -> Vec<ClassRef> {
        self.get_references(true, true)
    }

    /// Only classes defined in this DEX (or by the VM).
    pub fn internal_references(&self) -> Vec<ClassRef> {
        self.get_references(true, false)
    }

    /// Only classes resolved outside this DEX.
    pub fn external_references(&self) -> Vec<ClassRef> {
        self.get_references(false, true)
    }

    /// Builds one `ClassRef` per type matching the filter, then attaches
    /// every field and method whose declaring type matches.
    ///
    /// A sparse slot array parallel to the type table collects the refs;
    /// compacting it at the end preserves ascending type-index order. Fields
    /// and methods declared on a filtered-out type are skipped, never an
    /// error.
    pub fn get_references(&self, internal: bool, external: bool) -> Vec<ClassRef> {
        let mut sparse: Vec<Option<ClassRef>> = Vec::with_capacity(self.types.len());
        for i in 0..self.types.len() {
            let selected = if self.is_internal(i) { internal } else { external };
            sparse.push(if selected {
                Some(ClassRef::new(self.type_descriptor(i), self.is_internal(i)))
            } else {
                None
            });
        }

        for field in &self.fields {
            let internal = self.is_internal(field.class_idx);
            if let Some(class_ref) = sparse[field.class_idx].as_mut() {
                class_ref.fields.push(FieldRef {
                    class_name: self.type_descriptor(field.class_idx).to_string(),
                    field_type: self.type_descriptor(field.type_idx).to_string(),
                    name: self.strings[field.name_idx].clone(),
                    internal,
                });
            }
        }

        for method in &self.methods {
            let internal = self.is_internal(method.class_idx);
            if let Some(class_ref) = sparse[method.class_idx].as_mut() {
                class_ref.methods.push(MethodRef {
                    class_name: self.type_descriptor(method.class_idx).to_string(),
                    argument_types: self.argument_types(method.proto_idx),
                    return_type: self.return_type(method.proto_idx).to_string(),
                    name: self.strings[method.name_idx].clone(),
                    internal,
                });
            }
        }

        sparse.into_iter().flatten().collect()
    }

    fn argument_types(&self, proto_idx: ProtoId) -> Vec<String> {
        self.prototypes[proto_idx]
            .parameters
            .iter()
            .map(|&t| self.type_descriptor(t).to_string())
            .collect()
    }

    fn return_type(&self, proto_idx: ProtoId) -> &str {
        self.type_descriptor(self.prototypes[proto_idx].return_type_idx)
    }
}

/// Converts a descriptor to dotted Java form: `Lcom/example/Foo;` becomes
/// `com.example.Foo`, `[I` becomes `int[]`.
pub fn descriptor_to_dot(descriptor: &str) -> String {
    let mut rest = descriptor;
    let mut dims = 0;
    while let Some(stripped) = rest.strip_prefix('[') {
        rest = stripped;
        dims += 1;
    }

    let base = match rest {
        "Z" => "boolean".to_string(),
        "B" => "byte".to_string(),
        "C" => "char".to_string(),
        "S" => "short".to_string(),
        "I" => "int".to_string(),
        "J" => "long".to_string(),
        "F" => "float".to_string(),
        "D" => "double".to_string(),
        "V" => "void".to_string(),
        _ => rest
            .strip_prefix('L')
            .and_then(|s| s.strip_suffix(';'))
            .unwrap_or(rest)
            .replace('/', "."),
    };

    base + &"[]".repeat(dims)
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}:{}",
            descriptor_to_dot(&self.class_name),
            self.name,
            self.field_type
        )
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}{}",
            descriptor_to_dot(&self.class_name),
            self.name,
            self.descriptor()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_args_void_return_descriptor() {
        let m = MethodRef {
            class_name: "Lcom/example/Foo;".to_string(),
            argument_types: vec![],
            return_type: "V".to_string(),
            name: "run".to_string(),
            internal: true,
        };
        assert_eq!(m.descriptor(), "()V");
        assert_eq!(m.to_string(), "com.example.Foo.run()V");
    }

    #[test]
    fn descriptor_with_arguments() {
        let m = MethodRef {
            class_name: "Lcom/example/Foo;".to_string(),
            argument_types: vec!["I".to_string(), "Ljava/lang/String;".to_string()],
            return_type: "[B".to_string(),
            name: "encode".to_string(),
            internal: false,
        };
        assert_eq!(m.descriptor(), "(ILjava/lang/String;)[B");
    }

    #[test]
    fn descriptor_to_dot_forms() {
        assert_eq!(descriptor_to_dot("Lcom/example/Foo;"), "com.example.Foo");
        assert_eq!(descriptor_to_dot("I"), "int");
        assert_eq!(descriptor_to_dot("[I"), "int[]");
        assert_eq!(descriptor_to_dot("[[Ljava/lang/String;"), "java.lang.String[][]");
    }

    #[test]
    fn field_ref_display() {
        let f = FieldRef {
            class_name: "Lcom/example/Foo;".to_string(),
            field_type: "J".to_string(),
            name: "count".to_string(),
            internal: true,
        };
        assert_eq!(f.to_string(), "com.example.Foo.count:J");
    }
}
