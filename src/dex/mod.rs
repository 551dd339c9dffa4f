pub mod error;

pub(crate) mod dex_file;
pub(crate) mod reader;
pub(crate) mod refs;

pub use dex_file::{DexFile, Header};
pub use error::DexError;
pub use refs::{descriptor_to_dot, ClassRef, FieldRef, MethodRef};
