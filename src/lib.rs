//! # dexdeps
//!
//! A library for extracting class, field and method references from Android
//! DEX files, grouped by declaring class and tagged as internal (defined in
//! the DEX) or external (resolved elsewhere). Useful for dependency audits,
//! minification checks and API-usage scans.
//!
use std::path::Path;

use crate::container::ContainerResult;
use crate::dex::DexFile;

pub mod container;
pub mod dex;
#[cfg(test)]
mod tests;

/// Opens a `.dex`, `.apk` or `.jar` file and decodes every DEX image found
/// inside (`classes.dex`, `classes2.dex`, ... for archives).
///
/// # Examples
///
/// ```no_run
///  use std::path::Path;
///
///  let dexes = dexdeps::open(Path::new("app.apk")).unwrap();
///  for dex in &dexes {
///      for class in dex.external_references() {
///          println!("{} ({} methods)", class.name, class.methods.len());
///      }
///  }
/// ```
pub fn open(path: &Path) -> ContainerResult<Vec<DexFile>> {
    container::open_dex(path)
}
