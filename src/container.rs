//! Resolves an input file into one or more DEX images: either the file is a
//! ZIP archive (`.apk`/`.jar`) holding `classes.dex`, `classes2.dex`, ... or
//! it is a raw `.dex` image itself. The decode core never touches the file
//! system; it only sees the byte buffers produced here.

use std::fs;
use std::io::{self, Cursor, Read};
use std::path::Path;

use log::info;
use zip::read::ZipArchive;
use zip::result::ZipError;

use crate::dex::{DexError, DexFile};

/// Result alias for container resolution.
pub type ContainerResult<T> = Result<T, ContainerError>;

/// Errors surfaced while locating and extracting DEX images.
#[derive(Debug)]
pub enum ContainerError {
    Io(io::Error),
    Zip(ZipError),
    /// The file is a ZIP archive but holds no `classes.dex` entry.
    NoDexEntries(String),
    /// An extracted image failed to decode.
    Dex(DexError),
}

impl std::fmt::Display for ContainerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContainerError::Io(err) => write!(f, "I/O error: {err}"),
            ContainerError::Zip(err) => write!(f, "ZIP error: {err}"),
            ContainerError::NoDexEntries(name) => {
                write!(f, "no classes.dex entries in '{name}'")
            }
            ContainerError::Dex(err) => write!(f, "DEX error: {err}"),
        }
    }
}

impl std::error::Error for ContainerError {}

impl From<io::Error> for ContainerError {
    fn from(value: io::Error) -> Self {
        ContainerError::Io(value)
    }
}

impl From<ZipError> for ContainerError {
    fn from(value: ZipError) -> Self {
        ContainerError::Zip(value)
    }
}

impl From<DexError> for ContainerError {
    fn from(value: DexError) -> Self {
        ContainerError::Dex(value)
    }
}

/// The name of the nth DEX entry in an APK: `classes.dex`, `classes2.dex`, ...
fn dex_entry_name(n: usize) -> String {
    if n == 1 {
        "classes.dex".to_string()
    } else {
        format!("classes{n}.dex")
    }
}

/// Reads every DEX image out of `path`.
///
/// If the file is a ZIP archive, consecutive `classesN.dex` entries are
/// extracted until the first gap; an archive without any is an error. Any
/// other file is assumed to be a raw DEX image and returned whole (the
/// header decode will reject it if it is not).
pub fn read_dex_images(path: &Path) -> ContainerResult<Vec<Vec<u8>>> {
    let bytes = fs::read(path)?;

    // Borrow of `bytes` ends with this block so a non-archive file can be
    // handed back whole.
    let extracted = match ZipArchive::new(Cursor::new(&bytes)) {
        Ok(mut archive) => {
            let mut images = vec![];
            for n in 1.. {
                let name = dex_entry_name(n);
                match archive.by_name(&name) {
                    Ok(mut entry) => {
                        let mut image = Vec::with_capacity(entry.size() as usize);
                        entry.read_to_end(&mut image)?;
                        info!(
                            "extracted {} ({} bytes) from {}",
                            name,
                            image.len(),
                            path.display()
                        );
                        images.push(image);
                    }
                    Err(ZipError::FileNotFound) => break,
                    Err(e) => return Err(e.into()),
                }
            }
            if images.is_empty() {
                return Err(ContainerError::NoDexEntries(path.display().to_string()));
            }
            Some(images)
        }
        Err(ZipError::InvalidArchive(_)) => None,
        Err(e) => return Err(e.into()),
    };

    Ok(match extracted {
        Some(images) => images,
        None => vec![bytes],
    })
}

/// Opens `path` and decodes every DEX image found inside.
///
/// Any single image failing to decode fails the whole batch; callers that
/// want per-image isolation can use [`read_dex_images`] and decode each
/// buffer themselves.
pub fn open_dex(path: &Path) -> ContainerResult<Vec<DexFile>> {
    let mut dexes = vec![];
    for image in read_dex_images(path)? {
        dexes.push(DexFile::from_bytes(&image)?);
    }
    Ok(dexes)
}
