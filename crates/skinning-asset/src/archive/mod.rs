//! Sources for the files an asset refers to (external buffers and images).
//!
//! A `.gltf` file names its sidecar files by URI. Resolving those through an
//! [`Archive`] keeps the parser independent of where the asset is stored: a
//! plain directory on disk, or a packed zip file.

use std::{borrow::Cow, error::Error, path::Path};

mod dir;
#[cfg(feature = "zip")]
pub mod zip;

pub use dir::{DirectoryArchive, FileEntry};

pub trait Entry<'a> {
    type Error: Error;

    fn name(&self) -> Result<Cow<'_, str>, Self::Error>;
    fn unpack(&mut self) -> Result<Vec<u8>, Self::Error>;
}

pub trait Archive: Sized {
    type Error: Error;
    type Entry<'a>: Entry<'a, Error = Self::Error>
    where
        Self: 'a;

    /// Look up an entry. A missing entry is `Ok(None)`, not an error.
    fn by_path<P: AsRef<Path>>(&mut self, path: P) -> Result<Option<Self::Entry<'_>>, Self::Error>;
}
