use std::{
    borrow::Cow,
    fs, io,
    path::{Path, PathBuf},
};

use super::{Archive, Entry};

/// Files below a base directory, usually the directory holding the asset.
#[derive(Debug, Clone)]
pub struct DirectoryArchive {
    base: PathBuf,
}

impl DirectoryArchive {
    pub fn new<P: Into<PathBuf>>(base: P) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }
}

#[derive(Debug)]
pub struct FileEntry {
    path: PathBuf,
}

impl<'a> Entry<'a> for FileEntry {
    type Error = io::Error;

    fn name(&self) -> Result<Cow<'_, str>, Self::Error> {
        Ok(self.path.to_string_lossy())
    }

    fn unpack(&mut self) -> Result<Vec<u8>, Self::Error> {
        fs::read(&self.path)
    }
}

impl Archive for DirectoryArchive {
    type Error = io::Error;

    type Entry<'a> = FileEntry
    where
        Self: 'a;

    fn by_path<P: AsRef<Path>>(&mut self, path: P) -> Result<Option<Self::Entry<'_>>, Self::Error> {
        let path = self.base.join(path);
        match fs::metadata(&path) {
            Ok(metadata) if metadata.is_file() => Ok(Some(FileEntry { path })),
            Ok(_) => Ok(None),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error),
        }
    }
}
