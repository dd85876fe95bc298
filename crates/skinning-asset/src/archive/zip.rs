use std::{
    borrow::Cow,
    error::Error,
    fmt::{self, Display, Formatter},
    io::{self, Read, Seek},
    path::{Component, Path, PathBuf},
};

use zip::{read::ZipFile, ZipArchive};

use super::{Archive, Entry};

#[derive(Debug)]
pub enum ZipError {
    Zip(zip::result::ZipError),
    Io(io::Error),
    /// Entry names inside a zip are UTF-8, so non-Unicode paths can't match.
    BadFileName(PathBuf),
    EntryTooLarge { name: String, size: u64 },
}

impl Display for ZipError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ZipError::Zip(error) => Display::fmt(error, f),
            ZipError::Io(error) => Display::fmt(error, f),
            ZipError::BadFileName(path) => {
                write!(f, "Path {} is not valid Unicode", path.display())
            }
            ZipError::EntryTooLarge { name, size } => {
                write!(f, "Entry {} has size {}, too large to unpack", name, size)
            }
        }
    }
}

impl Error for ZipError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ZipError::Zip(error) => Some(error),
            ZipError::Io(error) => Some(error),
            _ => None,
        }
    }
}

impl From<zip::result::ZipError> for ZipError {
    fn from(value: zip::result::ZipError) -> Self {
        Self::Zip(value)
    }
}

impl From<io::Error> for ZipError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

/// Open a zip file holding a model and its sidecar files.
pub fn open<R: Read + Seek>(stream: R) -> Result<ZipArchive<R>, ZipError> {
    Ok(ZipArchive::new(stream)?)
}

/// Zip entry names always use `/`, whatever the host separator is.
fn entry_name(path: &Path) -> Result<String, ZipError> {
    let mut parts: Vec<&str> = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(
                part.to_str()
                    .ok_or_else(|| ZipError::BadFileName(path.to_path_buf()))?,
            ),
            Component::ParentDir => {
                parts.pop();
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => (),
        }
    }
    Ok(parts.join("/"))
}

impl<'a> Entry<'a> for ZipFile<'a> {
    type Error = ZipError;

    fn name(&self) -> Result<Cow<'_, str>, Self::Error> {
        Ok(Cow::Borrowed(ZipFile::name(self)))
    }

    fn unpack(&mut self) -> Result<Vec<u8>, Self::Error> {
        let size = self.size();
        let capacity = usize::try_from(size).map_err(|_| ZipError::EntryTooLarge {
            name: ZipFile::name(self).to_string(),
            size,
        })?;
        let mut data = Vec::with_capacity(capacity);
        self.read_to_end(&mut data)?;
        Ok(data)
    }
}

impl<T: Read + Seek> Archive for ZipArchive<T> {
    type Error = ZipError;

    type Entry<'a> = ZipFile<'a>
    where
        Self: 'a;

    fn by_path<P: AsRef<Path>>(&mut self, name: P) -> Result<Option<Self::Entry<'_>>, Self::Error> {
        let name = entry_name(name.as_ref())?;
        match self.by_name(&name) {
            Ok(entry) => Ok(Some(entry)),
            Err(zip::result::ZipError::FileNotFound) => Ok(None),
            Err(error) => Err(error.into()),
        }
    }
}

#[cfg(test)]
mod test {
    use std::path::Path;

    use super::entry_name;

    #[test]
    fn entry_names_are_normalized() {
        assert_eq!(
            entry_name(Path::new("./models/../textures/a.png")).unwrap(),
            "textures/a.png"
        );
        assert_eq!(entry_name(Path::new("model.gltf")).unwrap(), "model.gltf");
    }
}
