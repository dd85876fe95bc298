use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    path::Path,
};

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::archive::{Archive, Entry};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemeError {
    Unsupported(String),
    BadDataUri,
}

impl Display for SchemeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SchemeError::Unsupported(uri) => write!(f, "Unsupported scheme in URI {}", uri),
            SchemeError::BadDataUri => write!(f, "Bad data URI"),
        }
    }
}

impl Error for SchemeError {}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Scheme<'a> {
    // Data uri with optional mime type
    Data(Option<&'a str>, Vec<u8>),
    // Relative path, percent-decoded
    Relative(String),
    // Absolute path
    Absolute(String),
}

fn has_prefix(uri: &str, prefix: &str) -> bool {
    uri.len() >= prefix.len() && uri[..prefix.len()].eq_ignore_ascii_case(prefix)
}

fn percent_decode(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut index = 0;
    while index < bytes.len() {
        if bytes[index] == b'%' && index + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[index + 1..index + 3])
                .ok()
                .and_then(|hex| u8::from_str_radix(hex, 16).ok());
            if let Some(byte) = hex {
                decoded.push(byte);
                index += 3;
                continue;
            }
        }
        decoded.push(bytes[index]);
        index += 1;
    }
    String::from_utf8_lossy(&decoded).into_owned()
}

impl<'a> TryFrom<&'a str> for Scheme<'a> {
    type Error = SchemeError;

    fn try_from(uri: &'a str) -> Result<Self, Self::Error> {
        if has_prefix(uri, "data:") {
            // Data URI: rfc2397
            let content = &uri[5..];
            let Some((param, value)) = content.split_once(',') else {
                return Err(SchemeError::BadDataUri);
            };
            if let Some((mime, encoding)) = param.split_once(';') {
                if encoding.eq_ignore_ascii_case("base64") {
                    let data = STANDARD
                        .decode(value)
                        .map_err(|_| SchemeError::BadDataUri)?;
                    let mime = (!mime.is_empty()).then_some(mime);
                    Ok(Scheme::Data(mime, data))
                } else {
                    Err(SchemeError::BadDataUri)
                }
            } else {
                // Plain data URIs carry text; let the consumer guess the content.
                Ok(Scheme::Data(None, Vec::from(value.as_bytes())))
            }
        } else if has_prefix(uri, "file://") {
            Ok(Scheme::Absolute(percent_decode(&uri[7..])))
        } else if has_prefix(uri, "file:") {
            Ok(Scheme::Absolute(percent_decode(&uri[5..])))
        } else if uri.contains("://") {
            Err(SchemeError::Unsupported(uri.to_string()))
        } else {
            Ok(Scheme::Relative(percent_decode(uri)))
        }
    }
}

type SchemeData<'a> = (Option<&'a str>, Vec<u8>);

impl<'a> Scheme<'a> {
    /// Fetch the bytes behind this URI. Relative paths are joined onto `base`,
    /// the directory of the model file inside the archive.
    pub(crate) fn load<A: Archive>(
        &self,
        archive: &mut A,
        base: &Path,
    ) -> Result<Option<SchemeData<'a>>, A::Error> {
        match self {
            Scheme::Data(mime, data) => Ok(Some((*mime, data.clone()))),
            Scheme::Relative(path) => {
                let path = base.join(path);
                let Some(mut entry) = archive.by_path(path)? else {
                    return Ok(None);
                };
                let data = entry.unpack()?;
                Ok(Some((None, data)))
            }
            Scheme::Absolute(path) => {
                let Some(mut entry) = archive.by_path(path)? else {
                    return Ok(None);
                };
                let data = entry.unpack()?;
                Ok(Some((None, data)))
            }
        }
    }
}
