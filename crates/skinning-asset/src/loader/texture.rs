use std::{
    collections::HashMap,
    error::Error,
    fmt::{self, Display, Formatter},
    io::Cursor,
    sync::Arc,
};

use image::{ImageError, ImageFormat, ImageReader};
use log::warn;

use crate::texture::Texture;

use super::gltf::ImageDesc;

#[derive(Debug)]
pub enum TextureLoadError {
    Missing,
    BadMime(String),
    Image(ImageError),
}

impl Display for TextureLoadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TextureLoadError::Missing => write!(f, "Image file is missing"),
            TextureLoadError::BadMime(mime) => write!(f, "Bad image MIME {}", mime),
            TextureLoadError::Image(err) => Display::fmt(&err, f),
        }
    }
}

impl Error for TextureLoadError {}

impl From<ImageError> for TextureLoadError {
    fn from(value: ImageError) -> Self {
        TextureLoadError::Image(value)
    }
}

/// Decodes images into RGBA8 textures, one per image index.
#[derive(Default)]
pub(crate) struct TextureLoader {
    texture_cache: HashMap<usize, Arc<Texture>>,
    placeholder: Option<Arc<Texture>>,
}

impl TextureLoader {
    pub fn decode(data: &[u8], mime: Option<&str>) -> Result<Texture, TextureLoadError> {
        let mut reader = ImageReader::new(Cursor::new(data));
        match mime {
            Some(mime) => {
                let format = ImageFormat::from_mime_type(mime)
                    .ok_or_else(|| TextureLoadError::BadMime(mime.to_string()))?;
                reader.set_format(format);
            }
            None => reader = reader.with_guessed_format().map_err(ImageError::IoError)?,
        }
        let image = reader.decode()?.into_rgba8();
        let (width, height) = image.dimensions();
        Ok(Texture {
            width,
            height,
            pixels: image.into_raw(),
        })
    }

    pub fn placeholder(&mut self) -> Arc<Texture> {
        self.placeholder
            .get_or_insert_with(|| Arc::new(Texture::placeholder()))
            .clone()
    }

    /// Decode image `index`, falling back to the placeholder on any failure.
    pub fn load(&mut self, index: usize, image: &ImageDesc) -> Arc<Texture> {
        if let Some(texture) = self.texture_cache.get(&index) {
            return texture.clone();
        }

        let decoded = match &image.data {
            Some(data) => Self::decode(data, image.mime_type.as_deref()),
            None => Err(TextureLoadError::Missing),
        };
        let texture = match decoded {
            Ok(texture) => Arc::new(texture),
            Err(error) => {
                warn!(
                    "Image #{} ({}) replaced by placeholder: {}",
                    index, image.source, error
                );
                self.placeholder()
            }
        };

        self.texture_cache.insert(index, texture.clone());
        texture
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::loader::{fixture::encode_png, gltf::ImageSource};

    fn image(data: Option<Vec<u8>>, mime: Option<&str>) -> ImageDesc {
        ImageDesc {
            name: None,
            source: ImageSource::View(0),
            mime_type: mime.map(str::to_string),
            data,
        }
    }

    #[test]
    fn decodes_png_to_rgba() {
        let png = encode_png(2, 1, &[10, 20, 30, 255, 40, 50, 60, 128]);
        let mut loader = TextureLoader::default();
        let texture = loader.load(0, &image(Some(png.clone()), Some("image/png")));
        assert_eq!((texture.width, texture.height), (2, 1));
        assert_eq!(texture.pixel(1, 0), Some([40, 50, 60, 128]));

        let guessed = loader.load(1, &image(Some(png), None));
        assert_eq!(guessed.pixels, texture.pixels);
    }

    #[test]
    fn failures_become_placeholder() {
        let mut loader = TextureLoader::default();
        assert!(loader.load(0, &image(Some(vec![1, 2, 3]), Some("image/png"))).is_placeholder());
        assert!(loader.load(1, &image(None, None)).is_placeholder());
        assert!(loader.load(2, &image(Some(vec![1, 2, 3]), Some("text/plain"))).is_placeholder());
        assert!(Arc::ptr_eq(&loader.load(0, &image(None, None)), &loader.placeholder()));
    }
}
