use std::fmt::{self, Debug, Formatter};

pub const PLACEHOLDER_SIZE: u32 = 256;
pub const PLACEHOLDER_TILE: u32 = 16;

const MAGENTA: [u8; 4] = [255, 0, 255, 255];
const BLACK: [u8; 4] = [0, 0, 0, 255];

/// RGBA8 pixels, row-major, `width * height * 4` bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct Texture {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Debug for Texture {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Texture")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("pixels", &format_args!("[{} bytes]", self.pixels.len()))
            .finish()
    }
}

impl Texture {
    /// Magenta/black checkerboard standing in for images that failed to load.
    pub fn placeholder() -> Self {
        let size = PLACEHOLDER_SIZE;
        let mut pixels = Vec::with_capacity((size * size * 4) as usize);
        for y in 0..size {
            for x in 0..size {
                let color = if (x / PLACEHOLDER_TILE) % 2 == (y / PLACEHOLDER_TILE) % 2 {
                    MAGENTA
                } else {
                    BLACK
                };
                pixels.extend_from_slice(&color);
            }
        }
        Self {
            width: size,
            height: size,
            pixels,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        *self == Self::placeholder()
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let index = ((y * self.width + x) * 4) as usize;
        let pixel = self.pixels.get(index..index + 4)?;
        Some([pixel[0], pixel[1], pixel[2], pixel[3]])
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn placeholder_layout() {
        let texture = Texture::placeholder();
        assert_eq!((texture.width, texture.height), (256, 256));
        assert_eq!(texture.pixels.len(), 256 * 256 * 4);
        assert_eq!(texture.pixel(0, 0), Some(MAGENTA));
        assert_eq!(texture.pixel(15, 15), Some(MAGENTA));
        assert_eq!(texture.pixel(16, 0), Some(BLACK));
        assert_eq!(texture.pixel(0, 16), Some(BLACK));
        assert_eq!(texture.pixel(16, 16), Some(MAGENTA));
        assert_eq!(texture.pixel(256, 0), None);
    }
}
