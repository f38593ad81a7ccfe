//! Image loading into `[C, H, W]` float arrays

use ndarray::Array3;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Image in channel-first layout with values in `[0, 1]`
pub type ImageTensor = Array3<f32>;

/// Turns a record path into pixels
///
/// Loaders are shared by every data-loading worker, so they must be
/// `Send + Sync`.
pub trait ImageLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<ImageTensor>;
}

/// Decodes PNG/JPEG files from disk as RGB
#[derive(Debug, Clone, Copy, Default)]
pub struct FileImageLoader;

impl ImageLoader for FileImageLoader {
    fn load(&self, path: &Path) -> Result<ImageTensor> {
        let rgb = image::open(path)
            .map_err(|e| Error::config(format!("failed to open image {}: {e}", path.display())))?
            .to_rgb8();
        let (width, height) = rgb.dimensions();
        let mut tensor = Array3::<f32>::zeros((3, height as usize, width as usize));
        for (x, y, pixel) in rgb.enumerate_pixels() {
            for c in 0..3 {
                tensor[[c, y as usize, x as usize]] = f32::from(pixel[c]) / 255.0;
            }
        }
        Ok(tensor)
    }
}

/// Serves pre-decoded images keyed by path
#[derive(Debug, Clone, Default)]
pub struct InMemoryImageLoader {
    images: HashMap<PathBuf, ImageTensor>,
}

impl InMemoryImageLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, image: ImageTensor) {
        self.images.insert(path.into(), image);
    }

    pub fn with_image(mut self, path: impl Into<PathBuf>, image: ImageTensor) -> Self {
        self.insert(path, image);
        self
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

impl ImageLoader for InMemoryImageLoader {
    fn load(&self, path: &Path) -> Result<ImageTensor> {
        self.images
            .get(path)
            .cloned()
            .ok_or_else(|| Error::config(format!("no image registered for {}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_loader_decodes_rgb_chw() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("px.png");
        let mut img = image::RgbImage::new(3, 2);
        img.put_pixel(2, 1, image::Rgb([255, 0, 51]));
        img.save(&path).unwrap();

        let tensor = FileImageLoader.load(&path).unwrap();
        assert_eq!(tensor.dim(), (3, 2, 3));
        assert_eq!(tensor[[0, 1, 2]], 1.0);
        assert_eq!(tensor[[1, 1, 2]], 0.0);
        assert!((tensor[[2, 1, 2]] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_file_loader_missing_file() {
        let err = FileImageLoader.load(Path::new("/nonexistent.png")).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_in_memory_loader() {
        let loader = InMemoryImageLoader::new().with_image("a.png", Array3::zeros((3, 4, 4)));
        assert_eq!(loader.len(), 1);
        assert!(loader.load(Path::new("a.png")).is_ok());
        assert!(loader.load(Path::new("b.png")).is_err());
    }
}
