use crate::domain::ports::ImageStore;
use crate::error::AppError;
use async_trait::async_trait;
use image::{codecs::jpeg::JpegEncoder, imageops::FilterType};
use std::path::PathBuf;
use tracing::{debug, error};

const JPEG_QUALITY: u8 = 90;

/// Writes processed uploads under the directory served as static assets.
pub struct FsImageStore {
    root: PathBuf,
}

impl FsImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ImageStore for FsImageStore {
    async fn save_jpeg(&self, data: Vec<u8>, width: u32, height: u32, relative_path: &str) -> Result<(), AppError> {
        let jpeg = tokio::task::spawn_blocking(move || encode_cover(&data, width, height))
            .await
            .map_err(|e| AppError::InternalWithMsg(format!("Image worker failed: {}", e)))??;

        let path = self.root.join(relative_path);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                error!("Cannot create {:?}: {}", parent, e);
                AppError::InternalWithMsg(format!("Image directory unavailable: {}", e))
            })?;
        }

        tokio::fs::write(&path, jpeg).await.map_err(|e| {
            error!("Cannot write {:?}: {}", path, e);
            AppError::InternalWithMsg(format!("Image write failed: {}", e))
        })?;

        debug!("Stored image {}", relative_path);
        Ok(())
    }
}

/// Scales and crops to exactly `width`x`height`, then encodes as JPEG.
fn encode_cover(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>, AppError> {
    let decoded = image::load_from_memory(data)
        .map_err(|_| AppError::Validation("Not an image! Please upload only images.".into()))?;
    let rgb = decoded.resize_to_fill(width, height, FilterType::Lanczos3).to_rgb8();

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY)
        .encode_image(&rgb)
        .map_err(|e| AppError::InternalWithMsg(format!("JPEG encoding failed: {}", e)))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(width, height))
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[tokio::test]
    async fn stores_cropped_jpeg() {
        let root = std::env::temp_dir().join(format!("images_{}", uuid::Uuid::new_v4()));
        let store = FsImageStore::new(&root);

        store.save_jpeg(png(800, 300), 500, 500, "img/users/user-1.jpeg").await.unwrap();

        let written = image::open(root.join("img/users/user-1.jpeg")).unwrap();
        assert_eq!((written.width(), written.height()), (500, 500));
        std::fs::remove_dir_all(&root).unwrap();
    }

    #[tokio::test]
    async fn rejects_non_images() {
        let store = FsImageStore::new(std::env::temp_dir());
        let err = store.save_jpeg(b"plain text".to_vec(), 10, 10, "x.jpeg").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
