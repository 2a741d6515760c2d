//! Local-filesystem implementation of `MediaStore`.
//!
//! Originals live flat under the image directory keyed by their
//! content-addressed name; thumbnails are 250px WebP renditions in a
//! sibling directory, named after the original with `.webp` appended.

use std::io::Cursor;
use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use domains::ports::MediaStore;
use domains::{DomainError, Result};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use tokio::fs;
use tracing::debug;

pub struct LocalMediaStore {
    image_dir: PathBuf,
    thumb_dir: PathBuf,
}

impl LocalMediaStore {
    /// Creates both directories when missing.
    pub async fn open(image_dir: PathBuf, thumb_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&image_dir).await.map_err(io_err)?;
        fs::create_dir_all(&thumb_dir).await.map_err(io_err)?;
        Ok(Self { image_dir, thumb_dir })
    }

    fn image_path(&self, file_name: &str) -> PathBuf {
        self.image_dir.join(file_name)
    }

    fn thumb_path(&self, file_name: &str) -> PathBuf {
        self.thumb_dir.join(format!("{file_name}.webp"))
    }

    async fn decode(&self, file_name: &str) -> Result<Option<DynamicImage>> {
        let data = fs::read(self.image_path(file_name)).await.map_err(io_err)?;
        let reader = ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(io_err)?;
        match reader.decode() {
            Ok(img) => Ok(Some(img)),
            // Video and audio land here; they are stored but never decoded.
            Err(err) => {
                debug!(file = file_name, error = %err, "not decodable as an image");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn contains(&self, file_name: &str) -> Result<bool> {
        fs::try_exists(self.image_path(file_name)).await.map_err(io_err)
    }

    async fn store(&self, file_name: &str, data: Bytes) -> Result<()> {
        fs::write(self.image_path(file_name), &data).await.map_err(io_err)
    }

    async fn remove(&self, file_name: &str) -> Result<()> {
        match fs::remove_file(self.image_path(file_name)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_err(err)),
        }
    }

    async fn create_thumbnail(&self, file_name: &str) -> Result<()> {
        let img = self.decode(file_name).await?.ok_or_else(|| {
            DomainError::Storage(format!("{file_name} cannot be thumbnailed"))
        })?;
        let thumb = img.thumbnail(250, 250);
        thumb
            .save_with_format(self.thumb_path(file_name), ImageFormat::WebP)
            .map_err(|err| DomainError::Storage(err.to_string()))
    }

    async fn perceptual_hash(&self, file_name: &str) -> Result<Option<u64>> {
        Ok(self.decode(file_name).await?.map(|img| difference_hash(&img)))
    }
}

/// 64-bit difference hash: scale to 9x8 grayscale and compare each pixel
/// against its right neighbor, row by row.
fn difference_hash(img: &DynamicImage) -> u64 {
    let gray = img.resize_exact(9, 8, FilterType::Triangle).to_luma8();
    let mut hash = 0u64;
    let mut bit = 0u32;
    for y in 0..8 {
        for x in 0..8 {
            if gray.get_pixel(x, y)[0] < gray.get_pixel(x + 1, y)[0] {
                hash |= 1 << bit;
            }
            bit += 1;
        }
    }
    hash
}

fn io_err(err: std::io::Error) -> DomainError {
    DomainError::Storage(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn scratch_dirs(tag: &str) -> (PathBuf, PathBuf) {
        let base = std::env::temp_dir().join(format!("tagboard-media-{}-{tag}", std::process::id()));
        (base.join("images"), base.join("thumbs"))
    }

    fn gradient() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(64, 64, |x, _| {
            image::Rgb([(x * 4) as u8; 3])
        }))
    }

    fn png_bytes(img: &DynamicImage) -> Bytes {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        Bytes::from(buf)
    }

    #[test]
    fn uniform_images_hash_to_zero() {
        let flat = DynamicImage::ImageRgb8(RgbImage::from_pixel(32, 32, image::Rgb([128; 3])));
        assert_eq!(difference_hash(&flat), 0);
    }

    #[test]
    fn a_horizontal_gradient_sets_every_bit() {
        // Brightness strictly increases left to right in every row.
        assert_eq!(difference_hash(&gradient()), u64::MAX);
    }

    #[test]
    fn mirroring_changes_the_hash() {
        let img = gradient();
        assert_ne!(difference_hash(&img), difference_hash(&img.fliph()));
    }

    #[tokio::test]
    async fn store_contains_remove_round_trip() {
        let (images, thumbs) = scratch_dirs("roundtrip");
        let store = LocalMediaStore::open(images, thumbs).await.unwrap();

        assert!(!store.contains("abc.png").await.unwrap());
        store.store("abc.png", Bytes::from_static(b"bytes")).await.unwrap();
        assert!(store.contains("abc.png").await.unwrap());

        store.remove("abc.png").await.unwrap();
        assert!(!store.contains("abc.png").await.unwrap());
        // Removing again is fine.
        store.remove("abc.png").await.unwrap();
    }

    #[tokio::test]
    async fn thumbnails_land_in_the_thumb_directory() {
        let (images, thumbs) = scratch_dirs("thumbs");
        let store = LocalMediaStore::open(images, thumbs.clone()).await.unwrap();

        store.store("pic.png", png_bytes(&gradient())).await.unwrap();
        store.create_thumbnail("pic.png").await.unwrap();
        assert!(thumbs.join("pic.png.webp").exists());
    }

    #[tokio::test]
    async fn undecodable_files_produce_no_hash() {
        let (images, thumbs) = scratch_dirs("nohash");
        let store = LocalMediaStore::open(images, thumbs).await.unwrap();

        store
            .store("clip.webm", Bytes::from_static(b"definitely not an image"))
            .await
            .unwrap();
        assert_eq!(store.perceptual_hash("clip.webm").await.unwrap(), None);
        assert!(store.create_thumbnail("clip.webm").await.is_err());
    }

    #[tokio::test]
    async fn decodable_files_hash_consistently() {
        let (images, thumbs) = scratch_dirs("hash");
        let store = LocalMediaStore::open(images, thumbs).await.unwrap();

        store.store("pic.png", png_bytes(&gradient())).await.unwrap();
        let first = store.perceptual_hash("pic.png").await.unwrap();
        let second = store.perceptual_hash("pic.png").await.unwrap();
        assert!(first.is_some());
        assert_eq!(first, second);
    }
}
