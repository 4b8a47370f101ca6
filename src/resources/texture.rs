//! HDR image loading and upload

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::error::{RenderError, RenderResult};
use image::{DynamicImage, GenericImageView};
use std::path::Path;

/// Decoded image as linear RGBA32F texels
#[derive(Debug, Clone)]
pub struct HdrImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<[f32; 4]>,
    pub name: String,
}

impl HdrImage {
    /// Load an image from file; Radiance `.hdr` and every other `image` format
    pub fn from_file<P: AsRef<Path>>(path: P) -> RenderResult<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();

        let img = image::open(path).map_err(|e| RenderError::ImageLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let image = Self::from_image(img, &name);
        if !image.is_complete() {
            return Err(RenderError::ImageLoad {
                path: path.to_path_buf(),
                reason: "image has no texels".into(),
            });
        }

        log::info!("Loaded environment {} ({}x{})", name, image.width, image.height);
        Ok(image)
    }

    /// Build an image from raw texels, row-major
    pub fn from_pixels(width: u32, height: u32, pixels: Vec<[f32; 4]>, name: &str) -> RenderResult<Self> {
        let image = Self {
            width,
            height,
            pixels,
            name: name.to_string(),
        };
        if !image.is_complete() {
            return Err(RenderError::ImageLoad {
                path: name.into(),
                reason: format!(
                    "{} texels for a {}x{} image",
                    image.pixels.len(),
                    width,
                    height
                ),
            });
        }
        Ok(image)
    }

    /// Non-empty, with exactly one texel per pixel
    pub fn is_complete(&self) -> bool {
        self.width > 0 && self.height > 0 && self.pixels.len() as u64 == self.width as u64 * self.height as u64
    }

    fn from_image(img: DynamicImage, name: &str) -> Self {
        let (width, height) = img.dimensions();
        let pixels = img
            .to_rgba32f()
            .pixels()
            .map(|p| p.0)
            .collect();

        Self {
            width,
            height,
            pixels,
            name: name.to_string(),
        }
    }

    /// Texel bytes in `Rgba32Float` layout
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }
}

/// GPU texture with its default view
pub struct GpuTexture {
    pub handle: TextureHandle,
    pub view: TextureViewHandle,
    pub width: u32,
    pub height: u32,
}

impl GpuTexture {
    /// Create a sampled RGBA32F texture and upload `image` into it
    pub fn create(backend: &mut dyn GraphicsBackend, image: &HdrImage) -> RenderResult<Self> {
        if !image.is_complete() {
            return Err(RenderError::ResourceCreation {
                resource: image.name.clone(),
                source: BackendError::TextureCreationFailed(format!(
                    "{} texels for a {}x{} image",
                    image.pixels.len(),
                    image.width,
                    image.height
                )),
            });
        }

        let handle = backend
            .create_texture(&TextureDescriptor {
                label: Some(image.name.clone()),
                width: image.width,
                height: image.height,
                format: TextureFormat::Rgba32Float,
                usage: TextureUsage::TEXTURE_BINDING | TextureUsage::COPY_DST,
                ..Default::default()
            })
            .map_err(RenderError::resource(image.name.as_str()))?;

        backend.write_texture(handle, image.as_bytes(), image.width, image.height);

        let view = match backend.create_texture_view(handle, &TextureViewDescriptor::default()) {
            Ok(view) => view,
            Err(source) => {
                backend.destroy_texture(handle);
                return Err(RenderError::ResourceCreation {
                    resource: image.name.clone(),
                    source,
                });
            }
        };

        Ok(Self {
            handle,
            view,
            width: image.width,
            height: image.height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{RecordedCall, RecordingBackend};

    #[test]
    fn test_missing_file_is_image_load_error() {
        let err = HdrImage::from_file("does/not/exist.hdr").unwrap_err();
        assert!(matches!(err, RenderError::ImageLoad { .. }));
    }

    #[test]
    fn test_texel_count_must_match_extent() {
        let err = HdrImage::from_pixels(2, 2, vec![[1.0; 4]; 3], "short").unwrap_err();
        assert!(matches!(err, RenderError::ImageLoad { .. }));
        assert!(HdrImage::from_pixels(0, 1, Vec::new(), "empty").is_err());
    }

    #[test]
    fn test_incomplete_image_is_not_uploaded() {
        let mut image = HdrImage::from_pixels(2, 1, vec![[1.0; 4]; 2], "sky").unwrap();
        image.pixels.pop();
        let mut backend = RecordingBackend::new(4, 4);

        let err = GpuTexture::create(&mut backend, &image).err().unwrap();
        assert!(matches!(err, RenderError::ResourceCreation { ref resource, .. } if resource == "sky"));
        assert_eq!(backend.live_texture_count(), 0);
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_upload_writes_float_texels() {
        let image = HdrImage::from_pixels(2, 1, vec![[1.0, 0.5, 0.25, 1.0], [0.0; 4]], "sky").unwrap();
        let mut backend = RecordingBackend::new(4, 4);

        let texture = GpuTexture::create(&mut backend, &image).unwrap();

        let desc = backend.texture_descriptor(texture.handle).unwrap();
        assert_eq!(desc.format, TextureFormat::Rgba32Float);
        assert!(backend.calls().contains(&RecordedCall::WriteTexture {
            texture: texture.handle,
            width: 2,
            height: 1,
            len: 32,
        }));
    }
}
