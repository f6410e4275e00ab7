//! Image decoding and placeholder texture replacement.

use crate::error::{ViewerError, ViewerResult};
use crate::resources::{PLACEHOLDER_TOKEN, ScenegraphAsset};

/// An image decoded to straight RGBA8, ready for upload.
#[derive(Clone, Debug)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl DecodedImage {
    /// 1x1 opaque white stand-in used when an image cannot be decoded.
    pub fn fallback() -> Self {
        Self {
            width: 1,
            height: 1,
            rgba: vec![255, 255, 255, 255],
        }
    }
}

pub fn decode_image(bytes: &[u8]) -> anyhow::Result<DecodedImage> {
    let image = image::load_from_memory(bytes)?;
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(DecodedImage {
        width,
        height,
        rgba: rgba.into_raw(),
    })
}

/// Substitute the model's placeholder texture with `image_bytes`.
///
/// Scans the materials for a name containing [`PLACEHOLDER_TOKEN`], follows
/// that material's base-color texture to its image index, swaps the image in
/// and re-runs post-processing. Models without a placeholder slot fail with
/// [`ViewerError::MissingTextureSlot`]; the model itself stays usable
/// without the replacement.
pub fn replace_placeholder_texture(
    asset: &mut ScenegraphAsset,
    model_id: &str,
    image_bytes: &[u8],
) -> ViewerResult<()> {
    let index = placeholder_image_index(asset)
        .ok_or_else(|| ViewerError::MissingTextureSlot(model_id.to_string()))?;

    let decoded =
        decode_image(image_bytes).map_err(|err| ViewerError::AssetLoad(err.to_string()))?;

    asset.set_image_override(index, decoded);
    asset.post_process();
    Ok(())
}

fn placeholder_image_index(asset: &ScenegraphAsset) -> Option<usize> {
    asset
        .document()
        .materials()
        .find(|material| {
            material
                .name()
                .is_some_and(|name| name.to_ascii_lowercase().contains(PLACEHOLDER_TOKEN))
        })
        .and_then(|material| material.pbr_metallic_roughness().base_color_texture())
        .map(|info| info.texture().source().index())
}
