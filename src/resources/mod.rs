//! Loading and post-processing of model assets.
//!
//! Models arrive as in-memory glTF-binary buffers and are decoded with the
//! `gltf` crate into a [`ScenegraphAsset`]: the parsed document, its buffer
//! data, and a table of decoded RGBA images ready for upload by the host
//! renderer. Decode anomalies are collected as warnings on the asset so the
//! engine can republish them instead of letting them vanish in a console.

use std::collections::HashMap;

use serde::Serialize;

pub mod texture;

use crate::resources::texture::DecodedImage;

/// Marker token identifying a replaceable material texture slot. A material
/// whose name contains this token designates its base-color texture as the
/// replacement target.
pub const PLACEHOLDER_TOKEN: &str = "placeholder";

/// Statistics extracted from a decoded model.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub name: String,
    /// First buffer's byte length in MiB, rounded to two decimals.
    pub size_mb: f64,
    pub accessor: usize,
    pub material: usize,
    pub mesh: usize,
    pub nodes: usize,
    /// Attached once a benchmark for this model set completes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fps: Option<f64>,
}

/// A decoded and post-processed model, owned by the engine that loaded it.
pub struct ScenegraphAsset {
    document: gltf::Document,
    buffers: Vec<Vec<u8>>,
    images: Vec<DecodedImage>,
    overrides: HashMap<usize, DecodedImage>,
    warnings: Vec<String>,
}

impl ScenegraphAsset {
    pub fn document(&self) -> &gltf::Document {
        &self.document
    }

    /// Decoded RGBA image table, index-aligned with the document's images.
    pub fn images(&self) -> &[DecodedImage] {
        &self.images
    }

    pub(crate) fn set_image_override(&mut self, index: usize, image: DecodedImage) {
        self.overrides.insert(index, image);
    }

    /// Drain the warnings collected during decode and post-processing.
    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }

    /// Rebuild the decoded image table from the document, the buffer data
    /// and any replacement overrides. Runs once at load and again after a
    /// texture substitution.
    pub(crate) fn post_process(&mut self) {
        let mut images = Vec::new();

        for image in self.document.images() {
            if let Some(replacement) = self.overrides.get(&image.index()) {
                images.push(replacement.clone());
                continue;
            }

            let decoded = match image.source() {
                gltf::image::Source::View { view, mime_type: _ } => {
                    let buffer = &self.buffers[view.buffer().index()];
                    let bytes = &buffer[view.offset()..view.offset() + view.length()];
                    texture::decode_image(bytes)
                }
                gltf::image::Source::Uri { uri, .. } => Err(anyhow::anyhow!(
                    "external image \"{uri}\" is not resolvable from an in-memory asset"
                )),
            };

            match decoded {
                Ok(decoded) => images.push(decoded),
                Err(err) => {
                    self.warnings
                        .push(format!("image {} skipped: {err}", image.index()));
                    images.push(DecodedImage::fallback());
                }
            }
        }

        self.images = images;
    }
}

/// Decode a glTF-binary asset and post-process it.
///
/// Only embedded binary buffers are resolvable; buffers referencing external
/// URIs produce a warning and an empty buffer slot. Resolves once decode and
/// post-processing finished.
pub async fn load_scene(bytes: &[u8]) -> anyhow::Result<ScenegraphAsset> {
    let gltf = gltf::Gltf::from_slice(bytes)?;
    let document = gltf.document;
    let blob = gltf.blob;

    let mut warnings = Vec::new();
    let mut buffers = Vec::new();
    for buffer in document.buffers() {
        match buffer.source() {
            gltf::buffer::Source::Bin => {
                buffers.push(blob.as_deref().unwrap_or_default().to_vec());
            }
            gltf::buffer::Source::Uri(uri) => {
                warnings.push(format!(
                    "external buffer \"{uri}\" is not resolvable from an in-memory asset"
                ));
                buffers.push(Vec::new());
            }
        }
    }

    let mut asset = ScenegraphAsset {
        document,
        buffers,
        images: Vec::new(),
        overrides: HashMap::new(),
        warnings,
    };
    asset.post_process();
    Ok(asset)
}

/// Extract the statistics record for a loaded model.
pub fn stats_for(name: &str, asset: &ScenegraphAsset) -> Stats {
    let document = asset.document();
    let byte_length = document.buffers().next().map(|buffer| buffer.length());

    Stats {
        name: name.strip_suffix(".glb").unwrap_or(name).to_string(),
        size_mb: round2(byte_length.unwrap_or(0) as f64 / 1_048_576.0),
        accessor: document.accessors().count(),
        material: document.materials().count(),
        mesh: document.meshes().count(),
        nodes: document.nodes().count(),
        fps: None,
    }
}

/// Stats straight from glb bytes, for backends that never decode a full
/// scenegraph of their own.
pub fn stats_from_bytes(name: &str, bytes: &[u8]) -> anyhow::Result<Stats> {
    let gltf = gltf::Gltf::from_slice(bytes)?;
    let document = gltf.document;
    let byte_length = document.buffers().next().map(|buffer| buffer.length());

    Ok(Stats {
        name: name.strip_suffix(".glb").unwrap_or(name).to_string(),
        size_mb: round2(byte_length.unwrap_or(0) as f64 / 1_048_576.0),
        accessor: document.accessors().count(),
        material: document.materials().count(),
        mesh: document.meshes().count(),
        nodes: document.nodes().count(),
        fps: None,
    })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
