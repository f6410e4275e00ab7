#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use futures::FutureExt;
use futures::future::LocalBoxFuture;
use instant::Duration;

use map_model_viewer::engines::scenegraph::OverlayLayer;
use map_model_viewer::surface::{CameraPose, MapBackend};

/// Everything the scripted backend observed, for assertions.
pub struct MapLog {
    pub ops: Vec<String>,
    pub fly_count: usize,
    pub interaction_changes: Vec<bool>,
    pub overlay_sets: usize,
    pub overlay_removed: usize,
    pub layers: Vec<OverlayLayer>,
    pub source_data: HashMap<String, serde_json::Value>,
    pub pose: CameraPose,
}

impl MapLog {
    fn new() -> Self {
        Self {
            ops: Vec::new(),
            fly_count: 0,
            interaction_changes: Vec::new(),
            overlay_sets: 0,
            overlay_removed: 0,
            layers: Vec::new(),
            source_data: HashMap::new(),
            pose: CameraPose::start(),
        }
    }
}

/// Host map fake: records every backend call, resolves camera transitions
/// immediately, and optionally invokes a hook per transition so tests can
/// drive frame ticks mid-sweep.
pub struct ScriptedMap {
    pub log: Rc<RefCell<MapLog>>,
    pub on_fly: Option<Box<dyn Fn()>>,
    /// Invoke `mark_rendered` on every layer as soon as it is attached.
    pub mark_layers_rendered: bool,
    /// Model ids whose `add_model` call should fail.
    pub fail_model_ids: HashSet<String>,
}

impl ScriptedMap {
    pub fn new() -> Self {
        Self {
            log: Rc::new(RefCell::new(MapLog::new())),
            on_fly: None,
            mark_layers_rendered: false,
            fail_model_ids: HashSet::new(),
        }
    }
}

impl MapBackend for ScriptedMap {
    fn jump_to(&mut self, pose: CameraPose) {
        let mut log = self.log.borrow_mut();
        log.pose = pose;
        log.ops.push("jump_to".to_string());
    }

    fn fly_to(&mut self, pose: CameraPose, _duration: Duration) -> LocalBoxFuture<'static, ()> {
        {
            let mut log = self.log.borrow_mut();
            log.pose = pose;
            log.fly_count += 1;
        }
        if let Some(hook) = &self.on_fly {
            hook();
        }
        futures::future::ready(()).boxed_local()
    }

    fn current_pose(&self) -> CameraPose {
        self.log.borrow().pose
    }

    fn set_interaction_enabled(&mut self, enabled: bool) {
        self.log.borrow_mut().interaction_changes.push(enabled);
    }

    fn set_overlay_layers(&mut self, layers: Vec<OverlayLayer>) {
        if self.mark_layers_rendered {
            for layer in &layers {
                layer.mark_rendered();
            }
        }
        let mut log = self.log.borrow_mut();
        log.overlay_sets += 1;
        log.layers = layers;
    }

    fn remove_overlay(&mut self) {
        let mut log = self.log.borrow_mut();
        log.overlay_removed += 1;
        log.layers.clear();
    }

    fn add_model(&mut self, id: &str, _glb: &[u8]) -> anyhow::Result<()> {
        if self.fail_model_ids.contains(id) {
            anyhow::bail!("scripted decode failure for {id}");
        }
        self.log.borrow_mut().ops.push(format!("add_model {id}"));
        Ok(())
    }

    fn remove_model(&mut self, id: &str) {
        self.log.borrow_mut().ops.push(format!("remove_model {id}"));
    }

    fn add_source(&mut self, id: &str, data: serde_json::Value) {
        let mut log = self.log.borrow_mut();
        log.ops.push(format!("add_source {id}"));
        log.source_data.insert(id.to_string(), data);
    }

    fn set_source_data(&mut self, id: &str, data: serde_json::Value) {
        let mut log = self.log.borrow_mut();
        log.ops.push(format!("set_source_data {id}"));
        log.source_data.insert(id.to_string(), data);
    }

    fn remove_source(&mut self, id: &str) {
        self.log.borrow_mut().ops.push(format!("remove_source {id}"));
    }

    fn add_model_layer(&mut self, layer_id: &str, model_id: &str, source_id: &str) {
        self.log
            .borrow_mut()
            .ops
            .push(format!("add_model_layer {layer_id} {model_id} {source_id}"));
    }

    fn set_model_layer_transform(&mut self, layer_id: &str, rotation: [f64; 3], elevation: f64) {
        self.log.borrow_mut().ops.push(format!(
            "set_model_layer_transform {layer_id} {rotation:?} {elevation}"
        ));
    }

    fn remove_layer(&mut self, id: &str) {
        self.log.borrow_mut().ops.push(format!("remove_layer {id}"));
    }
}

const CHUNK_JSON: u32 = 0x4E4F_534A;
const CHUNK_BIN: u32 = 0x004E_4942;

/// Assemble a glTF-binary container from a JSON root and an optional binary
/// chunk.
pub fn build_glb(json: &serde_json::Value, bin: Option<&[u8]>) -> Vec<u8> {
    let mut json_bytes = serde_json::to_vec(json).unwrap();
    while json_bytes.len() % 4 != 0 {
        json_bytes.push(b' ');
    }

    let bin_padded = bin.map(|bin| {
        let mut padded = bin.to_vec();
        while padded.len() % 4 != 0 {
            padded.push(0);
        }
        padded
    });

    let total = 12
        + 8
        + json_bytes.len()
        + bin_padded.as_ref().map_or(0, |padded| 8 + padded.len());

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(b"glTF");
    out.extend_from_slice(&2u32.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());

    out.extend_from_slice(&(json_bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(&CHUNK_JSON.to_le_bytes());
    out.extend_from_slice(&json_bytes);

    if let Some(padded) = bin_padded {
        out.extend_from_slice(&(padded.len() as u32).to_le_bytes());
        out.extend_from_slice(&CHUNK_BIN.to_le_bytes());
        out.extend_from_slice(&padded);
    }

    out
}

/// A minimal valid model: one scene, one node, two accessors, one material
/// and a binary buffer of `buffer_len` zero bytes.
pub fn simple_glb(buffer_len: usize) -> Vec<u8> {
    let json = serde_json::json!({
        "asset": { "version": "2.0" },
        "buffers": [{ "byteLength": buffer_len }],
        "accessors": [
            { "componentType": 5126, "count": 3, "type": "VEC3" },
            { "componentType": 5126, "count": 3, "type": "VEC2" }
        ],
        "materials": [{ "name": "body" }],
        "nodes": [{}],
        "scenes": [{ "nodes": [0] }],
        "scene": 0
    });
    build_glb(&json, Some(&vec![0u8; buffer_len]))
}

/// A model whose single material carries an embedded base-color texture.
/// With `placeholder` the material name contains the replacement marker.
pub fn textured_glb(placeholder: bool) -> Vec<u8> {
    let png = png_bytes(1, 1, [255, 0, 0, 255]);
    let name = if placeholder {
        "car_placeholder_panel"
    } else {
        "car_body"
    };
    let json = serde_json::json!({
        "asset": { "version": "2.0" },
        "buffers": [{ "byteLength": png.len() }],
        "bufferViews": [{ "buffer": 0, "byteOffset": 0, "byteLength": png.len() }],
        "images": [{ "bufferView": 0, "mimeType": "image/png" }],
        "textures": [{ "source": 0 }],
        "materials": [{
            "name": name,
            "pbrMetallicRoughness": { "baseColorTexture": { "index": 0 } }
        }],
        "nodes": [{}],
        "scenes": [{ "nodes": [0] }],
        "scene": 0
    });
    build_glb(&json, Some(&png))
}

/// Encode a solid-color PNG in memory.
pub fn png_bytes(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba(rgba));
    let mut out = Vec::new();
    img.write_to(
        &mut std::io::Cursor::new(&mut out),
        image::ImageFormat::Png,
    )
    .unwrap();
    out
}
