use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::AssetError;
use crate::mesh::{uv_sphere, MeshData, ModelData};
use crate::render::MeshKey;

/// External asset the bootstrap asks the platform to load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetRequest {
    GlobeTexture { path: String },
    /// Model of the landmark declared at `landmark` in the scene document.
    LandmarkModel { landmark: usize, path: String },
}

impl AssetRequest {
    pub fn path(&self) -> &str {
        match self {
            Self::GlobeTexture { path } | Self::LandmarkModel { path, .. } => path,
        }
    }
}

/// Completion of an [`AssetRequest`], delivered to the UI thread.
#[derive(Debug)]
pub enum AssetEvent {
    TextureLoaded {
        path: String,
        texture: TextureData,
    },
    ModelLoaded {
        landmark: usize,
        path: String,
        model: ModelData,
    },
    Failed {
        request: AssetRequest,
        error: AssetError,
    },
}

/// Decoded RGBA8 image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl TextureData {
    pub fn decode(path: &str, bytes: &[u8]) -> Result<Self, AssetError> {
        let image = image::load_from_memory(bytes).map_err(|source| AssetError::Texture {
            path: path.to_string(),
            source,
        })?;
        let rgba = image.to_rgba8();
        Ok(Self {
            width: rgba.width(),
            height: rgba.height(),
            rgba: rgba.into_raw(),
        })
    }

    /// Single white texel bound to untextured draws.
    pub fn white() -> Self {
        Self {
            width: 1,
            height: 1,
            rgba: vec![255; 4],
        }
    }
}

/// Turns fetched bytes into the completion event for `request`.
pub fn decode_asset(request: AssetRequest, bytes: &[u8]) -> AssetEvent {
    let path = request.path().to_string();
    let decoded = match &request {
        AssetRequest::GlobeTexture { .. } => TextureData::decode(&path, bytes)
            .map(|texture| AssetEvent::TextureLoaded {
                path: path.clone(),
                texture,
            }),
        AssetRequest::LandmarkModel { landmark, .. } => ModelData::from_glb(&path, bytes)
            .map(|model| AssetEvent::ModelLoaded {
                landmark: *landmark,
                path: path.clone(),
                model,
            }),
    };
    decoded.unwrap_or_else(|error| AssetEvent::Failed { request, error })
}

/// Completion queue filled by loaders and drained by the frame loop.
#[derive(Debug, Clone, Default)]
pub struct AssetQueue {
    pending: Arc<Mutex<VecDeque<AssetEvent>>>,
}

impl AssetQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: AssetEvent) {
        self.pending.lock().push_back(event);
    }

    /// Takes every completion delivered so far, oldest first.
    pub fn drain(&self) -> Vec<AssetEvent> {
        self.pending.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

/// CPU-side geometry and images referenced by draw items.
#[derive(Debug, Default)]
pub struct AssetLibrary {
    meshes: HashMap<MeshKey, Arc<MeshData>>,
    textures: HashMap<String, Arc<TextureData>>,
    models: HashMap<String, Arc<ModelData>>,
}

impl AssetLibrary {
    /// Library holding the globe and marker spheres.
    pub fn with_spheres(globe_radius: f32, segments: u32) -> Self {
        let mut library = Self::default();
        library.meshes.insert(
            MeshKey::Globe,
            Arc::new(uv_sphere(globe_radius, segments, segments)),
        );
        library
            .meshes
            .insert(MeshKey::Marker, Arc::new(uv_sphere(1.0, 16, 16)));
        library
    }

    pub fn mesh(&self, key: &MeshKey) -> Option<&MeshData> {
        match key {
            MeshKey::ModelPart { path, part } => self
                .models
                .get(path)
                .and_then(|model| model.parts.get(*part))
                .map(|part| &part.mesh),
            other => self.meshes.get(other).map(|mesh| mesh.as_ref()),
        }
    }

    pub fn texture(&self, key: &str) -> Option<&TextureData> {
        self.textures.get(key).map(|texture| texture.as_ref())
    }

    pub fn model(&self, path: &str) -> Option<&Arc<ModelData>> {
        self.models.get(path)
    }

    pub fn insert_texture(&mut self, key: impl Into<String>, texture: TextureData) {
        self.textures.insert(key.into(), Arc::new(texture));
    }

    pub fn insert_model(&mut self, path: impl Into<String>, model: ModelData) -> Arc<ModelData> {
        let model = Arc::new(model);
        self.models.insert(path.into(), Arc::clone(&model));
        model
    }

    /// Library holding only `model`, for a popup's independent renderer.
    pub fn for_model(path: &str, model: Arc<ModelData>) -> Self {
        let mut library = Self::default();
        library.models.insert(path.to_string(), model);
        library
    }
}

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::path::Path;
    use std::thread::{self, JoinHandle};

    use super::{decode_asset, AssetEvent, AssetQueue, AssetRequest};
    use crate::error::AssetError;

    /// Reads and decodes one asset from disk, relative to `base_dir`.
    pub fn load_file(request: AssetRequest, base_dir: &Path) -> AssetEvent {
        let full_path = base_dir.join(request.path());
        match std::fs::read(&full_path) {
            Ok(bytes) => decode_asset(request, &bytes),
            Err(source) => {
                let path = request.path().to_string();
                AssetEvent::Failed {
                    request,
                    error: AssetError::Read { path, source },
                }
            }
        }
    }

    /// Starts one loader thread per request; completions land in `queue`.
    pub fn spawn_file_loads(
        requests: Vec<AssetRequest>,
        base_dir: &Path,
        queue: &AssetQueue,
    ) -> Vec<JoinHandle<()>> {
        requests
            .into_iter()
            .map(|request| {
                let base_dir = base_dir.to_path_buf();
                let queue = queue.clone();
                thread::spawn(move || queue.push(load_file(request, &base_dir)))
            })
            .collect()
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use native::{load_file, spawn_file_loads};
