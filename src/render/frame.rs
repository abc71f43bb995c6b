use glam::{Mat4, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::assets::AssetLibrary;
use crate::camera::PerspectiveCamera;
use crate::error::RenderError;

/// Camera parameters consumed by the renderer's uniform buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct CameraParams {
    pub view_proj: Mat4,
    pub position: Vec3,
}

impl CameraParams {
    pub fn from_camera(camera: &PerspectiveCamera) -> Self {
        Self {
            view_proj: camera.view_proj(),
            position: camera.position,
        }
    }
}

/// Ambient term plus one directional light.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LightParams {
    pub ambient: Vec3,
    /// Direction the light travels, world space.
    pub direction: Vec3,
    pub color: Vec3,
    pub intensity: f32,
}

impl LightParams {
    /// Plain white ambient light, as used for the globe scene.
    pub fn ambient_only() -> Self {
        Self {
            ambient: Vec3::ONE,
            direction: Vec3::NEG_Y,
            color: Vec3::ONE,
            intensity: 0.0,
        }
    }
}

/// Identifies CPU-side geometry held by the [`AssetLibrary`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum MeshKey {
    Globe,
    Marker,
    ModelPart { path: String, part: usize },
}

#[derive(Clone, Debug, PartialEq)]
pub struct DrawItem {
    pub mesh: MeshKey,
    pub transform: Mat4,
    pub color: Vec4,
    /// Library key of the texture sampled by this item.
    pub texture: Option<String>,
    /// Unlit items output their base color unchanged.
    pub lit: bool,
}

/// Everything a renderer needs to draw one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameScene {
    pub camera: CameraParams,
    pub light: LightParams,
    pub clear_color: Vec4,
    pub items: Vec<DrawItem>,
}

/// Surface the frame loop renders into.
pub trait MainRenderer {
    fn draw(&mut self, scene: &FrameScene, library: &AssetLibrary) -> Result<(), RenderError>;
    /// Resizes the render surface to exactly `width` x `height` pixels.
    fn resize(&mut self, width: u32, height: u32);
    fn size(&self) -> (u32, u32);
}

/// Renderer that only counts frames; used for headless runs.
#[derive(Debug, Clone)]
pub struct NullRenderer {
    size: (u32, u32),
    frames: u64,
    last_item_count: usize,
}

impl NullRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width.max(1), height.max(1)),
            frames: 0,
            last_item_count: 0,
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn last_item_count(&self) -> usize {
        self.last_item_count
    }
}

impl MainRenderer for NullRenderer {
    fn draw(&mut self, scene: &FrameScene, _library: &AssetLibrary) -> Result<(), RenderError> {
        self.frames += 1;
        self.last_item_count = scene.items.len();
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.size = (width, height);
    }

    fn size(&self) -> (u32, u32) {
        self.size
    }
}
