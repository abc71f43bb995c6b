use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use glam::{Mat4, Vec3, Vec4};
use log::info;
use serde::{Deserialize, Serialize};

use crate::camera::PerspectiveCamera;
use crate::landmark::Landmark;
use crate::mesh::ModelData;
use crate::overlay::Overlay;
use crate::render::{CameraParams, DrawItem, FrameScene, LightParams, MeshKey};

/// Shared flag telling a popup render loop to stop re-arming itself.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Look of the popup's secondary render.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PopupSettings {
    pub width: u32,
    pub height: u32,
    /// Rotation added to the model every tick, in radians.
    pub spin: f32,
    pub camera_distance: f32,
}

impl Default for PopupSettings {
    fn default() -> Self {
        Self {
            width: 300,
            height: 300,
            spin: 0.01,
            camera_distance: 3.0,
        }
    }
}

/// Bookkeeping for the open popup, kept by the [`PopupController`].
#[derive(Debug, Clone)]
pub struct PopupHandle {
    pub id: u64,
    pub caption: String,
    pub info: String,
    pub model_path: String,
    token: CancellationToken,
}

/// State owned by a popup's own render loop: its scene, camera and lighting.
#[derive(Debug, Clone)]
pub struct PopupView {
    pub id: u64,
    pub caption: String,
    pub model_path: String,
    pub rotation: f32,
    settings: PopupSettings,
    camera: PerspectiveCamera,
    light: LightParams,
    token: CancellationToken,
}

impl PopupView {
    /// Advances the model rotation by one tick.
    ///
    /// Returns `false` once the session was cancelled; the caller must stop
    /// scheduling further ticks.
    pub fn tick(&mut self) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        self.rotation += self.settings.spin;
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn surface_size(&self) -> (u32, u32) {
        (self.settings.width, self.settings.height)
    }

    /// Builds the popup scene with `model` centered and scaled to unit size.
    pub fn frame_scene(&self, model: Option<&ModelData>) -> FrameScene {
        let mut items = Vec::new();
        if let Some(model) = model {
            let radius = if model.bounds_radius > f32::EPSILON {
                model.bounds_radius
            } else {
                1.0
            };
            let transform = Mat4::from_rotation_y(self.rotation)
                * Mat4::from_scale(Vec3::splat(1.0 / radius))
                * Mat4::from_translation(-model.bounds_center);
            for (index, part) in model.parts.iter().enumerate() {
                items.push(DrawItem {
                    mesh: MeshKey::ModelPart {
                        path: self.model_path.clone(),
                        part: index,
                    },
                    transform,
                    color: part.color,
                    texture: None,
                    lit: true,
                });
            }
        }
        FrameScene {
            camera: CameraParams::from_camera(&self.camera),
            light: self.light,
            clear_color: Vec4::new(0.08, 0.08, 0.1, 1.0),
            items,
        }
    }
}

/// Open/closed state machine for the landmark popup. At most one session is open.
#[derive(Debug, Default)]
pub struct PopupController {
    current: Option<PopupHandle>,
    next_id: u64,
}

impl PopupController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.current.is_some()
    }

    pub fn current(&self) -> Option<&PopupHandle> {
        self.current.as_ref()
    }

    /// Opens a popup for `landmark`, tearing down any session that is still open.
    pub fn open(
        &mut self,
        overlay: &mut dyn Overlay,
        landmark: &Landmark,
        settings: PopupSettings,
    ) -> PopupView {
        self.teardown(overlay);

        self.next_id += 1;
        let token = CancellationToken::new();
        let caption = landmark.label().caption.clone();
        overlay.open_popup(landmark.info());
        info!("opened popup {} for {caption:?}", self.next_id);

        self.current = Some(PopupHandle {
            id: self.next_id,
            caption: caption.clone(),
            info: landmark.info().to_string(),
            model_path: landmark.model_path().to_string(),
            token: token.clone(),
        });

        let mut camera = PerspectiveCamera {
            position: Vec3::new(0.0, 0.0, settings.camera_distance),
            ..PerspectiveCamera::default()
        };
        camera.set_viewport(settings.width, settings.height);

        PopupView {
            id: self.next_id,
            caption,
            model_path: landmark.model_path().to_string(),
            rotation: 0.0,
            settings,
            camera,
            light: LightParams {
                ambient: Vec3::splat(0.25),
                direction: Vec3::new(-1.0, -1.0, -1.0).normalize(),
                color: Vec3::ONE,
                intensity: 1.0,
            },
            token,
        }
    }

    /// Closes the open popup. Returns `false` and leaves the overlay alone
    /// when nothing is open.
    pub fn close(&mut self, overlay: &mut dyn Overlay) -> bool {
        self.teardown(overlay)
    }

    fn teardown(&mut self, overlay: &mut dyn Overlay) -> bool {
        let Some(handle) = self.current.take() else {
            return false;
        };
        handle.token.cancel();
        overlay.clear_popup();
        info!("closed popup {}", handle.id);
        true
    }
}

/// Frame driver of one popup session and the resources its render loop owns.
///
/// `state` (renderer, model library) is dropped on the first step after the
/// session is cancelled, even if the platform keeps the driver itself alive
/// a little longer.
pub struct PopupLoop<S> {
    view: PopupView,
    state: Option<S>,
}

impl<S> PopupLoop<S> {
    pub fn new(view: PopupView, state: S) -> Self {
        Self {
            view,
            state: Some(state),
        }
    }

    pub fn view(&self) -> &PopupView {
        &self.view
    }

    /// Advances the session and hands the live state to `frame`.
    ///
    /// Returns `false` once the session is over; the state is released at
    /// that point and the caller must not schedule another step.
    pub fn step(&mut self, frame: impl FnOnce(&PopupView, &mut S)) -> bool {
        if self.state.is_none() {
            return false;
        }
        if !self.view.tick() {
            self.state = None;
            info!("popup {} render loop finished", self.view.id);
            return false;
        }
        if let Some(state) = self.state.as_mut() {
            frame(&self.view, state);
        }
        true
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_none()
    }
}
