use anyhow::{bail, Result};
use glam::{EulerRot, Mat4, Vec2, Vec3, Vec4};
use log::{debug, error, info, warn};

use crate::assets::{AssetEvent, AssetLibrary, AssetQueue, AssetRequest};
use crate::camera::{pixels_to_ndc, PerspectiveCamera};
use crate::error::RenderError;
use crate::landmark::{Landmark, LandmarkRegistry, Marker};
use crate::layout::{push_out_factor, ControlButton, Viewport};
use crate::orbit::OrbitControls;
use crate::overlay::Overlay;
use crate::picking::{marker_spheres, pick_nearest, PickSphere};
use crate::popup::{PopupController, PopupView};
use crate::proximity::landmark_in_range;
use crate::render::{CameraParams, DrawItem, FrameScene, LightParams, MainRenderer, MeshKey};
use crate::scene::{InfoMode, ViewerScene};

const CLEAR_COLOR: Vec4 = Vec4::new(0.0, 0.0, 0.0, 1.0);

/// Visibility of one landmark as of the current camera state.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkStatus {
    pub caption: String,
    pub visible: bool,
    /// Label anchor in pixels, offset included.
    pub screen: Vec2,
    pub distance: f32,
}

/// Application context shared by the platform front ends.
///
/// Owns everything the frame loop and input handlers touch. Platform code
/// owns the `GlobeApp`, forwards input and resize events to it and calls
/// [`GlobeApp::tick`] once per display refresh.
pub struct GlobeApp<O: Overlay, R: MainRenderer> {
    scene: ViewerScene,
    overlay: O,
    renderer: R,
    camera: PerspectiveCamera,
    controls: OrbitControls,
    registry: LandmarkRegistry,
    popups: PopupController,
    viewport: Viewport,
    library: AssetLibrary,
    queue: AssetQueue,
    globe_texture: Option<String>,
    buttons: Vec<ControlButton>,
    frames: u64,
}

impl<O: Overlay, R: MainRenderer> GlobeApp<O, R> {
    pub fn new(scene: ViewerScene, overlay: O, renderer: R) -> Self {
        let (width, height) = renderer.size();
        let viewport = Viewport::new(width, height);
        let mut camera = scene.camera;
        camera.set_viewport(viewport.width, viewport.height);
        let controls = OrbitControls::new(scene.orbit);
        let registry = LandmarkRegistry::with_marker(Marker {
            color: scene.display.hidden_color,
            scale: 1.0,
        });
        let library = AssetLibrary::with_spheres(scene.globe.radius, scene.globe.segments);
        info!(
            "globe viewer ready: {} landmark(s) configured, {:?} mode, viewport {}x{}",
            scene.landmarks.len(),
            scene.display.mode,
            viewport.width,
            viewport.height
        );
        Self {
            scene,
            overlay,
            renderer,
            camera,
            controls,
            registry,
            popups: PopupController::new(),
            viewport,
            library,
            queue: AssetQueue::new(),
            globe_texture: None,
            buttons: Vec::new(),
            frames: 0,
        }
    }

    /// Assets the platform has to load: the globe texture, then one model per landmark.
    pub fn asset_requests(&self) -> Vec<AssetRequest> {
        let mut requests = vec![AssetRequest::GlobeTexture {
            path: self.scene.globe.texture.clone(),
        }];
        requests.extend(
            self.scene
                .landmarks
                .iter()
                .enumerate()
                .map(|(landmark, registration)| AssetRequest::LandmarkModel {
                    landmark,
                    path: registration.model_path.clone(),
                }),
        );
        requests
    }

    /// Queue that loaders push completions into.
    pub fn asset_queue(&self) -> AssetQueue {
        self.queue.clone()
    }

    /// Applies every completion delivered since the previous call.
    ///
    /// Runs on the UI thread between ticks, which is what makes registering
    /// from a completion safe without further locking.
    pub fn pump_assets(&mut self) {
        for event in self.queue.drain() {
            match event {
                AssetEvent::TextureLoaded { path, texture } => {
                    debug!("globe texture {path} is {}x{}", texture.width, texture.height);
                    self.library.insert_texture(path.clone(), texture);
                    self.globe_texture = Some(path);
                }
                AssetEvent::ModelLoaded {
                    landmark,
                    path,
                    model,
                } => {
                    let Some(registration) = self.scene.landmarks.get(landmark).cloned() else {
                        warn!("model {path} loaded for unknown landmark #{landmark}");
                        continue;
                    };
                    self.library.insert_model(path, model);
                    if let Err(err) = self.registry.register(&mut self.overlay, registration) {
                        error!("landmark #{landmark} rejected: {err}");
                    }
                }
                AssetEvent::Failed { request, error } => {
                    error!("failed to load {}: {error}", request.path());
                }
            }
        }
    }

    /// Applies the initial centered-plus-offset placement of the control buttons.
    pub fn init_buttons(&mut self, buttons: Vec<ControlButton>) {
        for button in &buttons {
            self.overlay.place_button(&button.id, button.offset);
        }
        debug!("placed {} control button(s)", buttons.len());
        self.buttons = buttons;
    }

    /// Runs one frame: assets, damping, render, landmark pass, buttons.
    pub fn tick(&mut self) -> Result<()> {
        self.pump_assets();
        self.controls.update(&mut self.camera);

        let frame = self.frame_scene();
        match self.renderer.draw(&frame, &self.library) {
            Ok(()) => {}
            Err(RenderError::SurfaceLost) => {
                let (width, height) = self.viewport.size();
                self.renderer.resize(width, height);
            }
            Err(RenderError::Timeout) => warn!("surface timeout, skipping frame"),
            Err(RenderError::OutOfMemory) => bail!(RenderError::OutOfMemory),
            Err(err) => error!("{err}"),
        }

        match self.scene.display.mode {
            InfoMode::Labels => self.update_labels(),
            InfoMode::Proximity => self.update_info_panel(),
        }
        if let Some(push) = self.scene.display.button_push {
            self.push_out_buttons(push);
        }
        self.frames += 1;
        Ok(())
    }

    fn update_labels(&mut self) {
        let frustum = self.camera.frustum();
        let viewport = self.viewport.size();
        let test = self.scene.display.visibility;
        let display = &self.scene.display;
        for index in 0..self.registry.len() {
            let Some(landmark) = self.registry.get(index) else {
                break;
            };
            let classification = test.classify(&self.camera, &frustum, landmark.position(), viewport);
            let label = landmark.label_element();
            let anchor = classification.screen + landmark.label().offset;
            let scale = landmark.marker.scale;

            let color = if classification.visible {
                display.visible_color
            } else {
                display.hidden_color
            };
            self.registry.update_appearance(index, color, scale);
            self.overlay.place_label(label, anchor);
            self.overlay.set_label_visible(label, classification.visible);
        }
    }

    fn update_info_panel(&mut self) {
        let display = &self.scene.display;
        match landmark_in_range(&self.registry, self.camera.position, display.proximity) {
            Some(landmark) => self.overlay.show_info(landmark.info(), landmark.panel()),
            None => self.overlay.show_info(&display.welcome, None),
        }
    }

    fn push_out_buttons(&mut self, push: f32) {
        let fraction = self.controls.zoom_fraction(self.camera.distance_to_target());
        let factor = push_out_factor(push, fraction);
        for button in &self.buttons {
            self.overlay.place_button(&button.id, button.offset * factor);
        }
    }

    /// Draw list of the main scene for the current state.
    pub fn frame_scene(&self) -> FrameScene {
        let mut items = Vec::new();
        if let Some(texture) = &self.globe_texture {
            items.push(DrawItem {
                mesh: MeshKey::Globe,
                transform: Mat4::IDENTITY,
                color: Vec4::ONE,
                texture: Some(texture.clone()),
                lit: false,
            });
        }
        let marker_radius = self.scene.display.marker_radius;
        for landmark in self.registry.iter() {
            items.push(DrawItem {
                mesh: MeshKey::Marker,
                transform: Mat4::from_scale_rotation_translation(
                    Vec3::splat(marker_radius * landmark.marker.scale),
                    Default::default(),
                    landmark.position(),
                ),
                color: landmark.marker.color.extend(1.0),
                texture: None,
                lit: false,
            });
            if self.scene.display.models_on_globe {
                if let Some(model) = self.library.model(landmark.model_path()) {
                    let transform = model_transform(landmark);
                    items.extend(model.parts.iter().enumerate().map(|(part, data)| DrawItem {
                        mesh: MeshKey::ModelPart {
                            path: landmark.model_path().to_string(),
                            part,
                        },
                        transform,
                        color: data.color,
                        texture: None,
                        lit: true,
                    }));
                }
            }
        }
        FrameScene {
            camera: CameraParams::from_camera(&self.camera),
            light: LightParams::ambient_only(),
            clear_color: CLEAR_COLOR,
            items,
        }
    }

    /// Pointer drag while the primary button is held, in pixels.
    pub fn pointer_drag(&mut self, delta: Vec2) {
        self.controls.rotate_by_pixels(delta, self.viewport.height);
    }

    pub fn wheel(&mut self, delta_y: f32) {
        self.controls.zoom_by_wheel(delta_y);
    }

    /// Handles a click at `pixels` (origin top-left).
    ///
    /// Opens a popup for the nearest landmark under the pointer and returns
    /// the state its render loop should drive. A miss is a no-op.
    pub fn click(&mut self, pixels: Vec2) -> Option<PopupView> {
        let ndc = pixels_to_ndc(pixels, self.viewport.size());
        let ray = self.camera.ray_through(ndc);
        let hit = pick_nearest(&ray, &self.pick_spheres())?;
        let landmark = self.registry.get(hit.landmark)?;
        debug!(
            "click at ({:.0}, {:.0}) hit {:?} at distance {:.2}",
            pixels.x,
            pixels.y,
            landmark.label().caption,
            hit.distance
        );
        Some(self.popups.open(&mut self.overlay, landmark, self.scene.popup))
    }

    fn pick_spheres(&self) -> Vec<PickSphere> {
        let mut spheres = marker_spheres(&self.registry, self.scene.display.marker_radius);
        if self.scene.display.models_on_globe {
            for (index, landmark) in self.registry.iter().enumerate() {
                let Some(model) = self.library.model(landmark.model_path()) else {
                    continue;
                };
                let scale = landmark.placement().scale.abs().max_element();
                spheres.push(PickSphere {
                    landmark: index,
                    center: model_transform(landmark).transform_point3(model.bounds_center),
                    radius: model.bounds_radius * scale,
                });
            }
        }
        spheres
    }

    /// Closes the popup; returns `false` when none was open.
    pub fn close_popup(&mut self) -> bool {
        self.popups.close(&mut self.overlay)
    }

    /// Closes the popup session `id` after the platform failed to show it.
    ///
    /// Does nothing when another session has been opened in the meantime.
    pub fn abandon_popup(&mut self, id: u64) -> bool {
        if self.popups.current().map(|popup| popup.id) != Some(id) {
            return false;
        }
        warn!("popup {id} could not be shown, closing it");
        self.popups.close(&mut self.overlay)
    }

    /// Activates a control button. Unknown ids are ignored.
    pub fn press_button(&mut self, id: &str) -> bool {
        if !self.buttons.iter().any(|button| button.id == id) {
            warn!("no control button named {id:?}");
            return false;
        }
        self.overlay.alert(&self.scene.display.alert);
        true
    }

    /// Applies a viewport size change to the camera and the render surface.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.viewport = Viewport::new(width, height);
        self.camera.set_viewport(self.viewport.width, self.viewport.height);
        self.renderer.resize(self.viewport.width, self.viewport.height);
        info!("viewport resized to {}x{}", self.viewport.width, self.viewport.height);
    }

    /// Visibility and label anchor of every registered landmark.
    pub fn landmark_status(&self) -> Vec<LandmarkStatus> {
        let frustum = self.camera.frustum();
        let test = self.scene.display.visibility;
        self.registry
            .iter()
            .map(|landmark| {
                let classification =
                    test.classify(&self.camera, &frustum, landmark.position(), self.viewport.size());
                LandmarkStatus {
                    caption: landmark.label().caption.clone(),
                    visible: classification.visible,
                    screen: classification.screen + landmark.label().offset,
                    distance: self.camera.position.distance(landmark.position()),
                }
            })
            .collect()
    }

    pub fn scene(&self) -> &ViewerScene {
        &self.scene
    }

    pub fn overlay(&self) -> &O {
        &self.overlay
    }

    pub fn overlay_mut(&mut self) -> &mut O {
        &mut self.overlay
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn camera(&self) -> &PerspectiveCamera {
        &self.camera
    }

    pub fn registry(&self) -> &LandmarkRegistry {
        &self.registry
    }

    pub fn popups(&self) -> &PopupController {
        &self.popups
    }

    pub fn library(&self) -> &AssetLibrary {
        &self.library
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

/// World transform of a landmark model placed on the globe.
fn model_transform(landmark: &Landmark) -> Mat4 {
    let placement = landmark.placement();
    let rotation = placement.rotation;
    Mat4::from_translation(landmark.position())
        * Mat4::from_euler(
            EulerRot::XYZ,
            rotation.x.to_radians(),
            rotation.y.to_radians(),
            rotation.z.to_radians(),
        )
        * Mat4::from_scale(placement.scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{decode_asset, TextureData};
    use crate::landmark::tests::registration;
    use crate::mesh::tests::triangle_glb;
    use crate::overlay::HeadlessOverlay;
    use crate::render::NullRenderer;

    type TestApp = GlobeApp<HeadlessOverlay, NullRenderer>;

    fn app_with(scene: ViewerScene) -> TestApp {
        let mut app = GlobeApp::new(scene, HeadlessOverlay::new(), NullRenderer::new(1280, 720));
        let queue = app.asset_queue();
        for request in app.asset_requests() {
            if let AssetRequest::LandmarkModel { .. } = request {
                queue.push(decode_asset(request, &triangle_glb()));
            }
        }
        app.tick().unwrap();
        app
    }

    fn scene(landmarks: &[(&str, Vec3)]) -> ViewerScene {
        let mut scene = ViewerScene::default();
        scene.landmarks = landmarks
            .iter()
            .map(|(caption, position)| registration(caption, *position))
            .collect();
        scene
    }

    fn front_and_back() -> ViewerScene {
        scene(&[
            ("Front", Vec3::new(0.0, 0.0, 5.1)),
            ("Back", Vec3::new(0.0, 0.0, -5.1)),
        ])
    }

    #[test]
    fn label_display_follows_visibility_each_tick() {
        let app = app_with(front_and_back());
        assert_eq!(app.registry().len(), 2);
        let status = app.landmark_status();
        for (landmark, status) in app.registry().iter().zip(&status) {
            let label = app.overlay().label(landmark.label_element()).unwrap();
            assert_eq!(label.visible, status.visible);
            assert_eq!(label.position, status.screen);
        }
        assert!(status[0].visible);
        assert!(!status[1].visible);

        let display = &app.scene().display;
        assert_eq!(app.registry().get(0).unwrap().marker.color, display.visible_color);
        assert_eq!(app.registry().get(1).unwrap().marker.color, display.hidden_color);
    }

    #[test]
    fn welcome_text_when_nothing_is_close() {
        let mut scene = scene(&[("House", Vec3::new(5.0, 1.0, 0.0))]);
        scene.display.mode = InfoMode::Proximity;
        let app = app_with(scene);
        assert!((app.camera().position - Vec3::new(0.0, 0.0, 12.0)).length() < 1e-4);
        assert_eq!(app.overlay().info_text(), Some(app.scene().display.welcome.as_str()));
    }

    #[test]
    fn nearby_landmark_fills_the_info_panel() {
        let mut scene = front_and_back();
        scene.display.mode = InfoMode::Proximity;
        let app = app_with(scene);
        assert_eq!(app.overlay().info_text(), Some("Front description"));
    }

    #[test]
    fn clicking_a_marker_opens_its_popup() {
        let mut app = app_with(front_and_back());
        let view = app.click(Vec2::new(640.0, 360.0)).unwrap();
        assert_eq!(view.caption, "Front");
        assert_eq!(view.model_path, "model/front.glb");
        assert_eq!(app.overlay().popup_text(), Some("Front description"));
        assert!(app.popups().is_open());
        assert!(app.library().model(&view.model_path).is_some());

        assert!(app.click(Vec2::new(5.0, 5.0)).is_none());
        assert!(app.popups().is_open());
    }

    #[test]
    fn close_popup_twice_is_harmless() {
        let mut app = app_with(front_and_back());
        let view = app.click(Vec2::new(640.0, 360.0)).unwrap();
        assert!(app.close_popup());
        assert!(view.is_cancelled());
        assert!(app.overlay().popup_text().is_none());
        let before = app.overlay().clone();
        assert!(!app.close_popup());
        assert_eq!(app.overlay().labels(), before.labels());
        assert_eq!(app.overlay().popup_text(), before.popup_text());
    }

    #[test]
    fn popup_that_cannot_be_shown_is_closed() {
        let mut app = app_with(front_and_back());
        let view = app.click(Vec2::new(640.0, 360.0)).unwrap();
        assert!(app.abandon_popup(view.id));
        assert!(!app.popups().is_open());
        assert!(view.is_cancelled());
        assert!(app.overlay().popup_text().is_none());
    }

    #[test]
    fn abandoning_a_replaced_popup_keeps_the_current_one() {
        let mut app = app_with(front_and_back());
        let stale = app.click(Vec2::new(640.0, 360.0)).unwrap();
        let current = app.click(Vec2::new(640.0, 360.0)).unwrap();
        assert!(!app.abandon_popup(stale.id));
        assert!(app.popups().is_open());
        assert!(!current.is_cancelled());
        assert_eq!(app.overlay().popup_text(), Some("Front description"));
    }

    #[test]
    fn resize_updates_aspect_and_surface() {
        let mut app = GlobeApp::new(
            ViewerScene::default(),
            HeadlessOverlay::new(),
            NullRenderer::new(800, 600),
        );
        assert!((app.camera().aspect - 800.0 / 600.0).abs() < 1e-6);
        app.resize(1920, 1080);
        assert!((app.camera().aspect - 1920.0 / 1080.0).abs() < 1e-6);
        assert_eq!(app.renderer().size(), (1920, 1080));
        assert_eq!(app.viewport().size(), (1920, 1080));
    }

    #[test]
    fn failed_loads_leave_landmarks_absent() {
        let mut app = GlobeApp::new(
            front_and_back(),
            HeadlessOverlay::new(),
            NullRenderer::new(1280, 720),
        );
        let queue = app.asset_queue();
        let mut requests = app.asset_requests().into_iter().skip(1);
        if let Some(request) = requests.next() {
            queue.push(decode_asset(request, b"not a model"));
        }
        app.tick().unwrap();
        assert!(app.registry().is_empty());
        assert!(app.overlay().labels().is_empty());
        assert_eq!(app.renderer().last_item_count(), 0);
    }

    #[test]
    fn globe_is_drawn_once_its_texture_arrives() {
        let mut app = app_with(front_and_back());
        assert_eq!(app.renderer().last_item_count(), 2);
        app.asset_queue().push(AssetEvent::TextureLoaded {
            path: "images/earth.jpg".into(),
            texture: TextureData::white(),
        });
        app.tick().unwrap();
        assert_eq!(app.renderer().last_item_count(), 3);
        assert_eq!(app.frames(), 2);
    }

    #[test]
    fn placed_models_are_drawn_and_pickable() {
        let mut scene = scene(&[("Hut", Vec3::new(0.0, 0.0, 5.0))]);
        scene.display.models_on_globe = true;
        let app = app_with(scene);
        let frame = app.frame_scene();
        assert_eq!(frame.items.len(), 2);
        assert!(frame.items[1].lit);
        assert_eq!(app.pick_spheres().len(), 2);
    }

    #[test]
    fn buttons_push_out_and_alert() {
        let mut scene = ViewerScene::default();
        scene.display.button_push = Some(1.5);
        let mut app = GlobeApp::new(scene, HeadlessOverlay::new(), NullRenderer::new(1280, 720));
        app.init_buttons(vec![ControlButton {
            id: "button1".into(),
            offset: Vec2::new(-300.0, -200.0),
        }]);
        assert_eq!(app.overlay().button_offset("button1"), Some(Vec2::new(-300.0, -200.0)));

        // distance 12 sits halfway between the (9, 15) clamps
        app.tick().unwrap();
        let offset = app.overlay().button_offset("button1").unwrap();
        assert!((offset - Vec2::new(-375.0, -250.0)).length() < 1e-3);

        assert!(app.press_button("button1"));
        assert!(!app.press_button("button9"));
        assert_eq!(app.overlay().alerts(), ["Coming soon".to_string()]);
    }
}
