//! Interactive 3D globe with clickable landmarks.
//!
//! The crate renders a textured globe, places a colored marker and a
//! screen-space label for every landmark and opens a popup with a rotating
//! model when a marker is clicked. Everything except the GPU renderer and the
//! platform glue is plain data and math, so the viewer logic runs headless
//! against [`HeadlessOverlay`] and [`NullRenderer`] in tests and in the
//! `--summary-only` mode of the binary.

pub mod app;
pub mod assets;
pub mod camera;
pub mod error;
pub mod input;
pub mod landmark;
pub mod layout;
pub mod mesh;
pub mod orbit;
pub mod overlay;
pub mod picking;
pub mod popup;
pub mod proximity;
pub mod render;
pub mod scene;
pub mod visibility;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use app::{GlobeApp, LandmarkStatus};
#[cfg(not(target_arch = "wasm32"))]
pub use assets::{load_file, spawn_file_loads};
pub use assets::{AssetEvent, AssetLibrary, AssetQueue, AssetRequest, TextureData};
pub use camera::{Frustum, PerspectiveCamera, Ray};
pub use error::{AssetError, LayoutError, RegistryError, RenderError};
pub use input::{Command, PointerTracker};
pub use landmark::{Landmark, LandmarkLabel, LandmarkRegistry, Marker, Registration};
pub use layout::{ControlButton, Viewport};
pub use orbit::{OrbitControls, OrbitSettings};
pub use overlay::{HeadlessOverlay, LabelId, Overlay, PanelPlacement};
pub use popup::{CancellationToken, PopupController, PopupLoop, PopupSettings, PopupView};
pub use render::{FrameScene, MainRenderer, NullRenderer, Renderer};
pub use scene::{InfoMode, ViewerScene};
pub use visibility::VisibilityTest;
