mod frame;
mod gpu;

pub use frame::{
    CameraParams, DrawItem, FrameScene, LightParams, MainRenderer, MeshKey, NullRenderer,
};
pub use gpu::Renderer;
