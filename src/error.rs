use thiserror::Error;

/// Failure while fetching or decoding an external asset.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("unable to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("unable to fetch {path}: {message}")]
    Fetch { path: String, message: String },
    #[error("{path} is not a valid glTF binary: {source}")]
    Model {
        path: String,
        #[source]
        source: gltf::Error,
    },
    #[error("{path} does not contain any triangle meshes")]
    EmptyModel { path: String },
    #[error("{path} is not a decodable image: {source}")]
    Texture {
        path: String,
        #[source]
        source: image::ImageError,
    },
}

impl AssetError {
    pub fn path(&self) -> &str {
        match self {
            Self::Read { path, .. }
            | Self::Fetch { path, .. }
            | Self::Model { path, .. }
            | Self::EmptyModel { path }
            | Self::Texture { path, .. } => path,
        }
    }
}

/// Rejected landmark registration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    #[error("landmark position must be finite")]
    NonFinitePosition,
    #[error("landmark caption must not be empty")]
    EmptyCaption,
    #[error("landmark info text must not be empty")]
    EmptyInfo,
}

/// Malformed control button declaration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayoutError {
    #[error("button {id} is missing its {axis} offset")]
    MissingOffset { id: String, axis: &'static str },
    #[error("button {id} has a malformed {axis} offset: {value:?}")]
    MalformedOffset {
        id: String,
        axis: &'static str,
        value: String,
    },
}

/// Failure reported by a renderer while presenting a frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("render surface was lost or is outdated")]
    SurfaceLost,
    #[error("GPU is out of memory")]
    OutOfMemory,
    #[error("timed out acquiring the next surface texture")]
    Timeout,
    #[error("renderer failure: {0}")]
    Other(String),
}
