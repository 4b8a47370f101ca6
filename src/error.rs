//! Crate-level error types

use crate::backend::BackendError;
use crate::render_graph::GraphError;
use crate::scene::SceneLoadError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the renderer
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to create the GPU device: {0}")]
    DeviceCreation(String),
    #[error("Failed to create {resource}: {source}")]
    ResourceCreation {
        resource: String,
        #[source]
        source: BackendError,
    },
    #[error("Failed to load scene {}: {source}", path.display())]
    SceneLoad {
        path: PathBuf,
        #[source]
        source: SceneLoadError,
    },
    #[error("Failed to load image {}: {reason}", path.display())]
    ImageLoad { path: PathBuf, reason: String },
    #[error("Failed to present frame: {0}")]
    Presentation(#[source] BackendError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("Window error: {0}")]
    Window(String),
}

pub type RenderResult<T> = Result<T, RenderError>;

impl RenderError {
    /// Wrap a backend failure for the named resource
    pub fn resource(resource: impl Into<String>) -> impl FnOnce(BackendError) -> RenderError {
        let resource = resource.into();
        move |source| RenderError::ResourceCreation { resource, source }
    }
}
