use thiserror::Error;

/// Cosine similarity and euclidean distance for appearance vectors
pub mod distance;

/// Point-cloud localization: background model, differencing, clustering and region search
pub mod locate;

/// Frequently used types
pub mod prelude;

/// Aggregated per-frame object observations built from detections
pub mod robot;

/// Report sinks for the external communication component
pub mod sink;

/// Frame-level orchestration of the localization engine and the tracker
pub mod station;

/// Synthetic scenes for tests, benchmarks and demos
pub mod synthetic;

/// Single object track
pub mod track;

/// Multi-object tracker
pub mod tracker;

/// Coordinate transforms, dense images, Kalman filter and assignment solvers
pub mod utils;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Errors {
    #[error("Camera intrinsic matrix is not invertible.")]
    NonInvertibleIntrinsic,
    #[error("Extrinsic transform `{0}` is not invertible.")]
    NonInvertibleTransform(&'static str),
    #[error("Zoom factor must be within (0, 1], got {0}.")]
    InvalidZoomFactor(f32),
    #[error("Image dimensions must be positive after zooming, got {0}x{1}.")]
    InvalidImageSize(usize, usize),
    #[error("Depth difference band [{0}, {1}] is empty.")]
    InvalidDepthBand(f32, f32),
    #[error("Cluster size bounds [{0}, {1}] are empty.")]
    InvalidClusterSize(usize, usize),
    #[error("Option `{0}` has an invalid value: {1}.")]
    InvalidOption(&'static str, String),
    #[error("The report receiver is disconnected.")]
    SinkDisconnected,
}

pub(crate) const EPS: f32 = 0.00001;
