//! Cam-Labeler: camera sessions with throttled on-device image labeling
//!
//! Use-cases (preview, image analysis, image capture) are declared through
//! builders, composed into a session and bound to a lifecycle owner. A V4L2
//! binder streams frames to them while the owner is started; the analysis
//! use-case runs its analyzer, typically a [`LabelingAnalyzer`], on a
//! dedicated thread.

pub mod aspect_ratio;
pub mod color_labeler;
pub mod config;
pub mod device;
pub mod executor;
pub mod labeling;
pub mod lifecycle;
pub mod provider;
pub mod session;
pub mod traits;
pub mod use_case;

#[cfg(test)]
pub mod mock;

pub use aspect_ratio::AspectRatio;
pub use color_labeler::ColorLabeler;
pub use config::{AppConfig, ConfigError};
pub use device::V4L2Device;
pub use executor::{AnalysisExecutor, Analyzer};
pub use labeling::{ImageLabeler, Label, LabelError, LabelOutcome, LabelSummary, LabelingAnalyzer};
pub use lifecycle::{LifecycleOwner, LifecycleState};
pub use provider::{DeviceProvider, V4l2Provider};
pub use session::{camera_session, SessionBuilder, SessionDescriptor};
pub use traits::{
    CameraBinder, CameraDevice, CameraError, CaptureStream, DeviceCapabilities, Format, FourCC,
    Frame, FrameMetadata, LensFacing, Rotation,
};
pub use use_case::{
    ImageAnalysis, ImageAnalysisBuilder, ImageCapture, ImageCaptureBuilder, Preview,
    PreviewBuilder, PreviewOutput, PreviewOutputListener, UseCase, UseCaseKind,
};
