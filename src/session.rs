//! Session builder composing use-cases and binding them to a lifecycle.

use std::fmt;
use std::sync::Arc;

use tracing::info;

use crate::lifecycle::LifecycleOwner;
use crate::traits::{CameraBinder, LensFacing, Result};
use crate::use_case::{
    ImageAnalysis, ImageAnalysisBuilder, ImageCapture, ImageCaptureBuilder, Preview,
    PreviewBuilder, UseCase,
};

type Block<B> = Box<dyn Fn(&mut B)>;

/// The use-cases of one bound session. Any subset may be absent.
#[derive(Debug, Clone, Default)]
pub struct SessionDescriptor {
    preview: Option<Arc<Preview>>,
    image_analysis: Option<Arc<ImageAnalysis>>,
    image_capture: Option<Arc<ImageCapture>>,
}

impl SessionDescriptor {
    /// The preview, if the session has one.
    pub const fn preview(&self) -> Option<&Arc<Preview>> {
        self.preview.as_ref()
    }

    /// The image analysis, if the session has one.
    pub const fn image_analysis(&self) -> Option<&Arc<ImageAnalysis>> {
        self.image_analysis.as_ref()
    }

    /// The image capture, if the session has one.
    pub const fn image_capture(&self) -> Option<&Arc<ImageCapture>> {
        self.image_capture.as_ref()
    }

    /// Present use-cases in binding order: preview, analysis, capture.
    pub fn use_cases(&self) -> Vec<UseCase> {
        let preview = self.preview.iter().cloned().map(UseCase::Preview);
        let analysis = self.image_analysis.iter().cloned().map(UseCase::ImageAnalysis);
        let capture = self.image_capture.iter().cloned().map(UseCase::ImageCapture);
        preview.chain(analysis).chain(capture).collect()
    }

    /// Whether the session has no use-cases at all.
    pub const fn is_empty(&self) -> bool {
        self.preview.is_none() && self.image_analysis.is_none() && self.image_capture.is_none()
    }
}

/// Declares the use-cases of a camera session.
///
/// Configuration closures are kept and run on every [`SessionBuilder::build`],
/// each against a fresh use-case builder facing the session's camera.
///
/// ```no_run
/// use cam_labeler::{AspectRatio, LensFacing, LifecycleOwner, SessionBuilder, V4l2Provider};
///
/// let owner = LifecycleOwner::new();
/// let mut provider = V4l2Provider::v4l2();
/// let session = SessionBuilder::new(owner.clone())
///     .facing(LensFacing::Back)
///     .preview(|preview| {
///         preview.aspect_ratio = AspectRatio::RATIO_16_9;
///         preview.width = 1280;
///         preview.height = 720;
///     })
///     .build(&mut provider)?;
/// owner.start();
/// # Ok::<(), cam_labeler::CameraError>(())
/// ```
pub struct SessionBuilder {
    owner: LifecycleOwner,
    facing: LensFacing,
    preview: Option<Block<PreviewBuilder>>,
    image_analysis: Option<Block<ImageAnalysisBuilder>>,
    image_capture: Option<Block<ImageCaptureBuilder>>,
}

impl SessionBuilder {
    /// Start declaring a session bound to `owner`, facing front.
    #[must_use]
    pub fn new(owner: LifecycleOwner) -> Self {
        Self {
            owner,
            facing: LensFacing::default(),
            preview: None,
            image_analysis: None,
            image_capture: None,
        }
    }

    /// Camera every use-case of the session runs on.
    #[must_use]
    pub const fn facing(mut self, facing: LensFacing) -> Self {
        self.facing = facing;
        self
    }

    /// Add a preview configured by `block`.
    #[must_use]
    pub fn preview<F>(mut self, block: F) -> Self
    where
        F: Fn(&mut PreviewBuilder) + 'static,
    {
        self.preview = Some(Box::new(block));
        self
    }

    /// Add an image analysis configured by `block`.
    #[must_use]
    pub fn image_analysis<F>(mut self, block: F) -> Self
    where
        F: Fn(&mut ImageAnalysisBuilder) + 'static,
    {
        self.image_analysis = Some(Box::new(block));
        self
    }

    /// Add an image capture configured by `block`.
    #[must_use]
    pub fn image_capture<F>(mut self, block: F) -> Self
    where
        F: Fn(&mut ImageCaptureBuilder) + 'static,
    {
        self.image_capture = Some(Box::new(block));
        self
    }

    /// Build the declared use-cases and bind them through `binder`.
    ///
    /// The binder is called exactly once, with the present use-cases in the
    /// order preview, analysis, capture. Its error is returned unchanged.
    pub fn build<B>(&self, binder: &mut B) -> Result<SessionDescriptor>
    where
        B: CameraBinder + ?Sized,
    {
        let preview = self.preview.as_ref().map(|block| {
            let mut builder = PreviewBuilder::new(self.facing);
            block(&mut builder);
            Arc::new(builder.build())
        });

        let image_analysis = self
            .image_analysis
            .as_ref()
            .map(|block| {
                let mut builder = ImageAnalysisBuilder::new(self.facing);
                block(&mut builder);
                builder.build().map(Arc::new)
            })
            .transpose()?;

        let image_capture = self.image_capture.as_ref().map(|block| {
            let mut builder = ImageCaptureBuilder::new(self.facing);
            block(&mut builder);
            Arc::new(builder.build())
        });

        let descriptor = SessionDescriptor {
            preview,
            image_analysis,
            image_capture,
        };
        let use_cases = descriptor.use_cases();
        info!(
            facing = %self.facing,
            use_cases = use_cases.len(),
            "Binding camera session"
        );
        binder.bind(&self.owner, &use_cases)?;
        Ok(descriptor)
    }
}

impl fmt::Debug for SessionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionBuilder")
            .field("owner", &self.owner)
            .field("facing", &self.facing)
            .field("preview", &self.preview.is_some())
            .field("image_analysis", &self.image_analysis.is_some())
            .field("image_capture", &self.image_capture.is_some())
            .finish()
    }
}

/// Declare a session with `configure` and bind it to `owner` in one call.
pub fn camera_session<B, F>(
    owner: LifecycleOwner,
    binder: &mut B,
    configure: F,
) -> Result<SessionDescriptor>
where
    B: CameraBinder + ?Sized,
    F: FnOnce(SessionBuilder) -> SessionBuilder,
{
    configure(SessionBuilder::new(owner)).build(binder)
}
