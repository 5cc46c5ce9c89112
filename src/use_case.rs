//! Use-cases and the builders that configure them.
//!
//! Each builder starts from the defaults (640x480, 4:3), is adjusted by
//! assigning its public fields, and is consumed by `build()`. The resulting
//! use-case is immutable apart from the runtime hooks a binder drives.

use std::fmt;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::aspect_ratio::AspectRatio;
use crate::executor::{AnalysisExecutor, Analyzer};
use crate::traits::{FourCC, Format, Frame, LensFacing, Result, Rotation};

/// Default target width.
pub const DEFAULT_WIDTH: u32 = 640;
/// Default target height.
pub const DEFAULT_HEIGHT: u32 = 480;
/// Default name of the analysis executor thread.
pub const DEFAULT_ANALYZER_THREAD: &str = "camera-analyzer";

/// Frames buffered for a preview consumer before new ones are dropped.
const PREVIEW_QUEUE_DEPTH: usize = 2;

/// Target output size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Settings shared by every use-case kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UseCaseConfig {
    /// Requested output size.
    pub target_resolution: Resolution,
    /// Requested output shape.
    pub target_aspect_ratio: AspectRatio,
    /// Camera the use-case runs on.
    pub lens_facing: LensFacing,
}

impl UseCaseConfig {
    const fn new(width: u32, height: u32, aspect_ratio: AspectRatio, facing: LensFacing) -> Self {
        Self {
            target_resolution: Resolution { width, height },
            target_aspect_ratio: aspect_ratio,
            lens_facing: facing,
        }
    }
}

/// Output handed to a preview listener when the preview stream (re)starts.
#[derive(Debug)]
pub struct PreviewOutput {
    /// Format negotiated with the device.
    pub format: Format,
    /// Preview frames, newest last. Frames are dropped while the queue is full.
    pub frames: Receiver<Frame>,
}

/// Callback told about new preview outputs.
pub trait PreviewOutputListener: Send {
    /// A new preview output is ready.
    fn on_output_update(&mut self, output: PreviewOutput);
}

impl<F> PreviewOutputListener for F
where
    F: FnMut(PreviewOutput) + Send,
{
    fn on_output_update(&mut self, output: PreviewOutput) {
        self(output);
    }
}

/// Viewfinder use-case.
pub struct Preview {
    config: UseCaseConfig,
    has_listener: bool,
    listener: Mutex<Option<Box<dyn PreviewOutputListener>>>,
    output: Mutex<Option<SyncSender<Frame>>>,
}

impl Preview {
    /// Resolved configuration.
    pub const fn config(&self) -> &UseCaseConfig {
        &self.config
    }

    /// Whether a listener will be told about outputs.
    pub const fn has_output_listener(&self) -> bool {
        self.has_listener
    }

    /// Open a new preview output in `format` and hand it to the listener.
    ///
    /// Called by binders when streaming starts. Replaces any previous output.
    /// The listener runs without any lock of this preview held.
    pub fn attach_output(&self, format: Format) {
        let (sender, frames) = mpsc::sync_channel(PREVIEW_QUEUE_DEPTH);
        *self.output.lock().unwrap_or_else(PoisonError::into_inner) = Some(sender);

        let taken = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(mut listener) = taken {
            listener.on_output_update(PreviewOutput { format, frames });
            self.listener
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get_or_insert(listener);
        }
    }

    /// Push a frame to the current output. Returns `false` if it was dropped.
    pub fn deliver(&self, frame: Frame) -> bool {
        let mut output = self.output.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = output.as_ref() else {
            return false;
        };
        match sender.try_send(frame) {
            Ok(()) => true,
            Err(mpsc::TrySendError::Full(_)) => false,
            Err(mpsc::TrySendError::Disconnected(_)) => {
                *output = None;
                false
            }
        }
    }

    /// Close the current output.
    pub fn detach_output(&self) {
        *self.output.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl fmt::Debug for Preview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Preview")
            .field("config", &self.config)
            .field("has_output_listener", &self.has_output_listener())
            .finish_non_exhaustive()
    }
}

/// Still-capture use-case.
#[derive(Debug)]
pub struct ImageCapture {
    config: UseCaseConfig,
    pixel_format: FourCC,
    latest: Mutex<Option<Frame>>,
}

impl ImageCapture {
    /// Resolved configuration.
    pub const fn config(&self) -> &UseCaseConfig {
        &self.config
    }

    /// Requested buffer pixel format.
    pub const fn pixel_format(&self) -> FourCC {
        self.pixel_format
    }

    /// Most recent frame captured while the session was active, if any.
    pub fn take_picture(&self) -> Option<Frame> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Record `frame` as the latest capture. Called by binders.
    pub fn store_frame(&self, frame: Frame) {
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(frame);
    }
}

/// Frame-analysis use-case with its own executor thread.
#[derive(Debug)]
pub struct ImageAnalysis {
    config: UseCaseConfig,
    has_analyzer: bool,
    executor: AnalysisExecutor,
}

impl ImageAnalysis {
    /// Resolved configuration.
    pub const fn config(&self) -> &UseCaseConfig {
        &self.config
    }

    /// Whether frames reach an analyzer.
    pub const fn has_analyzer(&self) -> bool {
        self.has_analyzer
    }

    /// Executor the analyzer runs on.
    pub const fn executor(&self) -> &AnalysisExecutor {
        &self.executor
    }

    /// Offer a frame to the analyzer. Returns `false` if it was dropped.
    pub fn analyze(&self, frame: Frame, rotation: Rotation) -> bool {
        self.executor.dispatch(frame, rotation)
    }

    /// Stop the analyzer thread. Called by binders on teardown.
    pub fn shutdown(&self) {
        self.executor.shutdown();
    }
}

/// Kind of a [`UseCase`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UseCaseKind {
    /// [`Preview`].
    Preview,
    /// [`ImageAnalysis`].
    ImageAnalysis,
    /// [`ImageCapture`].
    ImageCapture,
}

/// A built use-case, shared between a session descriptor and its binder.
///
/// Equality is identity: two values are equal when they wrap the same
/// use-case instance.
#[derive(Debug, Clone)]
pub enum UseCase {
    /// Viewfinder.
    Preview(Arc<Preview>),
    /// Frame analysis.
    ImageAnalysis(Arc<ImageAnalysis>),
    /// Still capture.
    ImageCapture(Arc<ImageCapture>),
}

impl UseCase {
    /// Resolved configuration.
    pub fn config(&self) -> &UseCaseConfig {
        match self {
            Self::Preview(preview) => preview.config(),
            Self::ImageAnalysis(analysis) => analysis.config(),
            Self::ImageCapture(capture) => capture.config(),
        }
    }

    /// Which kind of use-case this is.
    pub const fn kind(&self) -> UseCaseKind {
        match self {
            Self::Preview(_) => UseCaseKind::Preview,
            Self::ImageAnalysis(_) => UseCaseKind::ImageAnalysis,
            Self::ImageCapture(_) => UseCaseKind::ImageCapture,
        }
    }
}

impl PartialEq for UseCase {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Preview(a), Self::Preview(b)) => Arc::ptr_eq(a, b),
            (Self::ImageAnalysis(a), Self::ImageAnalysis(b)) => Arc::ptr_eq(a, b),
            (Self::ImageCapture(a), Self::ImageCapture(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Configures a [`Preview`].
pub struct PreviewBuilder {
    facing: LensFacing,
    /// Target width.
    pub width: u32,
    /// Target height.
    pub height: u32,
    /// Target aspect ratio.
    pub aspect_ratio: AspectRatio,
    /// Told about each new preview output.
    pub on_output_update: Option<Box<dyn PreviewOutputListener>>,
}

impl PreviewBuilder {
    /// Start a builder for the camera facing `facing`.
    #[must_use]
    pub fn new(facing: LensFacing) -> Self {
        Self {
            facing,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            aspect_ratio: AspectRatio::RATIO_4_3,
            on_output_update: None,
        }
    }

    /// Camera this preview will run on.
    pub const fn facing(&self) -> LensFacing {
        self.facing
    }

    /// Build the preview.
    #[must_use]
    pub fn build(self) -> Preview {
        let config = UseCaseConfig::new(self.width, self.height, self.aspect_ratio, self.facing);
        debug!(?config, "Built preview");
        Preview {
            config,
            has_listener: self.on_output_update.is_some(),
            listener: Mutex::new(self.on_output_update),
            output: Mutex::new(None),
        }
    }
}

/// Configures an [`ImageCapture`].
#[derive(Debug)]
pub struct ImageCaptureBuilder {
    facing: LensFacing,
    /// Target width.
    pub width: u32,
    /// Target height.
    pub height: u32,
    /// Target aspect ratio.
    pub aspect_ratio: AspectRatio,
    /// Buffer pixel format.
    pub pixel_format: FourCC,
}

impl ImageCaptureBuilder {
    /// Start a builder for the camera facing `facing`.
    #[must_use]
    pub const fn new(facing: LensFacing) -> Self {
        Self {
            facing,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            aspect_ratio: AspectRatio::RATIO_4_3,
            pixel_format: FourCC::YU12,
        }
    }

    /// Camera this capture will run on.
    pub const fn facing(&self) -> LensFacing {
        self.facing
    }

    /// Build the capture use-case.
    #[must_use]
    pub fn build(self) -> ImageCapture {
        let config = UseCaseConfig::new(self.width, self.height, self.aspect_ratio, self.facing);
        debug!(?config, pixel_format = %self.pixel_format, "Built image capture");
        ImageCapture {
            config,
            pixel_format: self.pixel_format,
            latest: Mutex::new(None),
        }
    }
}

/// Configures an [`ImageAnalysis`].
pub struct ImageAnalysisBuilder {
    facing: LensFacing,
    /// Target width.
    pub width: u32,
    /// Target height.
    pub height: u32,
    /// Target aspect ratio.
    pub aspect_ratio: AspectRatio,
    /// Called for each analyzed frame on the executor thread.
    pub analyzer: Option<Box<dyn Analyzer>>,
    /// Name given to the executor thread.
    pub thread_name: String,
}

impl ImageAnalysisBuilder {
    /// Start a builder for the camera facing `facing`.
    #[must_use]
    pub fn new(facing: LensFacing) -> Self {
        Self {
            facing,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            aspect_ratio: AspectRatio::RATIO_4_3,
            analyzer: None,
            thread_name: DEFAULT_ANALYZER_THREAD.to_owned(),
        }
    }

    /// Camera this analysis will run on.
    pub const fn facing(&self) -> LensFacing {
        self.facing
    }

    /// Build the analysis use-case, starting its executor thread.
    pub fn build(self) -> Result<ImageAnalysis> {
        let config = UseCaseConfig::new(self.width, self.height, self.aspect_ratio, self.facing);
        let has_analyzer = self.analyzer.is_some();
        let executor = AnalysisExecutor::spawn(&self.thread_name, self.analyzer)?;
        debug!(?config, executor = executor.id(), "Built image analysis");
        Ok(ImageAnalysis {
            config,
            has_analyzer,
            executor,
        })
    }
}
