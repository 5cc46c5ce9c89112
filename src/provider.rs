//! Binder that runs bound use-cases on a camera device.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, error, info, trace, warn};

use crate::config::DeviceIndices;
use crate::device::V4L2Device;
use crate::lifecycle::{LifecycleOwner, LifecycleState};
use crate::traits::{
    CameraBinder, CameraDevice, CameraError, CaptureStream, FourCC, Format, Frame, Result,
    Rotation,
};
use crate::use_case::{ImageAnalysis, ImageCapture, Preview, UseCase};

type DeviceOpener<D> = Box<dyn Fn(u32) -> Result<D> + Send>;

/// [`DeviceProvider`] over V4L2 devices.
pub type V4l2Provider = DeviceProvider<V4L2Device>;

impl V4l2Provider {
    /// Provider opening `/dev/videoN` through V4L2.
    #[must_use]
    pub fn v4l2() -> Self {
        Self::new(V4L2Device::open)
    }
}

/// Binds use-cases to camera devices, one capture thread per binding.
///
/// Each binding opens the device for the use-cases' lens facing, negotiates
/// a format, then streams while its owner is started. Frames go to the
/// preview output, the analysis executor and the capture slot. Stopping the
/// owner releases the stream; destroying it shuts the analysis executor down
/// and ends the thread.
pub struct DeviceProvider<D> {
    open: DeviceOpener<D>,
    devices: DeviceIndices,
    buffer_count: u32,
    rotation: Rotation,
    bindings: Vec<JoinHandle<Result<()>>>,
}

impl<D> DeviceProvider<D>
where
    D: CameraDevice + Send + 'static,
{
    /// Provider opening devices with `open`.
    pub fn new<F>(open: F) -> Self
    where
        F: Fn(u32) -> Result<D> + Send + 'static,
    {
        Self {
            open: Box::new(open),
            devices: DeviceIndices::default(),
            buffer_count: 4,
            rotation: Rotation::Deg0,
            bindings: Vec::new(),
        }
    }

    /// Device index to open per lens facing.
    #[must_use]
    pub const fn with_devices(mut self, devices: DeviceIndices) -> Self {
        self.devices = devices;
        self
    }

    /// Capture buffers requested per stream.
    #[must_use]
    pub const fn with_buffer_count(mut self, buffer_count: u32) -> Self {
        self.buffer_count = buffer_count;
        self
    }

    /// Rotation passed to analyzers with every frame.
    #[must_use]
    pub const fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    /// Bindings whose capture thread is still running.
    pub fn active_bindings(&self) -> usize {
        self.bindings.iter().filter(|h| !h.is_finished()).count()
    }

    /// Wait for every capture thread and return the first failure.
    ///
    /// Blocks until the owners of all bindings are destroyed.
    pub fn join(self) -> Result<()> {
        let mut first_error = None;
        for handle in self.bindings {
            let result = handle.join().unwrap_or_else(|_| {
                Err(CameraError::StreamError("capture thread panicked".to_owned()))
            });
            if let Err(err) = result {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl<D> CameraBinder for DeviceProvider<D>
where
    D: CameraDevice + Send + 'static,
{
    fn bind(&mut self, owner: &LifecycleOwner, use_cases: &[UseCase]) -> Result<()> {
        if owner.is_destroyed() {
            return Err(CameraError::LifecycleDestroyed);
        }
        let Some(first) = use_cases.first() else {
            debug!("No use-cases to bind");
            return Ok(());
        };

        let facing = first.config().lens_facing;
        if let Some(second) = use_cases
            .iter()
            .map(|use_case| use_case.config().lens_facing)
            .find(|other| *other != facing)
        {
            return Err(CameraError::MixedLensFacing {
                first: facing,
                second,
            });
        }

        let binding = Binding::new(use_cases);
        let index = self.devices.index_for(facing);
        let mut device = (self.open)(index)?;
        let requested = binding.requested_format();
        let format = device.set_format(&requested)?;
        if format.width != requested.width || format.height != requested.height {
            warn!(
                requested_width = requested.width,
                requested_height = requested.height,
                width = format.width,
                height = format.height,
                "Driver adjusted the requested resolution"
            );
        }

        let owner = owner.clone();
        let buffer_count = self.buffer_count;
        let rotation = self.rotation;
        let handle = thread::Builder::new()
            .name(format!("camera-session-{index}"))
            .spawn(move || run_binding(device, &format, &binding, &owner, buffer_count, rotation))?;
        self.bindings.push(handle);

        info!(
            device = index,
            %facing,
            width = requested.width,
            height = requested.height,
            "Session bound"
        );
        Ok(())
    }
}

/// Use-cases of one binding, split by kind.
struct Binding {
    preview: Option<Arc<Preview>>,
    analysis: Option<Arc<ImageAnalysis>>,
    capture: Option<Arc<ImageCapture>>,
}

impl Binding {
    fn new(use_cases: &[UseCase]) -> Self {
        let mut binding = Self {
            preview: None,
            analysis: None,
            capture: None,
        };
        for use_case in use_cases {
            match use_case {
                UseCase::Preview(preview) => binding.preview = Some(Arc::clone(preview)),
                UseCase::ImageAnalysis(analysis) => binding.analysis = Some(Arc::clone(analysis)),
                UseCase::ImageCapture(capture) => binding.capture = Some(Arc::clone(capture)),
            }
        }
        binding
    }

    /// Stream format: size from preview, else analysis, else capture.
    ///
    /// Frames feeding a preview or an analyzer are YUYV; the capture pixel
    /// format is only requested when capture is the sole use-case.
    fn requested_format(&self) -> Format {
        let config = self
            .preview
            .as_ref()
            .map(|p| p.config())
            .or_else(|| self.analysis.as_ref().map(|a| a.config()))
            .or_else(|| self.capture.as_ref().map(|c| c.config()));
        let (width, height) = config.map_or((0, 0), |c| {
            (c.target_resolution.width, c.target_resolution.height)
        });

        let fourcc = match (&self.preview, &self.analysis, &self.capture) {
            (None, None, Some(capture)) => capture.pixel_format(),
            _ => FourCC::YUYV,
        };
        Format::new(width, height, fourcc)
    }

    fn attach(&self, format: &Format) {
        if let Some(preview) = &self.preview {
            preview.attach_output(format.clone());
        }
    }

    fn deliver(&self, frame: Frame, rotation: Rotation) {
        if let Some(capture) = &self.capture {
            capture.store_frame(frame.clone());
        }
        if let Some(analysis) = &self.analysis {
            analysis.analyze(frame.clone(), rotation);
        }
        if let Some(preview) = &self.preview {
            preview.deliver(frame);
        }
    }

    fn detach(&self) {
        if let Some(preview) = &self.preview {
            preview.detach_output();
        }
    }

    fn teardown(&self) {
        self.detach();
        if let Some(analysis) = &self.analysis {
            analysis.shutdown();
        }
    }
}

fn run_binding<D: CameraDevice>(
    mut device: D,
    format: &Format,
    binding: &Binding,
    owner: &LifecycleOwner,
    buffer_count: u32,
    rotation: Rotation,
) -> Result<()> {
    let result =
        stream_until_destroyed(&mut device, format, binding, owner, buffer_count, rotation);
    binding.teardown();
    match &result {
        Ok(()) => info!("Camera session torn down"),
        Err(err) => error!(%err, "Camera session failed"),
    }
    result
}

fn stream_until_destroyed<D: CameraDevice>(
    device: &mut D,
    format: &Format,
    binding: &Binding,
    owner: &LifecycleOwner,
    buffer_count: u32,
    rotation: Rotation,
) -> Result<()> {
    loop {
        if owner.wait_until_active() == LifecycleState::Destroyed {
            return Ok(());
        }

        let mut stream = device.create_stream(buffer_count)?;
        binding.attach(format);
        info!(
            width = format.width,
            height = format.height,
            fourcc = %format.fourcc,
            "Camera session active"
        );

        while owner.state().is_active() {
            match stream.next_frame() {
                Ok(frame) => binding.deliver(frame, rotation),
                Err(CameraError::Timeout) => trace!("No frame within the stream timeout"),
                Err(err) => return Err(err),
            }
        }

        binding.detach();
        debug!("Camera session paused");
    }
}
