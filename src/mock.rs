//! Mock device implementation for testing without hardware.

use crate::lifecycle::LifecycleOwner;
use crate::traits::{
    CameraBinder, CameraDevice, CameraError, CaptureStream, DeviceCapabilities, Format, FourCC,
    Frame, FrameMetadata, Result,
};
use crate::use_case::UseCase;
use std::thread;
use std::time::Duration;

/// Mock device for testing without hardware.
pub struct MockDevice {
    capabilities: DeviceCapabilities,
    format: Format,
    frame_count: u32,
    pattern: TestPattern,
    frame_interval: Duration,
    frame_timeout: Option<Duration>,
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDevice {
    /// Create a new mock device with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            capabilities: DeviceCapabilities {
                driver: "mock".to_owned(),
                card: "Mock Camera".to_owned(),
                bus_info: "mock:0".to_owned(),
                can_capture: true,
                can_stream: true,
            },
            format: Format::new(640, 480, FourCC::YUYV),
            frame_count: 0,
            pattern: TestPattern::ColorBars,
            frame_interval: Duration::ZERO,
            frame_timeout: None,
        }
    }

    /// Set the format for this mock device.
    #[must_use]
    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    /// Set the pattern every stream of this device starts with.
    #[must_use]
    pub const fn with_pattern(mut self, pattern: TestPattern) -> Self {
        self.pattern = pattern;
        self
    }

    /// Sleep this long before producing each frame.
    #[must_use]
    pub const fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    /// Fail with [`CameraError::Timeout`] after `timeout` when frames are
    /// slower than that.
    #[must_use]
    pub const fn with_frame_timeout(mut self, timeout: Duration) -> Self {
        self.frame_timeout = Some(timeout);
        self
    }
}

impl CameraDevice for MockDevice {
    type Stream<'a> = MockStream<'a>;

    fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    fn format(&self) -> Result<Format> {
        Ok(self.format.clone())
    }

    fn set_format(&mut self, format: &Format) -> Result<Format> {
        self.format = format.clone();
        Ok(self.format.clone())
    }

    fn create_stream(&mut self, _buffer_count: u32) -> Result<Self::Stream<'_>> {
        let pattern = self.pattern;
        Ok(MockStream {
            device: self,
            pattern,
        })
    }
}

/// Test pattern types for mock frame generation.
#[derive(Debug, Clone, Copy)]
pub enum TestPattern {
    /// SMPTE color bars pattern.
    ColorBars,
    /// Horizontal gradient from dark to light.
    Gradient,
    /// Solid color with specified Y, U, V values.
    Solid(u8, u8, u8),
}

/// Mock capture stream for testing.
pub struct MockStream<'a> {
    device: &'a mut MockDevice,
    pattern: TestPattern,
}

impl CaptureStream for MockStream<'_> {
    fn next_frame(&mut self) -> Result<Frame> {
        let interval = self.device.frame_interval;
        if let Some(timeout) = self.device.frame_timeout.filter(|t| interval > *t) {
            thread::sleep(timeout);
            return Err(CameraError::Timeout);
        }
        if !interval.is_zero() {
            thread::sleep(interval);
        }
        let format = &self.device.format;
        let data = generate_test_frame(format, self.pattern);

        let seq = self.device.frame_count;
        self.device.frame_count += 1;

        Ok(Frame {
            data: data.into(),
            format: format.clone(),
            metadata: FrameMetadata {
                sequence: seq,
                timestamp: Duration::from_millis(u64::from(seq) * 33), // ~30fps
                bytes_used: format.size,
            },
        })
    }
}

/// Binder that records every bind call instead of touching hardware.
#[derive(Debug, Default)]
pub struct RecordingBinder {
    /// Use-cases of each bind call, in call order.
    pub calls: Vec<Vec<UseCase>>,
    /// Fail the next bind call with a stream error.
    pub fail_next: bool,
}

impl CameraBinder for RecordingBinder {
    fn bind(&mut self, owner: &LifecycleOwner, use_cases: &[UseCase]) -> Result<()> {
        if owner.is_destroyed() {
            return Err(CameraError::LifecycleDestroyed);
        }
        if self.fail_next {
            self.fail_next = false;
            return Err(CameraError::StreamError("camera busy".to_owned()));
        }
        self.calls.push(use_cases.to_vec());
        Ok(())
    }
}

/// Generate test frame data based on pattern.
fn generate_test_frame(format: &Format, pattern: TestPattern) -> Vec<u8> {
    let size = (format.width * format.height * 2) as usize; // YUYV = 2 bytes/pixel
    let mut data = vec![0u8; size];

    match pattern {
        TestPattern::ColorBars => {
            generate_color_bars(&mut data, format.width, format.height);
        }
        TestPattern::Gradient => {
            generate_gradient(&mut data, format.width, format.height);
        }
        TestPattern::Solid(y, u, v) => {
            generate_solid(&mut data, y, u, v);
        }
    }

    data
}

/// Generate YUYV color bars pattern.
fn generate_color_bars(data: &mut [u8], width: u32, height: u32) {
    // 8 color bars: White, Yellow, Cyan, Green, Magenta, Red, Blue, Black
    // YUYV values for each bar
    let bars: [(u8, u8, u8); 8] = [
        (235, 128, 128), // White
        (210, 16, 146),  // Yellow
        (170, 166, 16),  // Cyan
        (145, 54, 34),   // Green
        (106, 202, 222), // Magenta
        (81, 90, 240),   // Red
        (41, 240, 110),  // Blue
        (16, 128, 128),  // Black
    ];

    let bar_width = (width / 8).max(1);

    for y in 0..height {
        for x in (0..width).step_by(2) {
            let bar_idx = (x / bar_width).min(7) as usize;
            let (y_val, u_val, v_val) = bars[bar_idx];

            let offset = ((y * width + x) * 2) as usize;
            if offset + 3 < data.len() {
                data[offset] = y_val;     // Y0
                data[offset + 1] = u_val; // U
                data[offset + 2] = y_val; // Y1
                data[offset + 3] = v_val; // V
            }
        }
    }
}

/// Generate YUYV horizontal gradient pattern.
fn generate_gradient(data: &mut [u8], width: u32, height: u32) {
    for y in 0..height {
        for x in (0..width).step_by(2) {
            #[allow(clippy::cast_possible_truncation)]
            let y_val = ((x * 255) / width) as u8;
            let offset = ((y * width + x) * 2) as usize;

            if offset + 3 < data.len() {
                data[offset] = y_val;     // Y0
                data[offset + 1] = 128;   // U (neutral)
                data[offset + 2] = y_val; // Y1
                data[offset + 3] = 128;   // V (neutral)
            }
        }
    }
}

/// Generate solid color YUYV frame.
fn generate_solid(data: &mut [u8], y: u8, u: u8, v: u8) {
    for i in (0..data.len()).step_by(4) {
        if i + 3 < data.len() {
            data[i] = y;     // Y0
            data[i + 1] = u; // U
            data[i + 2] = y; // Y1
            data[i + 3] = v; // V
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_device_creation() {
        let device = MockDevice::new();
        assert_eq!(device.capabilities().driver, "mock");
        assert!(device.capabilities().can_capture);
        assert!(device.capabilities().can_stream);
    }

    #[test]
    fn test_mock_device_format() {
        let mut device = MockDevice::new();
        let format = device.format().expect("format should succeed");
        assert_eq!(format.width, 640);
        assert_eq!(format.height, 480);

        let new_format = Format::new(1280, 720, FourCC::YUYV);
        let actual = device.set_format(&new_format).expect("set_format should succeed");
        assert_eq!(actual.width, 1280);
        assert_eq!(actual.height, 720);
    }

    #[test]
    fn test_mock_stream_frames_carry_format() {
        let mut device = MockDevice::new().with_format(Format::new(64, 48, FourCC::YUYV));
        let mut stream = device.create_stream(4).expect("create_stream should succeed");

        let frame1 = stream.next_frame().expect("next_frame should succeed");
        assert_eq!(frame1.metadata.sequence, 0);
        assert_eq!(frame1.format.width, 64);
        assert_eq!(frame1.data.len(), 64 * 48 * 2);

        let frame2 = stream.next_frame().expect("next_frame should succeed");
        assert_eq!(frame2.metadata.sequence, 1);
    }

    #[test]
    fn test_color_bars_decode_to_white_then_black() {
        let mut device = MockDevice::new();
        let mut stream = device.create_stream(1).expect("create_stream should succeed");
        let frame = stream.next_frame().expect("next_frame should succeed");

        assert_eq!(frame.pixel_at(0, 0), Some((235, 235, 235)));
        assert_eq!(frame.pixel_at(639, 479), Some((16, 16, 16)));
        assert_eq!(frame.pixel_at(640, 0), None);
    }

    #[test]
    fn test_pixel_at_with_oversized_format() {
        let mut device = MockDevice::new();
        let mut stream = device.create_stream(1).expect("create_stream should succeed");
        let mut frame = stream.next_frame().expect("next_frame should succeed");
        frame.format = Format::new(u32::MAX, u32::MAX, FourCC::YUYV);

        assert_eq!(frame.pixel_at(u32::MAX - 1, u32::MAX - 1), None);
        assert_eq!(frame.pixel_at(u32::MAX - 2, 1), None);
        assert_eq!(frame.pixel_at(0, 0), Some((235, 235, 235)));
    }

    #[test]
    fn test_slow_frames_time_out() {
        let mut device = MockDevice::new()
            .with_frame_interval(Duration::from_secs(60))
            .with_frame_timeout(Duration::from_millis(5));
        let mut stream = device.create_stream(1).expect("create_stream should succeed");
        assert!(matches!(stream.next_frame(), Err(CameraError::Timeout)));
    }

    #[test]
    fn test_gradient_pattern() {
        let format = Format::new(640, 480, FourCC::YUYV);
        let data = generate_test_frame(&format, TestPattern::Gradient);

        assert!(data.first().is_some_and(|y| *y < 10));
        let last_row_start = 479 * 640 * 2;
        assert!(data.get(last_row_start + 638 * 2).is_some_and(|y| *y > 200));
    }

    #[test]
    fn test_device_pattern_applies_to_stream() {
        let mut device = MockDevice::new().with_pattern(TestPattern::Solid(128, 64, 192));
        let mut stream = device.create_stream(1).expect("create_stream should succeed");
        let frame = stream.next_frame().expect("next_frame should succeed");

        assert_eq!(frame.data.get(..4), Some(&[128, 64, 128, 192][..]));
    }

    #[test]
    fn test_tiny_frames_do_not_divide_by_zero() {
        let format = Format::new(4, 2, FourCC::YUYV);
        let data = generate_test_frame(&format, TestPattern::ColorBars);
        assert_eq!(data.len(), 16);
    }

    #[test]
    fn test_recording_binder_fails_once() {
        let mut binder = RecordingBinder {
            fail_next: true,
            ..RecordingBinder::default()
        };
        let owner = LifecycleOwner::new();
        assert!(binder.bind(&owner, &[]).is_err());
        assert!(binder.bind(&owner, &[]).is_ok());
        assert_eq!(binder.calls.len(), 1);
    }
}
