//! Dominant-colour labeler for YUYV frames.
//!
//! Samples a grid over the frame, snaps each sample to the nearest colour of
//! the SMPTE bar palette and reports colours by their share of the samples.

use crate::labeling::{ImageLabeler, Label, LabelError};
use crate::traits::{FourCC, Frame, Rotation};

/// Named colours of the SMPTE bars, as RGB after YUYV decoding.
const PALETTE: [(&str, (u8, u8, u8)); 8] = [
    ("White", (235, 235, 235)),
    ("Yellow", (235, 235, 11)),
    ("Cyan", (12, 236, 237)),
    ("Green", (13, 237, 13)),
    ("Magenta", (237, 13, 237)),
    ("Red", (238, 14, 13)),
    ("Blue", (15, 15, 239)),
    ("Black", (16, 16, 16)),
];

/// Samples per side of the sampling grid.
const DEFAULT_GRID: u32 = 32;

/// Labels frames by their dominant palette colours.
#[derive(Debug, Clone)]
pub struct ColorLabeler {
    grid: u32,
    min_confidence: f32,
}

impl Default for ColorLabeler {
    fn default() -> Self {
        Self {
            grid: DEFAULT_GRID,
            min_confidence: 0.05,
        }
    }
}

impl ColorLabeler {
    /// Labeler with a 32x32 sampling grid, dropping colours under 5%.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Samples per side of the sampling grid (at least 1).
    #[must_use]
    pub fn with_grid(mut self, grid: u32) -> Self {
        self.grid = grid.max(1);
        self
    }

    /// Colours below this share of samples are not reported.
    #[must_use]
    pub const fn with_min_confidence(mut self, min_confidence: f32) -> Self {
        self.min_confidence = min_confidence;
        self
    }
}

impl ImageLabeler for ColorLabeler {
    // Colour shares do not depend on orientation.
    fn process_image(
        &mut self,
        frame: &Frame,
        _rotation: Rotation,
    ) -> Result<Vec<Label>, LabelError> {
        if frame.format.fourcc != FourCC::YUYV {
            return Err(LabelError::UnsupportedFormat(frame.format.fourcc));
        }
        let (width, height) = (frame.format.width, frame.format.height);
        if frame.data.is_empty() || width == 0 || height == 0 {
            return Err(LabelError::EmptyImage);
        }

        let mut counts = [0u32; PALETTE.len()];
        let mut total = 0u32;
        for gy in 0..self.grid {
            for gx in 0..self.grid {
                let x = sample_coord(gx, self.grid, width);
                let y = sample_coord(gy, self.grid, height);
                let Some(rgb) = frame.pixel_at(x, y) else {
                    continue;
                };
                if let Some(count) = counts.get_mut(nearest(rgb)) {
                    *count += 1;
                    total += 1;
                }
            }
        }
        if total == 0 {
            return Err(LabelError::EmptyImage);
        }

        #[allow(clippy::cast_precision_loss)]
        let mut labels: Vec<Label> = PALETTE
            .iter()
            .zip(counts)
            .map(|((name, _), count)| Label {
                text: (*name).to_owned(),
                confidence: count as f32 / total as f32,
            })
            .filter(|label| label.confidence > 0.0 && label.confidence >= self.min_confidence)
            .collect();
        labels.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        Ok(labels)
    }
}

/// Centre of cell `cell` when `extent` pixels are split into `cells`.
fn sample_coord(cell: u32, cells: u32, extent: u32) -> u32 {
    let centre = (u64::from(cell) * 2 + 1) * u64::from(extent) / (u64::from(cells) * 2);
    u32::try_from(centre).unwrap_or(extent).min(extent - 1)
}

/// Index of the palette colour closest to `rgb`.
fn nearest(rgb: (u8, u8, u8)) -> usize {
    let distance = |(r, g, b): (u8, u8, u8)| {
        let dr = i32::from(rgb.0) - i32::from(r);
        let dg = i32::from(rgb.1) - i32::from(g);
        let db = i32::from(rgb.2) - i32::from(b);
        dr * dr + dg * dg + db * db
    };
    PALETTE
        .iter()
        .enumerate()
        .min_by_key(|(_, (_, colour))| distance(*colour))
        .map_or(0, |(index, _)| index)
}
