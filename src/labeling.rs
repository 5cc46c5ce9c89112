//! Throttled image labeling on analyzed frames.
//!
//! [`LabelingAnalyzer`] sits on the analysis executor thread. It forwards at
//! most one frame per interval to an [`ImageLabeler`] and sends the outcome,
//! success or failure, over a channel to whichever thread presents results.

use std::fmt::Write as _;
use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};

use tracing::{debug, error};

use crate::executor::Analyzer;
use crate::traits::{FourCC, Frame, Rotation};

/// Default minimum time between labeling requests.
pub const DEFAULT_LABEL_INTERVAL: Duration = Duration::from_secs(1);
/// Default number of labels shown per result.
pub const DEFAULT_MAX_LABELS: usize = 3;

/// One detected label.
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    /// Human-readable name.
    pub text: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f32,
}

/// Why labeling a frame failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LabelError {
    /// The frame carried no pixel data.
    #[error("Image has no pixel data")]
    EmptyImage,
    /// The labeler cannot read this pixel format.
    #[error("Unsupported pixel format {0}")]
    UnsupportedFormat(FourCC),
    /// The labeling backend reported an error.
    #[error("Labeler failed: {0}")]
    Backend(String),
}

/// Produces labels for a frame.
pub trait ImageLabeler: Send {
    /// Label `frame`, which needs `rotation` to be upright. Labels are
    /// ordered by descending confidence.
    fn process_image(&mut self, frame: &Frame, rotation: Rotation)
        -> Result<Vec<Label>, LabelError>;
}

/// Outcome delivered to the presenting thread.
pub type LabelOutcome = Result<LabelSummary, LabelError>;

/// Labels formatted for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSummary {
    /// Text of the most confident label.
    pub title: String,
    /// One `"<text>: <percent>%"` line per shown label, then `"..."` when
    /// labels were left out.
    pub text: String,
}

impl LabelSummary {
    /// Summarize `labels`, showing at most `limit`. `None` when empty.
    pub fn from_labels(labels: &[Label], limit: usize) -> Option<Self> {
        let title = labels.first()?.text.clone();
        let mut text = String::new();
        for (i, label) in labels.iter().take(limit).enumerate() {
            if i > 0 {
                text.push('\n');
            }
            let _ = write!(text, "{}: {:.0}%", label.text, label.confidence * 100.0);
        }
        if labels.len() > limit {
            if limit > 0 {
                text.push('\n');
            }
            text.push_str("...");
        }
        Some(Self { title, text })
    }
}

/// Admits at most one event per interval.
#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    /// Throttle admitting one event per `interval`.
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Admit an event at `now` if the interval has passed since the last
    /// admitted one. The first event is always admitted.
    pub fn try_acquire_at(&mut self, now: Instant) -> bool {
        let ready = match self.last {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        };
        if ready {
            self.last = Some(now);
        }
        ready
    }

    /// [`Throttle::try_acquire_at`] the current instant.
    pub fn try_acquire(&mut self) -> bool {
        self.try_acquire_at(Instant::now())
    }
}

/// Analyzer running a labeler on throttled frames.
pub struct LabelingAnalyzer<L> {
    labeler: L,
    throttle: Throttle,
    max_labels: usize,
    results: Sender<LabelOutcome>,
}

impl<L: ImageLabeler> LabelingAnalyzer<L> {
    /// Analyzer sending outcomes to `results`, one label request per second.
    pub const fn new(labeler: L, results: Sender<LabelOutcome>) -> Self {
        Self {
            labeler,
            throttle: Throttle::new(DEFAULT_LABEL_INTERVAL),
            max_labels: DEFAULT_MAX_LABELS,
            results,
        }
    }

    /// Minimum time between label requests.
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.throttle = Throttle::new(interval);
        self
    }

    /// Labels shown per summary.
    #[must_use]
    pub const fn with_max_labels(mut self, max_labels: usize) -> Self {
        self.max_labels = max_labels;
        self
    }
}

impl<L: ImageLabeler> Analyzer for LabelingAnalyzer<L> {
    fn analyze(&mut self, frame: &Frame, rotation: Rotation) {
        if !self.throttle.try_acquire() {
            return;
        }

        let outcome = match self.labeler.process_image(frame, rotation) {
            Ok(labels) => match LabelSummary::from_labels(&labels, self.max_labels) {
                Some(summary) => Ok(summary),
                None => {
                    debug!(sequence = frame.metadata.sequence, "No labels found");
                    return;
                }
            },
            Err(err) => {
                error!(%err, sequence = frame.metadata.sequence, "Image labeling failed");
                Err(err)
            }
        };

        if self.results.send(outcome).is_err() {
            debug!("Label receiver gone, result discarded");
        }
    }
}
