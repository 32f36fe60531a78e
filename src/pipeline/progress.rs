//! Driver-owned progress accounting.
//!
//! Overall completion is a single 0..100 value plus a phase label. Only the
//! pipeline driver holds a [`ProgressTracker`]; worker tasks never see it.
//! Consumers receive [`ProgressEvent`]s over an mpsc channel.

use tokio::sync::mpsc;

/// One progress update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Overall completion, 0..=100.
    pub percent: u8,
    /// Human-readable phase label.
    pub label: String,
}

/// Single-writer progress state.
#[derive(Debug)]
pub struct ProgressTracker {
    percent: u8,
    label: String,
    event_tx: Option<mpsc::Sender<ProgressEvent>>,
}

impl ProgressTracker {
    /// Tracker that forwards every update to `event_tx`.
    pub fn new(event_tx: mpsc::Sender<ProgressEvent>) -> Self {
        Self {
            percent: 0,
            label: String::new(),
            event_tx: Some(event_tx),
        }
    }

    /// Tracker that only records state.
    pub fn silent() -> Self {
        Self {
            percent: 0,
            label: String::new(),
            event_tx: None,
        }
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Move to `percent` under `label` and emit an event.
    ///
    /// Values above 100 are clamped. The percentage never moves backwards;
    /// a lower value only updates the label.
    pub async fn update(&mut self, percent: u8, label: &str) {
        self.percent = self.percent.max(percent.min(100));
        if self.label != label {
            self.label = label.to_string();
        }

        if let Some(ref tx) = self.event_tx {
            // A closed receiver just means nobody is watching.
            let _ = tx
                .send(ProgressEvent {
                    percent: self.percent,
                    label: self.label.clone(),
                })
                .await;
        }
    }
}

/// Percentage reached after `completed` of `total` items in `[lo, hi]`.
///
/// An empty stage is complete by definition.
pub fn weighted_percent(lo: u8, hi: u8, completed: usize, total: usize) -> u8 {
    if total == 0 {
        return hi;
    }
    let span = f64::from(hi.saturating_sub(lo));
    let done = completed.min(total) as f64;
    (f64::from(lo) + span * done / total as f64).round() as u8
}
