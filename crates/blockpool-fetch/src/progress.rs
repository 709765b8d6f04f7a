//! Download progress reporting

/// Receives completion updates from a running download
///
/// Called synchronously from the copy loop, so implementations should return
/// quickly. Any `FnMut(f64)` closure is an observer.
pub trait ProgressObserver {
    /// `percent` is the cumulative completion in `[0, 100]`
    fn on_progress(&mut self, percent: f64);
}

impl<F: FnMut(f64)> ProgressObserver for F {
    fn on_progress(&mut self, percent: f64) {
        self(percent);
    }
}

/// Turns byte counts into throttled percentage updates
///
/// An update is emitted only when the percentage moved by at least `step`
/// points since the last emitted value (starting from 0).
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    existing_bytes: u64,
    total_bytes: u64,
    step: f64,
    last_percent: f64,
}

impl ProgressTracker {
    pub fn new(existing_bytes: u64, total_bytes: u64, step: f64) -> Self {
        Self {
            existing_bytes,
            total_bytes,
            step,
            last_percent: 0.0,
        }
    }

    /// Completion after `downloaded` new bytes on top of the existing ones
    #[allow(clippy::cast_precision_loss)]
    pub fn percent(&self, downloaded: u64) -> f64 {
        if self.total_bytes == 0 {
            return 100.0;
        }
        (self.existing_bytes + downloaded) as f64 * 100.0 / self.total_bytes as f64
    }

    /// Record `downloaded` new bytes, notifying `observer` if the change is large enough
    pub fn record<O: ProgressObserver + ?Sized>(&mut self, downloaded: u64, observer: &mut O) {
        let percent = self.percent(downloaded);
        if (percent - self.last_percent).abs() < self.step {
            return;
        }

        self.last_percent = percent;
        observer.on_progress(percent);
    }

    /// Last percentage handed to an observer
    pub fn last_percent(&self) -> f64 {
        self.last_percent
    }
}
