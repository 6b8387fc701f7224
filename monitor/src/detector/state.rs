use pill_watch_common::config::{DetectionConfig, OnDetect};
use pill_watch_common::frame::GrayFrame;
use tracing::{debug, info, warn};

use crate::camera::FrameSource;
use crate::filter::pixeldiff::{Comparison, DiffError, PixelDiff};
use crate::snapshots::SnapshotStore;

use super::buffer::FrameBuffer;
use super::switch::DetectionSwitch;

/// What a single tick observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Detection is switched off; nothing was read or captured.
    Disabled,
    /// Fewer than two slots to compare (detector not initialized yet).
    InsufficientData,
    /// One of the two newest slots is empty. The buffer advanced.
    NoData,
    /// Both frames present and similar. The buffer advanced.
    NoChange { changed_pixels: u64 },
    /// The newest frames differ enough to count as a detection.
    Detected { changed_pixels: u64 },
}

impl TickOutcome {
    pub fn is_detection(&self) -> bool {
        matches!(self, TickOutcome::Detected { .. })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DetectError {
    #[error(transparent)]
    Compare(#[from] DiffError),
}

/// Rolling-buffer change detector.
///
/// Owns the buffer exclusively; every tick runs to completion under `&mut self`,
/// so the buffer is never observed half-advanced.
pub struct ChangeDetector<S> {
    source: S,
    buffer: FrameBuffer,
    diff: PixelDiff,
    switch: DetectionSwitch,
    on_detect: OnDetect,
    snapshots: Option<SnapshotStore>,
}

impl<S: FrameSource> ChangeDetector<S> {
    /// `capacity` below two is raised to two so a pair can always be compared.
    pub fn new(source: S, capacity: usize, diff: PixelDiff, switch: DetectionSwitch) -> Self {
        Self {
            source,
            buffer: FrameBuffer::new(capacity),
            diff,
            switch,
            on_detect: OnDetect::Hold,
            snapshots: None,
        }
    }

    pub fn from_config(source: S, config: &DetectionConfig, switch: DetectionSwitch) -> Self {
        Self::new(
            source,
            config.capacity,
            PixelDiff::new(config.noise_floor, config.pixel_threshold),
            switch,
        )
        .with_on_detect(config.on_detect)
    }

    pub fn with_on_detect(mut self, on_detect: OnDetect) -> Self {
        self.on_detect = on_detect;
        self
    }

    pub fn with_snapshots(mut self, store: SnapshotStore) -> Self {
        self.snapshots = Some(store);
        self
    }

    pub fn buffer(&self) -> &FrameBuffer {
        &self.buffer
    }

    pub fn switch(&self) -> &DetectionSwitch {
        &self.switch
    }

    #[cfg(test)]
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Empty the buffer and refill it with `capacity` fresh captures.
    /// Failed captures still take a slot.
    pub async fn initialize(&mut self) {
        self.buffer.clear();
        if let Some(store) = &self.snapshots {
            if let Err(e) = store.clear() {
                warn!(error = %e, "failed to clear old snapshots");
            }
        }

        for slot in 1..=self.buffer.capacity() {
            let frame = self.source.capture_frame().await;
            self.record_snapshot(slot, frame.as_ref());
            self.buffer.push(frame);
        }

        info!(
            capacity = self.buffer.capacity(),
            captured = self.buffer.present(),
            "frame buffer initialized"
        );
    }

    /// One evaluation cycle: compare the two newest frames and, unless a
    /// detection is being held, slide the window forward by one capture.
    pub async fn tick(&mut self) -> Result<TickOutcome, DetectError> {
        if !self.switch.is_enabled() {
            debug!("detection disabled, skipping tick");
            return Ok(TickOutcome::Disabled);
        }

        let Some((older, newer)) = self.buffer.newest_pair() else {
            debug!(slots = self.buffer.len(), "not enough frames to compare");
            return Ok(TickOutcome::InsufficientData);
        };

        let outcome = match self.diff.compare(older, newer)? {
            Comparison::NoData => TickOutcome::NoData,
            Comparison::NoChange { changed_pixels } => TickOutcome::NoChange { changed_pixels },
            Comparison::Changed { changed_pixels } => TickOutcome::Detected { changed_pixels },
        };

        if let TickOutcome::Detected { changed_pixels } = outcome {
            info!(
                changed_pixels,
                threshold = self.diff.threshold(),
                on_detect = ?self.on_detect,
                "change detected"
            );
            if self.on_detect == OnDetect::Hold {
                return Ok(outcome);
            }
        }

        self.advance().await;
        Ok(outcome)
    }

    /// Boolean form of [`ChangeDetector::tick`].
    #[allow(dead_code)]
    pub async fn check_for_pill(&mut self) -> Result<bool, DetectError> {
        Ok(self.tick().await?.is_detection())
    }

    /// Evict the oldest slot and append exactly one new capture.
    async fn advance(&mut self) {
        self.buffer.evict_oldest();
        if let Some(store) = &self.snapshots {
            if let Err(e) = store.rotate() {
                warn!(error = %e, "failed to rotate snapshots");
            }
        }

        let frame = self.source.capture_frame().await;
        let slot = self.buffer.len() + 1;
        self.record_snapshot(slot, frame.as_ref());
        self.buffer.push(frame);

        debug!(seqs = ?self.buffer.seqs(), "buffer advanced");
    }

    fn record_snapshot(&self, slot: usize, frame: Option<&GrayFrame>) {
        let (Some(store), Some(frame)) = (&self.snapshots, frame) else {
            return;
        };
        if let Err(e) = store.write(slot, frame) {
            warn!(error = %e, slot, "failed to save snapshot");
        }
    }
}
