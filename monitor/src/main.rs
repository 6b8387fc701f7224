mod camera;
mod detector;
mod filter;
mod snapshots;

use camera::{FrameSource, HttpCamera};
use detector::{ChangeDetector, DetectionSwitch, TickOutcome};
use pill_watch_common::config::Config;
use snapshots::SnapshotStore;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {e}", config_path.display());
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .init();

    let camera = match HttpCamera::new(&config.camera) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "failed to set up camera client");
            std::process::exit(1);
        }
    };

    info!(
        url = camera.url(),
        capacity = config.detection.capacity,
        noise_floor = config.detection.noise_floor,
        pixel_threshold = config.detection.pixel_threshold,
        on_detect = ?config.detection.on_detect,
        enabled = config.detection.enabled,
        "starting pill-watch monitor"
    );

    let switch = DetectionSwitch::new(config.detection.enabled);
    let mut detector = ChangeDetector::from_config(camera, &config.detection, switch);

    if config.snapshots.enabled {
        match SnapshotStore::open(&config.snapshots.dir, config.detection.capacity) {
            Ok(store) => detector = detector.with_snapshots(store),
            Err(e) => {
                warn!(error = %e, "snapshot directory unavailable; keeping frames in memory only");
            }
        }
    }

    #[cfg(unix)]
    spawn_toggle_on_sigusr1(detector.switch().clone());

    // Subscribe once, before any fetch, so an interrupt during a capture is not lost.
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    tokio::select! {
        _ = &mut shutdown => {
            info!("interrupt received during startup, shutting down");
            return;
        }
        _ = detector.initialize() => {}
    }

    let interval = Duration::from_secs_f64(config.detection.poll_interval_secs);
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first interval tick completes immediately; skip it so the first
    // comparison happens one interval after the buffer was filled.
    ticker.tick().await;

    info!(interval_secs = config.detection.poll_interval_secs, "entering detection loop");
    run_until_shutdown(&mut detector, &mut ticker, &mut shutdown).await;
    info!("interrupt received, shutting down");
}

/// Poll the detector on every interval until `shutdown` resolves. Shutdown
/// also cancels a tick that is still waiting on the camera.
async fn run_until_shutdown<S, F>(
    detector: &mut ChangeDetector<S>,
    ticker: &mut Interval,
    shutdown: F,
) where
    S: FrameSource,
    F: Future,
{
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = poll_once(detector, ticker) => {}
        }
    }
}

/// Wait for the next interval, then run one detection tick.
async fn poll_once<S: FrameSource>(detector: &mut ChangeDetector<S>, ticker: &mut Interval) {
    ticker.tick().await;

    match detector.tick().await {
        Ok(TickOutcome::Detected { changed_pixels }) => {
            info!(changed_pixels, "pill taken");
        }
        Ok(TickOutcome::NoData) => {
            debug!(
                present = detector.buffer().present(),
                slots = detector.buffer().len(),
                "waiting for camera frames"
            );
        }
        Ok(outcome) => {
            debug!(?outcome, "tick complete");
        }
        Err(e) => {
            warn!(error = %e, "frame comparison failed, refilling buffer");
            detector.initialize().await;
        }
    }
}

/// `kill -USR1 <pid>` flips detection on or off.
#[cfg(unix)]
fn spawn_toggle_on_sigusr1(switch: DetectionSwitch) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut usr1 = match signal(SignalKind::user_defined1()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "failed to install SIGUSR1 handler; detection toggle unavailable");
            return;
        }
    };

    tokio::spawn(async move {
        while usr1.recv().await.is_some() {
            let enabled = switch.toggle();
            info!(enabled, "detection toggled");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use pill_watch_common::frame::GrayFrame;

    /// Answers the first `ready` captures, then never answers again.
    struct StallingCamera {
        ready: usize,
        captures: usize,
    }

    impl FrameSource for StallingCamera {
        async fn capture_frame(&mut self) -> Option<GrayFrame> {
            self.captures += 1;
            if self.captures > self.ready {
                std::future::pending::<()>().await;
            }
            Some(GrayFrame::filled(8, 8, 0, self.captures as u64))
        }
    }

    #[tokio::test]
    async fn shutdown_interrupts_a_stalled_capture() {
        let camera = StallingCamera {
            ready: 2,
            captures: 0,
        };
        let mut detector = ChangeDetector::new(
            camera,
            2,
            filter::pixeldiff::PixelDiff::default(),
            DetectionSwitch::default(),
        );
        detector.initialize().await;

        let mut ticker = tokio::time::interval(Duration::from_millis(10));
        let shutdown = tokio::time::sleep(Duration::from_millis(100));

        // The first tick advances the window and hangs on the third capture.
        let finished = tokio::time::timeout(
            Duration::from_secs(5),
            run_until_shutdown(&mut detector, &mut ticker, shutdown),
        )
        .await;
        assert!(finished.is_ok(), "loop must stop while a capture is in flight");
    }

    #[tokio::test]
    async fn shutdown_fired_before_the_loop_is_not_lost() {
        let camera = StallingCamera {
            ready: 2,
            captures: 0,
        };
        let mut detector = ChangeDetector::new(
            camera,
            2,
            filter::pixeldiff::PixelDiff::default(),
            DetectionSwitch::default(),
        );
        detector.initialize().await;
        let mut ticker = tokio::time::interval(Duration::from_millis(10));

        let finished = tokio::time::timeout(
            Duration::from_secs(5),
            run_until_shutdown(&mut detector, &mut ticker, std::future::ready(())),
        )
        .await;
        assert!(finished.is_ok());
    }
}
