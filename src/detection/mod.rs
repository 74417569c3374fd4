//! Continuous currency detection: controller and background worker
//!
//! At most one worker runs per controller. The worker polls the detection
//! stream on a dedicated thread and announces labels through the speech
//! gate, debounced so a note held steady in front of the camera is not
//! announced over and over.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::external::{DetectionEvent, DetectionStream};
use crate::speech::SpeechGate;

/// Handle to a running worker thread
struct WorkerHandle {
    stop: Arc<AtomicBool>,
    exit_rx: mpsc::Receiver<()>,
}

/// Owns the single background detection worker.
///
/// `start` and `stop` are serialized by the handle mutex, so a stop can
/// never race a start that is concurrently in flight. The worker itself
/// runs free of that lock.
pub struct BackgroundModeController {
    handle: Mutex<Option<WorkerHandle>>,
    gate: Arc<SpeechGate>,
    stream: Arc<dyn DetectionStream>,
    cooldown: Duration,
    stop_timeout: Duration,
}

impl BackgroundModeController {
    pub fn new(
        gate: Arc<SpeechGate>,
        stream: Arc<dyn DetectionStream>,
        cooldown: Duration,
        stop_timeout: Duration,
    ) -> Self {
        Self {
            handle: Mutex::new(None),
            gate,
            stream,
            cooldown,
            stop_timeout,
        }
    }

    /// Launch the detection worker. Idempotent: a second start while the
    /// worker is running logs and returns without creating another worker.
    /// Never blocks on the worker's lifetime.
    pub fn start(&self) {
        let mut handle = lock_handle(&self.handle);

        if handle.is_some() {
            warn!("detection worker already running, ignoring duplicate start");
            return;
        }

        let stop = Arc::new(AtomicBool::new(false));
        let (exit_tx, exit_rx) = mpsc::channel();

        let mut worker = DetectionWorker {
            stream: Arc::clone(&self.stream),
            gate: Arc::clone(&self.gate),
            stop: Arc::clone(&stop),
            cooldown: self.cooldown,
            last_spoken: None,
            last_time: None,
        };

        let spawned = thread::Builder::new()
            .name("currency-detection".to_string())
            .spawn(move || {
                info!("detection worker thread started");
                worker.run();
                let _ = exit_tx.send(());
                info!("detection worker thread stopped");
            });

        match spawned {
            Ok(_join) => {
                *handle = Some(WorkerHandle { stop, exit_rx });
                info!("detection worker started");
            }
            Err(e) => {
                error!(?e, "failed to spawn detection worker thread");
            }
        }
    }

    /// Signal the worker to terminate and wait (bounded) for its exit
    /// acknowledgement. Idempotent: stopping while not running logs and
    /// returns.
    pub fn stop(&self) {
        let mut handle = lock_handle(&self.handle);

        let Some(worker) = handle.take() else {
            warn!("detection worker not running, nothing to stop");
            return;
        };

        worker.stop.store(true, Ordering::SeqCst);

        match worker.exit_rx.recv_timeout(self.stop_timeout) {
            Ok(()) => info!("detection worker stopped"),
            Err(RecvTimeoutError::Timeout) => {
                // Handle is dropped either way; the stop flag will end the
                // worker on its next poll
                warn!(
                    timeout_ms = self.stop_timeout.as_millis() as u64,
                    "detection worker did not acknowledge stop in time, detaching"
                );
            }
            Err(RecvTimeoutError::Disconnected) => {
                warn!("detection worker exited without acknowledgement");
            }
        }
    }

    /// Whether the worker is currently running.
    pub fn is_running(&self) -> bool {
        lock_handle(&self.handle).is_some()
    }
}

fn lock_handle(handle: &Mutex<Option<WorkerHandle>>) -> std::sync::MutexGuard<'_, Option<WorkerHandle>> {
    handle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// The worker's own state, including the debounce fields
struct DetectionWorker {
    stream: Arc<dyn DetectionStream>,
    gate: Arc<SpeechGate>,
    stop: Arc<AtomicBool>,
    cooldown: Duration,
    last_spoken: Option<String>,
    last_time: Option<Instant>,
}

impl DetectionWorker {
    /// Poll the stream until stopped. A failing poll or malformed event is
    /// logged and skipped; only the stop flag ends this loop.
    fn run(&mut self) {
        while !self.stop.load(Ordering::SeqCst) {
            match self.stream.next_event() {
                Ok(Some(event)) => self.handle_event(event),
                Ok(None) => {}
                Err(e) => {
                    error!(?e, "detection stream poll failed, skipping event");
                }
            }
        }
    }

    fn handle_event(&mut self, event: DetectionEvent) {
        let Some(label) = event.labels.iter().find(|l| !l.trim().is_empty()) else {
            debug!("detection event without labels, skipping");
            return;
        };
        let label = label.trim().to_string();

        if !self.should_announce(&label) {
            return;
        }

        let message = format!("{} detected", label.replace('_', " "));
        info!(%label, "announcing detection");
        self.gate.speak(&message);

        self.last_spoken = Some(label);
        self.last_time = Some(Instant::now());
    }

    /// Announce only when the label differs from the last spoken one AND
    /// the cooldown has elapsed since the last announcement.
    fn should_announce(&self, label: &str) -> bool {
        if self.last_spoken.as_deref() == Some(label) {
            return false;
        }
        match self.last_time {
            Some(last) => last.elapsed() > self.cooldown,
            None => true,
        }
    }
}
