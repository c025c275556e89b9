use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::models::audio_models::StreamRequest;
use crate::models::error::CaptureError;
use crate::models::state::CaptureState;
use crate::session::capture_session::CaptureSession;
use crate::session::enumerator::DeviceEnumerator;
use crate::session::hotplug::HotplugWatcher;
use crate::session::shared::CaptureShared;
use crate::sync::event::Event;
use crate::traits::capture_backend::CaptureBackend;
use crate::traits::consumer::SharedConsumer;
use crate::traits::notification::NotificationSink;

const LOG_TARGET: &str = "pcm_capture::thread";

enum ThreadCommand {
    Start {
        consumer: SharedConsumer,
        cancel: Arc<AtomicBool>,
    },
    Shutdown,
}

/// Events the control path and the capture thread synchronize on.
struct Handshake {
    fill_request: Event,
    fill_complete: Event,
    session_opened: Event,
    session_ended: Event,
}

impl Handshake {
    fn new() -> Self {
        Self {
            fill_request: Event::auto_reset(),
            fill_complete: Event::auto_reset(),
            session_opened: Event::manual_reset(),
            session_ended: Event::manual_reset(),
        }
    }
}

enum LoopExit {
    Cancelled,
    Restart,
    Failed,
}

/// Dedicated capture thread for pull backends.
///
/// Spawned once per facade and parked on its command channel between
/// sessions. A session registers for hot-plug notifications, opens the
/// selected device and then drains it once per fill request until stopped.
/// Hot-plug restarts reopen the device inside the same session.
pub struct CaptureThread {
    commands: Sender<ThreadCommand>,
    handshake: Arc<Handshake>,
    shared: Arc<CaptureShared>,
    cancel: Option<Arc<AtomicBool>>,
    fill_timeout: Duration,
    capture_wait: Duration,
    handle: Option<thread::JoinHandle<()>>,
}

impl CaptureThread {
    pub fn spawn(
        backend: Arc<dyn CaptureBackend>,
        enumerator: DeviceEnumerator,
        shared: Arc<CaptureShared>,
        watcher: Arc<HotplugWatcher>,
        request: StreamRequest,
        fill_timeout: Duration,
        capture_wait: Duration,
    ) -> Result<Self, CaptureError> {
        let (commands, receiver) = unbounded();
        let handshake = Arc::new(Handshake::new());

        let worker = CaptureWorker {
            backend,
            enumerator,
            shared: Arc::clone(&shared),
            watcher,
            handshake: Arc::clone(&handshake),
            request,
            capture_wait,
        };

        let handle = thread::Builder::new()
            .name("pcm-capture".into())
            .spawn(move || worker.run(receiver))
            .map_err(|e| CaptureError::BackendUnavailable(format!("failed to spawn capture thread: {}", e)))?;

        log::debug!(target: LOG_TARGET, "Capture thread started.");

        Ok(Self {
            commands,
            handshake,
            shared,
            cancel: None,
            fill_timeout,
            capture_wait,
            handle: Some(handle),
        })
    }

    /// Starts a capture session on the current selection.
    ///
    /// Returns once the first open attempt has finished, so
    /// `is_capturing` reflects its outcome.
    pub fn start(&mut self, consumer: SharedConsumer) {
        self.stop();

        let cancel = Arc::new(AtomicBool::new(false));
        self.handshake.session_opened.reset();
        self.handshake.session_ended.reset();
        self.shared.set_capturing(true);

        let command = ThreadCommand::Start {
            consumer,
            cancel: Arc::clone(&cancel),
        };
        if self.commands.send(command).is_err() {
            log::error!(target: LOG_TARGET, "Capture thread is gone, cannot start capturing.");
            self.shared.set_capturing(false);
            return;
        }
        self.cancel = Some(cancel);

        if !self.handshake.session_opened.wait_timeout(self.capture_wait) {
            log::warn!(
                target: LOG_TARGET,
                "Audio device did not open within {:?}, capture continues in the background.",
                self.capture_wait
            );
        }
    }

    /// Ends the current session. Safe to call when no session is running.
    ///
    /// Waits at most one capture interval for the thread to leave the
    /// session and never hangs.
    pub fn stop(&mut self) {
        let Some(cancel) = self.cancel.take() else {
            return;
        };

        self.shared.set_capturing(false);
        if !self.handshake.session_ended.is_set() {
            self.shared.set_state(CaptureState::Stopping);
        }
        cancel.store(true, Ordering::SeqCst);
        // Wake the loop one last time so it observes the flags instead of waiting again.
        self.handshake.fill_request.set();

        if !self.handshake.session_ended.wait_timeout(self.capture_wait) {
            log::warn!(
                target: LOG_TARGET,
                "Capture thread did not stop within {:?}.",
                self.capture_wait
            );
        } else if self.shared.state().is_stopping() {
            self.shared.set_state(CaptureState::Idle);
        }
    }

    /// Asks the thread to drain the device and waits for it, bounded by
    /// the fill timeout. Returns immediately when not capturing.
    pub fn fill_buffer(&self) {
        if !self.shared.is_capturing() {
            return;
        }

        self.handshake.fill_complete.reset();
        self.handshake.fill_request.set();

        if !self.handshake.fill_complete.wait_timeout(self.fill_timeout) {
            log::debug!(
                target: LOG_TARGET,
                "Timeout waiting for the capture thread to fill the audio buffer."
            );
        }
    }
}

impl Drop for CaptureThread {
    fn drop(&mut self) {
        self.stop();
        let _ = self.commands.send(ThreadCommand::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        log::debug!(target: LOG_TARGET, "Capture thread exited.");
    }
}

struct CaptureWorker {
    backend: Arc<dyn CaptureBackend>,
    enumerator: DeviceEnumerator,
    shared: Arc<CaptureShared>,
    watcher: Arc<HotplugWatcher>,
    handshake: Arc<Handshake>,
    request: StreamRequest,
    capture_wait: Duration,
}

impl CaptureWorker {
    fn run(self, commands: Receiver<ThreadCommand>) {
        while let Ok(command) = commands.recv() {
            match command {
                ThreadCommand::Start { consumer, cancel } => self.run_session(&consumer, &cancel),
                ThreadCommand::Shutdown => break,
            }
        }
    }

    fn run_session(&self, consumer: &SharedConsumer, cancel: &AtomicBool) {
        let sink: Arc<dyn NotificationSink> = self.watcher.clone();
        let registration = self
            .backend
            .register_notifications(Arc::clone(&sink))
            .inspect_err(|e| {
                log::warn!(
                    target: LOG_TARGET,
                    "Device notifications unavailable, hot-plug events will be missed: {}",
                    e
                );
            })
            .ok();

        let mut restarting = false;
        loop {
            if cancel.load(Ordering::SeqCst) {
                break;
            }
            self.shared.take_restart();

            let list = self.enumerator.list();
            let opened = CaptureSession::open_selected(
                self.backend.as_ref(),
                &list,
                &self.shared,
                &self.request,
                consumer,
                &sink,
                restarting,
            );
            let mut session = match opened {
                Ok(session) => session,
                Err(e) => {
                    if !cancel.load(Ordering::SeqCst) {
                        self.shared.set_capturing(false);
                        self.shared.report_error(&e);
                    }
                    break;
                }
            };

            self.shared.set_state(CaptureState::Running);
            self.handshake.session_opened.set();

            let exit = self.capture(&mut session, cancel);
            session.close();
            self.handshake.fill_complete.set();

            match exit {
                LoopExit::Restart => {
                    log::info!(target: LOG_TARGET, "Restarting audio capture after a device change.");
                    self.shared.set_state(CaptureState::Restarting);
                    restarting = true;
                }
                LoopExit::Cancelled => break,
                LoopExit::Failed => {
                    if !cancel.load(Ordering::SeqCst) {
                        self.shared.set_capturing(false);
                    }
                    break;
                }
            }
        }

        self.shared.set_device_id(None);
        drop(registration);
        self.shared.set_state(CaptureState::Idle);
        self.handshake.session_opened.set();
        self.handshake.session_ended.set();
    }

    fn capture(&self, session: &mut CaptureSession, cancel: &AtomicBool) -> LoopExit {
        loop {
            if cancel.load(Ordering::SeqCst) {
                return LoopExit::Cancelled;
            }
            if self.shared.restart_requested() {
                return LoopExit::Restart;
            }

            let requested = self.handshake.fill_request.wait_timeout(self.capture_wait);
            if !requested {
                log::trace!(
                    target: LOG_TARGET,
                    "No fill request within {:?}, draining the device anyway.",
                    self.capture_wait
                );
            }
            if cancel.load(Ordering::SeqCst) {
                return LoopExit::Cancelled;
            }

            // Timeout wakes drain too; only a real request is answered.
            let result = session.pump();
            if requested {
                self.handshake.fill_complete.set();
            }
            match result {
                Ok(_) => {}
                Err(CaptureError::DeviceNotAvailable) => {
                    log::warn!(
                        target: LOG_TARGET,
                        "Audio device \"{}\" is no longer available.",
                        session.device_name()
                    );
                    self.shared.request_restart();
                }
                Err(e) => {
                    log::error!(
                        target: LOG_TARGET,
                        "Capturing from audio device \"{}\" failed: {}",
                        session.device_name(),
                        e
                    );
                    self.shared.report_error(&e);
                    return LoopExit::Failed;
                }
            }
        }
    }
}
