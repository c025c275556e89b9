use std::sync::Arc;

use crate::models::audio_models::{DeviceList, StreamRequest, DEFAULT_DEVICE_INDEX, SYSTEM_DEFAULT_NAME};
use crate::models::config::CaptureConfiguration;
use crate::models::error::CaptureError;
use crate::models::state::CaptureState;
use crate::session::capture_session::CaptureSession;
use crate::session::capture_thread::CaptureThread;
use crate::session::enumerator::DeviceEnumerator;
use crate::session::hotplug::HotplugWatcher;
use crate::session::shared::CaptureShared;
use crate::sync::generation::GenerationGate;
use crate::traits::capture_backend::{CaptureBackend, CaptureModel};
use crate::traits::capture_delegate::CaptureDelegate;
use crate::traits::consumer::SharedConsumer;
use crate::traits::notification::{NotificationRegistration, NotificationSink};

const LOG_TARGET: &str = "pcm_capture::facade";

/// Push backends: the session lives on the control thread and the OS
/// delivers audio on its own callback thread.
struct PushEngine {
    gate: Arc<GenerationGate>,
    session: Option<CaptureSession>,
    registration: Option<Box<dyn NotificationRegistration>>,
}

enum Engine {
    Push(PushEngine),
    Pull(CaptureThread),
}

/// Audio capture entry point used by the render loop and the UI.
///
/// Steady-state failures (device unplugged, open errors, driver hiccups)
/// are logged and reported to the delegate, never returned. Only
/// construction can fail.
///
/// ```text
/// render loop ── fill_buffer() ──► [CaptureThread | OS callback] ──► Consumer
///      UI ────── next_audio_device() / set_audio_device_index()
///      OS ────── device notifications ──► HotplugWatcher ──► restart
/// ```
pub struct AudioCapture {
    backend: Arc<dyn CaptureBackend>,
    enumerator: DeviceEnumerator,
    config: CaptureConfiguration,
    request: StreamRequest,
    shared: Arc<CaptureShared>,
    watcher: Arc<HotplugWatcher>,
    engine: Engine,
    consumer: Option<SharedConsumer>,
}

impl AudioCapture {
    /// Creates the facade. Pull backends get their capture thread here.
    pub fn new(backend: Arc<dyn CaptureBackend>, config: CaptureConfiguration) -> Result<Self, CaptureError> {
        config.validate().map_err(CaptureError::ConfigurationFailed)?;

        let enumerator = DeviceEnumerator::new(Arc::clone(&backend));
        let shared = Arc::new(CaptureShared::new());
        let watcher = Arc::new(HotplugWatcher::new(Arc::clone(&shared), enumerator.clone()));
        let request = StreamRequest {
            sample_rate: config.requested_sample_rate,
            channels: config.requested_channels,
            buffer_frames: config.requested_buffer_frames(),
        };

        let engine = match backend.model() {
            CaptureModel::Pull => Engine::Pull(CaptureThread::spawn(
                Arc::clone(&backend),
                enumerator.clone(),
                Arc::clone(&shared),
                Arc::clone(&watcher),
                request,
                config.fill_timeout(),
                config.capture_wait(),
            )?),
            CaptureModel::Push => Engine::Push(PushEngine {
                gate: Arc::new(GenerationGate::new()),
                session: None,
                registration: None,
            }),
        };

        log::debug!(
            target: LOG_TARGET,
            "Audio capture initialized with the {} backend ({:?} model).",
            backend.name(),
            backend.model()
        );

        Ok(Self {
            backend,
            enumerator,
            config,
            request,
            shared,
            watcher,
            engine,
            consumer: None,
        })
    }

    pub fn set_delegate(&self, delegate: Arc<dyn CaptureDelegate>) {
        self.shared.set_delegate(Some(delegate));
    }

    pub fn config(&self) -> &CaptureConfiguration {
        &self.config
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Fresh device snapshot. Index `-1` is the implicit default entry.
    pub fn audio_device_list(&self) -> DeviceList {
        self.enumerator.list()
    }

    /// Starts capturing from `index` into `consumer`.
    ///
    /// An index not in the current snapshot selects the default device.
    /// Calling again with the same index and consumer while capturing does
    /// nothing. If the device cannot be opened the facade stays idle.
    pub fn start_recording(&mut self, consumer: SharedConsumer, index: i32) {
        let list = self.enumerator.list();
        let index = if list.contains_index(index) {
            index
        } else {
            log::debug!(
                target: LOG_TARGET,
                "Audio device index {} is not available, using default device.",
                index
            );
            DEFAULT_DEVICE_INDEX
        };

        let same_consumer = self
            .consumer
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, &consumer));
        if same_consumer && self.is_capturing() && self.shared.selection() == index {
            return;
        }

        self.stop_recording();
        self.shared.set_selection(index);
        self.consumer = Some(Arc::clone(&consumer));

        if let Engine::Pull(thread) = &mut self.engine {
            thread.start(consumer);
            return;
        }
        self.start_push(&consumer, &list);
    }

    /// Stops capturing. Safe to call when already stopped.
    pub fn stop_recording(&mut self) {
        match &mut self.engine {
            Engine::Pull(thread) => thread.stop(),
            Engine::Push(push) => {
                if push.session.is_none() && push.registration.is_none() {
                    return;
                }
                self.shared.set_capturing(false);
                self.shared.set_state(CaptureState::Stopping);
                push.gate.advance();
                if let Some(mut session) = push.session.take() {
                    session.close();
                }
                push.registration = None;
                self.shared.set_device_id(None);
                self.shared.set_state(CaptureState::Idle);
            }
        }
        self.shared.take_restart();
    }

    /// Cycles to the next device, visiting the default entry once per round.
    pub fn next_audio_device(&mut self) {
        let count = self.enumerator.list().len() as i32;
        let current = self.audio_device_index();
        let next = ((current + 2) % (count + 1)) - 1;
        self.switch_to(next);
    }

    pub fn audio_device_index(&self) -> i32 {
        self.shared.selection()
    }

    /// Selects a device and restarts capture on it if capture was started before.
    pub fn set_audio_device_index(&mut self, index: i32) {
        self.switch_to(index);
    }

    /// Display name of the current selection.
    ///
    /// The default selection is always "System Default"; an index that
    /// left the device list yields an empty name.
    pub fn audio_device_name(&self) -> String {
        let index = self.audio_device_index();
        if index == DEFAULT_DEVICE_INDEX {
            return SYSTEM_DEFAULT_NAME.to_string();
        }
        self.enumerator
            .list()
            .name_of(index)
            .unwrap_or_default()
            .to_string()
    }

    /// Called once per render frame before rendering.
    ///
    /// Pull backends drain the device into the consumer, waiting at most the
    /// fill timeout. Push backends already delivered their audio and only
    /// service pending hot-plug restarts here: without regular calls a push
    /// facade keeps its retired stream after a device change until the next
    /// call or an explicit start.
    pub fn fill_buffer(&mut self) {
        if let Engine::Pull(thread) = &self.engine {
            thread.fill_buffer();
            return;
        }
        if self.shared.is_capturing() && self.shared.restart_requested() {
            self.restart_push();
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.shared.is_capturing()
    }

    pub fn state(&self) -> CaptureState {
        self.shared.state()
    }

    /// Resolves the configured device against the current device list.
    pub fn initial_device_index(&self) -> i32 {
        self.initial_device().0
    }

    /// Configured device index with its device-list label. The default
    /// entry carries the backend's own label.
    pub fn initial_device(&self) -> (i32, String) {
        let list = self.enumerator.list();
        let index = self.config.device.resolve(&list);
        let name = list.name_of(index).unwrap_or_default().to_string();
        (index, name)
    }

    /// Starts capturing from the configured device.
    pub fn start_from_config(&mut self, consumer: SharedConsumer) {
        let (index, name) = self.initial_device();
        log::info!(target: LOG_TARGET, "Recording audio from device \"{}\" (ID {}).", name, index);
        self.start_recording(consumer, index);
    }

    fn switch_to(&mut self, index: i32) {
        match self.consumer.clone() {
            Some(consumer) => {
                self.stop_recording();
                self.start_recording(consumer, index);
            }
            None => {
                let list = self.enumerator.list();
                let index = if list.contains_index(index) { index } else { DEFAULT_DEVICE_INDEX };
                self.shared.set_selection(index);
            }
        }

        let index = self.audio_device_index();
        let name = self.audio_device_name();
        log::info!(target: LOG_TARGET, "Switched to audio device \"{}\" (ID {}).", name, index);
        if let Some(delegate) = self.shared.delegate() {
            delegate.on_device_changed(index, &name);
        }
    }

    fn start_push(&mut self, consumer: &SharedConsumer, list: &DeviceList) {
        let Engine::Push(push) = &mut self.engine else {
            return;
        };

        let sink: Arc<dyn NotificationSink> = self.watcher.clone();
        push.registration = self
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

        self.shared.set_capturing(true);
        let tagged = push.gate.tag(Arc::clone(consumer));
        match CaptureSession::open_selected(
            self.backend.as_ref(),
            list,
            &self.shared,
            &self.request,
            &tagged,
            &sink,
            false,
        ) {
            Ok(session) => {
                push.session = Some(session);
                self.shared.set_state(CaptureState::Running);
            }
            Err(e) => {
                push.registration = None;
                self.shared.set_capturing(false);
                self.shared.report_error(&e);
            }
        }
    }

    fn restart_push(&mut self) {
        let Engine::Push(push) = &mut self.engine else {
            return;
        };
        let Some(consumer) = self.consumer.clone() else {
            return;
        };

        self.shared.take_restart();
        log::info!(target: LOG_TARGET, "Restarting audio capture after a device change.");
        self.shared.set_state(CaptureState::Restarting);
        push.gate.advance();
        if let Some(mut session) = push.session.take() {
            session.close();
        }

        let list = self.enumerator.list();
        let sink: Arc<dyn NotificationSink> = self.watcher.clone();
        let tagged = push.gate.tag(consumer);
        match CaptureSession::open_selected(
            self.backend.as_ref(),
            &list,
            &self.shared,
            &self.request,
            &tagged,
            &sink,
            true,
        ) {
            Ok(session) => {
                push.session = Some(session);
                self.shared.set_state(CaptureState::Running);
            }
            Err(e) => {
                push.registration = None;
                self.shared.set_capturing(false);
                self.shared.set_device_id(None);
                self.shared.set_state(CaptureState::Idle);
                self.shared.report_error(&e);
            }
        }
    }
}

impl Drop for AudioCapture {
    fn drop(&mut self) {
        self.stop_recording();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::simulated::SimulatedBackend;
    use crate::models::config::DeviceSelector;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::{Duration, Instant};

    const MODELS: [CaptureModel; 2] = [CaptureModel::Pull, CaptureModel::Push];

    fn config() -> CaptureConfiguration {
        CaptureConfiguration {
            capture_wait_ms: 250,
            ..CaptureConfiguration::default()
        }
    }

    /// Speakers (loopback, index 0) and Microphone (index 1).
    fn backend(model: CaptureModel) -> Arc<SimulatedBackend> {
        let backend = SimulatedBackend::new(model);
        backend.add_device("spk", "Speakers (loopback)", true);
        backend.add_device("mic", "Microphone", false);
        backend
    }

    fn facade(backend: &Arc<SimulatedBackend>) -> AudioCapture {
        AudioCapture::new(backend.clone(), config()).unwrap()
    }

    fn samples_consumer() -> (SharedConsumer, Arc<Mutex<Vec<f32>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        let consumer: SharedConsumer = Arc::new(move |samples: &[f32], _: usize, _: u16| {
            sink.lock().extend_from_slice(samples);
        });
        (consumer, received)
    }

    fn noop_consumer() -> SharedConsumer {
        Arc::new(|_: &[f32], _: usize, _: u16| {})
    }

    /// Pumps frames until `done` holds or two seconds pass.
    fn fill_until(capture: &mut AudioCapture, mut done: impl FnMut(&AudioCapture) -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            capture.fill_buffer();
            if done(capture) {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[derive(Default)]
    struct RecordingDelegate {
        states: Mutex<Vec<CaptureState>>,
        devices: Mutex<Vec<(i32, String)>>,
        errors: AtomicUsize,
    }

    impl CaptureDelegate for RecordingDelegate {
        fn on_state_changed(&self, state: CaptureState) {
            self.states.lock().push(state);
        }

        fn on_device_changed(&self, index: i32, name: &str) {
            self.devices.lock().push((index, name.to_string()));
        }

        fn on_error(&self, _error: &CaptureError) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn start_reports_requested_or_default_index() {
        for model in MODELS {
            let backend = backend(model);
            let mut capture = facade(&backend);

            for index in [-1, 0, 1] {
                capture.start_recording(noop_consumer(), index);
                assert_eq!(capture.audio_device_index(), index, "{:?}", model);
                assert!(capture.is_capturing());
            }

            capture.start_recording(noop_consumer(), 2);
            assert_eq!(capture.audio_device_index(), -1);
            capture.start_recording(noop_consumer(), -7);
            assert_eq!(capture.audio_device_index(), -1);
        }
    }

    #[test]
    fn next_device_cycles_through_default() {
        for model in MODELS {
            let backend = backend(model);
            let mut capture = facade(&backend);
            capture.start_recording(noop_consumer(), -1);

            capture.next_audio_device();
            assert_eq!(capture.audio_device_index(), 0);
            capture.next_audio_device();
            assert_eq!(capture.audio_device_index(), 1);
            capture.next_audio_device();
            assert_eq!(capture.audio_device_index(), -1);
            assert!(capture.is_capturing());
        }
    }

    #[test]
    fn next_device_closes_cycle_from_any_start() {
        let backend = backend(CaptureModel::Push);
        backend.add_device("line", "Line In", false);
        let mut capture = facade(&backend);
        let count = capture.audio_device_list().len();

        for start in -1..count as i32 {
            capture.start_recording(noop_consumer(), start);
            for _ in 0..=count {
                capture.next_audio_device();
            }
            assert_eq!(capture.audio_device_index(), start);
        }
    }

    #[test]
    fn name_and_index_selection_agree() {
        let backend = backend(CaptureModel::Pull);
        let capture = facade(&backend);
        let list = capture.audio_device_list();

        for device in list.iter() {
            let by_name = DeviceSelector::Name(device.name.clone()).resolve(&list);
            let by_index = DeviceSelector::Index(device.index).resolve(&list);
            assert_eq!(by_name, by_index);
        }
        assert_eq!(DeviceSelector::parse("Microphone").resolve(&list), 1);
    }

    #[test]
    fn unknown_selection_falls_back_to_default() {
        let backend = backend(CaptureModel::Push);
        let mut capture = AudioCapture::new(
            backend.clone(),
            CaptureConfiguration {
                device: DeviceSelector::Name("microphone".into()),
                ..config()
            },
        )
        .unwrap();

        assert_eq!(capture.initial_device_index(), -1);
        capture.start_from_config(noop_consumer());
        assert_eq!(capture.audio_device_index(), -1);
        assert!(capture.is_capturing());
    }

    #[test]
    fn configured_name_starts_matching_device() {
        let backend = backend(CaptureModel::Pull);
        let mut capture = AudioCapture::new(
            backend.clone(),
            CaptureConfiguration {
                device: DeviceSelector::Name("Microphone".into()),
                ..config()
            },
        )
        .unwrap();

        capture.start_from_config(noop_consumer());

        assert_eq!(capture.audio_device_index(), 1);
        assert_eq!(capture.audio_device_name(), "Microphone");
        assert_eq!(backend.opened_devices(), vec!["mic".to_string()]);
    }

    #[test]
    fn initial_default_device_uses_list_label() {
        let pull = facade(&backend(CaptureModel::Pull));
        assert_eq!(
            pull.initial_device(),
            (-1, "System Default Playback Device".to_string())
        );

        let push = facade(&backend(CaptureModel::Push));
        assert_eq!(push.initial_device(), (-1, "Default capturing device".to_string()));

        let named = AudioCapture::new(
            backend(CaptureModel::Pull),
            CaptureConfiguration {
                device: DeviceSelector::Name("Microphone".into()),
                ..config()
            },
        )
        .unwrap();
        assert_eq!(named.initial_device(), (1, "Microphone".to_string()));
    }

    #[test]
    fn fill_buffer_after_stop_is_noop() {
        for model in MODELS {
            let backend = backend(model);
            let mut capture = facade(&backend);
            capture.start_recording(noop_consumer(), 0);
            capture.stop_recording();

            let start = Instant::now();
            for _ in 0..10 {
                capture.fill_buffer();
            }
            assert!(start.elapsed() < Duration::from_millis(50));
            assert!(!capture.is_capturing());
            assert_eq!(backend.open_stream_count(), 0);
        }
    }

    #[test]
    fn double_stop_is_harmless() {
        for model in MODELS {
            let backend = backend(model);
            let mut capture = facade(&backend);
            capture.stop_recording();
            capture.start_recording(noop_consumer(), 1);

            let start = Instant::now();
            capture.stop_recording();
            capture.stop_recording();

            assert!(start.elapsed() < Duration::from_secs(1));
            assert_eq!(capture.state(), CaptureState::Idle);
            assert_eq!(backend.notification_sink_count(), 0);
        }
    }

    #[test]
    fn pull_delivers_queued_audio_in_order_and_skips_silence() {
        let backend = backend(CaptureModel::Pull);
        let mut capture = facade(&backend);
        let (consumer, received) = samples_consumer();
        capture.start_recording(consumer, 1);

        backend.push_audio("mic", &[0.1, 0.2, 0.3, 0.4], false);
        backend.push_audio("mic", &[0.0; 4], true);
        backend.push_audio("mic", &[0.5, 0.6], false);

        assert!(fill_until(&mut capture, |_| received.lock().len() == 6));
        let samples = received.lock().clone();
        let expected: [f32; 6] = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6];
        for (got, want) in samples.iter().zip(expected) {
            approx::assert_relative_eq!(*got, want);
        }
    }

    #[test]
    fn pull_drains_on_capture_wait_without_fill_buffer() {
        let backend = backend(CaptureModel::Pull);
        let config = CaptureConfiguration {
            capture_wait_ms: 50,
            ..CaptureConfiguration::default()
        };
        let mut capture = AudioCapture::new(backend.clone(), config).unwrap();
        let (consumer, received) = samples_consumer();
        capture.start_recording(consumer, 1);

        backend.push_audio("mic", &[0.1, 0.2, 0.3, 0.4], false);

        let deadline = Instant::now() + Duration::from_secs(2);
        while received.lock().len() < 4 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(received.lock().len(), 4);
        assert_eq!(backend.queued_packets("mic"), 0);
    }

    #[test]
    fn push_delivers_without_fill_buffer() {
        let backend = backend(CaptureModel::Push);
        let mut capture = facade(&backend);
        let (consumer, received) = samples_consumer();
        capture.start_recording(consumer, 0);

        backend.push_audio("spk", &[0.25; 4], false);
        assert_eq!(received.lock().len(), 4);

        capture.stop_recording();
        backend.push_audio("spk", &[0.25; 4], false);
        assert_eq!(received.lock().len(), 4);
    }

    #[test]
    fn repeated_start_is_idempotent() {
        for model in MODELS {
            let backend = backend(model);
            let mut capture = facade(&backend);
            let consumer = noop_consumer();

            capture.start_recording(Arc::clone(&consumer), 1);
            capture.start_recording(Arc::clone(&consumer), 1);

            assert_eq!(backend.opened_devices().len(), 1);
            assert_eq!(backend.open_stream_count(), 1);
        }
    }

    #[test]
    fn open_failure_leaves_facade_idle() {
        for model in MODELS {
            let backend = backend(model);
            backend.fail_open("mic", true);
            let delegate = Arc::new(RecordingDelegate::default());
            let mut capture = facade(&backend);
            capture.set_delegate(delegate.clone());

            capture.start_recording(noop_consumer(), 1);

            assert!(!capture.is_capturing());
            assert_eq!(delegate.errors.load(Ordering::SeqCst), 1);
            assert_eq!(backend.open_stream_count(), 0);
            capture.fill_buffer();
        }
    }

    #[test]
    fn removed_device_restarts_on_default_without_gap() {
        for model in MODELS {
            let backend = backend(model);
            let mut capture = facade(&backend);
            capture.start_recording(noop_consumer(), 0);
            assert_eq!(backend.opened_devices(), vec!["spk".to_string()]);

            backend.unplug("spk");
            assert!(capture.is_capturing());

            let restarted = fill_until(&mut capture, |c| {
                c.state() == CaptureState::Running && backend.opened_devices().len() == 2
            });
            assert!(restarted, "{:?}", model);
            assert_eq!(capture.audio_device_index(), -1);
            assert!(capture.is_capturing());
            assert_eq!(backend.opened_devices()[1], "mic");
            assert_eq!(backend.open_stream_count(), 1);
        }
    }

    #[test]
    fn unrelated_device_removal_keeps_stream() {
        for model in MODELS {
            let backend = backend(model);
            backend.add_device("line", "Line In", false);
            let mut capture = facade(&backend);
            capture.start_recording(noop_consumer(), 2);

            backend.unplug("mic");
            for _ in 0..5 {
                capture.fill_buffer();
            }

            assert_eq!(capture.audio_device_index(), 1);
            assert_eq!(capture.audio_device_name(), "Line In");
            assert_eq!(backend.opened_devices(), vec!["line".to_string()]);
        }
    }

    #[test]
    fn explicit_selection_ignores_default_change() {
        for model in MODELS {
            let backend = backend(model);
            backend.add_device("hdmi", "HDMI Output", true);
            let mut capture = facade(&backend);
            capture.start_recording(noop_consumer(), 2);

            backend.switch_default_render("hdmi");
            for _ in 0..5 {
                capture.fill_buffer();
            }

            assert_eq!(backend.opened_devices().len(), 1);
        }
    }

    #[test]
    fn default_selection_follows_default_render_change() {
        for model in MODELS {
            let backend = backend(model);
            backend.add_device("hdmi", "HDMI Output", true);
            let mut capture = facade(&backend);
            capture.start_recording(noop_consumer(), -1);

            backend.switch_default_render("hdmi");

            assert!(fill_until(&mut capture, |_| backend.opened_devices().len() == 2));
            assert_eq!(backend.opened_devices()[1], "hdmi");
            assert_eq!(capture.audio_device_index(), -1);
        }
    }

    #[test]
    fn default_name_and_out_of_range_name() {
        let backend = backend(CaptureModel::Push);
        let mut capture = facade(&backend);

        assert_eq!(capture.audio_device_name(), "System Default");
        capture.set_audio_device_index(1);
        assert_eq!(capture.audio_device_name(), "Microphone");

        backend.set_device_active("spk", false);
        assert_eq!(capture.audio_device_name(), "");
    }

    #[test]
    fn switching_notifies_delegate() {
        let backend = backend(CaptureModel::Pull);
        let delegate = Arc::new(RecordingDelegate::default());
        let mut capture = facade(&backend);
        capture.set_delegate(delegate.clone());
        capture.start_recording(noop_consumer(), -1);

        capture.next_audio_device();
        capture.set_audio_device_index(1);

        let devices = delegate.devices.lock().clone();
        assert_eq!(
            devices,
            vec![(0, "Speakers (loopback)".to_string()), (1, "Microphone".to_string())]
        );
        assert!(delegate.states.lock().contains(&CaptureState::Running));
    }

    #[test]
    fn concurrent_hotplug_and_manual_switch_do_not_deadlock() {
        for model in MODELS {
            let backend = backend(model);
            backend.add_device("line", "Line In", false);
            let mut capture = facade(&backend);
            capture.start_recording(noop_consumer(), 1);

            let plugger = {
                let backend = Arc::clone(&backend);
                thread::spawn(move || {
                    for _ in 0..20 {
                        backend.unplug("mic");
                        thread::sleep(Duration::from_millis(1));
                        backend.replug("mic");
                    }
                })
            };

            let start = Instant::now();
            for _ in 0..20 {
                capture.next_audio_device();
                capture.fill_buffer();
            }
            plugger.join().unwrap();
            capture.stop_recording();

            assert!(start.elapsed() < Duration::from_secs(20));
            assert!(capture.audio_device_list().contains_index(capture.audio_device_index()));
            assert_eq!(backend.open_stream_count(), 0);
        }
    }
}
