//! Binaural Engine - Main Entry Point
//!
//! The engine owns the output context and the generator pair and keeps
//! them consistent with the parameters callers set.
//!
//! # Threads
//!
//! ```text
//!  callers ──commands──▶ control thread ──atomics──▶ audio callback
//!     ▲                       │                          │
//!     └──────events───────────┘                          └──rtrb──▶ spectrum tap
//! ```
//!
//! Every operation is a command processed in order on one control thread,
//! which is what keeps start, stop and retune from interleaving. `start`,
//! `apply_preset` and `get_state` wait for their answer, so they always see
//! the effect of everything issued before them.
//!
//! Consecutive queued retunes are collapsed into the last one (slider drags
//! only need the final value), but never reordered around other commands.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use chakra_dsp::{
    BinauralParameters, Channel, FrequencyPolicy, PresetCatalog, CUSTOM_OFFSET_ID,
};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::graph::{ChannelPair, StereoRenderer, ToneGraph};
use crate::message::{Command, EngineState, Event, Lifecycle, PresetRequest, PresetSelection};
use crate::output::{ContextState, OutputBackend, OutputContext};
use crate::stream::CpalBackend;
use crate::tap::SpectrumTap;

/// The binaural synthesis engine
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
pub struct BinauralEngine {
    /// Channel for sending commands to the control thread
    command_sender: Sender<Command>,

    /// Channel for receiving events from the engine
    event_receiver: Receiver<Event>,

    /// Handle to the control thread
    control_thread: Option<JoinHandle<()>>,

    /// Last state published by the control thread
    published: Arc<RwLock<EngineState>>,

    tap: Arc<SpectrumTap>,

    config: EngineConfig,
}

impl BinauralEngine {
    /// Create an engine playing through the default output device
    pub fn new() -> EngineResult<Self> {
        Self::with_config(EngineConfig::default())
    }

    /// Create an engine with custom configuration on the default output device
    pub fn with_config(config: EngineConfig) -> EngineResult<Self> {
        let (event_sender, event_receiver) = bounded(config.event_capacity.max(1));
        let backend = CpalBackend::new().with_events(event_sender.clone());
        Self::spawn(config, Box::new(backend), event_sender, event_receiver)
    }

    /// Create an engine on a custom output backend
    pub fn with_backend<B: OutputBackend>(config: EngineConfig, backend: B) -> EngineResult<Self> {
        let (event_sender, event_receiver) = bounded(config.event_capacity.max(1));
        Self::spawn(config, Box::new(backend), event_sender, event_receiver)
    }

    fn spawn(
        config: EngineConfig,
        backend: Box<dyn OutputBackend>,
        event_sender: Sender<Event>,
        event_receiver: Receiver<Event>,
    ) -> EngineResult<Self> {
        config.validate().map_err(EngineError::ConfigError)?;

        let (command_sender, command_receiver) = bounded::<Command>(config.command_capacity);
        let tap = Arc::new(SpectrumTap::new(
            config.stream.sample_rate as f32,
            config.spectrum_fps,
        )?);

        let policy = config.policy();
        let initial = policy.normalize(config.initial);
        let (left_hz, right_hz) = policy.frequencies(initial);
        let published = Arc::new(RwLock::new(EngineState {
            lifecycle: Lifecycle::Idle,
            left_hz,
            right_hz,
            beat_hz: (right_hz - left_hz).abs(),
            gain: config.default_gain,
            parameters: initial,
            selection: PresetSelection::default(),
        }));

        let thread_config = config.clone();
        let thread_tap = Arc::clone(&tap);
        let thread_published = Arc::clone(&published);

        let control_thread = thread::Builder::new()
            .name("chakra-control".into())
            .spawn(move || {
                // Built here: output contexts never leave this thread
                let controller = Controller::new(
                    thread_config,
                    backend,
                    thread_tap,
                    event_sender,
                    thread_published,
                );
                controller.run(command_receiver);
            })
            .map_err(|e| EngineError::StreamBuildError(e.to_string()))?;

        Ok(Self {
            command_sender,
            event_receiver,
            control_thread: Some(control_thread),
            published,
            tap,
            config,
        })
    }

    /// Start generating. Opens the output context on first use and resumes
    /// it if suspended. Does nothing if already running.
    pub fn start(&self) -> EngineResult<()> {
        let (reply, response) = bounded(1);
        let stopped = || EngineError::AudioUnavailable("engine control thread stopped".into());
        self.command_sender
            .send(Command::Start { reply })
            .map_err(|_| stopped())?;
        response.recv().map_err(|_| stopped())?
    }

    /// Stop generating. Safe to call when already stopped.
    pub fn stop(&self) {
        self.send_or_warn(Command::Stop);
    }

    /// Set base/carrier and offset directly. Live tones are retuned in place;
    /// while idle the values are kept for the next start. Clears the preset selection.
    pub fn retune(&self, params: BinauralParameters) {
        self.send_or_warn(Command::Retune(params));
    }

    /// Set a single channel's frequency, keeping the other channel where it is
    pub fn set_channel_frequency(&self, channel: Channel, hz: f32) {
        self.send_or_warn(Command::SetChannelFrequency { channel, hz });
    }

    /// Set the per-channel gain (0.0 - 1.0)
    pub fn set_gain(&self, gain: f32) {
        self.send_or_warn(Command::SetGain(gain));
    }

    /// Apply a chakra and/or offset preset by id.
    ///
    /// `custom_offset` updates the custom slot. Unknown ids fail with
    /// [`EngineError::PresetNotFound`] and change nothing.
    pub fn apply_preset(
        &self,
        chakra: Option<&str>,
        offset: Option<&str>,
        custom_offset: Option<f32>,
    ) -> EngineResult<()> {
        let request = PresetRequest {
            chakra: chakra.map(str::to_string),
            offset: offset.map(str::to_string),
            custom_offset,
        };
        let (reply, response) = bounded(1);
        self.send_command(Command::ApplyPreset { request, reply })?;
        response.recv().map_err(|_| EngineError::ChannelRecvError)?
    }

    /// Select a chakra, keeping the current offset
    pub fn select_chakra(&self, id: &str) -> EngineResult<()> {
        self.apply_preset(Some(id), None, None)
    }

    /// Select an offset preset, keeping the current base
    pub fn select_offset(&self, id: &str) -> EngineResult<()> {
        self.apply_preset(None, Some(id), None)
    }

    /// Set the custom offset slot and select it
    pub fn set_custom_offset(&self, hz: f32) -> EngineResult<()> {
        self.apply_preset(None, Some(CUSTOM_OFFSET_ID), Some(hz))
    }

    /// Return to the configured initial parameters and clear the selection
    pub fn reset(&self) {
        self.send_or_warn(Command::Reset);
    }

    /// Current state, including every command issued before this call.
    /// Falls back to the last published state if the control thread is gone.
    pub fn get_state(&self) -> EngineState {
        let (reply, response) = bounded(1);
        if self.command_sender.send(Command::GetState { reply }).is_ok() {
            if let Ok(state) = response.recv() {
                return state;
            }
        }
        self.published.read().clone()
    }

    /// Non-blocking view of the lifecycle as last published
    pub fn is_running(&self) -> bool {
        self.published.read().lifecycle == Lifecycle::Running
    }

    /// Request a StateUpdate event
    pub fn request_state(&self) -> EngineResult<()> {
        self.send_command(Command::RequestState)
    }

    /// Read-only spectrum output for visualizers
    pub fn spectrum_tap(&self) -> Arc<SpectrumTap> {
        Arc::clone(&self.tap)
    }

    /// Get next event (non-blocking)
    pub fn poll_event(&self) -> Option<Event> {
        self.event_receiver.try_recv().ok()
    }

    /// Get next event (blocking)
    pub fn wait_event(&self) -> Option<Event> {
        self.event_receiver.recv().ok()
    }

    /// Get current configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn send_command(&self, command: Command) -> EngineResult<()> {
        self.command_sender
            .send(command)
            .map_err(|_| EngineError::ChannelSendError)
    }

    fn send_or_warn(&self, command: Command) {
        if let Err(e) = self.send_command(command) {
            warn!("Command dropped: {}", e);
        }
    }
}

impl Drop for BinauralEngine {
    fn drop(&mut self) {
        let _ = self.command_sender.send(Command::Shutdown);

        // Wait for the control thread to release the output context
        if let Some(handle) = self.control_thread.take() {
            let _ = handle.join();
        }
    }
}

/// Treat any failure to get sound out as `AudioUnavailable`
fn unavailable(err: EngineError) -> EngineError {
    match err {
        EngineError::AudioUnavailable(_) => err,
        other => EngineError::AudioUnavailable(other.to_string()),
    }
}

/// State owned by the control thread
struct Controller {
    config: EngineConfig,
    policy: FrequencyPolicy,
    backend: Box<dyn OutputBackend>,
    /// Opened on first start, kept until shutdown
    context: Option<Box<dyn OutputContext>>,
    /// Present exactly while running
    channels: Option<ChannelPair>,
    /// Last applied parameters, already clamped
    params: BinauralParameters,
    gain: f32,
    catalog: PresetCatalog,
    selection: PresetSelection,
    graph: Arc<ToneGraph>,
    tap: Arc<SpectrumTap>,
    events: Sender<Event>,
    published: Arc<RwLock<EngineState>>,
}

impl Controller {
    fn new(
        config: EngineConfig,
        backend: Box<dyn OutputBackend>,
        tap: Arc<SpectrumTap>,
        events: Sender<Event>,
        published: Arc<RwLock<EngineState>>,
    ) -> Self {
        let policy = config.policy();
        Self {
            params: policy.normalize(config.initial),
            gain: config.default_gain,
            catalog: PresetCatalog::for_convention(config.convention, config.limits),
            policy,
            backend,
            context: None,
            channels: None,
            selection: PresetSelection::default(),
            graph: Arc::new(ToneGraph::new()),
            tap,
            events,
            published,
            config,
        }
    }

    fn run(mut self, commands: Receiver<Command>) {
        info!("Control thread started ({} backend)", self.backend.name());

        let mut pending: Option<Command> = None;
        loop {
            let command = match pending.take() {
                Some(command) => command,
                None => match commands.recv() {
                    Ok(command) => command,
                    Err(_) => {
                        warn!("Command channel disconnected");
                        break;
                    }
                },
            };

            let command = match command {
                Command::Retune(params) => {
                    let (latest, next) = coalesce_retunes(params, &commands);
                    pending = next;
                    Command::Retune(latest)
                }
                other => other,
            };

            if !self.handle(command) {
                break;
            }
        }

        self.stop();
        // Dropping the context closes the device
        self.context = None;
        info!("Control thread shutting down");
    }

    /// Returns false when the thread should exit
    fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Start { reply } => {
                let result = self.start();
                if let Err(e) = &result {
                    error!("Failed to start audio: {}", e);
                    self.emit(Event::error(e));
                }
                self.publish();
                let _ = reply.send(result);
                return true;
            }
            Command::Stop => self.stop(),
            Command::Retune(params) => {
                self.selection = PresetSelection::default();
                self.apply_parameters(params);
            }
            Command::SetChannelFrequency { channel, hz } => self.set_channel_frequency(channel, hz),
            Command::SetGain(gain) => self.set_gain(gain),
            Command::ApplyPreset { request, reply } => {
                let result = self.apply_preset(request);
                if let Err(e) = &result {
                    warn!("Preset rejected: {}", e);
                }
                self.publish();
                let _ = reply.send(result);
                return true;
            }
            Command::Reset => {
                debug!("Resetting to initial parameters");
                self.selection = PresetSelection::default();
                self.apply_parameters(self.config.initial);
            }
            Command::GetState { reply } => {
                let _ = reply.send(self.state());
                return true;
            }
            Command::RequestState => self.emit(Event::StateUpdate(self.state())),
            Command::Shutdown => {
                info!("Shutdown command received");
                return false;
            }
        }
        self.publish();
        true
    }

    fn start(&mut self) -> EngineResult<()> {
        if self.channels.is_some() {
            debug!("Engine already running");
            return Ok(());
        }

        let context = self.ensure_context()?;
        if context.state() == ContextState::Suspended {
            context.resume().map_err(unavailable)?;
        }

        let (left_hz, right_hz) = self.policy.frequencies(self.params);
        let pair = ChannelPair::new(left_hz, right_hz, self.gain);
        self.graph.activate(&pair);
        self.channels = Some(pair);

        info!(
            "Generators started: L {:.2} Hz / R {:.2} Hz (beat {:.2} Hz)",
            left_hz,
            right_hz,
            pair.beat()
        );
        self.emit(Event::Started { left_hz, right_hz });
        Ok(())
    }

    /// Open the output context once; later calls reuse it
    fn ensure_context(&mut self) -> EngineResult<&mut Box<dyn OutputContext>> {
        let context = match self.context.take() {
            Some(context) => context,
            None => {
                info!("Opening {} output context", self.backend.name());
                let renderer = StereoRenderer::new(
                    Arc::clone(&self.graph),
                    self.config.stream.sample_rate as f32,
                    self.config.stream.channels as usize,
                    Some(self.tap.connect()),
                )?;
                let context = self
                    .backend
                    .open(&self.config.stream, renderer)
                    .map_err(unavailable)?;
                if let Some(name) = context.device_name() {
                    info!("Output context ready on '{}'", name);
                }
                context
            }
        };
        Ok(self.context.insert(context))
    }

    fn stop(&mut self) {
        if self.channels.take().is_none() {
            debug!("Engine not running");
            return;
        }

        info!("Stopping generators");
        self.graph.deactivate();
        if let Some(context) = self.context.as_mut() {
            if let Err(e) = context.suspend() {
                warn!("Output context could not be suspended: {}", e);
            }
        }
        // Visualizers show silence once stopped
        self.tap.reset();
        self.emit(Event::Stopped);
    }

    fn apply_parameters(&mut self, params: BinauralParameters) {
        self.params = self.policy.normalize(params);
        let (left_hz, right_hz) = self.policy.frequencies(self.params);

        match self.channels.as_mut() {
            Some(pair) => {
                pair.retune(left_hz, right_hz);
                self.graph.set_frequencies(left_hz, right_hz);
                debug!("Retuned live pair to {:.2} / {:.2} Hz", left_hz, right_hz);
            }
            None => debug!("Pending pair set to {:.2} / {:.2} Hz", left_hz, right_hz),
        }
        self.emit(Event::Retuned { left_hz, right_hz });
    }

    fn set_channel_frequency(&mut self, channel: Channel, hz: f32) {
        let (left_hz, right_hz) = self.policy.frequencies(self.params);
        let params = match channel {
            Channel::Left => self.policy.parameters_for_pair(hz, right_hz),
            Channel::Right => self.policy.parameters_for_pair(left_hz, hz),
        };
        self.selection = PresetSelection::default();
        self.apply_parameters(params);
    }

    fn set_gain(&mut self, gain: f32) {
        self.gain = if gain.is_finite() { gain.clamp(0.0, 1.0) } else { 0.0 };
        if let Some(pair) = self.channels.as_mut() {
            pair.set_gain(self.gain);
            self.graph.set_gains(self.gain, self.gain);
        }
        debug!("Gain set to {:.2}", self.gain);
    }

    fn apply_preset(&mut self, request: PresetRequest) -> EngineResult<()> {
        // Resolve everything before touching any state
        let chakra = request
            .chakra
            .as_deref()
            .map(|id| self.catalog.chakra(id))
            .transpose()?;
        let offset = request
            .offset
            .as_deref()
            .map(|id| self.catalog.offset(id))
            .transpose()?;

        if let Some(hz) = request.custom_offset {
            let stored = self.catalog.set_custom_offset(hz);
            debug!("Custom offset set to {:.2} Hz", stored);
        }

        let mut params = self.params;
        let mut retune = false;
        if let Some(chakra) = chakra {
            params.base = chakra.frequency;
            self.selection.chakra = Some(chakra.id.to_string());
            if let Some(beat) = chakra.beat {
                // Carrier presets bring their own beat
                params.offset = beat;
                self.selection.offset = None;
            }
            retune = true;
        }
        match offset {
            Some(preset) if preset.id == CUSTOM_OFFSET_ID => {
                params.offset = self.catalog.custom_offset();
                self.selection.offset = Some(preset.id.to_string());
                retune = true;
            }
            Some(preset) => {
                params.offset = preset.value;
                self.selection.offset = Some(preset.id.to_string());
                retune = true;
            }
            None if request.custom_offset.is_some()
                && self.selection.offset.as_deref() == Some(CUSTOM_OFFSET_ID) =>
            {
                // Editing the custom value while it is selected
                params.offset = self.catalog.custom_offset();
                retune = true;
            }
            None => {}
        }

        if !retune {
            debug!("Preset request selected nothing");
            return Ok(());
        }

        info!(
            "Preset applied: chakra {:?}, offset {:?}",
            self.selection.chakra, self.selection.offset
        );
        self.emit(Event::PresetApplied(self.selection.clone()));
        self.apply_parameters(params);
        Ok(())
    }

    fn state(&self) -> EngineState {
        let (left_hz, right_hz) = match &self.channels {
            Some(pair) => pair.frequencies(),
            None => self.policy.frequencies(self.params),
        };
        EngineState {
            lifecycle: if self.channels.is_some() {
                Lifecycle::Running
            } else {
                Lifecycle::Idle
            },
            left_hz,
            right_hz,
            beat_hz: (right_hz - left_hz).abs(),
            gain: self.gain,
            parameters: self.params,
            selection: self.selection.clone(),
        }
    }

    fn publish(&self) {
        *self.published.write() = self.state();
    }

    fn emit(&self, event: Event) {
        // Nobody listening is fine; a full queue drops the event
        let _ = self.events.try_send(event);
    }
}

/// Collapse queued retunes into the last one. Returns the first
/// non-retune command found, which must be handled next.
fn coalesce_retunes(
    mut latest: BinauralParameters,
    commands: &Receiver<Command>,
) -> (BinauralParameters, Option<Command>) {
    let mut skipped = 0usize;
    let mut next = None;
    while let Ok(command) = commands.try_recv() {
        match command {
            Command::Retune(params) => {
                latest = params;
                skipped += 1;
            }
            other => {
                next = Some(other);
                break;
            }
        }
    }
    if skipped > 0 {
        debug!("Coalesced {} queued retunes", skipped);
    }
    (latest, next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{OfflineBackend, OfflineHandle};
    use chakra_dsp::PresetKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const EPS: f32 = 1e-3;

    fn offline_engine() -> (BinauralEngine, OfflineHandle) {
        offline_engine_with(EngineConfig::default())
    }

    fn offline_engine_with(config: EngineConfig) -> (BinauralEngine, OfflineHandle) {
        let (backend, handle) = OfflineBackend::new();
        let engine = BinauralEngine::with_backend(config, backend).unwrap();
        (engine, handle)
    }

    fn drain_events(engine: &BinauralEngine) -> Vec<Event> {
        std::iter::from_fn(|| engine.poll_event()).collect()
    }

    /// Backend that fails to open a given number of times, then delegates
    struct FlakyBackend {
        failures_left: usize,
        opens: Arc<AtomicUsize>,
        inner: OfflineBackend,
    }

    impl OutputBackend for FlakyBackend {
        fn name(&self) -> &'static str {
            "flaky"
        }

        fn open(
            &mut self,
            config: &crate::config::StreamConfig,
            renderer: StereoRenderer,
        ) -> EngineResult<Box<dyn OutputContext>> {
            if self.failures_left > 0 {
                self.failures_left -= 1;
                return Err(EngineError::NoDevicesFound);
            }
            self.opens.fetch_add(1, Ordering::SeqCst);
            self.inner.open(config, renderer)
        }
    }

    /// Backend whose context can never leave the suspended state
    struct StuckBackend;

    struct StuckContext;

    impl OutputContext for StuckContext {
        fn state(&self) -> ContextState {
            ContextState::Suspended
        }

        fn resume(&mut self) -> EngineResult<()> {
            Err(EngineError::StreamPlayError("resume needs a user gesture".into()))
        }

        fn suspend(&mut self) -> EngineResult<()> {
            Ok(())
        }
    }

    impl OutputBackend for StuckBackend {
        fn name(&self) -> &'static str {
            "stuck"
        }

        fn open(
            &mut self,
            _config: &crate::config::StreamConfig,
            _renderer: StereoRenderer,
        ) -> EngineResult<Box<dyn OutputContext>> {
            Ok(Box::new(StuckContext))
        }
    }

    #[test]
    fn test_engine_idle_initially() {
        let (engine, handle) = offline_engine();
        let state = engine.get_state();
        assert_eq!(state.lifecycle, Lifecycle::Idle);
        assert_eq!(state.left_hz, 440.0);
        assert_eq!(state.right_hz, 444.0);
        assert!((state.beat_hz - 4.0).abs() < EPS);
        assert!(state.selection.is_empty());
        assert!(!engine.is_running());
        // No context until the first start
        assert!(!handle.is_open());
    }

    #[test]
    fn test_start_with_defaults_then_stop() {
        let (engine, handle) = offline_engine();
        engine.start().unwrap();

        let state = engine.get_state();
        assert_eq!(state.lifecycle, Lifecycle::Running);
        assert!((state.beat_hz - 4.0).abs() < EPS);
        assert_eq!(state.gain, 0.3);
        assert!(engine.is_running());

        let audio = handle.render(512);
        assert!(audio.iter().any(|&s| s != 0.0));
        assert!(audio.iter().all(|&s| s.abs() <= 0.3 + 1e-6));

        engine.stop();
        let state = engine.get_state();
        assert_eq!(state.lifecycle, Lifecycle::Idle);
        assert!(handle.render(512).iter().all(|&s| s == 0.0));
        // Still answers after stopping
        let _ = engine.get_state();
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (engine, _handle) = offline_engine();
        engine.stop();
        engine.stop();
        assert_eq!(engine.get_state().lifecycle, Lifecycle::Idle);

        engine.start().unwrap();
        engine.stop();
        engine.stop();
        assert_eq!(engine.get_state().lifecycle, Lifecycle::Idle);

        let stops = drain_events(&engine)
            .into_iter()
            .filter(|e| matches!(e, Event::Stopped))
            .count();
        assert_eq!(stops, 1);
    }

    #[test]
    fn test_start_twice_is_noop() {
        let (engine, _handle) = offline_engine();
        engine.start().unwrap();
        engine.start().unwrap();
        assert!(engine.get_state().is_running());
        let starts = drain_events(&engine)
            .into_iter()
            .filter(|e| matches!(e, Event::Started { .. }))
            .count();
        assert_eq!(starts, 1);
    }

    #[test]
    fn test_live_retune_without_restart() {
        let (engine, handle) = offline_engine();
        engine.start().unwrap();
        drain_events(&engine);

        engine.retune(BinauralParameters::new(300.0, 5.0));
        let state = engine.get_state();
        assert_eq!(state.lifecycle, Lifecycle::Running);
        assert!((state.beat_hz - 5.0).abs() < EPS);

        engine.retune(BinauralParameters::new(300.0, 9.0));
        let state = engine.get_state();
        assert_eq!(state.lifecycle, Lifecycle::Running);
        assert!((state.beat_hz - 9.0).abs() < EPS);
        assert_eq!(state.left_hz, 300.0);

        let events = drain_events(&engine);
        assert!(!events.iter().any(|e| matches!(e, Event::Stopped | Event::Started { .. })));
        assert_eq!(handle.state(), Some(ContextState::Running));
    }

    #[test]
    fn test_retune_is_click_free() {
        let (engine, handle) = offline_engine();
        engine.retune(BinauralParameters::new(300.0, 5.0));
        engine.start().unwrap();
        let before = handle.render(300);

        engine.retune(BinauralParameters::new(300.0, 9.0));
        let _ = engine.get_state();
        let after = handle.render(300);

        // Largest step of a 309 Hz sine at gain 0.3 is about 0.012
        let mut samples: Vec<f32> = before.iter().step_by(2).copied().collect();
        samples.extend(after.iter().step_by(2));
        let mut right: Vec<f32> = before.iter().skip(1).step_by(2).copied().collect();
        right.extend(after.iter().skip(1).step_by(2));
        for channel in [samples, right] {
            let max_step = channel
                .windows(2)
                .map(|w| (w[1] - w[0]).abs())
                .fold(0.0_f32, f32::max);
            assert!(max_step < 0.02, "discontinuity of {max_step}");
        }
    }

    #[test]
    fn test_retune_while_idle_is_pending() {
        let (engine, handle) = offline_engine();
        engine.retune(BinauralParameters::new(300.0, 9.0));
        let state = engine.get_state();
        assert_eq!(state.lifecycle, Lifecycle::Idle);
        assert_eq!(state.left_hz, 300.0);
        assert!(!handle.is_open());

        engine.start().unwrap();
        let state = engine.get_state();
        assert_eq!(state.left_hz, 300.0);
        assert!((state.right_hz - 309.0).abs() < EPS);
    }

    #[test]
    fn test_apply_preset_round_trip() {
        let (engine, _handle) = offline_engine();
        engine.apply_preset(Some("heart"), Some("relax"), None).unwrap();

        let state = engine.get_state();
        let expected = FrequencyPolicy::default().frequencies(BinauralParameters::new(639.0, 6.0));
        assert_eq!((state.left_hz, state.right_hz), expected);
        assert_eq!(state.selection.chakra.as_deref(), Some("heart"));
        assert_eq!(state.selection.offset.as_deref(), Some("relax"));
    }

    #[test]
    fn test_unknown_preset_changes_nothing() {
        let (engine, _handle) = offline_engine();
        engine.apply_preset(Some("heart"), Some("relax"), None).unwrap();
        let before = engine.get_state();

        let err = engine
            .apply_preset(Some("nonexistent"), Some("focus"), Some(30.0))
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::PresetNotFound {
                kind: PresetKind::Chakra,
                id: "nonexistent".into()
            }
        );

        let err = engine.apply_preset(Some("crown"), Some("zen"), None).unwrap_err();
        assert!(matches!(err, EngineError::PresetNotFound { kind: PresetKind::Offset, .. }));

        assert_eq!(engine.get_state(), before);
        // The custom slot was not touched either
        engine.select_offset("custom").unwrap();
        assert!((engine.get_state().parameters.offset - 4.0).abs() < EPS);
    }

    #[test]
    fn test_chakra_and_offset_are_orthogonal() {
        let (engine, _handle) = offline_engine();
        engine.select_offset("relax").unwrap();
        let state = engine.get_state();
        assert_eq!(state.parameters, BinauralParameters::new(440.0, 6.0));
        assert_eq!(state.selection.chakra, None);

        engine.select_chakra("crown").unwrap();
        let state = engine.get_state();
        assert_eq!(state.parameters, BinauralParameters::new(963.0, 6.0));
        assert_eq!(state.selection.offset.as_deref(), Some("relax"));
    }

    #[test]
    fn test_manual_edit_clears_selection() {
        let (engine, _handle) = offline_engine();
        engine.apply_preset(Some("root"), Some("focus"), None).unwrap();
        engine.retune(BinauralParameters::new(500.0, 3.0));
        let state = engine.get_state();
        assert!(state.selection.is_empty());
        assert_eq!(state.parameters, BinauralParameters::new(500.0, 3.0));
    }

    #[test]
    fn test_set_channel_frequency() {
        let (engine, _handle) = offline_engine();
        engine.start().unwrap();
        engine.select_chakra("heart").unwrap();

        // Right channel moves, left stays: the beat follows
        engine.set_channel_frequency(Channel::Right, 649.0);
        let state = engine.get_state();
        assert_eq!(state.left_hz, 639.0);
        assert!((state.right_hz - 649.0).abs() < EPS);
        assert!((state.beat_hz - 10.0).abs() < EPS);
        assert!(state.selection.is_empty());

        engine.set_channel_frequency(Channel::Left, 645.0);
        let state = engine.get_state();
        assert_eq!(state.left_hz, 645.0);
        assert!((state.right_hz - 649.0).abs() < EPS);

        // Crossing over collapses to the minimum offset instead of flipping sides
        engine.set_channel_frequency(Channel::Left, 700.0);
        let state = engine.get_state();
        assert!(state.right_hz > state.left_hz);
        assert!((state.beat_hz - 0.1).abs() < EPS);
    }

    #[test]
    fn test_custom_offset() {
        let (engine, _handle) = offline_engine();
        engine.set_custom_offset(7.5).unwrap();
        let state = engine.get_state();
        assert!((state.parameters.offset - 7.5).abs() < EPS);
        assert_eq!(state.selection.offset.as_deref(), Some("custom"));

        // Editing the slot while it is selected retunes
        engine.apply_preset(None, None, Some(12.0)).unwrap();
        assert!((engine.get_state().beat_hz - 12.0).abs() < EPS);

        // Clamped into the offset range
        engine.set_custom_offset(500.0).unwrap();
        assert!((engine.get_state().beat_hz - 50.0).abs() < EPS);

        // Editing the slot while another preset is selected only stores it
        engine.select_offset("meditate").unwrap();
        engine.apply_preset(None, None, Some(9.0)).unwrap();
        assert!((engine.get_state().beat_hz - 2.0).abs() < EPS);
        engine.select_offset("custom").unwrap();
        assert!((engine.get_state().beat_hz - 9.0).abs() < EPS);
    }

    #[test]
    fn test_boundary_clamping() {
        let (engine, _handle) = offline_engine();
        engine.retune(BinauralParameters::new(300.0, 0.05));
        assert!((engine.get_state().parameters.offset - 0.1).abs() < 1e-6);

        engine.retune(BinauralParameters::new(5000.0, 4.0));
        let state = engine.get_state();
        assert_eq!(state.parameters.base, 2000.0);
        assert_eq!(state.left_hz, 2000.0);

        engine.retune(BinauralParameters::new(1.0, 4.0));
        let state = engine.get_state();
        assert!(state.left_hz >= 20.0 && state.right_hz >= 20.0);
    }

    #[test]
    fn test_carrier_half_engine() {
        let (engine, _handle) = offline_engine_with(EngineConfig::carrier_half());
        engine.start().unwrap();
        engine.retune(BinauralParameters::new(200.0, 10.0));
        let state = engine.get_state();
        assert_eq!(state.left_hz, 195.0);
        assert_eq!(state.right_hz, 205.0);
        assert!((state.beat_hz - 10.0).abs() < EPS);
    }

    #[test]
    fn test_carrier_chakra_brings_its_beat() {
        let (engine, _handle) = offline_engine_with(EngineConfig::carrier_half());
        engine.select_offset("focus").unwrap();
        engine.select_chakra("heart").unwrap();

        let state = engine.get_state();
        assert!((state.left_hz - 337.0).abs() < EPS);
        assert!((state.right_hz - 345.0).abs() < EPS);
        assert!((state.beat_hz - 8.0).abs() < EPS);
        assert_eq!(state.selection.chakra.as_deref(), Some("heart"));
        assert_eq!(state.selection.offset, None);

        // An explicit offset in the same request wins over the chakra's beat
        engine.apply_preset(Some("heart"), Some("relax"), None).unwrap();
        let state = engine.get_state();
        assert!((state.left_hz - 338.0).abs() < EPS);
        assert!((state.right_hz - 344.0).abs() < EPS);
        assert_eq!(state.selection.offset.as_deref(), Some("relax"));
    }

    #[test]
    fn test_empty_preset_request_is_silent() {
        let (engine, _handle) = offline_engine();
        engine.apply_preset(Some("heart"), Some("relax"), None).unwrap();
        let before = engine.get_state();
        drain_events(&engine);

        engine.apply_preset(None, None, None).unwrap();
        // Storing the custom value while another offset is selected
        engine.apply_preset(None, None, Some(9.0)).unwrap();

        let events = drain_events(&engine);
        assert!(!events
            .iter()
            .any(|e| matches!(e, Event::PresetApplied(_) | Event::Retuned { .. })));
        assert_eq!(engine.get_state(), before);
    }

    #[test]
    fn test_set_gain() {
        let (engine, handle) = offline_engine();
        engine.start().unwrap();
        engine.set_gain(0.1);
        assert_eq!(engine.get_state().gain, 0.1);
        assert!(handle.render(1024).iter().all(|&s| s.abs() <= 0.1 + 1e-6));

        engine.set_gain(4.0);
        assert_eq!(engine.get_state().gain, 1.0);
    }

    #[test]
    fn test_reset() {
        let (engine, _handle) = offline_engine();
        engine.apply_preset(Some("throat"), Some("alert"), None).unwrap();
        engine.reset();
        let state = engine.get_state();
        assert_eq!(state.parameters, BinauralParameters::new(440.0, 4.0));
        assert!(state.selection.is_empty());
    }

    #[test]
    fn test_audio_unavailable_is_retryable() {
        let opens = Arc::new(AtomicUsize::new(0));
        let (inner, handle) = OfflineBackend::new();
        let backend = FlakyBackend {
            failures_left: 1,
            opens: Arc::clone(&opens),
            inner,
        };
        let engine = BinauralEngine::with_backend(EngineConfig::default(), backend).unwrap();

        let err = engine.start().unwrap_err();
        assert!(matches!(err, EngineError::AudioUnavailable(_)));
        assert_eq!(engine.get_state().lifecycle, Lifecycle::Idle);
        assert!(drain_events(&engine)
            .iter()
            .any(|e| matches!(e, Event::Error { .. })));

        engine.start().unwrap();
        assert!(engine.get_state().is_running());
        assert!(handle.is_open());
        assert_eq!(opens.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_resume_failure_leaves_engine_idle() {
        let engine = BinauralEngine::with_backend(EngineConfig::default(), StuckBackend).unwrap();
        for _ in 0..2 {
            let err = engine.start().unwrap_err();
            assert!(matches!(err, EngineError::AudioUnavailable(_)));
            assert_eq!(engine.get_state().lifecycle, Lifecycle::Idle);
        }
    }

    #[test]
    fn test_context_reused_across_cycles() {
        let opens = Arc::new(AtomicUsize::new(0));
        let (inner, handle) = OfflineBackend::new();
        let backend = FlakyBackend {
            failures_left: 0,
            opens: Arc::clone(&opens),
            inner,
        };
        let engine = BinauralEngine::with_backend(EngineConfig::default(), backend).unwrap();

        for _ in 0..3 {
            engine.start().unwrap();
            assert_eq!(handle.state(), Some(ContextState::Running));
            engine.stop();
            let _ = engine.get_state();
            assert_eq!(handle.state(), Some(ContextState::Suspended));
        }
        assert_eq!(opens.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_rapid_retunes_end_on_last_value() {
        let (engine, _handle) = offline_engine();
        engine.start().unwrap();
        for i in 0..500 {
            engine.retune(BinauralParameters::new(200.0 + i as f32, 5.0));
        }
        let state = engine.get_state();
        assert_eq!(state.parameters.base, 699.0);
        assert!((state.beat_hz - 5.0).abs() < EPS);
    }

    #[test]
    fn test_concurrent_callers_see_whole_pairs() {
        let (engine, handle) = offline_engine();
        let engine = Arc::new(engine);
        let policy = FrequencyPolicy::default();

        thread::scope(|s| {
            for worker in 0..4 {
                let engine = Arc::clone(&engine);
                s.spawn(move || {
                    for i in 0..50 {
                        match (worker + i) % 4 {
                            0 => {
                                let _ = engine.start();
                            }
                            1 => engine.stop(),
                            2 => engine.retune(BinauralParameters::new(300.0 + i as f32, 1.0 + worker as f32)),
                            _ => {
                                let state = engine.get_state();
                                let expected = policy.realized_beat(state.parameters);
                                assert!((state.beat_hz - expected).abs() < EPS);
                            }
                        }
                    }
                });
            }
            s.spawn(|| {
                for _ in 0..50 {
                    let _ = handle.render(64);
                }
            });
        });

        let state = engine.get_state();
        assert!((state.beat_hz - policy.realized_beat(state.parameters)).abs() < EPS);
    }

    #[test]
    fn test_spectrum_tap_follows_output() {
        let (engine, handle) = offline_engine();
        engine.retune(BinauralParameters::new(375.0, 50.0));
        engine.start().unwrap();

        let tap = engine.spectrum_tap();
        let _ = handle.render(2048);
        assert!(tap.poll());

        let snapshot = tap.snapshot();
        assert!(snapshot.left.iter().any(|&v| v > 0.0));
        assert!(snapshot.right.iter().any(|&v| v > 0.0));
    }

    #[test]
    fn test_spectrum_silent_after_stop() {
        let (engine, handle) = offline_engine();
        engine.retune(BinauralParameters::new(375.0, 50.0));
        engine.start().unwrap();

        let tap = engine.spectrum_tap();
        let _ = handle.render(2048);
        assert!(tap.poll());
        assert!(tap.snapshot().left.iter().any(|&v| v > 0.0));

        engine.stop();
        let _ = engine.get_state();
        for _ in 0..50 {
            let _ = handle.render(512);
            tap.poll();
        }
        let snapshot = tap.snapshot();
        assert!(snapshot.left.iter().chain(snapshot.right.iter()).all(|&v| v == 0.0));

        // Playing again fills it back up
        engine.start().unwrap();
        let _ = handle.render(2048);
        assert!(tap.poll());
        assert!(tap.snapshot().right.iter().any(|&v| v > 0.0));
    }

    #[test]
    fn test_events() {
        let (engine, _handle) = offline_engine();
        engine.apply_preset(Some("sacral"), Some("meditate"), None).unwrap();
        engine.start().unwrap();
        engine.request_state().unwrap();
        let _ = engine.get_state();

        let events = drain_events(&engine);
        assert!(events.iter().any(|e| matches!(e, Event::PresetApplied(_))));
        assert!(events.iter().any(|e| matches!(
            e,
            Event::Started { left_hz, .. } if *left_hz == 417.0
        )));
        assert!(events.iter().any(|e| matches!(e, Event::StateUpdate(s) if s.is_running())));
    }

    #[test]
    fn test_drop_releases_context() {
        let (engine, handle) = offline_engine();
        engine.start().unwrap();
        assert!(handle.is_open());
        drop(engine);
        assert!(!handle.is_open());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let (backend, _handle) = OfflineBackend::new();
        let config = EngineConfig {
            default_gain: -1.0,
            ..Default::default()
        };
        let result = BinauralEngine::with_backend(config, backend);
        assert!(matches!(result, Err(EngineError::ConfigError(_))));
    }

    // Hardware-dependent tests
    #[test]
    #[ignore = "requires audio hardware"]
    fn test_engine_start_stop() {
        let engine = BinauralEngine::new().unwrap();
        engine.start().unwrap();
        thread::sleep(std::time::Duration::from_millis(300));
        assert!(engine.is_running());

        engine.select_chakra("heart").unwrap();
        thread::sleep(std::time::Duration::from_millis(300));

        engine.stop();
        assert!(!engine.get_state().is_running());
    }
}
