//! Audio Stream Management
//!
//! cpal implementation of the output backend: one output stream on the
//! default device, built once and then paused/played across the engine's
//! stop/start cycles.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig as CpalStreamConfig};
use crossbeam_channel::Sender;
use tracing::{debug, error, info, warn};

use crate::config::StreamConfig;
use crate::error::{EngineError, EngineResult};
use crate::graph::StereoRenderer;
use crate::message::Event;
use crate::output::{ContextState, OutputBackend, OutputContext};

/// Plays through the system's default output device
pub struct CpalBackend {
    /// Stream errors reported from the audio thread
    event_sender: Option<Sender<Event>>,
}

impl CpalBackend {
    pub fn new() -> Self {
        Self { event_sender: None }
    }

    /// Forward device errors (e.g. unplugged headphones) as engine events
    pub(crate) fn with_events(mut self, sender: Sender<Event>) -> Self {
        self.event_sender = Some(sender);
        self
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputBackend for CpalBackend {
    fn name(&self) -> &'static str {
        "cpal"
    }

    fn open(
        &mut self,
        config: &StreamConfig,
        mut renderer: StereoRenderer,
    ) -> EngineResult<Box<dyn OutputContext>> {
        config.validate().map_err(EngineError::ConfigError)?;

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| EngineError::AudioUnavailable("No output device found".into()))?;
        let device_name = device.name().ok();

        let cpal_config = CpalStreamConfig {
            channels: config.channels,
            sample_rate: cpal::SampleRate(config.sample_rate),
            buffer_size: cpal::BufferSize::Fixed(config.buffer_size),
        };

        let err_sender = self.event_sender.clone();

        let stream = device
            .build_output_stream(
                &cpal_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    // Real-time audio callback - NO allocations allowed here
                    renderer.render(data);
                },
                move |err| {
                    error!("Output stream error: {}", err);
                    if let Some(sender) = err_sender.as_ref() {
                        let _ = sender.try_send(Event::error(err));
                    }
                },
                None, // No timeout
            )
            .map_err(|e| EngineError::AudioUnavailable(e.to_string()))?;

        // Some hosts start streams immediately; hold it until resume()
        if let Err(e) = stream.pause() {
            debug!("Could not pause new stream: {}", e);
        }

        info!(
            "Output stream built on {:?} ({} Hz, {} ch, {} frames)",
            device_name, config.sample_rate, config.channels, config.buffer_size
        );

        Ok(Box::new(CpalContext {
            stream,
            state: ContextState::Suspended,
            device_name,
        }))
    }
}

/// A built cpal output stream
struct CpalContext {
    stream: Stream,
    state: ContextState,
    device_name: Option<String>,
}

impl OutputContext for CpalContext {
    fn state(&self) -> ContextState {
        self.state
    }

    fn resume(&mut self) -> EngineResult<()> {
        self.stream
            .play()
            .map_err(|e| EngineError::AudioUnavailable(e.to_string()))?;
        self.state = ContextState::Running;
        Ok(())
    }

    fn suspend(&mut self) -> EngineResult<()> {
        if let Err(e) = self.stream.pause() {
            // Not every host can pause; the renderer is already silent
            warn!("Failed to pause output stream: {}", e);
            return Err(EngineError::StreamPlayError(e.to_string()));
        }
        self.state = ContextState::Suspended;
        Ok(())
    }

    fn device_name(&self) -> Option<String> {
        self.device_name.clone()
    }
}
