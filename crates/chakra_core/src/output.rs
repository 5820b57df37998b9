//! Output Backend Abstraction
//!
//! An [`OutputBackend`] knows how to open an output context; the context is
//! the long-lived sink the renderer plays into. The engine opens one context
//! on its first start and keeps it across stop/start cycles, only suspending
//! and resuming it.
//!
//! Contexts are created and used on the engine's control thread, so they do
//! not need to be `Send` (a cpal stream is not on every platform).

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::StreamConfig;
use crate::error::{EngineError, EngineResult};
use crate::graph::StereoRenderer;

/// Running state of an output context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContextState {
    /// Open but not pulling audio
    Suspended,
    /// Pulling audio from the renderer
    Running,
}

/// Factory for output contexts
pub trait OutputBackend: Send + 'static {
    /// Human-readable backend name for logs
    fn name(&self) -> &'static str;

    /// Open a context that plays `renderer`. The context starts suspended.
    fn open(
        &mut self,
        config: &StreamConfig,
        renderer: StereoRenderer,
    ) -> EngineResult<Box<dyn OutputContext>>;
}

/// An open output sink
pub trait OutputContext {
    fn state(&self) -> ContextState;

    /// Start (or restart) pulling audio
    fn resume(&mut self) -> EngineResult<()>;

    /// Stop pulling audio but keep the context open
    fn suspend(&mut self) -> EngineResult<()>;

    /// Name of the device behind this context, if known
    fn device_name(&self) -> Option<String> {
        None
    }
}

/// Renders into memory instead of a device
///
/// Used by tests and for rendering without audio hardware. The paired
/// [`OfflineHandle`] pulls audio the way a device callback would.
pub struct OfflineBackend {
    device: Arc<Mutex<Option<OfflineDevice>>>,
}

struct OfflineDevice {
    renderer: StereoRenderer,
    state: ContextState,
}

/// Pull side of an [`OfflineBackend`]
#[derive(Clone)]
pub struct OfflineHandle {
    device: Arc<Mutex<Option<OfflineDevice>>>,
}

impl OfflineBackend {
    pub fn new() -> (Self, OfflineHandle) {
        let device = Arc::new(Mutex::new(None));
        (
            Self {
                device: Arc::clone(&device),
            },
            OfflineHandle { device },
        )
    }
}

impl OutputBackend for OfflineBackend {
    fn name(&self) -> &'static str {
        "offline"
    }

    fn open(
        &mut self,
        _config: &StreamConfig,
        renderer: StereoRenderer,
    ) -> EngineResult<Box<dyn OutputContext>> {
        let mut device = self.device.lock();
        if device.is_some() {
            return Err(EngineError::AudioUnavailable(
                "offline device already has an open context".into(),
            ));
        }
        *device = Some(OfflineDevice {
            renderer,
            state: ContextState::Suspended,
        });
        debug!("Offline output context opened");

        Ok(Box::new(OfflineContext {
            device: Arc::clone(&self.device),
        }))
    }
}

struct OfflineContext {
    device: Arc<Mutex<Option<OfflineDevice>>>,
}

impl OfflineContext {
    fn set_state(&mut self, state: ContextState) -> EngineResult<()> {
        match self.device.lock().as_mut() {
            Some(device) => {
                device.state = state;
                Ok(())
            }
            None => Err(EngineError::AudioUnavailable("offline device closed".into())),
        }
    }
}

impl OutputContext for OfflineContext {
    fn state(&self) -> ContextState {
        self.device
            .lock()
            .as_ref()
            .map_or(ContextState::Suspended, |d| d.state)
    }

    fn resume(&mut self) -> EngineResult<()> {
        self.set_state(ContextState::Running)
    }

    fn suspend(&mut self) -> EngineResult<()> {
        self.set_state(ContextState::Suspended)
    }

    fn device_name(&self) -> Option<String> {
        Some("offline".into())
    }
}

impl Drop for OfflineContext {
    fn drop(&mut self) {
        *self.device.lock() = None;
    }
}

impl OfflineHandle {
    /// Whether the engine has opened a context on this device
    pub fn is_open(&self) -> bool {
        self.device.lock().is_some()
    }

    pub fn state(&self) -> Option<ContextState> {
        self.device.lock().as_ref().map(|d| d.state)
    }

    /// Pull `frames` interleaved frames. A suspended or closed device yields silence.
    pub fn render(&self, frames: usize) -> Vec<f32> {
        let mut guard = self.device.lock();
        let channels = guard.as_ref().map_or(2, |d| d.renderer.channels());
        let mut buffer = vec![0.0; frames * channels];

        if let Some(device) = guard.as_mut() {
            if device.state == ContextState::Running {
                device.renderer.render(&mut buffer);
            }
        }
        buffer
    }
}
