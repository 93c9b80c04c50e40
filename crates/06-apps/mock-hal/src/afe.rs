//! Pass-through acoustic front-end.

use device_abi::{AfeDevice, AfeHook, AudioStream, DeviceError, NotifyEvent};
use parking_lot::Mutex;
use std::sync::Arc;

/// A front-end that forwards blocks unmodified and optionally dumps them.
///
/// Stands in for the beamforming/echo-cancellation engine: the routing
/// contract (`Done` to the voice manager, `Dump` to the output manager) is
/// what the framework cares about.
pub struct PassThroughAfe {
    hook: Option<AfeHook>,
    dump_enabled: bool,
    feedback: Arc<Mutex<Vec<NotifyEvent>>>,
}

impl PassThroughAfe {
    /// A front-end without dumping.
    pub fn new() -> Self {
        Self {
            hook: None,
            dump_enabled: false,
            feedback: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Enables the dump path.
    pub fn with_dump(mut self) -> Self {
        self.dump_enabled = true;
        self
    }

    /// Feedback events the front-end has received.
    pub fn feedback(&self) -> Arc<Mutex<Vec<NotifyEvent>>> {
        Arc::clone(&self.feedback)
    }
}

impl Default for PassThroughAfe {
    fn default() -> Self {
        Self::new()
    }
}

impl AfeDevice for PassThroughAfe {
    fn name(&self) -> &str {
        "pass-through-afe"
    }

    fn init(&mut self, hook: AfeHook) -> Result<(), DeviceError> {
        self.hook = Some(hook);
        Ok(())
    }

    fn deinit(&mut self) -> Result<(), DeviceError> {
        self.hook = None;
        Ok(())
    }

    fn start(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }

    fn run(&mut self, audio: &AudioStream) -> Result<(), DeviceError> {
        let hook = self.hook.as_ref().ok_or(DeviceError::op("not initialized"))?;
        hook.done(Arc::clone(&audio.data))
            .map_err(|err| DeviceError::op(err.to_string()))?;
        if self.dump_enabled {
            // Dump consumers lag; each dump gets its own allocation.
            hook.dump(Arc::from(&*audio.data))
                .map_err(|err| DeviceError::op(err.to_string()))?;
        }
        Ok(())
    }

    fn input_notify(&mut self, event: &NotifyEvent) -> Result<(), DeviceError> {
        self.feedback.lock().push(event.clone());
        Ok(())
    }
}
