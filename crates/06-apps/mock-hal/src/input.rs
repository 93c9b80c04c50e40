//! Push-button style input device.

use device_abi::{
    DeliveryScope, DeviceError, FrameworkRequest, InputDevice, InputHook, ReceiverMask,
};
use parking_lot::Mutex;
use std::sync::Arc;

/// Handle for injecting events from a test bench or shell thread.
#[derive(Clone)]
pub struct InputInjector {
    hook: Arc<Mutex<Option<InputHook>>>,
}

impl InputInjector {
    fn with_hook<R>(
        &self,
        f: impl FnOnce(&InputHook) -> Result<R, device_abi::HookError>,
    ) -> Result<R, DeviceError> {
        let guard = self.hook.lock();
        let hook = guard.as_ref().ok_or(DeviceError::op("input not initialized"))?;
        f(hook).map_err(|err| DeviceError::op(err.to_string()))
    }

    /// Injects a raw event for fan-out to the masked managers.
    pub fn recv(
        &self,
        receivers: ReceiverMask,
        data: Arc<[u8]>,
        copy: bool,
        scope: DeliveryScope,
    ) -> Result<(), DeviceError> {
        self.with_hook(|hook| hook.recv(receivers, data, copy, scope))
    }

    /// Injects one microphone block.
    pub fn audio(&self, data: Arc<[u8]>) -> Result<(), DeviceError> {
        self.with_hook(|hook| hook.audio(data))
    }

    /// Injects a framework query.
    pub fn framework(&self, request: FrameworkRequest) -> Result<(), DeviceError> {
        self.with_hook(|hook| hook.framework(request))
    }
}

/// An input device whose events come from an [`InputInjector`].
pub struct PushInput {
    hook: Arc<Mutex<Option<InputHook>>>,
}

impl PushInput {
    /// A new, un-initialized device.
    pub fn new() -> Self {
        Self {
            hook: Arc::new(Mutex::new(None)),
        }
    }

    /// The injection handle.
    pub fn injector(&self) -> InputInjector {
        InputInjector {
            hook: Arc::clone(&self.hook),
        }
    }
}

impl Default for PushInput {
    fn default() -> Self {
        Self::new()
    }
}

impl InputDevice for PushInput {
    fn name(&self) -> &str {
        "push-input"
    }

    fn init(&mut self, hook: InputHook) -> Result<(), DeviceError> {
        *self.hook.lock() = Some(hook);
        Ok(())
    }

    fn deinit(&mut self) -> Result<(), DeviceError> {
        *self.hook.lock() = None;
        Ok(())
    }

    fn start(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }

    fn stop(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }
}
