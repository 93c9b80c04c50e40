//! Minimal output device.

use device_abi::{DeviceError, OutputDevice, OutputDeviceType, OutputHook};

/// An output device with no behavior of its own; pair it with an event
/// handler to observe routed results.
pub struct NullOutput {
    name: &'static str,
    device_type: OutputDeviceType,
}

impl NullOutput {
    /// A named device of the given type.
    pub fn new(name: &'static str, device_type: OutputDeviceType) -> Self {
        Self { name, device_type }
    }
}

impl OutputDevice for NullOutput {
    fn name(&self) -> &str {
        self.name
    }

    fn device_type(&self) -> OutputDeviceType {
        self.device_type
    }

    fn init(&mut self, _hook: OutputHook) -> Result<(), DeviceError> {
        Ok(())
    }

    fn deinit(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }

    fn start(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }

    fn stop(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }
}
