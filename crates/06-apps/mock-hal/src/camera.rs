//! Scripted capture device.

use device_abi::{
    CameraHook, CaptureConfig, CaptureDevice, CapturedFrame, DeviceError, FrameDescriptor,
    InitOutcome, PixelFormat,
};
use parking_lot::Mutex;
use std::sync::Arc;

/// Handle for firing capture-complete events from a test bench, standing in
/// for the sensor's frame ISR.
#[derive(Clone)]
pub struct CameraTrigger {
    hook: Arc<Mutex<Option<CameraHook>>>,
}

impl CameraTrigger {
    /// Fires one capture-complete event; errors if the device has not been
    /// initialized or the previous event is still in flight.
    pub fn frame_ready(&self) -> Result<(), DeviceError> {
        let guard = self.hook.lock();
        let hook = guard.as_ref().ok_or(DeviceError::op("camera not initialized"))?;
        hook.frame_ready()
            .map_err(|err| DeviceError::op(err.to_string()))
    }
}

/// A capture device producing frames from a script.
pub struct ScriptedCamera {
    config: CaptureConfig,
    format: PixelFormat,
    frames: Vec<Arc<[u8]>>,
    cursor: usize,
    enqueues: Arc<Mutex<usize>>,
    hook: Arc<Mutex<Option<CameraHook>>>,
    deinit_log: Option<(Arc<Mutex<Vec<u8>>>, u8)>,
}

impl ScriptedCamera {
    /// A camera with the given geometry producing `frames` round-robin.
    pub fn new(descriptor: FrameDescriptor, frames: Vec<Vec<u8>>) -> Self {
        let format = descriptor.src_format;
        Self {
            config: CaptureConfig { frame: descriptor },
            format,
            frames: frames.into_iter().map(Arc::from).collect(),
            cursor: 0,
            enqueues: Arc::new(Mutex::new(0)),
            hook: Arc::new(Mutex::new(None)),
            deinit_log: None,
        }
    }

    /// Records `tag` into `log` on deinit, for shutdown-order assertions.
    pub fn with_deinit_log(mut self, log: Arc<Mutex<Vec<u8>>>, tag: u8) -> Self {
        self.deinit_log = Some((log, tag));
        self
    }

    /// The trigger handle standing in for the capture ISR.
    pub fn trigger(&self) -> CameraTrigger {
        CameraTrigger {
            hook: Arc::clone(&self.hook),
        }
    }

    /// How many buffers have been recycled via `enqueue`.
    pub fn enqueue_count(&self) -> Arc<Mutex<usize>> {
        Arc::clone(&self.enqueues)
    }
}

impl CaptureDevice for ScriptedCamera {
    fn name(&self) -> &str {
        "scripted-camera"
    }

    fn config(&self) -> &CaptureConfig {
        &self.config
    }

    fn init(&mut self, hook: CameraHook) -> Result<InitOutcome, DeviceError> {
        *self.hook.lock() = Some(hook);
        Ok(InitOutcome::Ready)
    }

    fn deinit(&mut self) -> Result<(), DeviceError> {
        *self.hook.lock() = None;
        if let Some((log, tag)) = &self.deinit_log {
            log.lock().push(*tag);
        }
        Ok(())
    }

    fn start(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }

    fn stop(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }

    fn dequeue(&mut self) -> Result<CapturedFrame, DeviceError> {
        if self.frames.is_empty() {
            return Err(DeviceError::op("no scripted frames"));
        }
        let frame = Arc::clone(&self.frames[self.cursor % self.frames.len()]);
        self.cursor += 1;
        Ok(CapturedFrame {
            data: frame,
            format: self.format,
        })
    }

    fn enqueue(&mut self, _frame: Option<CapturedFrame>) -> Result<(), DeviceError> {
        *self.enqueues.lock() += 1;
        Ok(())
    }
}
