//! Framebuffer panel.

use device_abi::{
    BlitOutcome, DeviceError, DisplayCapability, DisplayDevice, DisplayHook, FrameBuffer,
    FrameDescriptor,
};
use parking_lot::Mutex;
use std::sync::Arc;

/// A display that copies every blitted frame into an inspectable panel
/// buffer.
pub struct PanelDisplay {
    cap: DisplayCapability,
    panel: FrameBuffer,
    blits: Arc<Mutex<usize>>,
}

impl PanelDisplay {
    /// A panel with the given geometry and a zeroed first framebuffer.
    pub fn new(descriptor: FrameDescriptor) -> Self {
        Self {
            cap: DisplayCapability {
                frame: descriptor,
                framebuffer: FrameBuffer::zeroed(descriptor.byte_len()),
            },
            panel: FrameBuffer::zeroed(descriptor.byte_len()),
            blits: Arc::new(Mutex::new(0)),
        }
    }

    /// The panel contents after the most recent blit.
    pub fn panel(&self) -> FrameBuffer {
        self.panel.clone()
    }

    /// Number of completed blits.
    pub fn blit_count(&self) -> Arc<Mutex<usize>> {
        Arc::clone(&self.blits)
    }
}

impl DisplayDevice for PanelDisplay {
    fn name(&self) -> &str {
        "panel-display"
    }

    fn cap(&self) -> &DisplayCapability {
        &self.cap
    }

    fn init(&mut self, _hook: DisplayHook) -> Result<(), DeviceError> {
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

    fn blit(&mut self, buffer: &FrameBuffer) -> Result<BlitOutcome, DeviceError> {
        let src = buffer.lock();
        let mut dst = self.panel.lock();
        let len = src.len().min(dst.len());
        dst[..len].copy_from_slice(&src[..len]);
        *self.blits.lock() += 1;
        Ok(BlitOutcome::Done)
    }
}
