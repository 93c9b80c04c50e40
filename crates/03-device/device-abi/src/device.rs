//! Device capability traits, one set per manager.
//!
//! Each manager requires a base capability set; optional capabilities are
//! default methods a driver may override. A driver that keeps the default
//! gets skipped the same way a null vtable slot used to be.

use crate::error::DeviceError;
use crate::hook::{
    AfeHook, CameraHook, DisplayHook, InputHook, MulticoreHook, OutputHook, VisionHook, VoiceHook,
};
use crate::message::{AsrResult, AudioDump, AudioStream, NotifyEvent, OverlaySurface};
use crate::query::DeviceConfigEntry;
use crate::surface::{FrameBuffer, FrameDescriptor, PixelFormat};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Maximum camera devices per manager.
pub const MAX_CAMERA_DEV: usize = 2;
/// Maximum display devices per manager.
pub const MAX_DISPLAY_DEV: usize = 2;
/// Maximum input devices per manager.
pub const MAX_INPUT_DEV: usize = 4;
/// Maximum output devices per manager.
pub const MAX_OUTPUT_DEV: usize = 4;
/// Maximum vision-algorithm devices per manager.
pub const MAX_VISION_ALGO_DEV: usize = 2;
/// Maximum voice-algorithm devices per manager.
pub const MAX_VOICE_ALGO_DEV: usize = 2;
/// Maximum audio-processing devices per manager.
pub const MAX_AFE_DEV: usize = 2;

/// Lifecycle state of a registered device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum DeviceState {
    /// Slot assigned, not yet initialized.
    Registered = 0,
    /// `init` completed (possibly asynchronously).
    Initialized = 1,
    /// `start` completed.
    Started = 2,
    /// `stop` completed.
    Stopped = 3,
    /// `deinit` completed.
    Deinitialized = 4,
}

/// Shared lifecycle state cell; devices reporting asynchronous init
/// completion flip it through their hook while the manager spin-waits.
pub struct StateCell(AtomicU8);

impl StateCell {
    /// A cell starting in [`DeviceState::Registered`].
    pub fn new() -> Arc<Self> {
        Arc::new(Self(AtomicU8::new(DeviceState::Registered as u8)))
    }

    /// Current state.
    pub fn get(&self) -> DeviceState {
        match self.0.load(Ordering::Acquire) {
            0 => DeviceState::Registered,
            1 => DeviceState::Initialized,
            2 => DeviceState::Started,
            3 => DeviceState::Stopped,
            _ => DeviceState::Deinitialized,
        }
    }

    /// Transitions to `state`.
    pub fn set(&self, state: DeviceState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// Outcome of a device `init` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InitOutcome {
    /// The device is initialized.
    Ready,
    /// Initialization completes asynchronously; the device reports through
    /// its hook when done.
    Pending,
}

/// Outcome of a display `blit`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlitOutcome {
    /// The frame reached the panel synchronously.
    Done,
    /// The device queued the frame and completes it on its own.
    NonBlocking,
}

/// Static geometry of a capture device.
#[derive(Clone, Debug)]
pub struct CaptureConfig {
    /// Sensor geometry: dimensions, pitch, active rectangle, declared
    /// rotation/flip/byte-swap, and the typical source format.
    pub frame: FrameDescriptor,
}

/// A raw captured buffer borrowed from the camera driver for one
/// dequeue→enqueue cycle.
#[derive(Clone, Debug)]
pub struct CapturedFrame {
    /// Capture bytes.
    pub data: Arc<[u8]>,
    /// The pixel format the sensor actually produced.
    pub format: PixelFormat,
}

/// Capture device capability set: `init`, `start`, `dequeue`, `enqueue`,
/// plus optional post-processing and input notification.
pub trait CaptureDevice: Send {
    /// Device name, stable for the device's lifetime.
    fn name(&self) -> &str;

    /// The device's static geometry.
    fn config(&self) -> &CaptureConfig;

    /// Initializes the device. The hook is the only channel back into the
    /// framework: frame-ready posts and asynchronous init completion.
    fn init(&mut self, hook: CameraHook) -> Result<InitOutcome, DeviceError>;

    /// Releases the device.
    fn deinit(&mut self) -> Result<(), DeviceError>;

    /// Starts capturing.
    fn start(&mut self) -> Result<(), DeviceError>;

    /// Stops capturing.
    fn stop(&mut self) -> Result<(), DeviceError>;

    /// Hands out the most recently captured buffer and its actual format.
    fn dequeue(&mut self) -> Result<CapturedFrame, DeviceError>;

    /// Returns a buffer to the capture queue; `None` recycles the last
    /// dequeued buffer.
    fn enqueue(&mut self, frame: Option<CapturedFrame>) -> Result<(), DeviceError>;

    /// Optional in-place fixup of a capture before conversion (e.g. a
    /// de-bayer or a format rewrite). Default: no-op.
    fn post_process(&mut self, _frame: &mut CapturedFrame) -> Result<(), DeviceError> {
        Ok(())
    }

    /// Optional event delivery. Default: ignored.
    fn input_notify(&mut self, _event: &NotifyEvent) -> Result<(), DeviceError> {
        Ok(())
    }
}

/// Static capabilities of a display device.
#[derive(Clone, Debug)]
pub struct DisplayCapability {
    /// Panel geometry and the source format it wants frames converted from.
    pub frame: FrameDescriptor,
    /// The device's first framebuffer, posted with the initial request.
    pub framebuffer: FrameBuffer,
}

/// Display device capability set.
pub trait DisplayDevice: Send {
    /// Device name.
    fn name(&self) -> &str;

    /// Panel capability block.
    fn cap(&self) -> &DisplayCapability;

    /// Initializes the panel.
    fn init(&mut self, hook: DisplayHook) -> Result<(), DeviceError>;

    /// Releases the panel.
    fn deinit(&mut self) -> Result<(), DeviceError>;

    /// Starts scanning out.
    fn start(&mut self) -> Result<(), DeviceError>;

    /// Stops scanning out.
    fn stop(&mut self) -> Result<(), DeviceError>;

    /// Presents a filled buffer.
    fn blit(&mut self, buffer: &FrameBuffer) -> Result<BlitOutcome, DeviceError>;

    /// Optional event delivery. Default: ignored.
    fn input_notify(&mut self, _event: &NotifyEvent) -> Result<(), DeviceError> {
        Ok(())
    }
}

/// Input device capability set. Events flow out through the [`InputHook`].
pub trait InputDevice: Send {
    /// Device name.
    fn name(&self) -> &str;

    /// Initializes the device.
    fn init(&mut self, hook: InputHook) -> Result<(), DeviceError>;

    /// Releases the device.
    fn deinit(&mut self) -> Result<(), DeviceError>;

    /// Starts event delivery.
    fn start(&mut self) -> Result<(), DeviceError>;

    /// Stops event delivery.
    fn stop(&mut self) -> Result<(), DeviceError>;

    /// Optional event delivery from other managers. Default: ignored.
    fn input_notify(&mut self, _event: &NotifyEvent) -> Result<(), DeviceError> {
        Ok(())
    }
}

/// Coarse type of an output device; at most one `Ui` event receiver may be
/// registered at a time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputDeviceType {
    /// UI surface renderer.
    Ui,
    /// Speaker or other audio sink.
    Audio,
    /// LEDs and everything else.
    Other,
}

/// Output device capability set.
pub trait OutputDevice: Send {
    /// Device name.
    fn name(&self) -> &str;

    /// Device type; governs the single-UI-receiver rule and overlay posts.
    fn device_type(&self) -> OutputDeviceType;

    /// Initializes the device.
    fn init(&mut self, hook: OutputHook) -> Result<(), DeviceError>;

    /// Releases the device.
    fn deinit(&mut self) -> Result<(), DeviceError>;

    /// Starts the device.
    fn start(&mut self) -> Result<(), DeviceError>;

    /// Stops the device.
    fn stop(&mut self) -> Result<(), DeviceError>;

    /// Runtime-tunable config table, surfaced by framework queries.
    fn configs(&self) -> Vec<DeviceConfigEntry> {
        Vec::new()
    }

    /// UI devices expose the overlay surface the camera composes with.
    fn overlay_surface(&self) -> Option<OverlaySurface> {
        None
    }
}

/// Source of an inference result dispatched to output event handlers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InferenceSource {
    /// Vision-algorithm manager.
    Vision,
    /// Voice-algorithm manager.
    Voice,
    /// Low-power transition broadcast.
    Lpm,
}

/// The result payload delivered with `inference_complete`.
#[derive(Clone, Debug)]
pub enum InferenceResult {
    /// Opaque vision result bytes.
    Vision(Arc<[u8]>),
    /// ASR recognition outcome.
    Voice(AsrResult),
    /// Sleep transition, no payload.
    Lpm,
}

/// What a UI handler reports back after consuming an inference result.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UiUpdate {
    /// The handler redrew its overlay; the manager should re-register it
    /// with the camera.
    pub overlay_changed: bool,
}

/// Event handler chained onto the output manager, registered separately
/// from the device itself.
pub trait OutputEventHandler: Send {
    /// Consumes an inference result.
    fn inference_complete(
        &mut self,
        source: InferenceSource,
        result: &InferenceResult,
    ) -> Result<UiUpdate, DeviceError>;

    /// Optional event delivery. Default: ignored.
    fn input_notify(&mut self, _event: &NotifyEvent) -> Result<(), DeviceError> {
        Ok(())
    }

    /// Optional audio-dump sink. Default: ignored.
    fn dump(&mut self, _dump: &AudioDump) {}
}

/// Frame kinds a vision algorithm can require.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameKind {
    /// Visible-light frame.
    Rgb,
    /// Infrared frame.
    Ir,
    /// Depth frame.
    Depth,
}

impl FrameKind {
    /// Number of frame kinds.
    pub const COUNT: usize = 3;

    /// All kinds in slot order.
    pub const fn all() -> [FrameKind; FrameKind::COUNT] {
        [FrameKind::Rgb, FrameKind::Ir, FrameKind::Depth]
    }

    /// Slot index of this kind.
    pub const fn index(self) -> usize {
        match self {
            FrameKind::Rgb => 0,
            FrameKind::Ir => 1,
            FrameKind::Depth => 2,
        }
    }
}

/// Geometry and destination buffer for one frame kind a vision device
/// requires.
#[derive(Clone, Debug)]
pub struct AlgoFrameSpec {
    /// Requested geometry and formats.
    pub descriptor: FrameDescriptor,
    /// Buffer the camera manager fills.
    pub buffer: FrameBuffer,
}

/// Vision-algorithm device capability set.
pub trait VisionAlgoDevice: Send {
    /// Device name.
    fn name(&self) -> &str;

    /// The frame spec for `kind`, or `None` when the kind is unsupported.
    fn frame(&self, kind: FrameKind) -> Option<AlgoFrameSpec>;

    /// Whether the manager should request frames immediately at start-up.
    fn auto_start(&self) -> bool {
        true
    }

    /// Initializes the inference engine.
    fn init(&mut self, hook: VisionHook) -> Result<(), DeviceError>;

    /// Releases the engine.
    fn deinit(&mut self) -> Result<(), DeviceError>;

    /// Runs inference over the frames previously written into the device's
    /// buffers.
    fn run(&mut self) -> Result<(), DeviceError>;

    /// Optional event delivery. Default: ignored.
    fn input_notify(&mut self, _event: &NotifyEvent) -> Result<(), DeviceError> {
        Ok(())
    }
}

/// Voice-algorithm device capability set (wake word + command recognition).
pub trait VoiceAlgoDevice: Send {
    /// Device name.
    fn name(&self) -> &str;

    /// Initializes the recognizer.
    fn init(&mut self, hook: VoiceHook) -> Result<(), DeviceError>;

    /// Releases the recognizer.
    fn deinit(&mut self) -> Result<(), DeviceError>;

    /// Feeds one cleaned audio block through the recognizer.
    fn run(&mut self, audio: &AudioStream) -> Result<(), DeviceError>;

    /// Optional event delivery (configuration, feedback). Default: ignored.
    fn input_notify(&mut self, _event: &NotifyEvent) -> Result<(), DeviceError> {
        Ok(())
    }
}

/// Acoustic front-end device capability set.
pub trait AfeDevice: Send {
    /// Device name.
    fn name(&self) -> &str;

    /// Initializes the front-end.
    fn init(&mut self, hook: AfeHook) -> Result<(), DeviceError>;

    /// Releases the front-end.
    fn deinit(&mut self) -> Result<(), DeviceError>;

    /// Starts processing.
    fn start(&mut self) -> Result<(), DeviceError>;

    /// Runs one raw microphone block through the front-end. Cleaned audio
    /// and dumps come back through the hook.
    fn run(&mut self, audio: &AudioStream) -> Result<(), DeviceError>;

    /// Feedback from the ASR engine or the speaker. Default: ignored.
    fn input_notify(&mut self, _event: &NotifyEvent) -> Result<(), DeviceError> {
        Ok(())
    }
}

/// Multicore transport device capability set.
pub trait MulticoreDevice: Send {
    /// Device name.
    fn name(&self) -> &str;

    /// Initializes the link; inbound frames arrive through the hook.
    fn init(&mut self, hook: MulticoreHook) -> Result<(), DeviceError>;

    /// Starts the link.
    fn start(&mut self) -> Result<(), DeviceError>;

    /// Sends one serialized envelope to the peer core.
    fn send(&mut self, frame: &[u8]) -> Result<(), DeviceError>;

    /// Releases the link.
    fn deinit(&mut self) -> Result<(), DeviceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_cell_round_trips_states() {
        let cell = StateCell::new();
        assert_eq!(cell.get(), DeviceState::Registered);
        cell.set(DeviceState::Started);
        assert_eq!(cell.get(), DeviceState::Started);
        cell.set(DeviceState::Deinitialized);
        assert_eq!(cell.get(), DeviceState::Deinitialized);
    }

    #[test]
    fn frame_kind_indices_are_dense() {
        for (i, kind) in FrameKind::all().into_iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }
}
