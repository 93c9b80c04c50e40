//! Device ABI shared between the managers and their pluggable devices.
//!
//! This crate defines the protocol boundary of the framework kernel: the
//! [`Message`] tagged sum exchanged over the mailbox substrate, the surface
//! and frame-descriptor vocabulary of the camera→display/algorithm pipeline,
//! the per-manager device capability traits, the typed event hooks drivers
//! use to enqueue events, and the fixed-capacity device registry.
//!
//! Drivers never receive arbitrary callbacks: each device is handed a small
//! hook at `init` through which it can only post pre-typed events.

mod device;
mod error;
mod hook;
mod message;
mod perf;
mod query;
mod registry;
mod surface;

pub use device::{
    AfeDevice, AlgoFrameSpec, BlitOutcome, CaptureConfig, CaptureDevice, CapturedFrame,
    DeviceState, DisplayCapability, DisplayDevice, FrameKind, InferenceResult, InferenceSource,
    InitOutcome, InputDevice, MulticoreDevice, OutputDevice, OutputDeviceType, OutputEventHandler,
    StateCell, UiUpdate, VisionAlgoDevice, VoiceAlgoDevice, MAX_AFE_DEV, MAX_CAMERA_DEV,
    MAX_DISPLAY_DEV, MAX_INPUT_DEV, MAX_OUTPUT_DEV, MAX_VISION_ALGO_DEV, MAX_VOICE_ALGO_DEV,
};
pub use error::{DeviceError, HookError};
pub use hook::{
    AfeHook, CameraHook, DisplayHook, InputHook, MulticoreHook, OutputHook, VisionHook, VoiceHook,
};
pub use message::{
    AsrDetectStatus, AsrResult, AudioDump, AudioStream, FrameRequest, FrameResponse, InputReceive,
    Message, MessageBody, NotifyData, NotifyEvent, OverlaySurface, ReceiverMask, ResultUpdate,
};
pub use perf::FpsCounter;
pub use query::{
    ComponentInfo, DeviceConfigEntry, FrameworkQuery, FrameworkReply, FrameworkRequest,
    ManagerInfo, QueryResponder,
};
pub use registry::Registry;
pub use surface::{ActiveRect, FlipMode, FrameBuffer, FrameDescriptor, PixelFormat, Rotation};

pub use mailbox::{DeliveryScope, ManagerId, MulticoreInfo};
