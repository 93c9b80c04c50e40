//! The framework message: a tagged sum routed between managers.

use crate::query::FrameworkRequest;
use crate::surface::{FrameBuffer, FrameDescriptor};
use mailbox::{DeliveryScope, Envelope, ManagerId, MulticoreInfo};
use std::sync::Arc;

/// Bitmask of manager ids used by input fan-out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReceiverMask(u16);

impl ReceiverMask {
    /// Empty mask.
    pub const fn none() -> Self {
        Self(0)
    }

    /// Adds a manager to the mask.
    pub const fn with(self, id: ManagerId) -> Self {
        Self(self.0 | 1 << id.index())
    }

    /// Whether the mask contains `id`.
    pub const fn contains(self, id: ManagerId) -> bool {
        self.0 & (1 << id.index()) != 0
    }

    /// Managers present in the mask, in slot order.
    pub fn iter(self) -> impl Iterator<Item = ManagerId> {
        (0..ManagerId::COUNT)
            .filter(move |i| self.0 & (1 << i) != 0)
            .filter_map(ManagerId::from_index)
    }
}

/// A pull-style frame request from a display or vision-algorithm device.
///
/// The initial request carries the full destination descriptor; follow-up
/// re-arms after a consumed response carry only the requester id and the
/// returned buffer, since the camera manager retains the descriptor from the
/// first post.
#[derive(Clone, Debug)]
pub struct FrameRequest {
    /// Requester slot: display device id, or vision (device, kind) slot id.
    pub requester: u8,
    /// Destination geometry; `None` re-arms a previously posted descriptor.
    pub descriptor: Option<FrameDescriptor>,
    /// Destination buffer the producer writes into; `None` re-arms the
    /// buffer retained from the previous request.
    pub buffer: Option<FrameBuffer>,
}

/// Response to a [`FrameRequest`]: the filled buffer travels back.
#[derive(Clone, Debug)]
pub struct FrameResponse {
    /// Requester slot the response answers.
    pub requester: u8,
    /// The buffer supplied with the request, now filled.
    pub buffer: FrameBuffer,
}

/// Opaque inference result blob posted by a vision device.
#[derive(Clone, Debug)]
pub struct ResultUpdate {
    /// Device that produced the result.
    pub dev_id: u8,
    /// Engine-specific result bytes.
    pub data: Arc<[u8]>,
}

/// ASR detection outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AsrDetectStatus {
    /// A wake word was spotted.
    WakeWordDetected,
    /// A voice command was spotted.
    CommandDetected,
    /// The voice-command session expired without a detection.
    Timeout,
}

/// Result of a wake-word or command recognition pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AsrResult {
    /// What was detected.
    pub status: AsrDetectStatus,
    /// Language bit of the model that fired (see the ASR language bitmask).
    pub language: u8,
    /// Detected keyword id, or -1 when not applicable.
    pub keyword_id: i32,
}

/// A block of audio samples moving through the audio pipeline.
#[derive(Clone, Debug)]
pub struct AudioStream {
    /// Producing device.
    pub dev_id: u8,
    /// Raw sample bytes.
    pub data: Arc<[u8]>,
}

/// Raw plus cleaned audio forwarded to dump consumers.
#[derive(Clone, Debug)]
pub struct AudioDump {
    /// Producing device.
    pub dev_id: u8,
    /// Dump bytes; always a fresh allocation, dump consumers are slow.
    pub data: Arc<[u8]>,
}

/// Event payload delivered to devices through `input_notify`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NotifyEvent {
    /// Uninterpreted bytes from an input device or the peer core.
    Raw(Arc<[u8]>),
    /// ASR telling the acoustic front-end how long the utterance was.
    AsrToAfeFeedback {
        /// Measured utterance length in samples.
        utterance_len: u32,
    },
    /// Speaker telling the acoustic front-end whether it is streaming.
    SpeakerToAfeFeedback {
        /// True while the speaker is actively playing.
        streaming: bool,
    },
    /// Vision algorithm driving LED brightness.
    LedPwmControl {
        /// Brightness percentage, 0..=100.
        brightness: u8,
    },
    /// Vision algorithm driving camera exposure.
    CameraExposureControl {
        /// Enable or disable the adjustment.
        enable: bool,
    },
    /// Vision algorithm toggling recording.
    RecordControl {
        /// Recording state selector.
        state: u8,
    },
    /// Select the ASR demo/language model set.
    SetVoiceModel {
        /// Demo bit (0 keeps the current demo).
        demo: u8,
        /// Language bitmask (0 keeps the current languages).
        language: u8,
        /// The device was woken by a button or touch instead of the wake
        /// word; enter the command session directly.
        push_to_talk: bool,
    },
    /// Change the voice-command session timeout.
    SetTimeoutDuration {
        /// New timeout in milliseconds; clamped to the supported minimum.
        timeout_ms: u32,
    },
    /// Abort the running voice-command session.
    StopVoiceCommand,
}

/// An `input_notify` fan-out message.
#[derive(Clone, Debug)]
pub struct NotifyData {
    /// Originating device.
    pub dev_id: u8,
    /// The event to deliver.
    pub event: NotifyEvent,
}

/// Raw input event with a receiver list, fanned out by the input manager.
#[derive(Clone, Debug)]
pub struct InputReceive {
    /// Originating input device.
    pub dev_id: u8,
    /// Managers that should receive an `InputNotify`.
    pub receivers: ReceiverMask,
    /// Event bytes.
    pub data: Arc<[u8]>,
    /// Give each recipient its own copy of the bytes; otherwise the single
    /// consumer shares the original allocation.
    pub copy: bool,
}

/// A UI overlay surface registered with the camera manager for composition.
#[derive(Clone, Debug)]
pub struct OverlaySurface {
    /// Overlay geometry and format.
    pub descriptor: FrameDescriptor,
    /// Overlay pixels.
    pub buffer: FrameBuffer,
}

/// Payload of a framework message, discriminated by kind.
#[derive(Clone, Debug)]
pub enum MessageBody {
    /// A capture completed on the given camera; dequeue and service requests.
    CameraDequeue {
        /// Camera device id.
        dev_id: u8,
    },
    /// Display manager asks for the next frame.
    DisplayRequestFrame(FrameRequest),
    /// Camera manager answers a display request.
    DisplayResponseFrame(FrameResponse),
    /// Vision-algorithm manager asks for a frame of a given kind.
    VAlgoRequestFrame(FrameRequest),
    /// Camera manager answers a vision request.
    VAlgoResponseFrame(FrameResponse),
    /// A vision device posted an inference result.
    VAlgoResultUpdate(ResultUpdate),
    /// Cleaned audio ready for the ASR engine.
    AsrInputProcess(AudioStream),
    /// The ASR engine posted a recognition result.
    AsrResultUpdate {
        /// Voice device that produced the result.
        dev_id: u8,
        /// The recognition outcome.
        result: AsrResult,
    },
    /// Register (or replace) the overlay the camera composes onto frames.
    ShowOverlay(OverlaySurface),
    /// Raw input event awaiting fan-out.
    InputReceive(InputReceive),
    /// Event fan-out to a manager's devices.
    InputNotify(NotifyData),
    /// A microphone block for the audio-processing manager.
    InputAudioReceived(AudioStream),
    /// Raw plus cleaned audio for dump consumers.
    AudioDump(AudioDump),
    /// Low-power broadcast: deinit devices before sleeping.
    LpmPreEnterSleep,
    /// Uninterpreted bytes; also carries inbound peer-core frames to the
    /// bridge.
    Raw(Arc<[u8]>),
    /// Self-describing framework query entering through the input manager.
    FrameworkReceived(FrameworkRequest),
    /// Enumerate a manager's devices through the request's responder.
    FrameworkGetComponents(FrameworkRequest),
    /// Enumerate one device's config table through the request's responder.
    FrameworkGetDeviceConfigs(FrameworkRequest),
    /// Stop the receiving manager's loop after handling.
    Shutdown,
}

/// A routed framework message: delivery metadata plus the typed payload.
#[derive(Clone, Debug)]
pub struct Message {
    /// Where the message should be delivered in a multicore build.
    pub scope: DeliveryScope,
    /// Bridge flags.
    pub multicore: MulticoreInfo,
    /// The payload.
    pub body: MessageBody,
}

impl Message {
    /// A message delivered locally only.
    pub fn local(body: MessageBody) -> Self {
        Self {
            scope: DeliveryScope::Local,
            multicore: MulticoreInfo::default(),
            body,
        }
    }

    /// A message that is additionally bridged to `target` on the peer core.
    pub fn bridged(body: MessageBody, scope: DeliveryScope, target: ManagerId) -> Self {
        Self {
            scope,
            multicore: MulticoreInfo {
                is_multicore: true,
                was_multicore: false,
                remote_target: Some(target),
            },
            body,
        }
    }
}

impl Envelope for Message {
    fn scope(&self) -> DeliveryScope {
        self.scope
    }

    fn multicore(&self) -> MulticoreInfo {
        self.multicore
    }

    fn kind_name(&self) -> &'static str {
        match &self.body {
            MessageBody::CameraDequeue { .. } => "camera_dq",
            MessageBody::DisplayRequestFrame(_) => "display_req",
            MessageBody::DisplayResponseFrame(_) => "display_res",
            MessageBody::VAlgoRequestFrame(_) => "alg_req_frame",
            MessageBody::VAlgoResponseFrame(_) => "alg_respond_frame",
            MessageBody::VAlgoResultUpdate(_) => "alg_result_update",
            MessageBody::AsrInputProcess(_) => "asr_input_process",
            MessageBody::AsrResultUpdate { .. } => "asr_result_update",
            MessageBody::ShowOverlay(_) => "dispatch_overlay",
            MessageBody::InputReceive(_) => "input_recv",
            MessageBody::InputNotify(_) => "input_notify",
            MessageBody::InputAudioReceived(_) => "audio_in",
            MessageBody::AudioDump(_) => "audio_dump",
            MessageBody::LpmPreEnterSleep => "lpm_pre_sleep",
            MessageBody::Raw(_) => "raw_msg",
            MessageBody::FrameworkReceived(_) => "fwk_recv",
            MessageBody::FrameworkGetComponents(_) => "fwk_get_components",
            MessageBody::FrameworkGetDeviceConfigs(_) => "fwk_get_dev_configs",
            MessageBody::Shutdown => "shutdown",
        }
    }

    fn is_shutdown(&self) -> bool {
        matches!(self.body, MessageBody::Shutdown)
    }
}
