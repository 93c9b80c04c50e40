//! Peer-core envelope codec.
//!
//! A bridged message travels as a fixed little-endian header followed by
//! payload bytes. Size-known kinds (frame request/response, audio dump) are
//! sent header-only; data-bearing kinds (input receive, result updates,
//! input notify) append their payload and the header records its length.
//!
//! Layout:
//!
//! ```text
//! +-----+--------+-------+-------+--------+----------+-------------+
//! | u8  | u8     | u8    | u8    | u8     | [u8; 3]  | u32         |
//! | kind| target | scope | flags | dev id | reserved | payload len |
//! +-----+--------+-------+-------+--------+----------+-------------+
//! | kind-specific fixed block | payload bytes ...                  |
//! +--------------------------------------------------------------- +
//! ```
//!
//! `encode` then `decode` is the identity on header fields and, for
//! data-bearing kinds, on the payload bytes.

use device_abi::{
    ActiveRect, AsrDetectStatus, AsrResult, AudioDump, DeliveryScope, FlipMode, FrameBuffer,
    FrameDescriptor, FrameRequest, FrameResponse, InputReceive, ManagerId, Message, MessageBody,
    MulticoreInfo, NotifyData, NotifyEvent, PixelFormat, ReceiverMask, ResultUpdate, Rotation,
};
use std::sync::Arc;
use thiserror::Error;

/// Fixed header length in bytes.
pub const HEADER_LEN: usize = 12;

const FLAG_IS_MULTICORE: u8 = 1 << 0;
const FLAG_WAS_MULTICORE: u8 = 1 << 1;
const FLAG_HAS_DESCRIPTOR: u8 = 1 << 2;

const NO_TARGET: u8 = 0xFF;

/// Errors surfaced by the envelope codec.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    /// The message kind does not cross cores.
    #[error("message kind {0} is not bridged")]
    Unsupported(&'static str),

    /// The buffer is shorter than the fixed header.
    #[error("truncated envelope: {0} bytes")]
    Truncated(usize),

    /// The header's payload length disagrees with the trailing bytes.
    #[error("payload size mismatch: header says {expected}, found {found}")]
    SizeMismatch {
        /// Length recorded in the header.
        expected: usize,
        /// Trailing bytes actually present.
        found: usize,
    },

    /// A discriminant byte holds an unknown value.
    #[error("invalid {field} value {value}")]
    BadField {
        /// Field name.
        field: &'static str,
        /// Offending value.
        value: u8,
    },
}

#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum WireKind {
    DisplayRequest = 0,
    DisplayResponse = 1,
    VAlgoRequest = 2,
    VAlgoResponse = 3,
    AudioDumpKind = 4,
    InputReceiveKind = 5,
    VisionResult = 6,
    AsrResult = 7,
    InputNotifyKind = 8,
}

impl WireKind {
    fn from_u8(value: u8) -> Result<Self, WireError> {
        Ok(match value {
            0 => WireKind::DisplayRequest,
            1 => WireKind::DisplayResponse,
            2 => WireKind::VAlgoRequest,
            3 => WireKind::VAlgoResponse,
            4 => WireKind::AudioDumpKind,
            5 => WireKind::InputReceiveKind,
            6 => WireKind::VisionResult,
            7 => WireKind::AsrResult,
            8 => WireKind::InputNotifyKind,
            other => {
                return Err(WireError::BadField {
                    field: "kind",
                    value: other,
                })
            }
        })
    }
}

fn scope_to_u8(scope: DeliveryScope) -> u8 {
    match scope {
        DeliveryScope::Local => 0,
        DeliveryScope::Remote => 1,
        DeliveryScope::DualCore => 2,
    }
}

fn scope_from_u8(value: u8) -> Result<DeliveryScope, WireError> {
    Ok(match value {
        0 => DeliveryScope::Local,
        1 => DeliveryScope::Remote,
        2 => DeliveryScope::DualCore,
        other => {
            return Err(WireError::BadField {
                field: "scope",
                value: other,
            })
        }
    })
}

fn format_to_u8(format: PixelFormat) -> u8 {
    match format {
        PixelFormat::Uyvy422 => 0,
        PixelFormat::Rgb565 => 1,
        PixelFormat::Rgb888 => 2,
        PixelFormat::Bgra8888 => 3,
        PixelFormat::Gray8 => 4,
    }
}

fn format_from_u8(value: u8) -> Result<PixelFormat, WireError> {
    Ok(match value {
        0 => PixelFormat::Uyvy422,
        1 => PixelFormat::Rgb565,
        2 => PixelFormat::Rgb888,
        3 => PixelFormat::Bgra8888,
        4 => PixelFormat::Gray8,
        other => {
            return Err(WireError::BadField {
                field: "format",
                value: other,
            })
        }
    })
}

fn rotation_to_u8(rotation: Rotation) -> u8 {
    match rotation {
        Rotation::Deg0 => 0,
        Rotation::Deg90 => 1,
        Rotation::Deg180 => 2,
        Rotation::Deg270 => 3,
    }
}

fn rotation_from_u8(value: u8) -> Result<Rotation, WireError> {
    Ok(match value {
        0 => Rotation::Deg0,
        1 => Rotation::Deg90,
        2 => Rotation::Deg180,
        3 => Rotation::Deg270,
        other => {
            return Err(WireError::BadField {
                field: "rotation",
                value: other,
            })
        }
    })
}

fn flip_to_u8(flip: FlipMode) -> u8 {
    match flip {
        FlipMode::None => 0,
        FlipMode::Horizontal => 1,
        FlipMode::Vertical => 2,
        FlipMode::Both => 3,
    }
}

fn flip_from_u8(value: u8) -> Result<FlipMode, WireError> {
    Ok(match value {
        0 => FlipMode::None,
        1 => FlipMode::Horizontal,
        2 => FlipMode::Vertical,
        3 => FlipMode::Both,
        other => {
            return Err(WireError::BadField {
                field: "flip",
                value: other,
            })
        }
    })
}

const DESCRIPTOR_LEN: usize = 21;

fn push_descriptor(out: &mut Vec<u8>, desc: &FrameDescriptor) {
    out.extend_from_slice(&desc.width.to_le_bytes());
    out.extend_from_slice(&desc.height.to_le_bytes());
    out.extend_from_slice(&desc.pitch.to_le_bytes());
    out.extend_from_slice(&desc.rect.left.to_le_bytes());
    out.extend_from_slice(&desc.rect.top.to_le_bytes());
    out.extend_from_slice(&desc.rect.right.to_le_bytes());
    out.extend_from_slice(&desc.rect.bottom.to_le_bytes());
    out.push(rotation_to_u8(desc.rotate));
    out.push(flip_to_u8(desc.flip));
    out.push(desc.swap_bytes as u8);
    out.push(format_to_u8(desc.format));
    out.push(format_to_u8(desc.src_format));
}

fn read_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn parse_descriptor(bytes: &[u8]) -> Result<FrameDescriptor, WireError> {
    if bytes.len() < DESCRIPTOR_LEN {
        return Err(WireError::Truncated(bytes.len()));
    }
    Ok(FrameDescriptor {
        width: read_u16(bytes, 0),
        height: read_u16(bytes, 2),
        pitch: read_u32(bytes, 4),
        rect: ActiveRect {
            left: read_u16(bytes, 8),
            top: read_u16(bytes, 10),
            right: read_u16(bytes, 12),
            bottom: read_u16(bytes, 14),
        },
        rotate: rotation_from_u8(bytes[16])?,
        flip: flip_from_u8(bytes[17])?,
        swap_bytes: bytes[18] != 0,
        format: format_from_u8(bytes[19])?,
        src_format: format_from_u8(bytes[20])?,
    })
}

fn encode_notify_event(event: &NotifyEvent) -> Vec<u8> {
    match event {
        NotifyEvent::Raw(data) => {
            let mut out = vec![0u8];
            out.extend_from_slice(data);
            out
        }
        NotifyEvent::AsrToAfeFeedback { utterance_len } => {
            let mut out = vec![1u8];
            out.extend_from_slice(&utterance_len.to_le_bytes());
            out
        }
        NotifyEvent::SpeakerToAfeFeedback { streaming } => vec![2u8, *streaming as u8],
        NotifyEvent::LedPwmControl { brightness } => vec![3u8, *brightness],
        NotifyEvent::CameraExposureControl { enable } => vec![4u8, *enable as u8],
        NotifyEvent::RecordControl { state } => vec![5u8, *state],
        NotifyEvent::SetVoiceModel {
            demo,
            language,
            push_to_talk,
        } => vec![6u8, *demo, *language, *push_to_talk as u8],
        NotifyEvent::SetTimeoutDuration { timeout_ms } => {
            let mut out = vec![7u8];
            out.extend_from_slice(&timeout_ms.to_le_bytes());
            out
        }
        NotifyEvent::StopVoiceCommand => vec![8u8],
    }
}

fn decode_notify_event(bytes: &[u8]) -> Result<NotifyEvent, WireError> {
    let Some((&tag, rest)) = bytes.split_first() else {
        return Err(WireError::Truncated(0));
    };
    Ok(match tag {
        0 => NotifyEvent::Raw(Arc::from(rest)),
        1 => {
            if rest.len() < 4 {
                return Err(WireError::Truncated(rest.len()));
            }
            NotifyEvent::AsrToAfeFeedback {
                utterance_len: read_u32(rest, 0),
            }
        }
        2 => NotifyEvent::SpeakerToAfeFeedback {
            streaming: rest.first().copied().unwrap_or(0) != 0,
        },
        3 => NotifyEvent::LedPwmControl {
            brightness: rest.first().copied().unwrap_or(0),
        },
        4 => NotifyEvent::CameraExposureControl {
            enable: rest.first().copied().unwrap_or(0) != 0,
        },
        5 => NotifyEvent::RecordControl {
            state: rest.first().copied().unwrap_or(0),
        },
        6 => {
            if rest.len() < 3 {
                return Err(WireError::Truncated(rest.len()));
            }
            NotifyEvent::SetVoiceModel {
                demo: rest[0],
                language: rest[1],
                push_to_talk: rest[2] != 0,
            }
        }
        7 => {
            if rest.len() < 4 {
                return Err(WireError::Truncated(rest.len()));
            }
            NotifyEvent::SetTimeoutDuration {
                timeout_ms: read_u32(rest, 0),
            }
        }
        8 => NotifyEvent::StopVoiceCommand,
        other => {
            return Err(WireError::BadField {
                field: "notify_tag",
                value: other,
            })
        }
    })
}

struct Parts {
    kind: WireKind,
    dev_id: u8,
    fixed: Vec<u8>,
    payload: Vec<u8>,
    descriptor: Option<FrameDescriptor>,
}

fn split_message(msg: &Message) -> Result<Parts, WireError> {
    let mut parts = Parts {
        kind: WireKind::DisplayRequest,
        dev_id: 0,
        fixed: Vec::new(),
        payload: Vec::new(),
        descriptor: None,
    };
    match &msg.body {
        MessageBody::DisplayRequestFrame(req) => {
            parts.kind = WireKind::DisplayRequest;
            parts.dev_id = req.requester;
            parts.descriptor = req.descriptor;
        }
        MessageBody::DisplayResponseFrame(res) => {
            parts.kind = WireKind::DisplayResponse;
            parts.dev_id = res.requester;
        }
        MessageBody::VAlgoRequestFrame(req) => {
            parts.kind = WireKind::VAlgoRequest;
            parts.dev_id = req.requester;
            parts.descriptor = req.descriptor;
        }
        MessageBody::VAlgoResponseFrame(res) => {
            parts.kind = WireKind::VAlgoResponse;
            parts.dev_id = res.requester;
        }
        MessageBody::AudioDump(dump) => {
            parts.kind = WireKind::AudioDumpKind;
            parts.dev_id = dump.dev_id;
        }
        MessageBody::InputReceive(recv) => {
            parts.kind = WireKind::InputReceiveKind;
            parts.dev_id = recv.dev_id;
            let mut mask = 0u16;
            for id in recv.receivers.iter() {
                mask |= 1 << id.index();
            }
            parts.fixed.extend_from_slice(&mask.to_le_bytes());
            parts.fixed.push(recv.copy as u8);
            parts.payload.extend_from_slice(&recv.data);
        }
        MessageBody::VAlgoResultUpdate(update) => {
            parts.kind = WireKind::VisionResult;
            parts.dev_id = update.dev_id;
            parts.payload.extend_from_slice(&update.data);
        }
        MessageBody::AsrResultUpdate { dev_id, result } => {
            parts.kind = WireKind::AsrResult;
            parts.dev_id = *dev_id;
            parts.payload.push(match result.status {
                AsrDetectStatus::WakeWordDetected => 0,
                AsrDetectStatus::CommandDetected => 1,
                AsrDetectStatus::Timeout => 2,
            });
            parts.payload.push(result.language);
            parts.payload.extend_from_slice(&result.keyword_id.to_le_bytes());
        }
        MessageBody::InputNotify(notify) => {
            parts.kind = WireKind::InputNotifyKind;
            parts.dev_id = notify.dev_id;
            parts.payload = encode_notify_event(&notify.event);
        }
        other_body => {
            return Err(WireError::Unsupported(match other_body {
                MessageBody::CameraDequeue { .. } => "camera_dq",
                MessageBody::ShowOverlay(_) => "dispatch_overlay",
                _ => "unbridged",
            }))
        }
    }
    Ok(parts)
}

/// Serializes a bridged message.
pub fn encode(msg: &Message) -> Result<Vec<u8>, WireError> {
    let parts = split_message(msg)?;

    let mut flags = 0u8;
    if msg.multicore.is_multicore {
        flags |= FLAG_IS_MULTICORE;
    }
    if msg.multicore.was_multicore {
        flags |= FLAG_WAS_MULTICORE;
    }
    if parts.descriptor.is_some() {
        flags |= FLAG_HAS_DESCRIPTOR;
    }

    let mut out = Vec::with_capacity(HEADER_LEN + parts.fixed.len() + parts.payload.len());
    out.push(parts.kind as u8);
    out.push(
        msg.multicore
            .remote_target
            .map(|id| id.index() as u8)
            .unwrap_or(NO_TARGET),
    );
    out.push(scope_to_u8(msg.scope));
    out.push(flags);
    out.push(parts.dev_id);
    out.extend_from_slice(&[0u8; 3]);
    out.extend_from_slice(&(parts.payload.len() as u32).to_le_bytes());

    if let Some(desc) = &parts.descriptor {
        push_descriptor(&mut out, desc);
    }
    out.extend_from_slice(&parts.fixed);
    out.extend_from_slice(&parts.payload);
    Ok(out)
}

/// Parses a serialized envelope back into a message.
///
/// Frame buffers do not cross cores: decoded requests re-arm without a
/// buffer and decoded responses carry an empty one.
pub fn decode(bytes: &[u8]) -> Result<Message, WireError> {
    if bytes.len() < HEADER_LEN {
        return Err(WireError::Truncated(bytes.len()));
    }
    let kind = WireKind::from_u8(bytes[0])?;
    let remote_target = match bytes[1] {
        NO_TARGET => None,
        index => Some(ManagerId::from_index(index as usize).ok_or(WireError::BadField {
            field: "target",
            value: index,
        })?),
    };
    let scope = scope_from_u8(bytes[2])?;
    let flags = bytes[3];
    let dev_id = bytes[4];
    let payload_len = read_u32(bytes, 8) as usize;

    let mut rest = &bytes[HEADER_LEN..];
    let descriptor = if flags & FLAG_HAS_DESCRIPTOR != 0 {
        let desc = parse_descriptor(rest)?;
        rest = &rest[DESCRIPTOR_LEN..];
        Some(desc)
    } else {
        None
    };

    let fixed_len = match kind {
        WireKind::InputReceiveKind => 3,
        _ => 0,
    };
    if rest.len() < fixed_len {
        return Err(WireError::Truncated(rest.len()));
    }
    let (fixed, payload) = rest.split_at(fixed_len);
    if payload.len() != payload_len {
        return Err(WireError::SizeMismatch {
            expected: payload_len,
            found: payload.len(),
        });
    }

    let body = match kind {
        WireKind::DisplayRequest => MessageBody::DisplayRequestFrame(FrameRequest {
            requester: dev_id,
            descriptor,
            buffer: None,
        }),
        WireKind::DisplayResponse => MessageBody::DisplayResponseFrame(FrameResponse {
            requester: dev_id,
            buffer: FrameBuffer::zeroed(0),
        }),
        WireKind::VAlgoRequest => MessageBody::VAlgoRequestFrame(FrameRequest {
            requester: dev_id,
            descriptor,
            buffer: None,
        }),
        WireKind::VAlgoResponse => MessageBody::VAlgoResponseFrame(FrameResponse {
            requester: dev_id,
            buffer: FrameBuffer::zeroed(0),
        }),
        WireKind::AudioDumpKind => MessageBody::AudioDump(AudioDump {
            dev_id,
            data: Arc::from(payload),
        }),
        WireKind::InputReceiveKind => {
            let mask_bits = read_u16(fixed, 0);
            let mut receivers = ReceiverMask::none();
            for index in 0..ManagerId::COUNT {
                if mask_bits & (1 << index) != 0 {
                    if let Some(id) = ManagerId::from_index(index) {
                        receivers = receivers.with(id);
                    }
                }
            }
            MessageBody::InputReceive(InputReceive {
                dev_id,
                receivers,
                data: Arc::from(payload),
                copy: fixed[2] != 0,
            })
        }
        WireKind::VisionResult => MessageBody::VAlgoResultUpdate(ResultUpdate {
            dev_id,
            data: Arc::from(payload),
        }),
        WireKind::AsrResult => {
            if payload.len() < 6 {
                return Err(WireError::Truncated(payload.len()));
            }
            let status = match payload[0] {
                0 => AsrDetectStatus::WakeWordDetected,
                1 => AsrDetectStatus::CommandDetected,
                2 => AsrDetectStatus::Timeout,
                other => {
                    return Err(WireError::BadField {
                        field: "asr_status",
                        value: other,
                    })
                }
            };
            MessageBody::AsrResultUpdate {
                dev_id,
                result: AsrResult {
                    status,
                    language: payload[1],
                    keyword_id: i32::from_le_bytes([
                        payload[2], payload[3], payload[4], payload[5],
                    ]),
                },
            }
        }
        WireKind::InputNotifyKind => MessageBody::InputNotify(NotifyData {
            dev_id,
            event: decode_notify_event(payload)?,
        }),
    };

    Ok(Message {
        scope,
        multicore: MulticoreInfo {
            is_multicore: flags & FLAG_IS_MULTICORE != 0,
            was_multicore: flags & FLAG_WAS_MULTICORE != 0,
            remote_target,
        },
        body,
    })
}

/// Whether a message kind is sent header-only (no trailing payload bytes).
pub fn is_header_only(body: &MessageBody) -> bool {
    matches!(
        body,
        MessageBody::DisplayRequestFrame(_)
            | MessageBody::DisplayResponseFrame(_)
            | MessageBody::VAlgoRequestFrame(_)
            | MessageBody::VAlgoResponseFrame(_)
            | MessageBody::AudioDump(_)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(msg: &Message) -> Message {
        decode(&encode(msg).unwrap()).unwrap()
    }

    #[test]
    fn input_notify_round_trips_header_and_payload() {
        let msg = Message::bridged(
            MessageBody::InputNotify(NotifyData {
                dev_id: 3,
                event: NotifyEvent::Raw(Arc::from(&b"hello-peer"[..])),
            }),
            DeliveryScope::Remote,
            ManagerId::Output,
        );
        let back = round_trip(&msg);
        assert_eq!(back.scope, DeliveryScope::Remote);
        assert_eq!(back.multicore.remote_target, Some(ManagerId::Output));
        assert!(back.multicore.is_multicore);
        match back.body {
            MessageBody::InputNotify(notify) => {
                assert_eq!(notify.dev_id, 3);
                assert_eq!(notify.event, NotifyEvent::Raw(Arc::from(&b"hello-peer"[..])));
            }
            other => panic!("wrong body: {other:?}"),
        }
    }

    #[test]
    fn input_receive_round_trips_mask_and_bytes() {
        let receivers = ReceiverMask::none()
            .with(ManagerId::Display)
            .with(ManagerId::VoiceAlgo);
        let msg = Message::bridged(
            MessageBody::InputReceive(InputReceive {
                dev_id: 1,
                receivers,
                data: Arc::from(&[0xAAu8; 32][..]),
                copy: true,
            }),
            DeliveryScope::Remote,
            ManagerId::Input,
        );
        let back = round_trip(&msg);
        match back.body {
            MessageBody::InputReceive(recv) => {
                assert!(recv.receivers.contains(ManagerId::Display));
                assert!(recv.receivers.contains(ManagerId::VoiceAlgo));
                assert!(!recv.receivers.contains(ManagerId::Camera));
                assert_eq!(recv.data.len(), 32);
                assert!(recv.copy);
            }
            other => panic!("wrong body: {other:?}"),
        }
    }

    #[test]
    fn asr_result_round_trips_fields() {
        let msg = Message::bridged(
            MessageBody::AsrResultUpdate {
                dev_id: 0,
                result: AsrResult {
                    status: AsrDetectStatus::CommandDetected,
                    language: 1,
                    keyword_id: 7,
                },
            },
            DeliveryScope::DualCore,
            ManagerId::Output,
        );
        let back = round_trip(&msg);
        match back.body {
            MessageBody::AsrResultUpdate { result, .. } => {
                assert_eq!(result.status, AsrDetectStatus::CommandDetected);
                assert_eq!(result.language, 1);
                assert_eq!(result.keyword_id, 7);
            }
            other => panic!("wrong body: {other:?}"),
        }
    }

    #[test]
    fn frame_request_keeps_descriptor_header_only() {
        let desc = FrameDescriptor::packed(320, 240, PixelFormat::Rgb565, PixelFormat::Uyvy422);
        let msg = Message::bridged(
            MessageBody::VAlgoRequestFrame(FrameRequest {
                requester: 2,
                descriptor: Some(desc),
                buffer: Some(FrameBuffer::zeroed(8)),
            }),
            DeliveryScope::Remote,
            ManagerId::Camera,
        );
        let encoded = encode(&msg).unwrap();
        assert_eq!(encoded.len(), HEADER_LEN + DESCRIPTOR_LEN);

        let back = decode(&encoded).unwrap();
        match back.body {
            MessageBody::VAlgoRequestFrame(req) => {
                assert_eq!(req.requester, 2);
                assert_eq!(req.descriptor, Some(desc));
                assert!(req.buffer.is_none());
            }
            other => panic!("wrong body: {other:?}"),
        }
    }

    #[test]
    fn size_mismatch_is_rejected() {
        let msg = Message::local(MessageBody::VAlgoResultUpdate(ResultUpdate {
            dev_id: 0,
            data: Arc::from(&[1u8, 2, 3, 4][..]),
        }));
        let mut encoded = encode(&msg).unwrap();
        encoded.pop();
        assert_eq!(
            decode(&encoded).unwrap_err(),
            WireError::SizeMismatch {
                expected: 4,
                found: 3
            }
        );
    }

    #[test]
    fn unbridged_kinds_are_refused() {
        let msg = Message::local(MessageBody::CameraDequeue { dev_id: 0 });
        assert!(matches!(encode(&msg), Err(WireError::Unsupported(_))));
    }
}
