//! Capture servicing: rotation planning, conversion, response posting.

use crate::RequestSlot;
use device_abi::{
    CaptureDevice, CapturedFrame, DeliveryScope, FlipMode, FrameDescriptor, FrameResponse,
    ManagerId, Message, MessageBody, OverlaySurface, Rotation,
};
use gfx::{RotateConfig, RotateTarget, Surface, SurfaceMut};
use log::{error, info};
use task_runtime::TaskContext;

/// How one request's rotation pair resolves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RotationPlan {
    /// Convert with at most one rotation.
    Proceed(Option<RotateConfig>),
    /// Both sides rotate: ill-posed, leave the request armed.
    Abandon,
}

/// Resolves the capture's declared rotation against the requester's.
///
/// The single cancellation in the pipeline is (src 90°, dst 270°): the two
/// corrections add up to a full turn. No other pair cancels; when both sides
/// still rotate after that, the request cannot be expressed as one rotate
/// operation.
pub(crate) fn plan_rotation(src_rot: Rotation, dst_rot: Rotation) -> RotationPlan {
    let (src_rot, dst_rot) =
        if src_rot == Rotation::Deg90 && dst_rot == Rotation::Deg270 {
            (Rotation::Deg0, Rotation::Deg0)
        } else {
            (src_rot, dst_rot)
        };

    if src_rot != Rotation::Deg0 && dst_rot != Rotation::Deg0 {
        return RotationPlan::Abandon;
    }
    if src_rot != Rotation::Deg0 {
        return RotationPlan::Proceed(Some(RotateConfig {
            target: RotateTarget::Source,
            degree: src_rot,
        }));
    }
    if dst_rot != Rotation::Deg0 {
        return RotationPlan::Proceed(Some(RotateConfig {
            target: RotateTarget::Dest,
            degree: dst_rot,
        }));
    }
    RotationPlan::Proceed(None)
}

fn convert_into_slot(
    captured: &CapturedFrame,
    src_desc: &FrameDescriptor,
    slot: &RequestSlot,
    rotate: Option<RotateConfig>,
    flip: FlipMode,
    overlay: Option<&OverlaySurface>,
) -> Result<(), gfx::GfxError> {
    let dst_desc = slot.descriptor.expect("armed slot has a descriptor");
    let buffer = slot.buffer.as_ref().expect("armed slot has a buffer");
    let mut dst_pixels = buffer.lock();

    let src = Surface {
        desc: *src_desc,
        data: &captured.data,
    };
    let mut dst = SurfaceMut {
        desc: dst_desc,
        data: &mut dst_pixels,
    };

    match overlay {
        Some(ov) => {
            let ov_pixels = ov.buffer.lock();
            let ov_surface = Surface {
                desc: ov.descriptor,
                data: &ov_pixels,
            };
            gfx::compose(&src, &ov_surface, &mut dst, rotate, flip)
        }
        None => gfx::blit(&src, &mut dst, rotate, flip),
    }
}

/// Services every armed display request matching the captured format.
///
/// An ill-posed rotation abandons the remaining display requests for this
/// capture, leaving their slots armed.
pub(crate) fn service_display_requests(
    dev: &mut dyn CaptureDevice,
    geometry: &FrameDescriptor,
    captured: &mut CapturedFrame,
    slots: &mut [RequestSlot],
    overlay: Option<&OverlaySurface>,
    ctx: &TaskContext<Message>,
) {
    for (slot_id, slot) in slots.iter_mut().enumerate() {
        if !slot.pending {
            continue;
        }
        let dst_desc = slot.descriptor.expect("armed slot has a descriptor");
        if dst_desc.src_format != captured.format {
            continue;
        }

        if let Err(err) = dev.post_process(captured) {
            error!("camera post-process error: {}", err);
        }

        let rotate = match plan_rotation(geometry.rotate, dst_desc.rotate) {
            RotationPlan::Proceed(rotate) => rotate,
            RotationPlan::Abandon => {
                error!("Cannot rotate both source and output");
                return;
            }
        };

        let mut src_desc = *geometry;
        src_desc.format = captured.format;

        if let Err(err) = convert_into_slot(
            captured,
            &src_desc,
            slot,
            rotate,
            geometry.flip,
            overlay,
        ) {
            error!("display blit failed: {}", err);
            slot.pending = false;
            continue;
        }

        info!("Sending camera frame to display id #{}", slot_id);
        let response = FrameResponse {
            requester: slot_id as u8,
            buffer: slot.buffer.clone().expect("armed slot has a buffer"),
        };
        if let Err(err) = ctx.router().put(
            ManagerId::Display,
            Message::local(MessageBody::DisplayResponseFrame(response)),
        ) {
            error!("display response post failed: {}", err);
        }

        slot.pending = false;
    }
}

/// Services every armed vision-algorithm request matching the captured
/// format. Responses fan out to the peer core when a bridge is registered.
pub(crate) fn service_valgo_requests(
    dev: &mut dyn CaptureDevice,
    geometry: &FrameDescriptor,
    captured: &mut CapturedFrame,
    slots: &mut [RequestSlot],
    ctx: &TaskContext<Message>,
) {
    let bridge = ctx.router().is_registered(ManagerId::Multicore);

    for (slot_id, slot) in slots.iter_mut().enumerate() {
        if !slot.pending {
            continue;
        }
        let dst_desc = slot.descriptor.expect("armed slot has a descriptor");
        if dst_desc.src_format != captured.format {
            continue;
        }

        if let Err(err) = dev.post_process(captured) {
            error!("camera post-process error: {}", err);
        }

        let rotate = match plan_rotation(geometry.rotate, dst_desc.rotate) {
            RotationPlan::Proceed(rotate) => rotate,
            RotationPlan::Abandon => {
                error!("Cannot rotate both source and output");
                return;
            }
        };

        let mut src_desc = *geometry;
        src_desc.format = captured.format;

        if let Err(err) =
            convert_into_slot(captured, &src_desc, slot, rotate, FlipMode::None, None)
        {
            error!("vision blit failed: {}", err);
            slot.pending = false;
            continue;
        }

        let response = FrameResponse {
            requester: slot_id as u8,
            buffer: slot.buffer.clone().expect("armed slot has a buffer"),
        };
        let body = MessageBody::VAlgoResponseFrame(response);
        let msg = if bridge {
            Message::bridged(body, DeliveryScope::Local, ManagerId::VisionAlgo)
        } else {
            Message::local(body)
        };
        if let Err(err) = ctx.router().put(ManagerId::VisionAlgo, msg) {
            error!("vision response post failed: {}", err);
        }

        slot.pending = false;
    }
}
