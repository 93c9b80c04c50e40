//! Typed event hooks handed to drivers at `init`.
//!
//! A hook is the only channel a driver has back into the framework: it can
//! enqueue pre-typed events, nothing else. Interrupt-context posts use a
//! pre-allocated affine slot — a second post before the manager consumed the
//! first is the typed error [`HookError::SlotBusy`].

use crate::device::{DeviceState, StateCell};
use crate::error::HookError;
use crate::message::{
    AsrResult, AudioDump, AudioStream, FrameRequest, InputReceive, Message, MessageBody,
    NotifyData, NotifyEvent, ReceiverMask, ResultUpdate,
};
use crate::query::FrameworkRequest;
use crate::surface::FrameBuffer;
use log::error;
use mailbox::{DeliveryScope, ManagerId, Router};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn envelope(body: MessageBody, scope: DeliveryScope, target: ManagerId) -> Message {
    match scope {
        DeliveryScope::Local => Message::local(body),
        _ => Message::bridged(body, scope, target),
    }
}

/// Hook held by a capture device.
pub struct CameraHook {
    router: Arc<Router<Message>>,
    dev_id: u8,
    state: Arc<StateCell>,
    in_flight: Arc<AtomicBool>,
}

impl CameraHook {
    /// Builds the hook and the manager-side handle to its affine slot.
    pub fn new(
        router: Arc<Router<Message>>,
        dev_id: u8,
        state: Arc<StateCell>,
    ) -> (Self, Arc<AtomicBool>) {
        let in_flight = Arc::new(AtomicBool::new(false));
        (
            Self {
                router,
                dev_id,
                state,
                in_flight: Arc::clone(&in_flight),
            },
            in_flight,
        )
    }

    /// Reports that a capture completed, from task context.
    pub fn frame_ready(&self) -> Result<(), HookError> {
        self.claim_slot()?;
        self.router
            .put(
                ManagerId::Camera,
                Message::local(MessageBody::CameraDequeue {
                    dev_id: self.dev_id,
                }),
            )
            .map_err(|err| {
                self.in_flight.store(false, Ordering::Release);
                HookError::Mailbox(err)
            })
    }

    /// Reports that a capture completed, from interrupt context. Must not
    /// allocate; the event rides the pre-allocated slot.
    pub fn frame_ready_from_isr(&self) -> Result<bool, HookError> {
        self.claim_slot()?;
        match self.router.put_from_isr(
            ManagerId::Camera,
            Message::local(MessageBody::CameraDequeue {
                dev_id: self.dev_id,
            }),
        ) {
            Ok(post) => Ok(post.needs_yield),
            Err(err) => {
                self.in_flight.store(false, Ordering::Release);
                Err(HookError::Mailbox(err))
            }
        }
    }

    /// Reports asynchronous init completion.
    pub fn init_done(&self, success: bool) {
        if success {
            self.state.set(DeviceState::Initialized);
        } else {
            error!("camera dev {} async init failed", self.dev_id);
        }
    }

    fn claim_slot(&self) -> Result<(), HookError> {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            return Err(HookError::SlotBusy);
        }
        Ok(())
    }
}

/// Hook held by a display device.
#[derive(Clone)]
pub struct DisplayHook {
    router: Arc<Router<Message>>,
    dev_id: u8,
}

impl DisplayHook {
    /// Builds the hook.
    pub fn new(router: Arc<Router<Message>>, dev_id: u8) -> Self {
        Self { router, dev_id }
    }

    /// Asks the camera manager for the next frame. `buffer` replaces the
    /// destination buffer retained by the camera; `None` re-arms the
    /// previous one.
    pub fn request_frame(&self, buffer: Option<FrameBuffer>) -> Result<(), HookError> {
        self.router
            .put(
                ManagerId::Camera,
                Message::local(MessageBody::DisplayRequestFrame(FrameRequest {
                    requester: self.dev_id,
                    descriptor: None,
                    buffer,
                })),
            )
            .map_err(HookError::Mailbox)
    }
}

/// Hook held by an input device.
#[derive(Clone)]
pub struct InputHook {
    router: Arc<Router<Message>>,
    dev_id: u8,
}

impl InputHook {
    /// Builds the hook.
    pub fn new(router: Arc<Router<Message>>, dev_id: u8) -> Self {
        Self { router, dev_id }
    }

    /// Posts a raw input event for fan-out to the masked managers.
    pub fn recv(
        &self,
        receivers: ReceiverMask,
        data: Arc<[u8]>,
        copy: bool,
        scope: DeliveryScope,
    ) -> Result<(), HookError> {
        let body = MessageBody::InputReceive(InputReceive {
            dev_id: self.dev_id,
            receivers,
            data,
            copy,
        });
        self.router
            .put(ManagerId::Input, envelope(body, scope, ManagerId::Input))
            .map_err(HookError::Mailbox)
    }

    /// Routes a microphone block to the audio-processing manager.
    pub fn audio(&self, data: Arc<[u8]>) -> Result<(), HookError> {
        self.router
            .put(
                ManagerId::Audio,
                Message::local(MessageBody::InputAudioReceived(AudioStream {
                    dev_id: self.dev_id,
                    data,
                })),
            )
            .map_err(HookError::Mailbox)
    }

    /// Interrupt-context variant of [`InputHook::audio`].
    pub fn audio_from_isr(&self, data: Arc<[u8]>) -> Result<bool, HookError> {
        self.router
            .put_from_isr(
                ManagerId::Audio,
                Message::local(MessageBody::InputAudioReceived(AudioStream {
                    dev_id: self.dev_id,
                    data,
                })),
            )
            .map(|post| post.needs_yield)
            .map_err(HookError::Mailbox)
    }

    /// Posts a self-describing framework query.
    pub fn framework(&self, request: FrameworkRequest) -> Result<(), HookError> {
        self.router
            .put(
                ManagerId::Input,
                Message::local(MessageBody::FrameworkReceived(request)),
            )
            .map_err(HookError::Mailbox)
    }
}

/// Hook held by an output device.
#[derive(Clone)]
pub struct OutputHook {
    router: Arc<Router<Message>>,
    dev_id: u8,
}

impl OutputHook {
    /// Builds the hook.
    pub fn new(router: Arc<Router<Message>>, dev_id: u8) -> Self {
        Self { router, dev_id }
    }

    /// Delivers an event to another manager's devices.
    pub fn notify(
        &self,
        to: ManagerId,
        event: NotifyEvent,
        scope: DeliveryScope,
    ) -> Result<(), HookError> {
        let body = MessageBody::InputNotify(NotifyData {
            dev_id: self.dev_id,
            event,
        });
        self.router
            .put(to, envelope(body, scope, to))
            .map_err(HookError::Mailbox)
    }
}

/// Hook held by a vision-algorithm device.
#[derive(Clone)]
pub struct VisionHook {
    router: Arc<Router<Message>>,
    dev_id: u8,
    request_templates: Arc<Vec<FrameRequest>>,
}

impl VisionHook {
    /// Builds the hook; `request_templates` are the device's supported frame
    /// requests, used when the device asks for frames on its own.
    pub fn new(
        router: Arc<Router<Message>>,
        dev_id: u8,
        request_templates: Arc<Vec<FrameRequest>>,
    ) -> Self {
        Self {
            router,
            dev_id,
            request_templates,
        }
    }

    /// Posts an inference result toward the output manager.
    pub fn result_update(&self, data: Arc<[u8]>, scope: DeliveryScope) -> Result<(), HookError> {
        let body = MessageBody::VAlgoResultUpdate(ResultUpdate {
            dev_id: self.dev_id,
            data,
        });
        self.router
            .put(
                ManagerId::Output,
                envelope(body, scope, ManagerId::Output),
            )
            .map_err(HookError::Mailbox)
    }

    /// Drives LED brightness through the output manager.
    pub fn led_pwm(&self, brightness: u8) -> Result<(), HookError> {
        self.notify_to(
            ManagerId::Output,
            NotifyEvent::LedPwmControl { brightness },
        )
    }

    /// Drives camera exposure through the camera manager.
    pub fn camera_exposure(&self, enable: bool) -> Result<(), HookError> {
        self.notify_to(
            ManagerId::Camera,
            NotifyEvent::CameraExposureControl { enable },
        )
    }

    /// Toggles recording on the vision manager itself.
    pub fn record_control(&self, state: u8) -> Result<(), HookError> {
        self.notify_to(ManagerId::VisionAlgo, NotifyEvent::RecordControl { state })
    }

    /// Re-requests every supported frame from the camera manager.
    pub fn request_frames(&self) -> Result<(), HookError> {
        for template in self.request_templates.iter() {
            self.router
                .put(
                    ManagerId::Camera,
                    Message::local(MessageBody::VAlgoRequestFrame(template.clone())),
                )
                .map_err(HookError::Mailbox)?;
        }
        Ok(())
    }

    fn notify_to(&self, to: ManagerId, event: NotifyEvent) -> Result<(), HookError> {
        self.router
            .put(
                to,
                Message::local(MessageBody::InputNotify(NotifyData {
                    dev_id: self.dev_id,
                    event,
                })),
            )
            .map_err(HookError::Mailbox)
    }
}

/// Hook held by a voice-algorithm device.
#[derive(Clone)]
pub struct VoiceHook {
    router: Arc<Router<Message>>,
    dev_id: u8,
}

impl VoiceHook {
    /// Builds the hook.
    pub fn new(router: Arc<Router<Message>>, dev_id: u8) -> Self {
        Self { router, dev_id }
    }

    /// Posts a recognition result toward the output manager.
    pub fn result(&self, result: AsrResult, scope: DeliveryScope) -> Result<(), HookError> {
        let body = MessageBody::AsrResultUpdate {
            dev_id: self.dev_id,
            result,
        };
        self.router
            .put(
                ManagerId::Output,
                envelope(body, scope, ManagerId::Output),
            )
            .map_err(HookError::Mailbox)
    }

    /// Feeds the measured utterance length back to the acoustic front-end.
    pub fn afe_feedback(&self, utterance_len: u32) -> Result<(), HookError> {
        self.router
            .put(
                ManagerId::Audio,
                Message::local(MessageBody::InputNotify(NotifyData {
                    dev_id: self.dev_id,
                    event: NotifyEvent::AsrToAfeFeedback { utterance_len },
                })),
            )
            .map_err(HookError::Mailbox)
    }

    /// Posts an audio dump toward the output manager. Always a fresh
    /// allocation; dump consumers lag.
    pub fn audio_dump(&self, data: Arc<[u8]>) -> Result<(), HookError> {
        self.router
            .put(
                ManagerId::Output,
                Message::local(MessageBody::AudioDump(AudioDump {
                    dev_id: self.dev_id,
                    data,
                })),
            )
            .map_err(HookError::Mailbox)
    }
}

/// Hook held by an acoustic front-end device.
#[derive(Clone)]
pub struct AfeHook {
    router: Arc<Router<Message>>,
    dev_id: u8,
}

impl AfeHook {
    /// Builds the hook.
    pub fn new(router: Arc<Router<Message>>, dev_id: u8) -> Self {
        Self { router, dev_id }
    }

    /// Forwards one cleaned audio block to the voice-algorithm manager.
    pub fn done(&self, cleaned: Arc<[u8]>) -> Result<(), HookError> {
        self.router
            .put(
                ManagerId::VoiceAlgo,
                Message::local(MessageBody::AsrInputProcess(AudioStream {
                    dev_id: self.dev_id,
                    data: cleaned,
                })),
            )
            .map_err(HookError::Mailbox)
    }

    /// Posts raw + cleaned audio toward dump consumers.
    pub fn dump(&self, data: Arc<[u8]>) -> Result<(), HookError> {
        self.router
            .put(
                ManagerId::Output,
                Message::local(MessageBody::AudioDump(AudioDump {
                    dev_id: self.dev_id,
                    data,
                })),
            )
            .map_err(HookError::Mailbox)
    }
}

/// Hook held by the multicore transport device.
#[derive(Clone)]
pub struct MulticoreHook {
    router: Arc<Router<Message>>,
}

impl MulticoreHook {
    /// Builds the hook.
    pub fn new(router: Arc<Router<Message>>) -> Self {
        Self { router }
    }

    /// Delivers one inbound serialized envelope to the bridge for decoding
    /// and local re-injection.
    pub fn received(&self, data: Arc<[u8]>) -> Result<(), HookError> {
        self.router
            .put(ManagerId::Multicore, Message::local(MessageBody::Raw(data)))
            .map_err(HookError::Mailbox)
    }
}
