//! Display manager.
//!
//! Initializes and starts the display devices, then primes the camera
//! manager with one full-geometry frame request per device. Every answered
//! frame is blitted to the panel; a synchronous blit immediately re-arms the
//! request, carrying only the device id and the returned buffer — the camera
//! manager retains the geometry from the initial post.

use device_abi::{
    BlitOutcome, ComponentInfo, DeviceError, DisplayDevice, DisplayHook, FpsCounter, FrameRequest,
    FrameworkReply, ManagerId, Message, MessageBody, Registry, MAX_DISPLAY_DEV,
};
use log::{debug, error, info};
use std::sync::Arc;
use task_runtime::{ManagerTask, TaskContext, TaskError, TaskSpec};

/// Task name of the display manager.
pub const DISPLAY_TASK_NAME: &str = "display_manager";

/// The default task spec for this manager.
pub fn task_spec(priority: u8) -> TaskSpec {
    TaskSpec::new(ManagerId::Display, DISPLAY_TASK_NAME, priority)
}

struct DisplayEntry {
    dev: Box<dyn DisplayDevice>,
    fps: FpsCounter,
}

/// The display manager task state.
pub struct DisplayManager {
    devs: Registry<DisplayEntry>,
}

impl DisplayManager {
    /// An empty manager ready for device registration.
    pub fn new() -> Self {
        Self {
            devs: Registry::new("display", MAX_DISPLAY_DEV),
        }
    }

    /// Registers a display device; the slot index becomes its id.
    pub fn register(&mut self, dev: Box<dyn DisplayDevice>) -> Result<u8, DeviceError> {
        self.devs.register(DisplayEntry {
            dev,
            fps: FpsCounter::new(),
        })
    }

    /// Whether no display device has been registered.
    pub fn is_empty(&self) -> bool {
        self.devs.is_empty()
    }

    /// Frame counter of one display, for inspection.
    pub fn fps(&self, dev_id: u8) -> Option<FpsCounter> {
        self.devs.get(dev_id).map(|entry| entry.fps.clone())
    }
}

impl Default for DisplayManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ManagerTask<Message> for DisplayManager {
    fn on_init(&mut self, ctx: &TaskContext<Message>) -> Result<(), TaskError> {
        for (id, entry) in self.devs.iter_mut() {
            debug!("[DisplayManager]:INIT dev[{}]", id);
            let hook = DisplayHook::new(Arc::clone(ctx.router()), id);
            entry
                .dev
                .init(hook)
                .map_err(|err| TaskError::Init(format!("init display dev {id}: {err}")))?;
        }

        for (id, entry) in self.devs.iter_mut() {
            debug!("[DisplayManager]:START dev[{}]", id);
            entry
                .dev
                .start()
                .map_err(|err| TaskError::Init(format!("start display dev {id}: {err}")))?;
        }

        // Prime the camera manager with one full request per device.
        for (id, entry) in self.devs.iter() {
            let cap = entry.dev.cap();
            let request = FrameRequest {
                requester: id,
                descriptor: Some(cap.frame),
                buffer: Some(cap.framebuffer.clone()),
            };
            if let Err(err) = ctx.router().put(
                ManagerId::Camera,
                Message::local(MessageBody::DisplayRequestFrame(request)),
            ) {
                error!("initial display request post failed: {}", err);
            }
        }

        Ok(())
    }

    fn on_message(&mut self, msg: Message, ctx: &TaskContext<Message>) {
        match msg.body {
            MessageBody::DisplayResponseFrame(response) => {
                let Some(entry) = self.devs.get_mut(response.requester) else {
                    return;
                };
                info!("Frame received for display w/ id #{}", response.requester);
                match entry.dev.blit(&response.buffer) {
                    Ok(BlitOutcome::Done) => {
                        let request = FrameRequest {
                            requester: response.requester,
                            descriptor: None,
                            buffer: Some(response.buffer),
                        };
                        if let Err(err) = ctx.router().put(
                            ManagerId::Camera,
                            Message::local(MessageBody::DisplayRequestFrame(request)),
                        ) {
                            error!("display re-request post failed: {}", err);
                        }
                        entry.fps.tick();
                    }
                    Ok(BlitOutcome::NonBlocking) => {
                        // The device re-requests on its own completion path.
                        entry.fps.tick();
                    }
                    Err(err) => {
                        error!(
                            "blit on display dev {} failed: {}",
                            response.requester, err
                        );
                    }
                }
            }
            MessageBody::InputNotify(notify) => {
                for (id, entry) in self.devs.iter_mut() {
                    if let Err(err) = entry.dev.input_notify(&notify.event) {
                        error!(
                            "inputNotify display dev id:{} name:{} error {}",
                            id,
                            entry.dev.name(),
                            err
                        );
                    }
                }
            }
            MessageBody::FrameworkGetComponents(request) => {
                for (id, entry) in self.devs.iter() {
                    request.reply(FrameworkReply::Component(ComponentInfo {
                        manager: ManagerId::Display.index() as u8,
                        device_id: id,
                        device_name: entry.dev.name().to_string(),
                        configs: Vec::new(),
                    }));
                }
                request.finish();
            }
            MessageBody::Shutdown => {
                debug!("display manager shutting down");
            }
            _ => {}
        }
    }
}
