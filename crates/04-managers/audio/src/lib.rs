//! Audio-processing manager.
//!
//! Owns the acoustic front-end devices. Raw microphone blocks arriving from
//! the input manager run through each front-end; cleaned audio flows onward
//! to the voice-algorithm manager and dumps flow to the output manager, both
//! through the device's hook. Feedback from the ASR engine and the speaker
//! comes back in through `input_notify`.

use device_abi::{
    AfeDevice, AfeHook, ComponentInfo, DeviceError, FrameworkReply, ManagerId, Message,
    MessageBody, Registry, MAX_AFE_DEV,
};
use log::{debug, error};
use std::sync::Arc;
use task_runtime::{ManagerTask, TaskContext, TaskError, TaskSpec};

/// Task name of the audio-processing manager.
pub const AUDIO_TASK_NAME: &str = "audio_processing";

/// The default task spec for this manager.
pub fn task_spec(priority: u8) -> TaskSpec {
    TaskSpec::new(ManagerId::Audio, AUDIO_TASK_NAME, priority)
}

/// The audio-processing manager task state.
pub struct AudioManager {
    devs: Registry<Box<dyn AfeDevice>>,
}

impl AudioManager {
    /// An empty manager ready for device registration.
    pub fn new() -> Self {
        Self {
            devs: Registry::new("audio_processing", MAX_AFE_DEV),
        }
    }

    /// Registers an acoustic front-end device; the slot index becomes its id.
    pub fn register(&mut self, dev: Box<dyn AfeDevice>) -> Result<u8, DeviceError> {
        self.devs.register(dev)
    }

    /// Whether no device has been registered.
    pub fn is_empty(&self) -> bool {
        self.devs.is_empty()
    }
}

impl Default for AudioManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ManagerTask<Message> for AudioManager {
    fn on_init(&mut self, ctx: &TaskContext<Message>) -> Result<(), TaskError> {
        for (id, dev) in self.devs.iter_mut() {
            debug!("INIT audio processing dev [{}]", id);
            let hook = AfeHook::new(Arc::clone(ctx.router()), id);
            if let Err(err) = dev.init(hook) {
                error!("INIT audio processing dev [{}] error: {}", id, err);
            }
        }

        for (id, dev) in self.devs.iter_mut() {
            debug!("START audio processing dev [{}]", id);
            dev.start()
                .map_err(|err| TaskError::Init(format!("start afe dev {id}: {err}")))?;
        }

        Ok(())
    }

    fn on_message(&mut self, msg: Message, _ctx: &TaskContext<Message>) {
        match msg.body {
            MessageBody::InputAudioReceived(audio) => {
                for (id, dev) in self.devs.iter_mut() {
                    if let Err(err) = dev.run(&audio) {
                        error!("Audio processing dev [{}] run failed error: {}", id, err);
                    }
                }
            }
            MessageBody::InputNotify(notify) => {
                for (_, dev) in self.devs.iter_mut() {
                    if let Err(err) = dev.input_notify(&notify.event) {
                        error!("inputNotify afe dev {} failed: {}", dev.name(), err);
                    }
                }
            }
            MessageBody::FrameworkGetComponents(request) => {
                for (id, dev) in self.devs.iter() {
                    request.reply(FrameworkReply::Component(ComponentInfo {
                        manager: ManagerId::Audio.index() as u8,
                        device_id: id,
                        device_name: dev.name().to_string(),
                        configs: Vec::new(),
                    }));
                }
                request.finish();
            }
            MessageBody::Shutdown => {
                debug!("audio-processing manager shutting down");
            }
            _ => {}
        }
    }
}
