//! Voice-algorithm manager.
//!
//! Runs the wake-word / voice-command recognizers. The manager itself is
//! thin: it owns the voice devices, routes cleaned audio blocks into them
//! and forwards configuration events. The recognition session machine lives
//! in [`asr`] and is packaged as a voice device.

pub mod asr;

use device_abi::{
    ComponentInfo, DeviceError, FrameworkReply, ManagerId, Message, MessageBody, Registry,
    VoiceAlgoDevice, VoiceHook, MAX_VOICE_ALGO_DEV,
};
use log::{debug, error};
use std::sync::Arc;
use task_runtime::{ManagerTask, TaskContext, TaskError, TaskSpec};

/// Task name of the voice-algorithm manager.
pub const VOICE_TASK_NAME: &str = "voice_algo_manager";

/// The default task spec for this manager.
pub fn task_spec(priority: u8) -> TaskSpec {
    TaskSpec::new(ManagerId::VoiceAlgo, VOICE_TASK_NAME, priority)
}

/// The voice-algorithm manager task state.
pub struct VoiceManager {
    devs: Registry<Box<dyn VoiceAlgoDevice>>,
}

impl VoiceManager {
    /// An empty manager ready for device registration.
    pub fn new() -> Self {
        Self {
            devs: Registry::new("voice_algo", MAX_VOICE_ALGO_DEV),
        }
    }

    /// Registers a voice-algorithm device; the slot index becomes its id.
    pub fn register(&mut self, dev: Box<dyn VoiceAlgoDevice>) -> Result<u8, DeviceError> {
        self.devs.register(dev)
    }

    /// Whether no device has been registered.
    pub fn is_empty(&self) -> bool {
        self.devs.is_empty()
    }
}

impl Default for VoiceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ManagerTask<Message> for VoiceManager {
    fn on_init(&mut self, ctx: &TaskContext<Message>) -> Result<(), TaskError> {
        for (id, dev) in self.devs.iter_mut() {
            debug!("INIT voice algo dev[{}]", id);
            let hook = VoiceHook::new(Arc::clone(ctx.router()), id);
            if let Err(err) = dev.init(hook) {
                // A dead recognizer degrades; the rest of the system runs on.
                error!("INIT voice algo dev [{}] error: {}", id, err);
            }
        }
        Ok(())
    }

    fn on_message(&mut self, msg: Message, _ctx: &TaskContext<Message>) {
        match msg.body {
            MessageBody::AsrInputProcess(audio) => {
                if let Some(dev) = self.devs.get_mut(audio.dev_id) {
                    if let Err(err) = dev.run(&audio) {
                        error!("voice algo dev {} run failed: {}", audio.dev_id, err);
                    }
                }
            }
            MessageBody::InputNotify(notify) => {
                for (id, dev) in self.devs.iter_mut() {
                    if let Err(err) = dev.input_notify(&notify.event) {
                        error!(
                            "inputNotify valgo dev id:{} name:{} error {}",
                            id,
                            dev.name(),
                            err
                        );
                    }
                }
            }
            MessageBody::FrameworkGetComponents(request) => {
                for (id, dev) in self.devs.iter() {
                    request.reply(FrameworkReply::Component(ComponentInfo {
                        manager: ManagerId::VoiceAlgo.index() as u8,
                        device_id: id,
                        device_name: dev.name().to_string(),
                        configs: Vec::new(),
                    }));
                }
                request.finish();
            }
            MessageBody::Shutdown => {
                debug!("voice manager shutting down");
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use device_abi::{AudioStream, NotifyData, NotifyEvent};
    use mailbox::Router;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use task_runtime::TaskTable;

    #[derive(Default)]
    struct CountingDevice {
        runs: Arc<AtomicUsize>,
        notifies: Arc<AtomicUsize>,
    }

    impl VoiceAlgoDevice for CountingDevice {
        fn name(&self) -> &str {
            "counting-voice"
        }
        fn init(&mut self, _hook: VoiceHook) -> Result<(), DeviceError> {
            Ok(())
        }
        fn deinit(&mut self) -> Result<(), DeviceError> {
            Ok(())
        }
        fn run(&mut self, _audio: &AudioStream) -> Result<(), DeviceError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn input_notify(&mut self, _event: &NotifyEvent) -> Result<(), DeviceError> {
            self.notifies.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn audio_routes_to_the_producing_device_only() {
        let router = Arc::new(Router::new());
        let ctx = TaskContext::new(Arc::clone(&router), Arc::new(TaskTable::new()));

        let mut mgr = VoiceManager::new();
        let first = CountingDevice::default();
        let second = CountingDevice::default();
        let first_runs = Arc::clone(&first.runs);
        let second_runs = Arc::clone(&second.runs);
        mgr.register(Box::new(first)).unwrap();
        mgr.register(Box::new(second)).unwrap();

        mgr.on_message(
            Message::local(MessageBody::AsrInputProcess(AudioStream {
                dev_id: 1,
                data: Arc::from(&[0u8; 4][..]),
            })),
            &ctx,
        );

        assert_eq!(first_runs.load(Ordering::SeqCst), 0);
        assert_eq!(second_runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn notify_reaches_every_device() {
        let router = Arc::new(Router::new());
        let ctx = TaskContext::new(Arc::clone(&router), Arc::new(TaskTable::new()));

        let mut mgr = VoiceManager::new();
        let dev = CountingDevice::default();
        let notifies = Arc::clone(&dev.notifies);
        mgr.register(Box::new(dev)).unwrap();

        mgr.on_message(
            Message::local(MessageBody::InputNotify(NotifyData {
                dev_id: 0,
                event: NotifyEvent::StopVoiceCommand,
            })),
            &ctx,
        );
        assert_eq!(notifies.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn sleep_broadcast_is_ignored() {
        struct DeinitTracking {
            deinits: Arc<AtomicUsize>,
        }

        impl VoiceAlgoDevice for DeinitTracking {
            fn name(&self) -> &str {
                "deinit-tracking"
            }
            fn init(&mut self, _hook: VoiceHook) -> Result<(), DeviceError> {
                Ok(())
            }
            fn deinit(&mut self) -> Result<(), DeviceError> {
                self.deinits.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            fn run(&mut self, _audio: &AudioStream) -> Result<(), DeviceError> {
                Ok(())
            }
        }

        let router = Arc::new(Router::new());
        let ctx = TaskContext::new(Arc::clone(&router), Arc::new(TaskTable::new()));

        let mut mgr = VoiceManager::new();
        let deinits = Arc::new(AtomicUsize::new(0));
        mgr.register(Box::new(DeinitTracking {
            deinits: Arc::clone(&deinits),
        }))
        .unwrap();

        // The low-power broadcast reaches this mailbox but the manager has
        // no case for it; recognizer teardown happens through explicit
        // model deselection, not the sleep path.
        mgr.on_message(Message::local(MessageBody::LpmPreEnterSleep), &ctx);
        assert_eq!(deinits.load(Ordering::SeqCst), 0);
    }
}
