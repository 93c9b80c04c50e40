//! Input manager.
//!
//! Collects events from input devices and fans them out. Raw events carry a
//! receiver bitmask; each named manager gets an `InputNotify`, with a private
//! copy of the bytes when the producer asked for one. Audio blocks route to
//! the audio-processing manager only, and self-describing framework queries
//! are answered locally or dispatched to the manager they name.

use device_abi::{
    ComponentInfo, DeviceError, FrameworkQuery, FrameworkReply, FrameworkRequest, InputDevice,
    InputHook, InputReceive, ManagerId, ManagerInfo, Message, MessageBody, NotifyData,
    NotifyEvent, Registry, MAX_INPUT_DEV,
};
use log::{debug, error};
use std::sync::Arc;
use task_runtime::{ManagerTask, TaskContext, TaskError, TaskSpec};

/// Task name of the input manager.
pub const INPUT_TASK_NAME: &str = "input_manager";

/// The default task spec for this manager.
pub fn task_spec(priority: u8) -> TaskSpec {
    TaskSpec::new(ManagerId::Input, INPUT_TASK_NAME, priority)
}

/// The input manager task state.
pub struct InputManager {
    devs: Registry<Box<dyn InputDevice>>,
}

impl InputManager {
    /// An empty manager ready for device registration.
    pub fn new() -> Self {
        Self {
            devs: Registry::new("input", MAX_INPUT_DEV),
        }
    }

    /// Registers an input device; the slot index becomes its id.
    pub fn register(&mut self, dev: Box<dyn InputDevice>) -> Result<u8, DeviceError> {
        self.devs.register(dev)
    }

    /// Whether no device has been registered.
    pub fn is_empty(&self) -> bool {
        self.devs.is_empty()
    }

    fn handle_framework_request(&self, request: FrameworkRequest, ctx: &TaskContext<Message>) {
        match &request.query {
            FrameworkQuery::GetManagerInfo => {
                for index in 0..ManagerId::APP_BOUNDARY {
                    let Some(id) = ManagerId::from_index(index) else {
                        continue;
                    };
                    if let Some(info) = ctx.table().info(id) {
                        request.reply(FrameworkReply::Manager(ManagerInfo {
                            manager: index as u8,
                            name: info.name,
                            priority: info.priority,
                        }));
                    }
                }
                request.finish();
            }
            FrameworkQuery::GetManagerComponents(manager) => {
                let manager = *manager;
                if ctx.table().is_registered(manager) {
                    let forwarded =
                        Message::local(MessageBody::FrameworkGetComponents(request.clone()));
                    if let Err(err) = ctx.router().put(manager, forwarded) {
                        error!("component query dispatch to {:?} failed: {}", manager, err);
                        request.finish();
                    }
                } else {
                    request.finish();
                }
            }
            FrameworkQuery::GetDeviceConfigs { manager, .. } => {
                let manager = *manager;
                if ctx.table().is_registered(manager) {
                    let forwarded =
                        Message::local(MessageBody::FrameworkGetDeviceConfigs(request.clone()));
                    if let Err(err) = ctx.router().put(manager, forwarded) {
                        error!("config query dispatch to {:?} failed: {}", manager, err);
                        request.finish();
                    }
                } else {
                    request.finish();
                }
            }
        }
    }

    fn fan_out(&self, recv: InputReceive, was_multicore: bool, ctx: &TaskContext<Message>) {
        // Events from unknown local devices are dropped unless the bridge
        // re-injected them from the peer core.
        if self.devs.get(recv.dev_id).is_none() && !was_multicore {
            return;
        }

        for target in recv.receivers.iter() {
            if !ctx.table().is_registered(target) {
                continue;
            }
            let data = if recv.copy {
                // Private copy per recipient.
                Arc::from(&*recv.data)
            } else {
                Arc::clone(&recv.data)
            };
            let notify = Message::local(MessageBody::InputNotify(NotifyData {
                dev_id: recv.dev_id,
                event: NotifyEvent::Raw(data),
            }));
            if let Err(err) = ctx.router().put(target, notify) {
                error!("input fan-out to {:?} failed: {}", target, err);
            }
        }
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ManagerTask<Message> for InputManager {
    fn on_init(&mut self, ctx: &TaskContext<Message>) -> Result<(), TaskError> {
        for (id, dev) in self.devs.iter_mut() {
            debug!("INIT input dev[{}]", id);
            let hook = InputHook::new(Arc::clone(ctx.router()), id);
            if let Err(err) = dev.init(hook) {
                // A dead input device degrades, it does not abort the system.
                error!("INIT input dev [{}] error: {}", id, err);
            }
        }

        for (id, dev) in self.devs.iter_mut() {
            debug!("START input dev [{}]", id);
            dev.start()
                .map_err(|err| TaskError::Init(format!("start input dev {id}: {err}")))?;
        }

        Ok(())
    }

    fn on_message(&mut self, msg: Message, ctx: &TaskContext<Message>) {
        let was_multicore = msg.multicore.was_multicore;
        match msg.body {
            MessageBody::FrameworkReceived(request) => {
                self.handle_framework_request(request, ctx);
            }
            MessageBody::InputReceive(recv) => {
                self.fan_out(recv, was_multicore, ctx);
            }
            MessageBody::InputNotify(notify) => {
                for (id, dev) in self.devs.iter_mut() {
                    if let Err(err) = dev.input_notify(&notify.event) {
                        error!(
                            "inputNotify input dev id:{} name:{} error {}",
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
                        manager: ManagerId::Input.index() as u8,
                        device_id: id,
                        device_name: dev.name().to_string(),
                        configs: Vec::new(),
                    }));
                }
                request.finish();
            }
            MessageBody::Shutdown => {
                debug!("input manager shutting down");
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use device_abi::ReceiverMask;
    use mailbox::Router;
    use parking_lot::Mutex;
    use task_runtime::TaskTable;

    struct NullInput;

    impl InputDevice for NullInput {
        fn name(&self) -> &str {
            "null-input"
        }
        fn init(&mut self, _hook: InputHook) -> Result<(), DeviceError> {
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
    }

    fn setup() -> (InputManager, TaskContext<Message>, Arc<Router<Message>>) {
        let router = Arc::new(Router::new());
        let table = Arc::new(TaskTable::new());
        let ctx = TaskContext::new(Arc::clone(&router), table);
        let mut mgr = InputManager::new();
        mgr.register(Box::new(NullInput)).unwrap();
        (mgr, ctx, router)
    }

    fn recv_msg(receivers: ReceiverMask, data: &[u8], copy: bool) -> Message {
        Message::local(MessageBody::InputReceive(InputReceive {
            dev_id: 0,
            receivers,
            data: Arc::from(data),
            copy,
        }))
    }

    #[test]
    fn fan_out_reaches_every_masked_registered_manager() {
        let (mut mgr, ctx, router) = setup();
        let display_rx = router.register(ManagerId::Display, 4).unwrap();
        let output_rx = router.register(ManagerId::Output, 4).unwrap();
        ctx.table().register(ManagerId::Display, "display", 2);
        ctx.table().register(ManagerId::Output, "output", 3);

        let mask = ReceiverMask::none()
            .with(ManagerId::Display)
            .with(ManagerId::Output);
        mgr.on_message(recv_msg(mask, b"evt", false), &ctx);

        for rx in [&display_rx, &output_rx] {
            let msg = rx.try_get().unwrap().expect("fan-out message");
            match msg.body {
                MessageBody::InputNotify(notify) => {
                    assert_eq!(notify.event, NotifyEvent::Raw(Arc::from(&b"evt"[..])));
                }
                other => panic!("unexpected message {other:?}"),
            }
        }
    }

    #[test]
    fn unregistered_receiver_bit_is_a_no_op() {
        let (mut mgr, ctx, router) = setup();
        let display_rx = router.register(ManagerId::Display, 4).unwrap();
        ctx.table().register(ManagerId::Display, "display", 2);
        // VoiceAlgo bit set but no task registered for it.

        let mask = ReceiverMask::none()
            .with(ManagerId::Display)
            .with(ManagerId::VoiceAlgo);
        mgr.on_message(recv_msg(mask, b"x", false), &ctx);

        assert!(display_rx.try_get().unwrap().is_some());
    }

    #[test]
    fn copy_flag_gives_each_recipient_its_own_bytes() {
        let (mut mgr, ctx, router) = setup();
        let display_rx = router.register(ManagerId::Display, 4).unwrap();
        ctx.table().register(ManagerId::Display, "display", 2);

        let original: Arc<[u8]> = Arc::from(&b"shared"[..]);
        mgr.on_message(
            Message::local(MessageBody::InputReceive(InputReceive {
                dev_id: 0,
                receivers: ReceiverMask::none().with(ManagerId::Display),
                data: Arc::clone(&original),
                copy: true,
            })),
            &ctx,
        );

        match display_rx.try_get().unwrap().unwrap().body {
            MessageBody::InputNotify(notify) => match notify.event {
                NotifyEvent::Raw(data) => {
                    assert_eq!(&*data, b"shared");
                    assert!(!Arc::ptr_eq(&data, &original), "copy requested");
                }
                other => panic!("unexpected event {other:?}"),
            },
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn events_from_unknown_devices_are_dropped_unless_bridged() {
        let (mut mgr, ctx, router) = setup();
        let display_rx = router.register(ManagerId::Display, 4).unwrap();
        ctx.table().register(ManagerId::Display, "display", 2);

        let mask = ReceiverMask::none().with(ManagerId::Display);
        let mut msg = recv_msg(mask, b"x", false);
        if let MessageBody::InputReceive(recv) = &mut msg.body {
            recv.dev_id = 9; // not registered locally
        }
        mgr.on_message(msg.clone(), &ctx);
        assert!(display_rx.try_get().unwrap().is_none());

        // The same event re-injected by the bridge goes through.
        msg.multicore.was_multicore = true;
        mgr.on_message(msg, &ctx);
        assert!(display_rx.try_get().unwrap().is_some());
    }

    #[test]
    fn manager_info_query_is_answered_locally() {
        let (mut mgr, ctx, _router) = setup();
        ctx.table().register(ManagerId::Camera, "camera", 1);
        ctx.table().register(ManagerId::Input, "input", 2);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let request = FrameworkRequest::new(FrameworkQuery::GetManagerInfo, move |reply, done| {
            sink.lock().push((reply, done));
        });

        mgr.on_message(Message::local(MessageBody::FrameworkReceived(request)), &ctx);

        let replies = seen.lock();
        assert_eq!(replies.len(), 3, "two managers plus the terminal call");
        assert!(matches!(
            replies[0],
            (Some(FrameworkReply::Manager(_)), false)
        ));
        assert!(matches!(replies[2], (None, true)));
    }

    #[test]
    fn component_query_for_unregistered_manager_finishes_immediately() {
        let (mut mgr, ctx, _router) = setup();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let request = FrameworkRequest::new(
            FrameworkQuery::GetManagerComponents(ManagerId::Camera),
            move |reply, done| {
                sink.lock().push((reply.is_some(), done));
            },
        );

        mgr.on_message(Message::local(MessageBody::FrameworkReceived(request)), &ctx);
        assert_eq!(&*seen.lock(), &[(false, true)]);
    }
}
