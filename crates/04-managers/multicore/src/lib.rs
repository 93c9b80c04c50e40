//! Multicore bridge.
//!
//! Hosts the single transport device linking this core to its peer. Messages
//! flagged multicore land in the bridge's mailbox alongside their local
//! delivery; the bridge serializes them out. Size-known kinds travel
//! header-only, data-bearing kinds are deep copies with the embedded scope
//! rewritten to `Local` so the peer does not bridge them back. Inbound
//! frames are decoded, re-flagged and injected into the local mailbox of the
//! manager they name.

use device_abi::{
    AudioDump, DeliveryScope, DeviceError, FrameworkReply, ComponentInfo, ManagerId, Message,
    MessageBody, MulticoreDevice, MulticoreHook,
};
use log::{debug, error};
use std::sync::Arc;
use task_runtime::{ManagerTask, TaskContext, TaskError, TaskSpec};

/// Task name of the multicore bridge.
pub const MULTICORE_TASK_NAME: &str = "multicore_manager";

/// The default task spec for this manager.
pub fn task_spec(priority: u8) -> TaskSpec {
    TaskSpec::new(ManagerId::Multicore, MULTICORE_TASK_NAME, priority)
}

/// The bridge task state; exactly one transport device.
pub struct MulticoreManager {
    dev: Option<Box<dyn MulticoreDevice>>,
}

impl MulticoreManager {
    /// An empty bridge awaiting its transport device.
    pub fn new() -> Self {
        Self { dev: None }
    }

    /// Registers the transport device; only one may exist.
    pub fn register(&mut self, dev: Box<dyn MulticoreDevice>) -> Result<u8, DeviceError> {
        if self.dev.is_some() {
            return Err(DeviceError::RegistryFull("multicore"));
        }
        self.dev = Some(dev);
        Ok(0)
    }

    fn send_out(&mut self, msg: Message) {
        let Some(dev) = self.dev.as_mut() else {
            return;
        };
        match wire::encode(&msg) {
            Ok(frame) => {
                if let Err(err) = dev.send(&frame) {
                    error!("bridge send of {} bytes failed: {}", frame.len(), err);
                }
            }
            Err(err) => {
                error!("bridge cannot serialize message: {}", err);
            }
        }
    }

    /// Outbound path: flatten and send one locally produced message.
    fn handle_outbound(&mut self, mut msg: Message) {
        match &mut msg.body {
            // Data-bearing kinds: deep copy, scope rewritten so the peer
            // treats the message as its own local traffic.
            MessageBody::InputReceive(_)
            | MessageBody::VAlgoResultUpdate(_)
            | MessageBody::AsrResultUpdate { .. }
            | MessageBody::InputNotify(_) => {
                msg.scope = DeliveryScope::Local;
                self.send_out(msg);
            }
            // Size-known kinds go header-only.
            MessageBody::AudioDump(dump) => {
                let header_only = AudioDump {
                    dev_id: dump.dev_id,
                    data: Arc::from(&[][..]),
                };
                msg.body = MessageBody::AudioDump(header_only);
                self.send_out(msg);
            }
            MessageBody::DisplayRequestFrame(_)
            | MessageBody::DisplayResponseFrame(_)
            | MessageBody::VAlgoRequestFrame(_)
            | MessageBody::VAlgoResponseFrame(_) => {
                self.send_out(msg);
            }
            _ => {}
        }
    }

    /// Inbound path: decode a peer frame and re-inject it locally.
    fn handle_inbound(&mut self, frame: &[u8], ctx: &TaskContext<Message>) {
        let mut msg = match wire::decode(frame) {
            Ok(msg) => msg,
            Err(err) => {
                error!("dropping inbound peer frame: {}", err);
                return;
            }
        };

        let Some(target) = msg.multicore.remote_target else {
            error!("inbound peer frame names no target manager");
            return;
        };
        if !ctx.table().is_registered(target) {
            error!("manager {:?} is not registered on this core", target);
            return;
        }

        msg.multicore.is_multicore = false;
        msg.multicore.was_multicore = true;
        msg.scope = DeliveryScope::Local;

        if let Err(err) = ctx.router().put(target, msg) {
            error!("re-injection to {:?} failed: {}", target, err);
        }
    }
}

impl Default for MulticoreManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ManagerTask<Message> for MulticoreManager {
    fn on_init(&mut self, ctx: &TaskContext<Message>) -> Result<(), TaskError> {
        let Some(dev) = self.dev.as_mut() else {
            // A coreless build simply idles the bridge.
            return Ok(());
        };
        let hook = MulticoreHook::new(Arc::clone(ctx.router()));
        dev.init(hook)
            .map_err(|err| TaskError::Init(format!("init multicore dev: {err}")))?;
        dev.start()
            .map_err(|err| TaskError::Init(format!("start multicore dev: {err}")))?;
        Ok(())
    }

    fn on_message(&mut self, msg: Message, ctx: &TaskContext<Message>) {
        match msg.body {
            MessageBody::Raw(ref frame) => {
                let frame = Arc::clone(frame);
                self.handle_inbound(&frame, ctx);
            }
            MessageBody::FrameworkGetComponents(request) => {
                if let Some(dev) = self.dev.as_ref() {
                    request.reply(FrameworkReply::Component(ComponentInfo {
                        manager: ManagerId::Multicore.index() as u8,
                        device_id: 0,
                        device_name: dev.name().to_string(),
                        configs: Vec::new(),
                    }));
                }
                request.finish();
            }
            MessageBody::Shutdown => {
                debug!("multicore bridge shutting down");
                if let Some(dev) = self.dev.as_mut() {
                    if let Err(err) = dev.deinit() {
                        error!("deinit multicore dev failed: {}", err);
                    }
                }
            }
            _ => self.handle_outbound(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use device_abi::{
        AsrDetectStatus, AsrResult, MulticoreInfo, NotifyData, NotifyEvent, ResultUpdate,
    };
    use mailbox::Router;
    use parking_lot::Mutex;
    use task_runtime::TaskTable;

    struct LoopbackLink {
        sent: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl MulticoreDevice for LoopbackLink {
        fn name(&self) -> &str {
            "loopback-link"
        }
        fn init(&mut self, _hook: MulticoreHook) -> Result<(), DeviceError> {
            Ok(())
        }
        fn start(&mut self) -> Result<(), DeviceError> {
            Ok(())
        }
        fn send(&mut self, frame: &[u8]) -> Result<(), DeviceError> {
            self.sent.lock().push(frame.to_vec());
            Ok(())
        }
        fn deinit(&mut self) -> Result<(), DeviceError> {
            Ok(())
        }
    }

    fn setup() -> (
        MulticoreManager,
        TaskContext<Message>,
        Arc<Router<Message>>,
        Arc<Mutex<Vec<Vec<u8>>>>,
    ) {
        let router = Arc::new(Router::new());
        let table = Arc::new(TaskTable::new());
        let ctx = TaskContext::new(Arc::clone(&router), table);
        let sent = Arc::new(Mutex::new(Vec::new()));
        let mut mgr = MulticoreManager::new();
        mgr.register(Box::new(LoopbackLink {
            sent: Arc::clone(&sent),
        }))
        .unwrap();
        (mgr, ctx, router, sent)
    }

    #[test]
    fn only_one_transport_device_registers() {
        let (mut mgr, _ctx, _router, sent) = setup();
        let second = LoopbackLink { sent };
        assert!(mgr.register(Box::new(second)).is_err());
    }

    #[test]
    fn data_bearing_message_is_flattened_with_local_scope() {
        let (mut mgr, ctx, _router, sent) = setup();

        let payload: Arc<[u8]> = Arc::from(&[0x5Au8; 32][..]);
        let msg = Message::bridged(
            MessageBody::InputNotify(NotifyData {
                dev_id: 2,
                event: NotifyEvent::Raw(Arc::clone(&payload)),
            }),
            DeliveryScope::Remote,
            ManagerId::Output,
        );
        mgr.on_message(msg, &ctx);

        let frames = sent.lock();
        assert_eq!(frames.len(), 1);
        // Header + event tag + 32 payload bytes, and the embedded scope
        // reads Local on the peer side.
        let decoded = wire::decode(&frames[0]).unwrap();
        assert_eq!(decoded.scope, DeliveryScope::Local);
        match decoded.body {
            MessageBody::InputNotify(notify) => {
                assert_eq!(notify.dev_id, 2);
                assert_eq!(notify.event, NotifyEvent::Raw(payload));
            }
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[test]
    fn audio_dump_travels_header_only() {
        let (mut mgr, ctx, _router, sent) = setup();

        let msg = Message::bridged(
            MessageBody::AudioDump(AudioDump {
                dev_id: 1,
                data: Arc::from(&[0xFFu8; 512][..]),
            }),
            DeliveryScope::DualCore,
            ManagerId::Output,
        );
        mgr.on_message(msg, &ctx);

        let frames = sent.lock();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].len(), wire::HEADER_LEN, "no payload bytes");
    }

    #[test]
    fn inbound_frame_is_reinjected_with_flipped_flags() {
        let (mut mgr, ctx, router, _sent) = setup();
        let output_rx = router.register(ManagerId::Output, 4).unwrap();
        ctx.table().register(ManagerId::Output, "output", 3);

        let peer_msg = Message::bridged(
            MessageBody::VAlgoResultUpdate(ResultUpdate {
                dev_id: 0,
                data: Arc::from(&b"face#3"[..]),
            }),
            DeliveryScope::Remote,
            ManagerId::Output,
        );
        let frame: Arc<[u8]> = Arc::from(wire::encode(&peer_msg).unwrap().into_boxed_slice());

        mgr.on_message(Message::local(MessageBody::Raw(frame)), &ctx);

        let injected = output_rx.try_get().unwrap().expect("re-injected message");
        assert!(!injected.multicore.is_multicore);
        assert!(injected.multicore.was_multicore);
        assert_eq!(injected.scope, DeliveryScope::Local);
        match injected.body {
            MessageBody::VAlgoResultUpdate(update) => {
                assert_eq!(&*update.data, b"face#3");
            }
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[test]
    fn inbound_frame_for_unregistered_manager_is_dropped() {
        let (mut mgr, ctx, router, _sent) = setup();
        let output_rx = router.register(ManagerId::Output, 4).unwrap();
        // Note: no task-table registration for Output.

        let peer_msg = Message::bridged(
            MessageBody::AsrResultUpdate {
                dev_id: 0,
                result: AsrResult {
                    status: AsrDetectStatus::CommandDetected,
                    language: 1,
                    keyword_id: 3,
                },
            },
            DeliveryScope::Remote,
            ManagerId::Output,
        );
        let frame: Arc<[u8]> = Arc::from(wire::encode(&peer_msg).unwrap().into_boxed_slice());
        mgr.on_message(Message::local(MessageBody::Raw(frame)), &ctx);

        assert!(output_rx.try_get().unwrap().is_none());
    }

    #[test]
    fn truncated_inbound_frame_is_dropped() {
        let (mut mgr, ctx, router, _sent) = setup();
        let output_rx = router.register(ManagerId::Output, 4).unwrap();
        ctx.table().register(ManagerId::Output, "output", 3);

        let peer_msg = Message::bridged(
            MessageBody::VAlgoResultUpdate(ResultUpdate {
                dev_id: 0,
                data: Arc::from(&[1u8, 2, 3, 4][..]),
            }),
            DeliveryScope::Remote,
            ManagerId::Output,
        );
        let mut bytes = wire::encode(&peer_msg).unwrap();
        bytes.truncate(bytes.len() - 2);
        let frame: Arc<[u8]> = Arc::from(bytes.into_boxed_slice());

        mgr.on_message(Message::local(MessageBody::Raw(frame)), &ctx);
        assert!(output_rx.try_get().unwrap().is_none());
    }

    #[test]
    fn messages_without_multicore_flags_pass_through_untouched() {
        // A stray local-only message in the bridge mailbox is ignored.
        let (mut mgr, ctx, _router, sent) = setup();
        mgr.on_message(
            Message {
                scope: DeliveryScope::Local,
                multicore: MulticoreInfo::default(),
                body: MessageBody::LpmPreEnterSleep,
            },
            &ctx,
        );
        assert!(sent.lock().is_empty());
    }
}
