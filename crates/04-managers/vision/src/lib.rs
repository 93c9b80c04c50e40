//! Vision-algorithm manager.
//!
//! Each registered algorithm device declares which frame kinds it needs and
//! their geometry. The manager requests those frames from the camera manager
//! and gates inference: `run` fires only once every supported kind has been
//! answered, after which the ready flags clear and, on success, fresh
//! requests go out.

use device_abi::{
    ComponentInfo, DeliveryScope, DeviceError, FrameKind, FrameRequest, FrameworkReply, ManagerId,
    Message, MessageBody, Registry, VisionAlgoDevice, VisionHook, MAX_VISION_ALGO_DEV,
};
use log::{debug, error};
use std::sync::Arc;
use task_runtime::{ManagerTask, TaskContext, TaskError, TaskSpec};

/// Task name of the vision-algorithm manager.
pub const VISION_TASK_NAME: &str = "vision_algo_manager";

/// Request slots: one per (device, frame kind) pair.
pub const VISION_SLOTS: usize = MAX_VISION_ALGO_DEV * FrameKind::COUNT;

/// The default task spec for this manager.
pub fn task_spec(priority: u8) -> TaskSpec {
    TaskSpec::new(ManagerId::VisionAlgo, VISION_TASK_NAME, priority)
}

/// Slot id of a (device, kind) pair.
pub fn slot_of(dev_id: u8, kind: FrameKind) -> u8 {
    dev_id * FrameKind::COUNT as u8 + kind.index() as u8
}

/// The vision-algorithm manager task state.
pub struct VisionManager {
    devs: Registry<Box<dyn VisionAlgoDevice>>,
    frame_ready: [bool; VISION_SLOTS],
}

impl VisionManager {
    /// An empty manager ready for device registration.
    pub fn new() -> Self {
        Self {
            devs: Registry::new("vision_algo", MAX_VISION_ALGO_DEV),
            frame_ready: [false; VISION_SLOTS],
        }
    }

    /// Registers a vision-algorithm device; the slot index becomes its id.
    pub fn register(&mut self, dev: Box<dyn VisionAlgoDevice>) -> Result<u8, DeviceError> {
        self.devs.register(dev)
    }

    /// Whether no device has been registered.
    pub fn is_empty(&self) -> bool {
        self.devs.is_empty()
    }

    fn request_message(&self, request: FrameRequest, bridge: bool) -> Message {
        let body = MessageBody::VAlgoRequestFrame(request);
        if bridge {
            Message::bridged(body, DeliveryScope::Local, ManagerId::Camera)
        } else {
            Message::local(body)
        }
    }

    fn request_supported_frames(
        &self,
        dev_id: u8,
        full: bool,
        ctx: &TaskContext<Message>,
    ) {
        let Some(dev) = self.devs.get(dev_id) else {
            return;
        };
        let bridge = ctx.router().is_registered(ManagerId::Multicore);
        for kind in FrameKind::all() {
            let Some(spec) = dev.frame(kind) else {
                continue;
            };
            let request = if full {
                FrameRequest {
                    requester: slot_of(dev_id, kind),
                    descriptor: Some(spec.descriptor),
                    buffer: Some(spec.buffer),
                }
            } else {
                // The camera manager retains geometry and buffer.
                FrameRequest {
                    requester: slot_of(dev_id, kind),
                    descriptor: None,
                    buffer: None,
                }
            };
            if let Err(err) = ctx
                .router()
                .put(ManagerId::Camera, self.request_message(request, bridge))
            {
                error!(
                    "frame request for vision dev {} kind {:?} failed: {}",
                    dev_id, kind, err
                );
            }
        }
    }

    fn handle_response(&mut self, slot: u8, ctx: &TaskContext<Message>) {
        let dev_id = slot / FrameKind::COUNT as u8;
        let Some(dev) = self.devs.get_mut(dev_id) else {
            return;
        };

        self.frame_ready[slot as usize] = true;

        let all_ready = FrameKind::all().into_iter().all(|kind| {
            dev.frame(kind).is_none() || self.frame_ready[slot_of(dev_id, kind) as usize]
        });
        if !all_ready {
            return;
        }

        for kind in FrameKind::all() {
            if dev.frame(kind).is_some() {
                self.frame_ready[slot_of(dev_id, kind) as usize] = false;
            }
        }

        match dev.run() {
            Ok(()) => self.request_supported_frames(dev_id, false, ctx),
            Err(err) => {
                error!("vision algo dev {} run failed: {}", dev_id, err);
            }
        }
    }
}

impl Default for VisionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ManagerTask<Message> for VisionManager {
    fn on_init(&mut self, ctx: &TaskContext<Message>) -> Result<(), TaskError> {
        let dev_ids: Vec<u8> = self.devs.iter().map(|(id, _)| id).collect();
        for id in dev_ids {
            // Build the hook's request templates from the declared frames.
            let templates: Vec<FrameRequest> = {
                let dev = self.devs.get(id).expect("registered device");
                FrameKind::all()
                    .into_iter()
                    .filter_map(|kind| {
                        dev.frame(kind).map(|spec| FrameRequest {
                            requester: slot_of(id, kind),
                            descriptor: Some(spec.descriptor),
                            buffer: Some(spec.buffer),
                        })
                    })
                    .collect()
            };
            let hook = VisionHook::new(Arc::clone(ctx.router()), id, Arc::new(templates));

            debug!("INIT vision algo dev[{}]", id);
            let dev = self.devs.get_mut(id).expect("registered device");
            if let Err(err) = dev.init(hook) {
                // A failed engine degrades; the rest of the system proceeds.
                error!("INIT vision algo dev [{}] error: {}", id, err);
                continue;
            }

            if dev.auto_start() {
                self.request_supported_frames(id, true, ctx);
            }
        }
        Ok(())
    }

    fn on_message(&mut self, msg: Message, ctx: &TaskContext<Message>) {
        match msg.body {
            MessageBody::VAlgoResponseFrame(response) => {
                if (response.requester as usize) < VISION_SLOTS {
                    self.handle_response(response.requester, ctx);
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
            MessageBody::LpmPreEnterSleep => {
                // Only one vision engine runs at a time; the sleep broadcast
                // deinits the first registered device.
                if let Some(dev) = self.devs.get_mut(0) {
                    debug!("DEINIT valgo dev \"{}\"", dev.name());
                    if let Err(err) = dev.deinit() {
                        error!("DEINIT valgo dev \"{}\" failed with error: {}", dev.name(), err);
                    }
                }
            }
            MessageBody::FrameworkGetComponents(request) => {
                for (id, dev) in self.devs.iter() {
                    request.reply(FrameworkReply::Component(ComponentInfo {
                        manager: ManagerId::VisionAlgo.index() as u8,
                        device_id: id,
                        device_name: dev.name().to_string(),
                        configs: Vec::new(),
                    }));
                }
                request.finish();
            }
            MessageBody::Shutdown => {
                debug!("vision manager shutting down");
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use device_abi::{
        AlgoFrameSpec, FrameBuffer, FrameDescriptor, FrameResponse, PixelFormat,
    };
    use mailbox::Router;
    use parking_lot::Mutex;
    use task_runtime::TaskTable;

    struct TwoFrameAlgo {
        runs: Arc<Mutex<usize>>,
        rgb: AlgoFrameSpec,
        ir: AlgoFrameSpec,
    }

    impl TwoFrameAlgo {
        fn new() -> Self {
            let desc = FrameDescriptor::packed(8, 8, PixelFormat::Gray8, PixelFormat::Gray8);
            Self {
                runs: Arc::new(Mutex::new(0)),
                rgb: AlgoFrameSpec {
                    descriptor: desc,
                    buffer: FrameBuffer::zeroed(desc.byte_len()),
                },
                ir: AlgoFrameSpec {
                    descriptor: desc,
                    buffer: FrameBuffer::zeroed(desc.byte_len()),
                },
            }
        }
    }

    impl VisionAlgoDevice for TwoFrameAlgo {
        fn name(&self) -> &str {
            "two-frame-algo"
        }

        fn frame(&self, kind: FrameKind) -> Option<AlgoFrameSpec> {
            match kind {
                FrameKind::Rgb => Some(self.rgb.clone()),
                FrameKind::Ir => Some(self.ir.clone()),
                FrameKind::Depth => None,
            }
        }

        fn init(&mut self, _hook: VisionHook) -> Result<(), DeviceError> {
            Ok(())
        }

        fn deinit(&mut self) -> Result<(), DeviceError> {
            Ok(())
        }

        fn run(&mut self) -> Result<(), DeviceError> {
            *self.runs.lock() += 1;
            Ok(())
        }
    }

    fn setup() -> (VisionManager, TaskContext<Message>, Arc<Router<Message>>) {
        let router = Arc::new(Router::new());
        let table = Arc::new(TaskTable::new());
        let ctx = TaskContext::new(Arc::clone(&router), table);
        (VisionManager::new(), ctx, router)
    }

    fn response(slot: u8) -> Message {
        Message::local(MessageBody::VAlgoResponseFrame(FrameResponse {
            requester: slot,
            buffer: FrameBuffer::zeroed(0),
        }))
    }

    #[test]
    fn init_posts_requests_for_supported_kinds_only() {
        let (mut mgr, ctx, router) = setup();
        let camera_rx = router.register(ManagerId::Camera, 8).unwrap();

        mgr.register(Box::new(TwoFrameAlgo::new())).unwrap();
        mgr.on_init(&ctx).unwrap();

        let mut requested = Vec::new();
        while let Some(msg) = camera_rx.try_get().unwrap() {
            match msg.body {
                MessageBody::VAlgoRequestFrame(req) => {
                    assert!(req.descriptor.is_some(), "initial requests are full");
                    requested.push(req.requester);
                }
                other => panic!("unexpected message {other:?}"),
            }
        }
        assert_eq!(
            requested,
            vec![
                slot_of(0, FrameKind::Rgb),
                slot_of(0, FrameKind::Ir)
            ]
        );
    }

    #[test]
    fn run_gates_until_every_supported_kind_arrives() {
        let (mut mgr, ctx, router) = setup();
        let camera_rx = router.register(ManagerId::Camera, 8).unwrap();

        let dev = TwoFrameAlgo::new();
        let runs = Arc::clone(&dev.runs);
        mgr.register(Box::new(dev)).unwrap();
        mgr.on_init(&ctx).unwrap();
        while camera_rx.try_get().unwrap().is_some() {}

        // First kind alone must not trigger inference.
        mgr.on_message(response(slot_of(0, FrameKind::Rgb)), &ctx);
        assert_eq!(*runs.lock(), 0);
        assert!(mgr.frame_ready[slot_of(0, FrameKind::Rgb) as usize]);

        // Second kind completes the set: exactly one run, flags cleared,
        // fresh requests for both kinds.
        mgr.on_message(response(slot_of(0, FrameKind::Ir)), &ctx);
        assert_eq!(*runs.lock(), 1);
        assert!(!mgr.frame_ready[slot_of(0, FrameKind::Rgb) as usize]);
        assert!(!mgr.frame_ready[slot_of(0, FrameKind::Ir) as usize]);

        let mut rerequested = Vec::new();
        while let Some(msg) = camera_rx.try_get().unwrap() {
            if let MessageBody::VAlgoRequestFrame(req) = msg.body {
                assert!(req.descriptor.is_none(), "re-requests are light");
                rerequested.push(req.requester);
            }
        }
        assert_eq!(
            rerequested,
            vec![
                slot_of(0, FrameKind::Rgb),
                slot_of(0, FrameKind::Ir)
            ]
        );
    }

    #[test]
    fn lpm_deinits_only_the_first_registered_device() {
        struct TrackingAlgo {
            inner: TwoFrameAlgo,
            deinits: Arc<Mutex<usize>>,
        }

        impl VisionAlgoDevice for TrackingAlgo {
            fn name(&self) -> &str {
                "tracking-algo"
            }
            fn frame(&self, kind: FrameKind) -> Option<AlgoFrameSpec> {
                self.inner.frame(kind)
            }
            fn init(&mut self, _hook: VisionHook) -> Result<(), DeviceError> {
                Ok(())
            }
            fn deinit(&mut self) -> Result<(), DeviceError> {
                *self.deinits.lock() += 1;
                Ok(())
            }
            fn run(&mut self) -> Result<(), DeviceError> {
                Ok(())
            }
        }

        let (mut mgr, ctx, _router) = setup();
        let first = Arc::new(Mutex::new(0));
        let second = Arc::new(Mutex::new(0));
        for deinits in [&first, &second] {
            mgr.register(Box::new(TrackingAlgo {
                inner: TwoFrameAlgo::new(),
                deinits: Arc::clone(deinits),
            }))
            .unwrap();
        }

        mgr.on_message(Message::local(MessageBody::LpmPreEnterSleep), &ctx);

        assert_eq!(*first.lock(), 1, "first device torn down");
        assert_eq!(*second.lock(), 0, "sleep touches the first device only");
    }

    #[test]
    fn failed_run_does_not_rerequest() {
        struct FailingAlgo {
            inner: TwoFrameAlgo,
        }

        impl VisionAlgoDevice for FailingAlgo {
            fn name(&self) -> &str {
                "failing-algo"
            }
            fn frame(&self, kind: FrameKind) -> Option<AlgoFrameSpec> {
                self.inner.frame(kind)
            }
            fn init(&mut self, _hook: VisionHook) -> Result<(), DeviceError> {
                Ok(())
            }
            fn deinit(&mut self) -> Result<(), DeviceError> {
                Ok(())
            }
            fn run(&mut self) -> Result<(), DeviceError> {
                Err(DeviceError::op("inference blew up"))
            }
        }

        let (mut mgr, ctx, router) = setup();
        let camera_rx = router.register(ManagerId::Camera, 8).unwrap();

        mgr.register(Box::new(FailingAlgo {
            inner: TwoFrameAlgo::new(),
        }))
        .unwrap();
        mgr.on_init(&ctx).unwrap();
        while camera_rx.try_get().unwrap().is_some() {}

        mgr.on_message(response(slot_of(0, FrameKind::Rgb)), &ctx);
        mgr.on_message(response(slot_of(0, FrameKind::Ir)), &ctx);

        // Flags cleared but no fresh requests after the failure.
        assert!(!mgr.frame_ready[slot_of(0, FrameKind::Rgb) as usize]);
        assert!(camera_rx.try_get().unwrap().is_none());
    }
}
