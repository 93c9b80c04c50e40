//! Camera manager.
//!
//! Owns the capture devices and the camera→display/algorithm data flow.
//! Display and vision-algorithm managers express pull-style frame requests;
//! on every capture completion the manager dequeues the raw buffer and, for
//! each pending request whose source format matches, converts into the
//! requester's buffer and posts a response. Requests coalesce: an armed slot
//! is never overwritten until its response has been posted.

mod pipeline;

use device_abi::{
    CameraHook, CaptureDevice, ComponentInfo, DeviceError, DeviceState, FpsCounter, FrameKind,
    FrameRequest, FrameworkReply, InitOutcome, ManagerId, Message, MessageBody, OverlaySurface,
    Registry, StateCell, MAX_CAMERA_DEV, MAX_DISPLAY_DEV, MAX_VISION_ALGO_DEV,
};
use log::{debug, error, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use task_runtime::{ManagerTask, TaskContext, TaskError, TaskSpec};

/// Task name of the camera manager.
pub const CAMERA_TASK_NAME: &str = "camera_manager";

/// Number of vision request slots: one per (device, frame kind) pair.
pub const VALGO_SLOTS: usize = MAX_VISION_ALGO_DEV * FrameKind::COUNT;

/// The default task spec for this manager.
pub fn task_spec(priority: u8) -> TaskSpec {
    TaskSpec::new(ManagerId::Camera, CAMERA_TASK_NAME, priority)
}

struct CameraEntry {
    dev: Box<dyn CaptureDevice>,
    state: Arc<StateCell>,
    in_flight: Arc<AtomicBool>,
    fps: FpsCounter,
}

/// One pending-request slot, keyed by requester id.
#[derive(Default)]
struct RequestSlot {
    /// Destination geometry, retained from the initial full request.
    descriptor: Option<device_abi::FrameDescriptor>,
    /// Destination buffer, retained across light re-arms.
    buffer: Option<device_abi::FrameBuffer>,
    /// Armed and awaiting a matching capture.
    pending: bool,
}

impl RequestSlot {
    fn arm(&mut self, req: FrameRequest) {
        // Coalescing: never overwrite an unserviced request.
        if self.pending {
            return;
        }
        if let Some(desc) = req.descriptor {
            self.descriptor = Some(desc);
        }
        if let Some(buffer) = req.buffer {
            self.buffer = Some(buffer);
        }
        if self.descriptor.is_none() || self.buffer.is_none() {
            error!(
                "frame request for slot {} re-armed before an initial descriptor",
                req.requester
            );
            return;
        }
        self.pending = true;
    }
}

/// The camera manager task state.
pub struct CameraManager {
    devs: Registry<CameraEntry>,
    display_slots: Vec<RequestSlot>,
    valgo_slots: Vec<RequestSlot>,
    overlay: Option<OverlaySurface>,
}

impl CameraManager {
    /// An empty manager ready for device registration.
    pub fn new() -> Self {
        let mut display_slots = Vec::new();
        display_slots.resize_with(MAX_DISPLAY_DEV, RequestSlot::default);
        let mut valgo_slots = Vec::new();
        valgo_slots.resize_with(VALGO_SLOTS, RequestSlot::default);
        Self {
            devs: Registry::new("camera", MAX_CAMERA_DEV),
            display_slots,
            valgo_slots,
            overlay: None,
        }
    }

    /// Registers a capture device; the slot index becomes its id.
    pub fn register(&mut self, dev: Box<dyn CaptureDevice>) -> Result<u8, DeviceError> {
        self.devs.register(CameraEntry {
            dev,
            state: StateCell::new(),
            in_flight: Arc::new(AtomicBool::new(false)),
            fps: FpsCounter::new(),
        })
    }

    /// Whether no capture device has been registered.
    pub fn is_empty(&self) -> bool {
        self.devs.is_empty()
    }

    /// Frame counter of one camera, for inspection.
    pub fn fps(&self, dev_id: u8) -> Option<FpsCounter> {
        self.devs.get(dev_id).map(|entry| entry.fps.clone())
    }

    fn handle_capture(&mut self, dev_id: u8, ctx: &TaskContext<Message>) {
        let Some(entry) = self.devs.get_mut(dev_id) else {
            error!("camera dequeue for unknown dev {}", dev_id);
            return;
        };
        // The pre-allocated dequeue event is consumed; the ISR may post again.
        entry.in_flight.store(false, Ordering::Release);

        let mut captured = match entry.dev.dequeue() {
            Ok(frame) => frame,
            Err(err) => {
                error!("camera dev {} dequeue error: {}", dev_id, err);
                return;
            }
        };
        let geometry = entry.dev.config().frame;

        pipeline::service_display_requests(
            entry.dev.as_mut(),
            &geometry,
            &mut captured,
            &mut self.display_slots,
            self.overlay.as_ref(),
            ctx,
        );
        pipeline::service_valgo_requests(
            entry.dev.as_mut(),
            &geometry,
            &mut captured,
            &mut self.valgo_slots,
            ctx,
        );

        if let Err(err) = entry.dev.enqueue(None) {
            error!("camera dev {} enqueue error: {}", dev_id, err);
        }
        entry.fps.tick();
    }
}

impl Default for CameraManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ManagerTask<Message> for CameraManager {
    fn on_init(&mut self, ctx: &TaskContext<Message>) -> Result<(), TaskError> {
        // Init every camera; async devices report completion via the hook.
        for (id, entry) in self.devs.iter_mut() {
            let (hook, in_flight) =
                CameraHook::new(Arc::clone(ctx.router()), id, Arc::clone(&entry.state));
            entry.in_flight = in_flight;
            debug!("INIT camera dev[{}]", id);
            match entry.dev.init(hook) {
                Ok(InitOutcome::Ready) => entry.state.set(DeviceState::Initialized),
                Ok(InitOutcome::Pending) => {}
                Err(err) => {
                    error!("INIT camera dev {} error: {}", id, err);
                    return Err(TaskError::Init(err.to_string()));
                }
            }
        }

        // Start each camera once its init has landed.
        for (id, entry) in self.devs.iter_mut() {
            while entry.state.get() != DeviceState::Initialized {
                thread::sleep(Duration::from_millis(1));
            }
            debug!("START camera dev[{}]", id);
            entry
                .dev
                .start()
                .map_err(|err| TaskError::Init(format!("start camera dev {id}: {err}")))?;
            entry.state.set(DeviceState::Started);
        }

        Ok(())
    }

    fn on_message(&mut self, msg: Message, ctx: &TaskContext<Message>) {
        match msg.body {
            MessageBody::DisplayRequestFrame(req) => {
                let slot = req.requester as usize;
                if slot < self.display_slots.len() {
                    self.display_slots[slot].arm(req);
                }
            }
            MessageBody::VAlgoRequestFrame(req) => {
                let slot = req.requester as usize;
                if slot < self.valgo_slots.len() {
                    self.valgo_slots[slot].arm(req);
                }
            }
            MessageBody::ShowOverlay(overlay) => {
                self.overlay = Some(overlay);
            }
            MessageBody::CameraDequeue { dev_id } => {
                self.handle_capture(dev_id, ctx);
            }
            MessageBody::InputNotify(notify) => {
                for (id, entry) in self.devs.iter_mut() {
                    if let Err(err) = entry.dev.input_notify(&notify.event) {
                        error!(
                            "inputNotify camera dev id:{} name:{} error {}",
                            id,
                            entry.dev.name(),
                            err
                        );
                    }
                }
            }
            MessageBody::LpmPreEnterSleep => {
                for (id, entry) in self.devs.iter_mut() {
                    debug!("DEINIT camera dev[{}]", id);
                    if let Err(err) = entry.dev.deinit() {
                        error!("deinit camera dev {} error: {}", id, err);
                    } else {
                        entry.state.set(DeviceState::Deinitialized);
                    }
                }
            }
            MessageBody::FrameworkGetComponents(request) => {
                for (id, entry) in self.devs.iter() {
                    request.reply(FrameworkReply::Component(ComponentInfo {
                        manager: ManagerId::Camera.index() as u8,
                        device_id: id,
                        device_name: entry.dev.name().to_string(),
                        configs: Vec::new(),
                    }));
                }
                request.finish();
            }
            MessageBody::Shutdown => {
                info!("camera manager shutting down");
            }
            _ => {}
        }
    }
}
