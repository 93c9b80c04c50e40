//! Output manager.
//!
//! Routes inference results, low-power transitions, input events and audio
//! dumps to the registered output devices. Event handlers register
//! separately from their devices and are walked in registration order; at
//! most one UI-typed receiver may exist at a time. Entering sleep latches
//! the manager: further inference results are dropped until wake.

use device_abi::{
    AsrResult, ComponentInfo, DeviceError, FrameworkReply, FrameworkRequest, InferenceResult,
    InferenceSource, ManagerId, Message, MessageBody, OutputDevice, OutputDeviceType,
    OutputEventHandler, OutputHook, Registry, MAX_OUTPUT_DEV,
};
use log::{debug, error};
use std::sync::Arc;
use task_runtime::{ManagerTask, TaskContext, TaskError, TaskSpec};

/// Task name of the output manager.
pub const OUTPUT_TASK_NAME: &str = "output_manager";

/// The default task spec for this manager.
pub fn task_spec(priority: u8) -> TaskSpec {
    TaskSpec::new(ManagerId::Output, OUTPUT_TASK_NAME, priority)
}

struct Receiver {
    dev_id: u8,
    handler: Box<dyn OutputEventHandler>,
}

/// The output manager task state.
pub struct OutputManager {
    devs: Registry<Box<dyn OutputDevice>>,
    receivers: Vec<Receiver>,
    ui_receivers: usize,
    sleeping: bool,
}

impl OutputManager {
    /// An empty manager ready for device registration.
    pub fn new() -> Self {
        Self {
            devs: Registry::new("output", MAX_OUTPUT_DEV),
            receivers: Vec::new(),
            ui_receivers: 0,
            sleeping: false,
        }
    }

    /// Registers an output device; the slot index becomes its id.
    pub fn register(&mut self, dev: Box<dyn OutputDevice>) -> Result<u8, DeviceError> {
        self.devs.register(dev)
    }

    /// Whether no device has been registered.
    pub fn is_empty(&self) -> bool {
        self.devs.is_empty()
    }

    /// Chains an event handler for a registered device.
    ///
    /// Only one UI receiver is permitted at any time.
    pub fn register_event_handler(
        &mut self,
        dev_id: u8,
        handler: Box<dyn OutputEventHandler>,
    ) -> Result<(), DeviceError> {
        let dev = self
            .devs
            .get(dev_id)
            .ok_or(DeviceError::UnknownDevice(dev_id))?;
        if dev.device_type() == OutputDeviceType::Ui {
            if self.ui_receivers == 1 {
                error!("a UI event receiver is already registered");
                return Err(DeviceError::op("only one UI event receiver is supported"));
            }
            self.ui_receivers += 1;
        }
        self.receivers.push(Receiver { dev_id, handler });
        Ok(())
    }

    /// Removes a previously chained handler.
    pub fn unregister_event_handler(&mut self, dev_id: u8) -> Result<(), DeviceError> {
        let index = self
            .receivers
            .iter()
            .position(|rec| rec.dev_id == dev_id)
            .ok_or(DeviceError::UnknownDevice(dev_id))?;
        self.receivers.remove(index);
        if self
            .devs
            .get(dev_id)
            .is_some_and(|dev| dev.device_type() == OutputDeviceType::Ui)
        {
            self.ui_receivers -= 1;
        }
        Ok(())
    }

    fn dispatch_inference(
        &mut self,
        source: InferenceSource,
        result: InferenceResult,
        ctx: &TaskContext<Message>,
    ) {
        if self.sleeping {
            // Inference results are dropped until wake.
            return;
        }

        for rec in self.receivers.iter_mut() {
            let update = match rec.handler.inference_complete(source, &result) {
                Ok(update) => update,
                Err(err) => {
                    error!(
                        "output device {} inference handler error: {}",
                        rec.dev_id, err
                    );
                    continue;
                }
            };

            let Some(dev) = self.devs.get(rec.dev_id) else {
                continue;
            };
            if update.overlay_changed && dev.device_type() == OutputDeviceType::Ui {
                if let Some(surface) = dev.overlay_surface() {
                    if let Err(err) = ctx
                        .router()
                        .put(ManagerId::Camera, Message::local(MessageBody::ShowOverlay(surface)))
                    {
                        error!("overlay post failed: {}", err);
                    }
                }
            }
        }

        if source == InferenceSource::Lpm {
            self.sleeping = true;
        }
    }

    fn answer_components(&self, request: &FrameworkRequest) {
        // Enumerate the handler chain, mirroring what can actually receive.
        for rec in &self.receivers {
            if let Some(dev) = self.devs.get(rec.dev_id) {
                request.reply(FrameworkReply::Component(ComponentInfo {
                    manager: ManagerId::Output.index() as u8,
                    device_id: rec.dev_id,
                    device_name: dev.name().to_string(),
                    configs: dev.configs(),
                }));
            }
        }
        request.finish();
    }

    fn answer_device_configs(&self, request: &FrameworkRequest) {
        let wanted = match &request.query {
            device_abi::FrameworkQuery::GetDeviceConfigs { device_name, .. } => device_name,
            _ => {
                request.finish();
                return;
            }
        };
        for rec in &self.receivers {
            if let Some(dev) = self.devs.get(rec.dev_id) {
                if dev.name() == wanted {
                    request.reply(FrameworkReply::Component(ComponentInfo {
                        manager: ManagerId::Output.index() as u8,
                        device_id: rec.dev_id,
                        device_name: dev.name().to_string(),
                        configs: dev.configs(),
                    }));
                    request.finish();
                    return;
                }
            }
        }
        request.finish();
    }
}

impl Default for OutputManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ManagerTask<Message> for OutputManager {
    fn on_init(&mut self, ctx: &TaskContext<Message>) -> Result<(), TaskError> {
        for (id, dev) in self.devs.iter_mut() {
            debug!("INIT output dev \"{}\"", dev.name());
            let hook = OutputHook::new(Arc::clone(ctx.router()), id);
            if let Err(err) = dev.init(hook) {
                error!("INIT output dev \"{}\" error: {}", dev.name(), err);
            }
        }

        for (_, dev) in self.devs.iter_mut() {
            debug!("START output dev \"{}\"", dev.name());
            dev.start().map_err(|err| {
                TaskError::Init(format!("start output dev {}: {err}", dev.name()))
            })?;
        }

        Ok(())
    }

    fn on_message(&mut self, msg: Message, ctx: &TaskContext<Message>) {
        match msg.body {
            MessageBody::VAlgoResultUpdate(update) => {
                self.dispatch_inference(
                    InferenceSource::Vision,
                    InferenceResult::Vision(update.data),
                    ctx,
                );
            }
            MessageBody::AsrResultUpdate { result, .. } => {
                self.dispatch_inference(InferenceSource::Voice, InferenceResult::Voice(result), ctx);
            }
            MessageBody::LpmPreEnterSleep => {
                self.dispatch_inference(InferenceSource::Lpm, InferenceResult::Lpm, ctx);
            }
            MessageBody::InputNotify(notify) => {
                for rec in self.receivers.iter_mut() {
                    if let Err(err) = rec.handler.input_notify(&notify.event) {
                        error!(
                            "output device {} input notify handler error: {}",
                            rec.dev_id, err
                        );
                    }
                }
            }
            MessageBody::AudioDump(dump) => {
                for rec in self.receivers.iter_mut() {
                    rec.handler.dump(&dump);
                }
            }
            MessageBody::FrameworkGetComponents(request) => {
                self.answer_components(&request);
            }
            MessageBody::FrameworkGetDeviceConfigs(request) => {
                self.answer_device_configs(&request);
            }
            MessageBody::Shutdown => {
                debug!("output manager shutting down");
            }
            _ => {}
        }
    }
}

/// Convenience constructor for voice results in tests and demos.
pub fn voice_result(dev_id: u8, result: AsrResult) -> Message {
    Message::local(MessageBody::AsrResultUpdate { dev_id, result })
}
