//! The owning framework record.
//!
//! One `Framework` is constructed at start-up; every manager, the message
//! router, the task table and the config store live inside it. Devices
//! register before [`Framework::start`]; starting moves each populated
//! manager onto its own task and returns a [`RunningFramework`] handle for
//! posting messages and shutting down.

use anyhow::{Context, Result};
use config_store::ConfigStore;
use device_abi::{
    AfeDevice, CaptureDevice, DeviceError, DisplayDevice, InputDevice, ManagerId, Message,
    MessageBody, MulticoreDevice, OutputDevice, OutputEventHandler, VisionAlgoDevice,
    VoiceAlgoDevice,
};
use log::debug;
use mailbox::{MailboxError, Router};
use manager_audio::AudioManager;
use manager_camera::CameraManager;
use manager_display::DisplayManager;
use manager_input::InputManager;
use manager_multicore::MulticoreManager;
use manager_output::OutputManager;
use manager_vision::VisionManager;
use manager_voice::VoiceManager;
use std::sync::Arc;
use std::thread::JoinHandle;
use task_runtime::{spawn_manager, TaskTable};

/// Abstract task priorities per manager, 0 highest.
#[derive(Clone, Copy, Debug)]
pub struct Priorities {
    /// Multicore bridge priority.
    pub multicore: u8,
    /// Camera manager priority.
    pub camera: u8,
    /// Display manager priority.
    pub display: u8,
    /// Vision-algorithm manager priority.
    pub vision: u8,
    /// Audio-processing manager priority.
    pub audio: u8,
    /// Voice-algorithm manager priority.
    pub voice: u8,
    /// Output manager priority.
    pub output: u8,
    /// Input manager priority.
    pub input: u8,
}

impl Default for Priorities {
    fn default() -> Self {
        Self {
            multicore: 1,
            camera: 2,
            display: 2,
            audio: 1,
            vision: 3,
            voice: 3,
            output: 4,
            input: 4,
        }
    }
}

/// The framework before start: managers accepting device registrations.
pub struct Framework {
    router: Arc<Router<Message>>,
    table: Arc<TaskTable>,
    config: Option<ConfigStore>,
    priorities: Priorities,
    camera: CameraManager,
    display: DisplayManager,
    vision: VisionManager,
    audio: AudioManager,
    voice: VoiceManager,
    output: OutputManager,
    input: InputManager,
    multicore: MulticoreManager,
    has_multicore: bool,
}

impl Framework {
    /// An empty framework with default priorities.
    pub fn new() -> Self {
        Self {
            router: Arc::new(Router::new()),
            table: Arc::new(TaskTable::new()),
            config: None,
            priorities: Priorities::default(),
            camera: CameraManager::new(),
            display: DisplayManager::new(),
            vision: VisionManager::new(),
            audio: AudioManager::new(),
            voice: VoiceManager::new(),
            output: OutputManager::new(),
            input: InputManager::new(),
            multicore: MulticoreManager::new(),
            has_multicore: false,
        }
    }

    /// Attaches the persisted config store.
    pub fn with_config(mut self, config: ConfigStore) -> Self {
        self.config = Some(config);
        self
    }

    /// Overrides the manager task priorities.
    pub fn with_priorities(mut self, priorities: Priorities) -> Self {
        self.priorities = priorities;
        self
    }

    /// The persisted config store, when attached.
    pub fn config(&self) -> Option<&ConfigStore> {
        self.config.as_ref()
    }

    /// Registers a capture device.
    pub fn register_camera(&mut self, dev: Box<dyn CaptureDevice>) -> Result<u8, DeviceError> {
        self.camera.register(dev)
    }

    /// Frame counter of a registered camera; stays live after start.
    pub fn camera_fps(&self, dev_id: u8) -> Option<device_abi::FpsCounter> {
        self.camera.fps(dev_id)
    }

    /// Frame counter of a registered display; stays live after start.
    pub fn display_fps(&self, dev_id: u8) -> Option<device_abi::FpsCounter> {
        self.display.fps(dev_id)
    }

    /// Registers a display device.
    pub fn register_display(&mut self, dev: Box<dyn DisplayDevice>) -> Result<u8, DeviceError> {
        self.display.register(dev)
    }

    /// Registers a vision-algorithm device.
    pub fn register_vision_algo(
        &mut self,
        dev: Box<dyn VisionAlgoDevice>,
    ) -> Result<u8, DeviceError> {
        self.vision.register(dev)
    }

    /// Registers an acoustic front-end device.
    pub fn register_audio_processing(
        &mut self,
        dev: Box<dyn AfeDevice>,
    ) -> Result<u8, DeviceError> {
        self.audio.register(dev)
    }

    /// Registers a voice-algorithm device.
    pub fn register_voice_algo(
        &mut self,
        dev: Box<dyn VoiceAlgoDevice>,
    ) -> Result<u8, DeviceError> {
        self.voice.register(dev)
    }

    /// Registers an output device.
    pub fn register_output(&mut self, dev: Box<dyn OutputDevice>) -> Result<u8, DeviceError> {
        self.output.register(dev)
    }

    /// Chains an output event handler onto a registered output device.
    pub fn register_output_event_handler(
        &mut self,
        dev_id: u8,
        handler: Box<dyn OutputEventHandler>,
    ) -> Result<(), DeviceError> {
        self.output.register_event_handler(dev_id, handler)
    }

    /// Registers an input device.
    pub fn register_input(&mut self, dev: Box<dyn InputDevice>) -> Result<u8, DeviceError> {
        self.input.register(dev)
    }

    /// Registers the multicore transport device.
    pub fn register_multicore(&mut self, dev: Box<dyn MulticoreDevice>) -> Result<u8, DeviceError> {
        let id = self.multicore.register(dev)?;
        self.has_multicore = true;
        Ok(id)
    }

    /// Spawns every populated manager on its own task.
    ///
    /// The bridge starts first so that fan-out decisions made during other
    /// managers' init already see its mailbox.
    pub fn start(self) -> Result<RunningFramework> {
        let Framework {
            router,
            table,
            config,
            priorities,
            camera,
            display,
            vision,
            audio,
            voice,
            output,
            input,
            multicore,
            has_multicore,
        } = self;

        let mut handles = Vec::new();
        let mut spawn = |name: &'static str,
                         handle: std::result::Result<JoinHandle<()>, task_runtime::TaskError>|
         -> Result<()> {
            handles.push(handle.with_context(|| format!("spawning {name}"))?);
            Ok(())
        };

        if has_multicore {
            spawn(
                manager_multicore::MULTICORE_TASK_NAME,
                spawn_manager(
                    manager_multicore::task_spec(priorities.multicore),
                    multicore,
                    Arc::clone(&router),
                    Arc::clone(&table),
                ),
            )?;
        }
        if !camera.is_empty() {
            spawn(
                manager_camera::CAMERA_TASK_NAME,
                spawn_manager(
                    manager_camera::task_spec(priorities.camera),
                    camera,
                    Arc::clone(&router),
                    Arc::clone(&table),
                ),
            )?;
        }
        if !display.is_empty() {
            spawn(
                manager_display::DISPLAY_TASK_NAME,
                spawn_manager(
                    manager_display::task_spec(priorities.display),
                    display,
                    Arc::clone(&router),
                    Arc::clone(&table),
                ),
            )?;
        }
        if !vision.is_empty() {
            spawn(
                manager_vision::VISION_TASK_NAME,
                spawn_manager(
                    manager_vision::task_spec(priorities.vision),
                    vision,
                    Arc::clone(&router),
                    Arc::clone(&table),
                ),
            )?;
        }
        if !audio.is_empty() {
            spawn(
                manager_audio::AUDIO_TASK_NAME,
                spawn_manager(
                    manager_audio::task_spec(priorities.audio),
                    audio,
                    Arc::clone(&router),
                    Arc::clone(&table),
                ),
            )?;
        }
        if !voice.is_empty() {
            spawn(
                manager_voice::VOICE_TASK_NAME,
                spawn_manager(
                    manager_voice::task_spec(priorities.voice),
                    voice,
                    Arc::clone(&router),
                    Arc::clone(&table),
                ),
            )?;
        }
        if !output.is_empty() {
            spawn(
                manager_output::OUTPUT_TASK_NAME,
                spawn_manager(
                    manager_output::task_spec(priorities.output),
                    output,
                    Arc::clone(&router),
                    Arc::clone(&table),
                ),
            )?;
        }
        if !input.is_empty() {
            spawn(
                manager_input::INPUT_TASK_NAME,
                spawn_manager(
                    manager_input::task_spec(priorities.input),
                    input,
                    Arc::clone(&router),
                    Arc::clone(&table),
                ),
            )?;
        }

        debug!("framework started with {} manager tasks", handles.len());
        Ok(RunningFramework {
            router,
            table,
            config,
            handles,
        })
    }
}

impl Default for Framework {
    fn default() -> Self {
        Self::new()
    }
}

/// A started framework: posting surface and shutdown control.
pub struct RunningFramework {
    router: Arc<Router<Message>>,
    table: Arc<TaskTable>,
    config: Option<ConfigStore>,
    handles: Vec<JoinHandle<()>>,
}

impl RunningFramework {
    /// The message router.
    pub fn router(&self) -> &Arc<Router<Message>> {
        &self.router
    }

    /// The task table.
    pub fn table(&self) -> &Arc<TaskTable> {
        &self.table
    }

    /// The persisted config store, when attached.
    pub fn config(&self) -> Option<&ConfigStore> {
        self.config.as_ref()
    }

    /// Posts a message to one manager.
    pub fn post(&self, to: ManagerId, msg: Message) -> std::result::Result<(), MailboxError> {
        self.router.put(to, msg)
    }

    /// Broadcasts the low-power pre-sleep message to every running manager.
    pub fn lpm_pre_enter_sleep(&self) {
        for id in ManagerId::all() {
            if self.router.is_registered(id) {
                let _ = self
                    .router
                    .put(id, Message::local(MessageBody::LpmPreEnterSleep));
            }
        }
    }

    /// Stops every manager task and waits for the threads to exit.
    pub fn shutdown(self) {
        for id in ManagerId::all() {
            if self.router.is_registered(id) {
                let _ = self.router.put(id, Message::local(MessageBody::Shutdown));
            }
        }
        for handle in self.handles {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use device_abi::{FrameDescriptor, PixelFormat};
    use mock_hal::ScriptedCamera;

    #[test]
    fn empty_framework_starts_and_stops() {
        let running = Framework::new().start().unwrap();
        assert_eq!(running.table().count_below_app(), 0);
        running.shutdown();
    }

    #[test]
    fn populated_managers_appear_in_the_task_table() {
        let mut fwk = Framework::new();
        let desc = FrameDescriptor::packed(4, 4, PixelFormat::Gray8, PixelFormat::Gray8);
        fwk.register_camera(Box::new(ScriptedCamera::new(desc, vec![vec![0; 16]])))
            .unwrap();

        let running = fwk.start().unwrap();
        assert!(running.table().is_registered(ManagerId::Camera));
        assert!(!running.table().is_registered(ManagerId::Display));
        let info = running.table().info(ManagerId::Camera).unwrap();
        assert_eq!(info.name, manager_camera::CAMERA_TASK_NAME);

        running.shutdown();
    }

    #[test]
    fn config_store_rides_along() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = config_store::ConfigStore::open(dir.path()).unwrap();
        let fwk = Framework::new().with_config(store);
        let running = fwk.start().unwrap();
        assert!(running.config().is_some());
        running.shutdown();
    }
}
