//! Self-describing framework queries and their responses.
//!
//! A query enters the system through an input device (shell, BLE, Wi-Fi …)
//! as a [`FrameworkRequest`]: what is being asked plus a responder the
//! answering manager drives. Component enumeration invokes the responder
//! once per device and then a final time with `is_final` set.

use mailbox::ManagerId;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// One entry of a device's runtime-tunable config table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DeviceConfigEntry {
    /// Config name, e.g. `volume`.
    pub name: String,
    /// Current value.
    pub value: u32,
    /// Human-readable description.
    pub description: String,
}

/// A registered device, as reported by component enumeration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ComponentInfo {
    /// Slot index of the owning manager.
    pub manager: u8,
    /// Device id within the manager's registry.
    pub device_id: u8,
    /// Device name.
    pub device_name: String,
    /// The device's config table, when it exposes one.
    pub configs: Vec<DeviceConfigEntry>,
}

/// A running manager task, as reported by `GetManagerInfo`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ManagerInfo {
    /// Slot index of the manager.
    pub manager: u8,
    /// Task name.
    pub name: String,
    /// Abstract priority (0 = highest).
    pub priority: u8,
}

/// What a framework query asks for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameworkQuery {
    /// Enumerate every running manager task.
    GetManagerInfo,
    /// Enumerate the devices registered with one manager.
    GetManagerComponents(ManagerId),
    /// Enumerate the config table of one device, by name.
    GetDeviceConfigs {
        /// Manager owning the device.
        manager: ManagerId,
        /// Device name to match.
        device_name: String,
    },
}

/// One unit of answer streamed back through the responder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameworkReply {
    /// A running task.
    Manager(ManagerInfo),
    /// A registered device.
    Component(ComponentInfo),
}

/// Callback the querying side supplies; invoked once per reply item and a
/// final time with `reply == None` and `is_final == true`.
pub type QueryResponder = Arc<dyn Fn(Option<FrameworkReply>, bool) + Send + Sync>;

/// A query plus the responder to stream answers through.
#[derive(Clone)]
pub struct FrameworkRequest {
    /// What is being asked.
    pub query: FrameworkQuery,
    /// Where the answers go.
    pub respond: QueryResponder,
}

impl FrameworkRequest {
    /// Builds a request from a query and a plain closure.
    pub fn new<F>(query: FrameworkQuery, respond: F) -> Self
    where
        F: Fn(Option<FrameworkReply>, bool) + Send + Sync + 'static,
    {
        Self {
            query,
            respond: Arc::new(respond),
        }
    }

    /// Streams one reply item.
    pub fn reply(&self, reply: FrameworkReply) {
        (self.respond)(Some(reply), false);
    }

    /// Signals the end of the reply stream.
    pub fn finish(&self) {
        (self.respond)(None, true);
    }
}

impl fmt::Debug for FrameworkRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameworkRequest")
            .field("query", &self.query)
            .finish()
    }
}
