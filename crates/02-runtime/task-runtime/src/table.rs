//! Registry of running manager tasks.

use mailbox::ManagerId;
use parking_lot::RwLock;
use serde::Serialize;

/// Name and priority of a registered task, as reported to framework queries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TaskInfo {
    /// Thread name of the task.
    pub name: String,
    /// Abstract priority the task was spawned with (0 = highest).
    pub priority: u8,
}

/// Table of running tasks, keyed by [`ManagerId`].
///
/// Written when tasks spawn or halt; read by framework queries and the input
/// manager's receiver-list filtering.
pub struct TaskTable {
    slots: RwLock<[Option<TaskInfo>; ManagerId::COUNT]>,
}

impl TaskTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(std::array::from_fn(|_| None)),
        }
    }

    /// Records a running task.
    pub fn register(&self, id: ManagerId, name: &str, priority: u8) {
        self.slots.write()[id.index()] = Some(TaskInfo {
            name: name.to_string(),
            priority,
        });
    }

    /// Removes a task that halted.
    pub fn deregister(&self, id: ManagerId) {
        self.slots.write()[id.index()] = None;
    }

    /// Whether a task is registered for `id`.
    pub fn is_registered(&self, id: ManagerId) -> bool {
        self.slots.read()[id.index()].is_some()
    }

    /// Number of registered framework tasks (application slots excluded).
    pub fn count_below_app(&self) -> usize {
        self.slots.read()[..ManagerId::APP_BOUNDARY]
            .iter()
            .filter(|slot| slot.is_some())
            .count()
    }

    /// Name and priority of the task registered for `id`.
    pub fn info(&self, id: ManagerId) -> Option<TaskInfo> {
        self.slots.read()[id.index()].clone()
    }
}

impl Default for TaskTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_ignores_application_slots() {
        let table = TaskTable::new();
        table.register(ManagerId::Camera, "camera", 1);
        table.register(ManagerId::Display, "display", 2);
        table.register(ManagerId::App0, "app", 5);

        assert_eq!(table.count_below_app(), 2);
        assert!(table.is_registered(ManagerId::App0));
    }

    #[test]
    fn info_reports_name_and_priority() {
        let table = TaskTable::new();
        table.register(ManagerId::Output, "output", 4);

        let info = table.info(ManagerId::Output).unwrap();
        assert_eq!(info.name, "output");
        assert_eq!(info.priority, 4);
        assert!(table.info(ManagerId::Input).is_none());
    }
}
