//! Manager task kernel.
//!
//! Each manager runs in its own OS thread with a user-supplied init hook and
//! message handler. The kernel owns the receive loop: it creates the bounded
//! mailbox, registers it with the router and the task table, calls
//! [`ManagerTask::on_init`] exactly once, then blocks on the mailbox and
//! dispatches every message to [`ManagerTask::on_message`]. Message envelopes
//! are released by ownership when the handler returns.

mod table;

pub use table::{TaskInfo, TaskTable};

use log::{debug, error};
use mailbox::{Envelope, MailboxError, ManagerId, Router, DEFAULT_MAILBOX_DEPTH};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;

/// Highest abstract task priority value; 0 is the most urgent.
pub const LOWEST_PRIORITY: u8 = 15;

/// Errors surfaced while spawning a manager task.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Mailbox registration failed.
    #[error("mailbox error: {0}")]
    Mailbox(#[from] MailboxError),

    /// Manager-specific initialization failed.
    #[error("task init failed: {0}")]
    Init(String),

    /// The host refused to spawn the thread.
    #[error("failed to spawn task thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Shared handles every manager task receives.
pub struct TaskContext<M> {
    router: Arc<Router<M>>,
    table: Arc<TaskTable>,
}

impl<M> TaskContext<M> {
    /// Builds a context from shared handles; also used by manager tests that
    /// drive handlers directly instead of spawning the task.
    pub fn new(router: Arc<Router<M>>, table: Arc<TaskTable>) -> Self {
        Self { router, table }
    }

    /// The message router, for posting to other managers.
    pub fn router(&self) -> &Arc<Router<M>> {
        &self.router
    }

    /// The task table, for registry queries.
    pub fn table(&self) -> &Arc<TaskTable> {
        &self.table
    }
}

impl<M> Clone for TaskContext<M> {
    fn clone(&self) -> Self {
        Self {
            router: Arc::clone(&self.router),
            table: Arc::clone(&self.table),
        }
    }
}

/// A manager's behavior: one-time init plus the per-message handler.
pub trait ManagerTask<M>: Send + 'static {
    /// Called exactly once on the manager's own thread before the receive
    /// loop starts. Returning an error halts this manager; the rest of the
    /// system proceeds.
    fn on_init(&mut self, ctx: &TaskContext<M>) -> Result<(), TaskError>;

    /// Handles one message. The envelope is dropped when this returns.
    fn on_message(&mut self, msg: M, ctx: &TaskContext<M>);
}

/// Static description of a manager task.
#[derive(Clone, Debug)]
pub struct TaskSpec {
    /// Mailbox address and table slot for this task.
    pub manager: ManagerId,
    /// Thread and table name.
    pub name: &'static str,
    /// Abstract priority, 0 (highest) ..= [`LOWEST_PRIORITY`].
    pub priority: u8,
    /// Optional sleep between handled messages.
    pub poll_delay: Option<Duration>,
    /// Mailbox depth in messages.
    pub mailbox_depth: usize,
}

impl TaskSpec {
    /// Spec with the default mailbox depth, a 1 ms poll delay, and the
    /// given priority.
    pub fn new(manager: ManagerId, name: &'static str, priority: u8) -> Self {
        Self {
            manager,
            name,
            priority,
            poll_delay: Some(Duration::from_millis(1)),
            mailbox_depth: DEFAULT_MAILBOX_DEPTH,
        }
    }
}

/// Maps an abstract priority onto the host's space.
///
/// Out-of-range values fall back to the lowest priority, mirroring the
/// scheduler-side clamp of the reference design.
pub fn clamp_priority(priority: u8) -> u8 {
    if priority <= LOWEST_PRIORITY {
        priority
    } else {
        error!("invalid task priority {}, using lowest", priority);
        LOWEST_PRIORITY
    }
}

/// Spawns a manager task: registers its mailbox and table entry, then runs
/// init and the receive loop on a dedicated named thread.
pub fn spawn_manager<M, T>(
    spec: TaskSpec,
    mut task: T,
    router: Arc<Router<M>>,
    table: Arc<TaskTable>,
) -> Result<JoinHandle<()>, TaskError>
where
    M: Envelope,
    T: ManagerTask<M>,
{
    let rx = router.register(spec.manager, spec.mailbox_depth)?;
    let priority = clamp_priority(spec.priority);
    table.register(spec.manager, spec.name, priority);

    let ctx = TaskContext {
        router,
        table: Arc::clone(&table),
    };

    let handle = thread::Builder::new()
        .name(spec.name.to_string())
        .spawn(move || {
            debug!("task {:?} ({}) started", spec.manager, spec.name);

            if let Err(err) = task.on_init(&ctx) {
                error!("task {:?} init failed: {}", spec.manager, err);
                table.deregister(spec.manager);
                return;
            }

            loop {
                let msg = match rx.get() {
                    Ok(msg) => msg,
                    Err(_) => break,
                };
                let stop = msg.is_shutdown();
                task.on_message(msg, &ctx);
                if stop {
                    debug!("task {:?} stopping", spec.manager);
                    break;
                }
                if let Some(delay) = spec.poll_delay {
                    thread::sleep(delay);
                }
            }
        })?;

    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mailbox::{DeliveryScope, MulticoreInfo};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;

    #[derive(Clone, Debug)]
    enum Msg {
        Ping(u32),
        Stop,
    }

    impl Envelope for Msg {
        fn scope(&self) -> DeliveryScope {
            DeliveryScope::Local
        }

        fn multicore(&self) -> MulticoreInfo {
            MulticoreInfo::default()
        }

        fn kind_name(&self) -> &'static str {
            match self {
                Msg::Ping(_) => "ping",
                Msg::Stop => "stop",
            }
        }

        fn is_shutdown(&self) -> bool {
            matches!(self, Msg::Stop)
        }
    }

    struct Echo {
        inits: Arc<AtomicUsize>,
        seen: mpsc::Sender<u32>,
    }

    impl ManagerTask<Msg> for Echo {
        fn on_init(&mut self, _ctx: &TaskContext<Msg>) -> Result<(), TaskError> {
            self.inits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn on_message(&mut self, msg: Msg, _ctx: &TaskContext<Msg>) {
            if let Msg::Ping(n) = msg {
                let _ = self.seen.send(n);
            }
        }
    }

    #[test]
    fn init_runs_once_and_messages_arrive_in_order() {
        let router = Arc::new(Router::new());
        let table = Arc::new(TaskTable::new());
        let inits = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::channel();

        let spec = TaskSpec {
            poll_delay: None,
            ..TaskSpec::new(ManagerId::App0, "echo", 3)
        };
        let handle = spawn_manager(
            spec,
            Echo {
                inits: Arc::clone(&inits),
                seen: tx,
            },
            Arc::clone(&router),
            Arc::clone(&table),
        )
        .unwrap();

        for n in 0..5 {
            router.put(ManagerId::App0, Msg::Ping(n)).unwrap();
        }
        router.put(ManagerId::App0, Msg::Stop).unwrap();
        handle.join().unwrap();

        assert_eq!(inits.load(Ordering::SeqCst), 1);
        let seen: Vec<u32> = rx.try_iter().collect();
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
        assert!(table.is_registered(ManagerId::App0));
    }

    struct FailingInit;

    impl ManagerTask<Msg> for FailingInit {
        fn on_init(&mut self, _ctx: &TaskContext<Msg>) -> Result<(), TaskError> {
            Err(TaskError::Init("no device".into()))
        }

        fn on_message(&mut self, _msg: Msg, _ctx: &TaskContext<Msg>) {
            unreachable!("handler must not run after failed init");
        }
    }

    #[test]
    fn failed_init_halts_the_task_and_clears_registration() {
        let router = Arc::new(Router::new());
        let table = Arc::new(TaskTable::new());

        let handle = spawn_manager(
            TaskSpec::new(ManagerId::App1, "bad", 2),
            FailingInit,
            Arc::clone(&router),
            Arc::clone(&table),
        )
        .unwrap();
        handle.join().unwrap();

        assert!(!table.is_registered(ManagerId::App1));
    }

    #[test]
    fn out_of_range_priority_clamps_to_lowest() {
        assert_eq!(clamp_priority(200), LOWEST_PRIORITY);
        assert_eq!(clamp_priority(0), 0);
        assert_eq!(clamp_priority(LOWEST_PRIORITY), LOWEST_PRIORITY);
    }
}
