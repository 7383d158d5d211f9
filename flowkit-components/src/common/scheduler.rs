//! Scheduler component (time-indexed task queue).
//!
//! Collects task messages and sends each one further when its scheduled
//! date and time come. Tasks with the same ID update the scheduled date and
//! the task itself; at most one schedule is active per ID. A task whose
//! date is already in the past fires as soon as the scheduler is running.

use chrono::{DateTime, Utc};
use flowkit_core::port::SETTINGS_PORT;
use flowkit_core::prelude::*;
use parking_lot::{Mutex, RwLock};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Component name.
pub const SCHEDULER_COMPONENT: &str = "scheduler";
/// Task submission port.
pub const SCHEDULER_IN_PORT: &str = "in";
/// Fired-task emission port.
pub const SCHEDULER_OUT_PORT: &str = "out";
/// Submission acknowledgement port (conditional on settings).
pub const SCHEDULER_ACK_PORT: &str = "ack";

/// Scheduler settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerSettings {
    /// Whether submissions are acknowledged on a dedicated port.
    #[schemars(
        title = "Enable task acknowledge port",
        description = "Port gives information if incoming task was scheduled properly"
    )]
    #[serde(default)]
    pub enable_ack_port: bool,
}

/// A future emission, keyed by a user-supplied ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique task ID within one scheduler instance.
    #[schemars(title = "Unique task ID", extend("propertyOrder" = 1))]
    pub id: String,
    /// The instant at or after which the task fires.
    #[schemars(
        title = "Date and time",
        description = "Format examples: 2012-10-01T09:45:00.000+02:00",
        extend("propertyOrder" = 2)
    )]
    pub date_time: DateTime<Utc>,
    /// `true` schedules the task; `false` cancels a pending one.
    #[schemars(
        title = "Schedule",
        description = "You can unschedule an existing task by setting schedule to false",
        extend("propertyOrder" = 3)
    )]
    pub schedule: bool,
}

impl Default for Task {
    fn default() -> Self {
        Self {
            id: String::new(),
            date_time: DateTime::UNIX_EPOCH,
            schedule: false,
        }
    }
}

/// Payload of the `in` port.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerInMessage {
    /// Arbitrary message to be sent further when the task fires.
    #[schemars(
        title = "Context",
        description = "Arbitrary message to be sent further",
        extend("configurable" = true, "propertyOrder" = 1)
    )]
    #[serde(default)]
    pub context: Value,
    /// The task to schedule or cancel.
    #[schemars(title = "Task", extend("propertyOrder" = 2))]
    pub task: Task,
}

/// Payload of the `out` port.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerOutMessage {
    /// The task that fired.
    pub task: Task,
    /// The context supplied at submission time.
    #[serde(default)]
    pub context: Value,
}

/// Payload of the `ack` port.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerTaskAck {
    /// The submitted task.
    pub task: Task,
    /// The context supplied at submission time.
    #[serde(default)]
    pub context: Value,
    /// Seconds from now until the task fires; zero or negative for past
    /// dates and cancellations.
    pub scheduled_in: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredTask {
    task: Task,
    #[serde(default)]
    context: Value,
}

struct TaskEntry {
    task: Task,
    context: Value,
    generation: u64,
    cancel: CancellationToken,
}

/// The scheduler component.
pub struct Scheduler {
    settings: RwLock<SchedulerSettings>,
    tasks: Arc<Mutex<HashMap<String, TaskEntry>>>,
    next_generation: AtomicU64,
    run: RwLock<Option<CancellationToken>>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self {
            settings: RwLock::new(SchedulerSettings::default()),
            tasks: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(0),
            run: RwLock::new(None),
        }
    }
}

impl Scheduler {
    fn run_token(&self) -> Option<CancellationToken> {
        self.run
            .read()
            .as_ref()
            .filter(|token| !token.is_cancelled())
            .cloned()
    }

    /// Replace, create, or cancel the schedule for one task ID.
    ///
    /// Per-ID mutation is sequentialised by the task-map lock; the waiter's
    /// compare-and-remove on generation keeps a racing resubmission from
    /// losing a firing.
    fn add_or_update(&self, task: Task, context: Value, handler: Handler) {
        let mut tasks = self.tasks.lock();

        if let Some(existing) = tasks.remove(&task.id) {
            existing.cancel.cancel();
        }
        if !task.schedule {
            return;
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        tasks.insert(
            task.id.clone(),
            TaskEntry {
                task: task.clone(),
                context: context.clone(),
                generation,
                cancel: cancel.clone(),
            },
        );

        // run-token read under the task-map lock, same as Run's update
        if let Some(run) = self.run_token() {
            self.spawn_waiter(run, cancel, task, context, generation, handler);
        }
    }

    fn spawn_waiter(
        &self,
        run: CancellationToken,
        cancel: CancellationToken,
        task: Task,
        context: Value,
        generation: u64,
        handler: Handler,
    ) {
        let tasks = Arc::clone(&self.tasks);
        tokio::spawn(async move {
            let delay = (task.date_time - Utc::now())
                .to_std()
                .unwrap_or(std::time::Duration::ZERO);

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => return,
                _ = run.cancelled() => return,
            }

            // Remove before emitting, and only if this waiter still owns
            // the entry: a resubmission bumps the generation.
            let fired = {
                let mut tasks = tasks.lock();
                match tasks.get(&task.id) {
                    Some(entry) if entry.generation == generation => tasks.remove(&task.id),
                    _ => None,
                }
            };
            let Some(entry) = fired else {
                return;
            };

            let out = SchedulerOutMessage {
                task: entry.task,
                context: entry.context,
            };
            let Ok(msg) = Message::encode(&out) else {
                return;
            };
            // No synchronous caller on the timer path; a downstream
            // rejection has nowhere to go but the log.
            if let Err(error) = handler(SCHEDULER_OUT_PORT, msg).await {
                tracing::warn!(task_id = %task.id, %error, "scheduled task rejected downstream");
            }
        });
    }
}

impl Component for Scheduler {
    fn info(&self) -> ComponentInfo {
        ComponentInfo::new(SCHEDULER_COMPONENT)
            .with_description("Scheduler")
            .with_info(
                "Collects task messages. While running, sends them further when the \
                 scheduled date and time come. Tasks with the same ID update the \
                 schedule and the task itself. If the scheduled date has already \
                 passed, the message is sent as soon as the scheduler starts.",
            )
            .with_tags(&["SDK"])
    }

    fn instance(&self) -> Box<dyn Component> {
        Box::new(Self::default())
    }

    fn ports(&self) -> Vec<Port> {
        let mut ports = vec![
            Port::settings(&self.settings.read().clone()),
            Port::source(SCHEDULER_IN_PORT, "Tasks")
                .with_position(PortPosition::Left)
                .with_config(&SchedulerInMessage {
                    context: Value::Null,
                    task: Task {
                        id: "example".to_string(),
                        date_time: Utc::now(),
                        schedule: true,
                    },
                }),
            Port::sink(SCHEDULER_OUT_PORT, "Scheduled")
                .with_position(PortPosition::Right)
                .with_config(&SchedulerOutMessage::default()),
        ];
        if self.settings.read().enable_ack_port {
            ports.push(
                Port::sink(SCHEDULER_ACK_PORT, "Ack")
                    .with_position(PortPosition::Bottom)
                    .with_config(&SchedulerTaskAck::default()),
            );
        }
        ports
    }

    fn handle<'a>(
        &'a self,
        _ctx: CancellationToken,
        handler: Handler,
        port: &'a str,
        msg: Message,
    ) -> ComponentFuture<'a> {
        Box::pin(async move {
            if port == SETTINGS_PORT {
                let settings: SchedulerSettings = msg.decode_settings(SCHEDULER_COMPONENT)?;
                *self.settings.write() = settings;
                return Ok(());
            }
            if port != SCHEDULER_IN_PORT {
                return Err(FlowError::unknown_port(port));
            }

            let input: SchedulerInMessage = msg.decode(port)?;
            let scheduled_in = if input.task.schedule {
                (input.task.date_time - Utc::now()).num_seconds()
            } else {
                0
            };

            tracing::debug!(
                task_id = %input.task.id,
                schedule = input.task.schedule,
                scheduled_in,
                "task submitted"
            );
            self.add_or_update(input.task.clone(), input.context.clone(), handler.clone());

            if self.settings.read().enable_ack_port {
                let ack = SchedulerTaskAck {
                    task: input.task,
                    context: input.context,
                    scheduled_in,
                };
                handler(SCHEDULER_ACK_PORT, Message::encode(&ack)?).await?;
            }
            Ok(())
        })
    }

    fn as_runnable(&self) -> Option<&dyn Runnable> {
        Some(self)
    }

    fn as_stateful(&self) -> Option<&dyn Stateful> {
        Some(self)
    }
}

impl Runnable for Scheduler {
    fn run<'a>(&'a self, ctx: CancellationToken, handler: Handler) -> ComponentFuture<'a> {
        Box::pin(async move {
            // Install timers for tasks already in the map (restored state or
            // submissions made before the run started). Token update and
            // snapshot happen under the task-map lock so a concurrent
            // submission is spawned exactly once.
            let pending: Vec<_> = {
                let tasks = self.tasks.lock();
                *self.run.write() = Some(ctx.clone());
                tasks
                    .values()
                    .map(|entry| {
                        (
                            entry.task.clone(),
                            entry.context.clone(),
                            entry.generation,
                            entry.cancel.clone(),
                        )
                    })
                    .collect()
            };
            for (task, context, generation, cancel) in pending {
                self.spawn_waiter(
                    ctx.clone(),
                    cancel,
                    task,
                    context,
                    generation,
                    handler.clone(),
                );
            }

            tracing::info!(component = SCHEDULER_COMPONENT, "scheduler running");
            ctx.cancelled().await;
            *self.run.write() = None;
            tracing::info!(component = SCHEDULER_COMPONENT, "scheduler stopped");
            Ok(())
        })
    }
}

impl Stateful for Scheduler {
    fn state(&self) -> Result<Vec<u8>> {
        let tasks = self.tasks.lock();
        let mut stored: Vec<StoredTask> = tasks
            .values()
            .map(|entry| StoredTask {
                task: entry.task.clone(),
                context: entry.context.clone(),
            })
            .collect();
        stored.sort_by(|a, b| a.task.id.cmp(&b.task.id));
        serde_json::to_vec(&stored).map_err(|e| FlowError::State(e.to_string()))
    }

    fn set_state(&self, state: &[u8]) -> Result<()> {
        let stored: Vec<StoredTask> =
            serde_json::from_slice(state).map_err(|e| FlowError::State(e.to_string()))?;

        let mut tasks = self.tasks.lock();
        for entry in tasks.values() {
            entry.cancel.cancel();
        }
        tasks.clear();
        for item in stored {
            let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
            tasks.insert(
                item.task.id.clone(),
                TaskEntry {
                    task: item.task,
                    context: item.context,
                    generation,
                    cancel: CancellationToken::new(),
                },
            );
        }
        Ok(())
    }
}
