// crates/shardline-core/src/runtime/scanner.rs
// ============================================================================
// Module: Shardline Scanner Registry
// Description: Explicit registration of background scanner workflows.
// Purpose: Hand scanner definitions to a worker without global state.
// Dependencies: thiserror, tracing
// ============================================================================

//! ## Overview
//! Scanner workflows consume the execution map store (select and delete
//! only) to scavenge orphaned rows. Their definitions are plain data: a
//! [`ScannerRegistry`] is built once, validated, and installed into a
//! caller-supplied [`RegistrationSink`]. Nothing registers itself at load
//! time, so two workers in one process can carry different registries.
//!
//! Security posture: names are validated at build; duplicates fail closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Stand-in for "no timeout" (twenty years).
pub const UNBOUNDED_TIMEOUT: Duration = Duration::from_secs(20 * 365 * 24 * 60 * 60);
/// Cron schedule shared by the standard scanners (twice a day).
pub const STANDARD_CRON_SCHEDULE: &str = "0 */12 * * *";

/// Task-list scanner workflow id.
const TASK_LIST_SCANNER_WORKFLOW_ID: &str = "cadence-sys-tl-scanner";
/// Task-list scanner workflow type name.
const TASK_LIST_SCANNER_WORKFLOW: &str = "cadence-sys-tl-scanner-workflow";
/// Task-list scanner task list.
const TASK_LIST_SCANNER_TASK_LIST: &str = "cadence-sys-tl-scanner-tasklist-0";
/// Task-list scavenger activity name.
const TASK_LIST_SCAVENGER_ACTIVITY: &str = "cadence-sys-tl-scanner-scvg-activity";

/// History scanner workflow id.
const HISTORY_SCANNER_WORKFLOW_ID: &str = "cadence-sys-history-scanner";
/// History scanner workflow type name.
const HISTORY_SCANNER_WORKFLOW: &str = "cadence-sys-history-scanner-workflow";
/// History scanner task list.
const HISTORY_SCANNER_TASK_LIST: &str = "cadence-sys-history-scanner-tasklist-0";
/// History scavenger activity name.
const HISTORY_SCAVENGER_ACTIVITY: &str = "cadence-sys-history-scanner-scvg-activity";

/// Concrete executions scanner workflow type name.
const CONCRETE_EXECUTIONS_SCANNER_WORKFLOW: &str = "cadence-sys-executions-scanner-workflow";
/// Current executions scanner workflow type name.
const CURRENT_EXECUTIONS_SCANNER_WORKFLOW: &str =
    "cadence-sys-current-executions-scanner-workflow";
/// Concrete executions fixer workflow type name.
const CONCRETE_EXECUTIONS_FIXER_WORKFLOW: &str = "cadence-sys-executions-fixer-workflow";
/// Current executions fixer workflow type name.
const CURRENT_EXECUTIONS_FIXER_WORKFLOW: &str = "cadence-sys-current-executions-fixer-workflow";
/// Timers scanner workflow type name.
const TIMERS_SCANNER_WORKFLOW: &str = "cadence-sys-timers-scanner-workflow";
/// Timers fixer workflow type name.
const TIMERS_FIXER_WORKFLOW: &str = "cadence-sys-timers-fixer-workflow";

/// Concurrency cap applied to scanner workers.
const STANDARD_WORKER_CONCURRENCY: usize = 10;

/// Maximum accepted registration name length.
const MAX_NAME_LENGTH: usize = 255;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Scanner registration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// Two entries share a name.
    #[error("duplicate scanner registration: {0}")]
    Duplicate(String),
    /// An entry failed validation.
    #[error("invalid scanner registration: {0}")]
    Invalid(String),
    /// The sink rejected an entry.
    #[error("scanner registration sink error: {0}")]
    Sink(String),
}

// ============================================================================
// SECTION: Definitions
// ============================================================================

/// Exponential retry schedule for scanner activities.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub initial_interval: Duration,
    /// Multiplier applied to the delay after each attempt.
    pub backoff_coefficient: f64,
    /// Upper bound on a single delay.
    pub maximum_interval: Duration,
    /// Total time after which retries stop.
    pub expiration_interval: Duration,
}

impl RetryPolicy {
    /// Retry schedule used by the standard scanner activities.
    #[must_use]
    pub const fn standard() -> Self {
        Self {
            initial_interval: Duration::from_secs(10),
            backoff_coefficient: 1.7,
            maximum_interval: Duration::from_secs(5 * 60),
            expiration_interval: UNBOUNDED_TIMEOUT,
        }
    }

    /// Returns the delay before retry `attempt` (0-based), capped at the maximum.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let scaled = self.initial_interval.as_secs_f64() * self.backoff_coefficient.powi(exponent);
        if !scaled.is_finite() || scaled >= self.maximum_interval.as_secs_f64() {
            return self.maximum_interval;
        }
        Duration::from_secs_f64(scaled)
    }

    /// Validates the schedule shape.
    fn validate(&self, owner: &str) -> Result<(), RegistrationError> {
        if self.initial_interval.is_zero() {
            return Err(RegistrationError::Invalid(format!("{owner}: initial interval is zero")));
        }
        if !self.backoff_coefficient.is_finite() || self.backoff_coefficient < 1.0 {
            return Err(RegistrationError::Invalid(format!(
                "{owner}: backoff coefficient must be >= 1"
            )));
        }
        if self.maximum_interval < self.initial_interval {
            return Err(RegistrationError::Invalid(format!(
                "{owner}: maximum interval below initial interval"
            )));
        }
        Ok(())
    }
}

/// What happens when a workflow id is reused after a previous run closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkflowIdReusePolicy {
    /// Reuse only when the previous run did not complete successfully.
    #[default]
    AllowDuplicateFailedOnly,
    /// Always allow a new run once the previous one closed.
    AllowDuplicate,
    /// Never reuse the id.
    RejectDuplicate,
    /// Terminate a running execution and start a new one.
    TerminateIfRunning,
}

impl WorkflowIdReusePolicy {
    /// Returns a stable label for logs and sinks.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::AllowDuplicateFailedOnly => "allow_duplicate_failed_only",
            Self::AllowDuplicate => "allow_duplicate",
            Self::RejectDuplicate => "reject_duplicate",
            Self::TerminateIfRunning => "terminate_if_running",
        }
    }
}

/// How a scanner workflow is started on its cron schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowStartOptions {
    /// Fixed workflow id used when starting.
    pub workflow_id: String,
    /// Task list the workflow is polled from.
    pub task_list: String,
    /// Five-field cron schedule.
    pub cron_schedule: String,
    /// Execution start-to-close timeout.
    pub execution_timeout: Duration,
    /// Workflow id reuse policy.
    pub id_reuse_policy: WorkflowIdReusePolicy,
}

impl WorkflowStartOptions {
    /// Creates cron start options with the standard schedule and reuse policy.
    #[must_use]
    pub fn standard(
        workflow_id: impl Into<String>,
        task_list: impl Into<String>,
        execution_timeout: Duration,
    ) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            task_list: task_list.into(),
            cron_schedule: STANDARD_CRON_SCHEDULE.to_string(),
            execution_timeout,
            id_reuse_policy: WorkflowIdReusePolicy::AllowDuplicate,
        }
    }

    /// Validates ids and the cron shape.
    fn validate(&self, owner: &str) -> Result<(), RegistrationError> {
        validate_name("workflow id", &self.workflow_id)?;
        validate_name("task list", &self.task_list)?;
        if self.cron_schedule.split_whitespace().count() != 5 {
            return Err(RegistrationError::Invalid(format!(
                "{owner}: cron schedule must have five fields"
            )));
        }
        if self.execution_timeout.is_zero() {
            return Err(RegistrationError::Invalid(format!("{owner}: execution timeout is zero")));
        }
        Ok(())
    }
}

/// A scanner workflow type, optionally started by the worker on a schedule.
///
/// Workflows without start options are registered so other workflows or
/// operators can start them (fixers, on-demand scanners).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowRegistration {
    /// Workflow type name.
    pub name: String,
    /// Start options for workflows the worker launches itself.
    pub start: Option<WorkflowStartOptions>,
}

impl WorkflowRegistration {
    /// Registers a workflow type without start options.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: None,
        }
    }

    /// Returns a copy started on a schedule with `options`.
    #[must_use]
    pub fn with_start(mut self, options: WorkflowStartOptions) -> Self {
        self.start = Some(options);
        self
    }

    /// Validates the name and any start options.
    fn validate(&self) -> Result<(), RegistrationError> {
        validate_name("workflow name", &self.name)?;
        self.start.as_ref().map_or(Ok(()), |start| start.validate(&self.name))
    }
}

/// Worker concurrency limits for scanner task lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerOptions {
    /// Activities a worker executes at once.
    pub max_concurrent_activity_executions: usize,
    /// Decision tasks a worker executes at once.
    pub max_concurrent_decision_tasks: usize,
}

impl WorkerOptions {
    /// Limits used by the standard scanner worker.
    #[must_use]
    pub const fn standard() -> Self {
        Self {
            max_concurrent_activity_executions: STANDARD_WORKER_CONCURRENCY,
            max_concurrent_decision_tasks: STANDARD_WORKER_CONCURRENCY,
        }
    }

    /// Validates that both limits are positive.
    fn validate(self) -> Result<(), RegistrationError> {
        if self.max_concurrent_activity_executions == 0 || self.max_concurrent_decision_tasks == 0
        {
            return Err(RegistrationError::Invalid(
                "worker concurrency limits must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self::standard()
    }
}

/// A scanner activity and its execution options.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityRegistration {
    /// Activity type name.
    pub name: String,
    /// Maximum queue wait before a worker picks the activity up.
    pub schedule_to_start_timeout: Duration,
    /// Maximum run time once started.
    pub start_to_close_timeout: Duration,
    /// Maximum gap between heartbeats.
    pub heartbeat_timeout: Duration,
    /// Retry schedule.
    pub retry_policy: RetryPolicy,
}

impl ActivityRegistration {
    /// Creates an activity with the standard scanner options.
    #[must_use]
    pub fn standard(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schedule_to_start_timeout: Duration::from_secs(5 * 60),
            start_to_close_timeout: UNBOUNDED_TIMEOUT,
            heartbeat_timeout: Duration::from_secs(5 * 60),
            retry_policy: RetryPolicy::standard(),
        }
    }

    /// Validates the name, timeouts, and retry policy.
    fn validate(&self) -> Result<(), RegistrationError> {
        validate_name("activity name", &self.name)?;
        if self.schedule_to_start_timeout.is_zero()
            || self.start_to_close_timeout.is_zero()
            || self.heartbeat_timeout.is_zero()
        {
            return Err(RegistrationError::Invalid(format!("{}: zero timeout", self.name)));
        }
        self.retry_policy.validate(&self.name)
    }
}

// ============================================================================
// SECTION: Sink
// ============================================================================

/// Receiver of scanner definitions, typically a worker's dispatcher.
pub trait RegistrationSink {
    /// Applies worker concurrency limits before any registration.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::Sink`] when the worker rejects them.
    fn configure_worker(&mut self, options: &WorkerOptions) -> Result<(), RegistrationError>;

    /// Registers one workflow.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::Sink`] when the worker rejects it.
    fn register_workflow(
        &mut self,
        registration: &WorkflowRegistration,
    ) -> Result<(), RegistrationError>;

    /// Registers one activity.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::Sink`] when the worker rejects it.
    fn register_activity(
        &mut self,
        registration: &ActivityRegistration,
    ) -> Result<(), RegistrationError>;
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Validated, immutable set of scanner definitions.
///
/// # Invariants
/// - Workflow and activity names are unique across the whole registry.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScannerRegistry {
    /// Worker concurrency limits.
    worker_options: WorkerOptions,
    /// Workflows in registration order.
    workflows: Vec<WorkflowRegistration>,
    /// Activities in registration order.
    activities: Vec<ActivityRegistration>,
}

impl ScannerRegistry {
    /// Starts an empty builder.
    #[must_use]
    pub fn builder() -> ScannerRegistryBuilder {
        ScannerRegistryBuilder::default()
    }

    /// Returns the standard scanner definitions.
    ///
    /// The task-list and history scanners are started on the twice-daily
    /// cron schedule; the executions and timers scanners and fixers are
    /// registered for on-demand starts.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError`] only if the built-in definitions are
    /// inconsistent.
    pub fn standard() -> Result<Self, RegistrationError> {
        Self::builder()
            .worker_options(WorkerOptions::standard())
            .workflow(WorkflowRegistration::named(TASK_LIST_SCANNER_WORKFLOW).with_start(
                WorkflowStartOptions::standard(
                    TASK_LIST_SCANNER_WORKFLOW_ID,
                    TASK_LIST_SCANNER_TASK_LIST,
                    Duration::from_secs(5 * 24 * 60 * 60),
                ),
            ))
            .activity(ActivityRegistration::standard(TASK_LIST_SCAVENGER_ACTIVITY))
            .workflow(WorkflowRegistration::named(HISTORY_SCANNER_WORKFLOW).with_start(
                WorkflowStartOptions::standard(
                    HISTORY_SCANNER_WORKFLOW_ID,
                    HISTORY_SCANNER_TASK_LIST,
                    UNBOUNDED_TIMEOUT,
                ),
            ))
            .activity(ActivityRegistration::standard(HISTORY_SCAVENGER_ACTIVITY))
            .workflow(WorkflowRegistration::named(CONCRETE_EXECUTIONS_SCANNER_WORKFLOW))
            .workflow(WorkflowRegistration::named(CURRENT_EXECUTIONS_SCANNER_WORKFLOW))
            .workflow(WorkflowRegistration::named(CONCRETE_EXECUTIONS_FIXER_WORKFLOW))
            .workflow(WorkflowRegistration::named(CURRENT_EXECUTIONS_FIXER_WORKFLOW))
            .workflow(WorkflowRegistration::named(TIMERS_SCANNER_WORKFLOW))
            .workflow(WorkflowRegistration::named(TIMERS_FIXER_WORKFLOW))
            .build()
    }

    /// Returns the worker concurrency limits.
    #[must_use]
    pub const fn worker_options(&self) -> WorkerOptions {
        self.worker_options
    }

    /// Iterates the workflows the worker starts on a schedule.
    pub fn scheduled(
        &self,
    ) -> impl Iterator<Item = (&WorkflowRegistration, &WorkflowStartOptions)> {
        self.workflows
            .iter()
            .filter_map(|workflow| workflow.start.as_ref().map(|start| (workflow, start)))
    }

    /// Returns the registered workflows.
    #[must_use]
    pub fn workflows(&self) -> &[WorkflowRegistration] {
        &self.workflows
    }

    /// Returns the registered activities.
    #[must_use]
    pub fn activities(&self) -> &[ActivityRegistration] {
        &self.activities
    }

    /// Looks up a workflow by type name.
    #[must_use]
    pub fn workflow(&self, name: &str) -> Option<&WorkflowRegistration> {
        self.workflows.iter().find(|workflow| workflow.name == name)
    }

    /// Looks up an activity by type name.
    #[must_use]
    pub fn activity(&self, name: &str) -> Option<&ActivityRegistration> {
        self.activities.iter().find(|activity| activity.name == name)
    }

    /// Configures the worker, then hands every definition to `sink`,
    /// workflows first. Returns the number of definitions registered.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by the sink.
    pub fn install<S>(&self, sink: &mut S) -> Result<usize, RegistrationError>
    where
        S: RegistrationSink + ?Sized,
    {
        sink.configure_worker(&self.worker_options)?;
        for workflow in &self.workflows {
            sink.register_workflow(workflow)?;
        }
        for activity in &self.activities {
            sink.register_activity(activity)?;
        }
        let installed = self.workflows.len() + self.activities.len();
        info!(
            workflows = self.workflows.len(),
            scheduled = self.scheduled().count(),
            activities = self.activities.len(),
            "scanner registry installed"
        );
        Ok(installed)
    }
}

/// Builder collecting scanner definitions before validation.
#[derive(Debug, Clone, Default)]
pub struct ScannerRegistryBuilder {
    /// Worker concurrency limits.
    worker_options: WorkerOptions,
    /// Pending workflows.
    workflows: Vec<WorkflowRegistration>,
    /// Pending activities.
    activities: Vec<ActivityRegistration>,
}

impl ScannerRegistryBuilder {
    /// Sets the worker concurrency limits.
    #[must_use]
    pub const fn worker_options(mut self, options: WorkerOptions) -> Self {
        self.worker_options = options;
        self
    }

    /// Adds a workflow definition.
    #[must_use]
    pub fn workflow(mut self, registration: WorkflowRegistration) -> Self {
        self.workflows.push(registration);
        self
    }

    /// Adds an activity definition.
    #[must_use]
    pub fn activity(mut self, registration: ActivityRegistration) -> Self {
        self.activities.push(registration);
        self
    }

    /// Validates every entry and freezes the registry.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::Duplicate`] when a name repeats and
    /// [`RegistrationError::Invalid`] when an entry is malformed.
    pub fn build(self) -> Result<ScannerRegistry, RegistrationError> {
        self.worker_options.validate()?;
        let mut seen = BTreeSet::new();
        for workflow in &self.workflows {
            workflow.validate()?;
            if !seen.insert(workflow.name.as_str()) {
                return Err(RegistrationError::Duplicate(workflow.name.clone()));
            }
        }
        for activity in &self.activities {
            activity.validate()?;
            if !seen.insert(activity.name.as_str()) {
                return Err(RegistrationError::Duplicate(activity.name.clone()));
            }
        }
        Ok(ScannerRegistry {
            worker_options: self.worker_options,
            workflows: self.workflows,
            activities: self.activities,
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Rejects empty, overlong, or whitespace-bearing names.
fn validate_name(field: &str, value: &str) -> Result<(), RegistrationError> {
    if value.is_empty() || value.len() > MAX_NAME_LENGTH {
        return Err(RegistrationError::Invalid(format!("{field} length out of range")));
    }
    if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(RegistrationError::Invalid(format!("{field} contains whitespace: {value}")));
    }
    Ok(())
}
