//! Post-dispatch actions
//!
//! Optional scripts triggered by classified events: a deploy script for
//! pushes and a test script for pull requests. Actions run in the background;
//! the HTTP response never waits for them and never reflects their outcome.
//! A semaphore bounds how many actions run at once across all deliveries.

use crate::{events::WebhookEvent, settings::ActionConfig, Result, WebhookError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Something to do after an event has been dispatched
#[async_trait]
pub trait EventAction: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Whether this action reacts to the event
    fn applies_to(&self, event: &WebhookEvent) -> bool;

    /// Run the action to completion
    async fn execute(&self, event: &WebhookEvent) -> Result<()>;
}

/// Event kind a script is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptTrigger {
    /// Receives the branch name
    Push,
    /// Receives the pull request number
    PullRequest,
}

impl ScriptTrigger {
    fn argument(&self, event: &WebhookEvent) -> Option<String> {
        match (self, event) {
            (Self::Push, WebhookEvent::Push(push)) => Some(push.branch.clone()),
            (Self::PullRequest, WebhookEvent::PullRequest(pr)) => Some(pr.number.clone()),
            _ => None,
        }
    }
}

/// External program invoked with a single argument derived from the event.
///
/// The program is executed directly, not through a shell.
#[derive(Debug, Clone)]
pub struct ScriptAction {
    name: String,
    program: PathBuf,
    trigger: ScriptTrigger,
    timeout: Duration,
}

impl ScriptAction {
    pub fn new(name: &str, program: impl AsRef<Path>, trigger: ScriptTrigger) -> Self {
        Self {
            name: name.to_string(),
            program: program.as_ref().to_path_buf(),
            trigger,
            timeout: Duration::from_secs(300),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

#[async_trait]
impl EventAction for ScriptAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn applies_to(&self, event: &WebhookEvent) -> bool {
        self.trigger.argument(event).is_some()
    }

    async fn execute(&self, event: &WebhookEvent) -> Result<()> {
        let argument = self.trigger.argument(event).ok_or_else(|| {
            WebhookError::Action(format!("{} does not handle {} events", self.name, event.event_type()))
        })?;

        // Payload-derived values must not be read as options by the script.
        if argument.starts_with('-') {
            return Err(WebhookError::Action(format!(
                "{} refused option-like argument {:?}",
                self.name, argument
            )));
        }

        debug!(action = %self.name, program = %self.program.display(), argument = %argument, "Running script");

        let mut command = Command::new(&self.program);
        command.arg(&argument).stdin(Stdio::null()).kill_on_drop(true);

        let status = tokio::time::timeout(self.timeout, command.status())
            .await
            .map_err(|_| {
                WebhookError::Action(format!(
                    "{} timed out after {}s",
                    self.name,
                    self.timeout.as_secs_f64()
                ))
            })?
            .map_err(|e| {
                WebhookError::Action(format!(
                    "failed to start {}: {}",
                    self.program.display(),
                    e
                ))
            })?;

        if !status.success() {
            return Err(WebhookError::Action(format!("{} exited with {}", self.name, status)));
        }

        Ok(())
    }
}

/// Immutable set of actions consulted for every dispatched event
#[derive(Clone)]
pub struct ActionRunner {
    actions: Vec<Arc<dyn EventAction>>,
    permits: Arc<Semaphore>,
    max_concurrent: usize,
}

impl Default for ActionRunner {
    fn default() -> Self {
        Self {
            actions: Vec::new(),
            permits: Arc::new(Semaphore::new(1)),
            max_concurrent: 1,
        }
    }
}

impl ActionRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow up to `max` actions to run at the same time (at least one)
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        let max = max.max(1);
        self.permits = Arc::new(Semaphore::new(max));
        self.max_concurrent = max;
        self
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Build the configured script actions
    pub fn from_config(config: &ActionConfig) -> Self {
        let mut runner = Self::new().with_max_concurrent(config.max_concurrent);

        if let Some(program) = &config.deploy_script {
            runner = runner.with_action(Arc::new(
                ScriptAction::new("deploy", program, ScriptTrigger::Push).with_timeout(config.timeout()),
            ));
        }
        if let Some(program) = &config.test_script {
            runner = runner.with_action(Arc::new(
                ScriptAction::new("test", program, ScriptTrigger::PullRequest)
                    .with_timeout(config.timeout()),
            ));
        }

        runner
    }

    pub fn with_action(mut self, action: Arc<dyn EventAction>) -> Self {
        info!(action = %action.name(), "Registering event action");
        self.actions.push(action);
        self
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Spawn every action that applies to `event`.
    ///
    /// Each task waits for a permit before running, so at most
    /// `max_concurrent` actions execute at once; the rest queue. Outcomes are
    /// logged from the spawned tasks. The handles are returned so callers may
    /// wait for completion; dropping them detaches the tasks.
    pub fn dispatch(&self, event: &WebhookEvent) -> Vec<JoinHandle<()>> {
        self.actions
            .iter()
            .filter(|action| action.applies_to(event))
            .map(|action| {
                let action = Arc::clone(action);
                let event = event.clone();
                let permits = Arc::clone(&self.permits);
                tokio::spawn(async move {
                    let _permit = match permits.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(e) => {
                            error!(action = %action.name(), error = %e, "Action not run");
                            return;
                        }
                    };
                    match action.execute(&event).await {
                        Ok(()) => info!(action = %action.name(), "Action completed"),
                        Err(e) => error!(action = %action.name(), error = %e, "Action failed"),
                    }
                })
            })
            .collect()
    }
}

impl std::fmt::Debug for ActionRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.actions.iter().map(|a| a.name()))
            .finish()
    }
}
