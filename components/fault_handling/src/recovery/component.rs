//! Component-level recovery: reset, isolate/restart and degrade
//!
//! Strategies here act on the component named by the fault's `component`
//! context key, looked up in a shared [`ComponentRegistry`].

use super::{RecoveryContext, RecoveryOutcome, RecoveryStrategy};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Health of a registered component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentStatus {
    /// Serving normally
    Healthy,
    /// Serving with reduced functionality
    Degraded,
    /// Taken out of service pending restart
    Isolated,
    /// Last recovery action failed
    Failed,
}

/// A runtime component that recovery strategies can act on
pub trait ManagedComponent: Send + Sync {
    /// Clear transient state
    fn reset(&self) -> Result<(), String>;

    /// Tear down and start again; defaults to [`ManagedComponent::reset`]
    fn restart(&self) -> Result<(), String> {
        self.reset()
    }

    /// Switch to a reduced mode of operation
    fn degrade(&self) -> Result<(), String>;
}

struct Entry {
    component: Arc<dyn ManagedComponent>,
    status: ComponentStatus,
}

/// Named components and their health
#[derive(Default)]
pub struct ComponentRegistry {
    entries: RwLock<BTreeMap<String, Entry>>,
}

impl ComponentRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a component; it starts healthy
    pub fn register(&self, name: impl Into<String>, component: Arc<dyn ManagedComponent>) {
        self.entries.write().insert(
            name.into(),
            Entry {
                component,
                status: ComponentStatus::Healthy,
            },
        );
    }

    /// Current status, if registered
    pub fn status(&self, name: &str) -> Option<ComponentStatus> {
        self.entries.read().get(name).map(|e| e.status)
    }

    /// Status of every component
    pub fn statuses(&self) -> BTreeMap<String, ComponentStatus> {
        self.entries
            .read()
            .iter()
            .map(|(name, e)| (name.clone(), e.status))
            .collect()
    }

    fn component(&self, name: &str) -> Option<Arc<dyn ManagedComponent>> {
        self.entries.read().get(name).map(|e| e.component.clone())
    }

    fn set_status(&self, name: &str, status: ComponentStatus) {
        if let Some(entry) = self.entries.write().get_mut(name) {
            entry.status = status;
        }
    }
}

fn target<'c>(
    strategy: &str,
    ctx: &'c RecoveryContext<'_>,
    registry: &ComponentRegistry,
) -> Result<(&'c str, Arc<dyn ManagedComponent>), RecoveryOutcome> {
    let name = ctx
        .context("component")
        .ok_or_else(|| RecoveryOutcome::failed(strategy, "fault names no component"))?;
    let component = registry.component(name).ok_or_else(|| {
        RecoveryOutcome::failed(strategy, format!("component '{}' is not registered", name))
    })?;
    Ok((name, component))
}

fn finish(
    strategy: &str,
    registry: &ComponentRegistry,
    name: &str,
    started: Instant,
    result: Result<(), String>,
    on_success: ComponentStatus,
) -> RecoveryOutcome {
    let mut outcome = match result {
        Ok(()) => {
            registry.set_status(name, on_success);
            info!(component = name, strategy, "component recovered");
            RecoveryOutcome::succeeded(strategy, format!("component '{}' {:?}", name, on_success))
        }
        Err(message) => {
            registry.set_status(name, ComponentStatus::Failed);
            warn!(component = name, strategy, %message, "component recovery failed");
            RecoveryOutcome::failed(strategy, message)
        }
    };
    outcome.elapsed = started.elapsed();
    outcome
}

/// Clears the component's state
pub struct ResetStrategy {
    components: Arc<ComponentRegistry>,
}

impl ResetStrategy {
    /// Strategy acting on `components`
    pub fn new(components: Arc<ComponentRegistry>) -> Self {
        Self { components }
    }
}

impl RecoveryStrategy for ResetStrategy {
    fn name(&self) -> &str {
        "reset"
    }

    fn recover(&self, ctx: &mut RecoveryContext<'_>) -> RecoveryOutcome {
        let started = Instant::now();
        match target(self.name(), ctx, &self.components) {
            Ok((name, component)) => finish(
                self.name(),
                &self.components,
                name,
                started,
                component.reset(),
                ComponentStatus::Healthy,
            ),
            Err(outcome) => outcome,
        }
    }
}

/// Takes the component out of service and restarts it
pub struct IsolateRestartStrategy {
    components: Arc<ComponentRegistry>,
}

impl IsolateRestartStrategy {
    /// Strategy acting on `components`
    pub fn new(components: Arc<ComponentRegistry>) -> Self {
        Self { components }
    }
}

impl RecoveryStrategy for IsolateRestartStrategy {
    fn name(&self) -> &str {
        "isolate_restart"
    }

    fn recover(&self, ctx: &mut RecoveryContext<'_>) -> RecoveryOutcome {
        let started = Instant::now();
        match target(self.name(), ctx, &self.components) {
            Ok((name, component)) => {
                self.components.set_status(name, ComponentStatus::Isolated);
                finish(
                    self.name(),
                    &self.components,
                    name,
                    started,
                    component.restart(),
                    ComponentStatus::Healthy,
                )
            }
            Err(outcome) => outcome,
        }
    }
}

/// Switches the component to a reduced mode
pub struct DegradeStrategy {
    components: Arc<ComponentRegistry>,
}

impl DegradeStrategy {
    /// Strategy acting on `components`
    pub fn new(components: Arc<ComponentRegistry>) -> Self {
        Self { components }
    }
}

impl RecoveryStrategy for DegradeStrategy {
    fn name(&self) -> &str {
        "degrade"
    }

    fn recover(&self, ctx: &mut RecoveryContext<'_>) -> RecoveryOutcome {
        let started = Instant::now();
        match target(self.name(), ctx, &self.components) {
            Ok((name, component)) => finish(
                self.name(),
                &self.components,
                name,
                started,
                component.degrade(),
                ComponentStatus::Degraded,
            ),
            Err(outcome) => outcome,
        }
    }
}
