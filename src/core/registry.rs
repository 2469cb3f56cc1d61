//! # Component registry: specs, live state and restart locks.
//!
//! The registry is the only owner of [`ComponentState`]. The watchdog mutates
//! it through [`Registry::update`]; everybody else receives cloned snapshots.
//!
//! ```text
//! Registry
//!   ├─ entries: name → Entry { spec (Arc, immutable), state (mutable), restart_lock }
//!   ├─ order:   registration order (stable iteration for ticks and shutdown)
//!   └─ graph:   DependencyGraph built from every spec's `depends_on`
//! ```
//!
//! ## Rules
//! - Names are unique; a second registration is rejected.
//! - The state lock is never held across process I/O or sleeps.
//! - `restart_lock` is a per-component `tokio::sync::Mutex` handed out as an
//!   `Arc` so a restart can hold it across awaits without pinning the registry.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::components::{ComponentSpec, ComponentState};
use crate::core::graph::DependencyGraph;
use crate::error::SupervisorError;

struct Entry {
    spec: Arc<ComponentSpec>,
    state: ComponentState,
    restart_lock: Arc<Mutex<()>>,
}

/// Registry of supervised components.
#[derive(Default)]
pub struct Registry {
    entries: RwLock<HashMap<String, Entry>>,
    order: RwLock<Vec<String>>,
    graph: RwLock<DependencyGraph>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a component in the `Stopped` state and records its dependency edges.
    pub async fn insert(&self, spec: ComponentSpec) -> Result<(), SupervisorError> {
        let name = spec.name().to_string();
        let mut entries = self.entries.write().await;
        if entries.contains_key(&name) {
            return Err(SupervisorError::AlreadyRegistered(name));
        }

        {
            let mut graph = self.graph.write().await;
            for dep in &spec.depends_on {
                graph.add_dependency(name.clone(), dep.clone());
            }
        }
        self.order.write().await.push(name.clone());
        entries.insert(
            name,
            Entry {
                spec: Arc::new(spec),
                state: ComponentState::new(),
                restart_lock: Arc::new(Mutex::new(())),
            },
        );
        Ok(())
    }

    /// Registered names in registration order.
    pub async fn names(&self) -> Vec<String> {
        self.order.read().await.clone()
    }

    pub async fn spec(&self, name: &str) -> Result<Arc<ComponentSpec>, SupervisorError> {
        self.with_entry(name, |e| Arc::clone(&e.spec)).await
    }

    /// Snapshot of the component's state.
    pub async fn state(&self, name: &str) -> Result<ComponentState, SupervisorError> {
        self.with_entry(name, |e| e.state.clone()).await
    }

    pub async fn restart_lock(&self, name: &str) -> Result<Arc<Mutex<()>>, SupervisorError> {
        self.with_entry(name, |e| Arc::clone(&e.restart_lock)).await
    }

    /// Mutates the component's state in place and returns `f`'s result.
    pub async fn update<R>(
        &self,
        name: &str,
        f: impl FnOnce(&mut ComponentState) -> R,
    ) -> Result<R, SupervisorError> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(name)
            .ok_or_else(|| SupervisorError::UnknownComponent(name.to_string()))?;
        Ok(f(&mut entry.state))
    }

    /// Snapshots of every component, keyed by name.
    pub async fn states(&self) -> HashMap<String, ComponentState> {
        self.entries
            .read()
            .await
            .iter()
            .map(|(name, e)| (name.clone(), e.state.clone()))
            .collect()
    }

    /// Start order for `names` (see [`DependencyGraph::start_order`]).
    pub async fn start_order<S: AsRef<str>>(
        &self,
        names: &[S],
    ) -> Result<Vec<String>, SupervisorError> {
        Ok(self.graph.read().await.start_order(names)?)
    }

    /// Stop order for `names` (see [`DependencyGraph::stop_order`]).
    pub async fn stop_order<S: AsRef<str>>(
        &self,
        names: &[S],
    ) -> Result<Vec<String>, SupervisorError> {
        Ok(self.graph.read().await.stop_order(names)?)
    }

    async fn with_entry<R>(
        &self,
        name: &str,
        f: impl FnOnce(&Entry) -> R,
    ) -> Result<R, SupervisorError> {
        self.entries
            .read()
            .await
            .get(name)
            .map(f)
            .ok_or_else(|| SupervisorError::UnknownComponent(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::ComponentStatus;

    #[tokio::test]
    async fn test_insert_and_update() {
        let reg = Registry::new();
        reg.insert(ComponentSpec::builder("db", "postgres").build())
            .await
            .unwrap();
        reg.insert(ComponentSpec::builder("api", "api").depends_on("db").build())
            .await
            .unwrap();

        assert_eq!(reg.names().await, vec!["db", "api"]);
        assert_eq!(reg.state("db").await.unwrap().status, ComponentStatus::Stopped);

        reg.update("db", |s| s.status = ComponentStatus::Healthy)
            .await
            .unwrap();
        assert_eq!(reg.state("db").await.unwrap().status, ComponentStatus::Healthy);
        assert_eq!(reg.start_order(&["api", "db"]).await.unwrap(), vec!["db", "api"]);
    }

    #[tokio::test]
    async fn test_duplicate_and_unknown() {
        let reg = Registry::new();
        reg.insert(ComponentSpec::builder("db", "postgres").build())
            .await
            .unwrap();
        let dup = reg
            .insert(ComponentSpec::builder("db", "postgres").build())
            .await
            .unwrap_err();
        assert_eq!(dup.as_label(), "supervisor_already_registered");

        let missing = reg.state("nope").await.unwrap_err();
        assert_eq!(missing.as_label(), "supervisor_unknown_component");
    }
}
