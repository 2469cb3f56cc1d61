//! # Dependency ordering of components.
//!
//! [`DependencyGraph`] turns "`api` depends on `db`" edges into a start order
//! (dependencies first) and a stop order (exact reverse).
//!
//! ## Algorithm
//! Depth-first topological sort restricted to the requested subset:
//! ```text
//! visit(n):
//!   done(n)        → return
//!   in_progress(n) → CycleDetected(n)
//!   mark in_progress; visit each requested dependency; mark done; push n
//! ```
//! Dependencies outside the requested subset are ignored, so a partial
//! `start_all` never drags in components the caller did not ask for.
//! Requested names are visited in the order given, and dependencies in name
//! order, which keeps the output deterministic.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::error::GraphError;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

/// Directed "depends on" edges between named components.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    edges: HashMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `component` must start after `depends_on`.
    pub fn add_dependency(&mut self, component: impl Into<String>, depends_on: impl Into<String>) {
        self.edges
            .entry(component.into())
            .or_default()
            .insert(depends_on.into());
    }

    /// Direct dependencies of `component`.
    pub fn dependencies(&self, component: &str) -> impl Iterator<Item = &str> {
        self.edges
            .get(component)
            .into_iter()
            .flat_map(|deps| deps.iter().map(String::as_str))
    }

    /// Start order for `components`: every dependency precedes its dependents.
    ///
    /// # Errors
    /// [`GraphError::CycleDetected`] if the requested subset contains a cycle.
    pub fn start_order<S: AsRef<str>>(&self, components: &[S]) -> Result<Vec<String>, GraphError> {
        let requested: HashSet<&str> = components.iter().map(AsRef::as_ref).collect();
        let mut marks: HashMap<&str, Mark> = HashMap::with_capacity(requested.len());
        let mut order = Vec::with_capacity(requested.len());

        for name in components {
            self.visit(name.as_ref(), &requested, &mut marks, &mut order)?;
        }
        Ok(order)
    }

    /// Stop order for `components`: exactly the reverse of [`start_order`](Self::start_order).
    pub fn stop_order<S: AsRef<str>>(&self, components: &[S]) -> Result<Vec<String>, GraphError> {
        let mut order = self.start_order(components)?;
        order.reverse();
        Ok(order)
    }

    fn visit<'a>(
        &'a self,
        name: &'a str,
        requested: &HashSet<&'a str>,
        marks: &mut HashMap<&'a str, Mark>,
        order: &mut Vec<String>,
    ) -> Result<(), GraphError> {
        match marks.get(name) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::InProgress) => {
                return Err(GraphError::CycleDetected {
                    component: name.to_string(),
                });
            }
            None => {}
        }

        marks.insert(name, Mark::InProgress);
        for dep in self.dependencies(name) {
            if requested.contains(dep) {
                self.visit(dep, requested, marks, order)?;
            }
        }
        marks.insert(name, Mark::Done);
        order.push(name.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(order: &[String], name: &str) -> usize {
        order.iter().position(|n| n == name).unwrap()
    }

    #[test]
    fn test_dependencies_precede_dependents() {
        let mut g = DependencyGraph::new();
        g.add_dependency("api", "db");
        g.add_dependency("api", "cache");
        g.add_dependency("engine", "api");
        g.add_dependency("cache", "db");

        let order = g.start_order(&["engine", "api", "cache", "db"]).unwrap();
        assert_eq!(order.len(), 4);
        for (dependent, dependency) in [("api", "db"), ("api", "cache"), ("engine", "api"), ("cache", "db")] {
            assert!(position(&order, dependency) < position(&order, dependent));
        }
    }

    #[test]
    fn test_stop_order_is_reverse() {
        let mut g = DependencyGraph::new();
        g.add_dependency("api", "db");
        g.add_dependency("ui", "api");

        let names = ["ui", "db", "api"];
        let mut start = g.start_order(&names).unwrap();
        let stop = g.stop_order(&names).unwrap();
        start.reverse();
        assert_eq!(start, stop);
    }

    #[test]
    fn test_cycle_names_component_on_cycle() {
        let mut g = DependencyGraph::new();
        g.add_dependency("a", "b");
        g.add_dependency("b", "c");
        g.add_dependency("c", "a");
        g.add_dependency("d", "a");

        let err = g.start_order(&["d", "a", "b", "c"]).unwrap_err();
        let GraphError::CycleDetected { component } = err;
        assert!(["a", "b", "c"].contains(&component.as_str()));
    }

    #[test]
    fn test_cycle_outside_subset_is_ignored() {
        let mut g = DependencyGraph::new();
        g.add_dependency("a", "b");
        g.add_dependency("b", "a");
        g.add_dependency("c", "d");

        assert_eq!(g.start_order(&["c", "a"]).unwrap(), vec!["c", "a"]);
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let mut g = DependencyGraph::new();
        g.add_dependency("a", "a");
        assert_eq!(
            g.start_order(&["a"]),
            Err(GraphError::CycleDetected {
                component: "a".into()
            })
        );
    }

    #[test]
    fn test_empty_request() {
        let g = DependencyGraph::new();
        assert!(g.start_order::<&str>(&[]).unwrap().is_empty());
    }
}
