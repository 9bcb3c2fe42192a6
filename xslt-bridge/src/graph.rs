//! Dependency graph of named steps and the schedulers that run it
//!
//! A [`TaskGraph`] only records which step needs which. Running a step is
//! up to the caller: [`run_sequential`] does it one by one on the calling
//! thread, [`run_concurrent`] starts every step whose dependencies are done
//! and waits for them together.

use std::collections::HashSet;
use std::fmt::Display;
use std::future::Future;
use std::hash::Hash;

use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use indexmap::IndexMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Step '{step}' depends on unknown step '{dependency}'")]
    UnknownDependency { step: String, dependency: String },

    #[error("Steps form a cycle: {}", .0.join(", "))]
    Cycle(Vec<String>),
}

/// Steps and their dependencies, kept in insertion order
#[derive(Debug, Clone)]
pub struct TaskGraph<K> {
    steps: IndexMap<K, Vec<K>>,
}

impl<K> Default for TaskGraph<K> {
    fn default() -> Self {
        Self {
            steps: IndexMap::new(),
        }
    }
}

impl<K> TaskGraph<K>
where
    K: Copy + Eq + Hash + Display,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `step`, replacing an earlier entry for it.
    pub fn add<I: IntoIterator<Item = K>>(&mut self, step: K, dependencies: I) -> &mut Self {
        self.steps.insert(step, dependencies.into_iter().collect());
        self
    }

    /// Add `dependency` to an existing step
    pub fn depend(&mut self, step: K, dependency: K) -> &mut Self {
        if let Some(deps) = self.steps.get_mut(&step) {
            if !deps.contains(&dependency) {
                deps.push(dependency);
            }
        }
        self
    }

    pub fn contains(&self, step: K) -> bool {
        self.steps.contains_key(&step)
    }

    pub fn dependencies(&self, step: K) -> &[K] {
        self.steps.get(&step).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Steps not yet started whose dependencies are all done
    pub fn ready(&self, done: &HashSet<K>, started: &HashSet<K>) -> Vec<K> {
        self.steps
            .iter()
            .filter(|(step, deps)| {
                !started.contains(*step) && deps.iter().all(|d| done.contains(d))
            })
            .map(|(step, _)| *step)
            .collect()
    }

    /// A topological order, preferring insertion order among ready steps.
    pub fn order(&self) -> Result<Vec<K>, GraphError> {
        for (step, deps) in &self.steps {
            if let Some(missing) = deps.iter().find(|d| !self.steps.contains_key(*d)) {
                return Err(GraphError::UnknownDependency {
                    step: step.to_string(),
                    dependency: missing.to_string(),
                });
            }
        }

        let mut done = HashSet::new();
        let mut order = Vec::with_capacity(self.steps.len());
        while order.len() < self.steps.len() {
            let Some(next) = self.ready(&done, &done).into_iter().next() else {
                let stuck = self
                    .steps
                    .keys()
                    .filter(|step| !done.contains(*step))
                    .map(ToString::to_string)
                    .collect();
                return Err(GraphError::Cycle(stuck));
            };
            done.insert(next);
            order.push(next);
        }
        Ok(order)
    }
}

/// Run every step in dependency order, stopping at the first failure.
pub fn run_sequential<K, E, F>(graph: &TaskGraph<K>, mut run: F) -> Result<(), E>
where
    K: Copy + Eq + Hash + Display,
    E: From<GraphError>,
    F: FnMut(K) -> Result<(), E>,
{
    for step in graph.order()? {
        log::debug!("step '{}' started", step);
        run(step)?;
        log::debug!("step '{}' finished", step);
    }
    Ok(())
}

/// Run steps concurrently as soon as their dependencies are done.
///
/// After a failure no further step is started; steps already running are
/// awaited and the first failure is returned.
pub async fn run_concurrent<K, E, F, Fut>(graph: &TaskGraph<K>, mut run: F) -> Result<(), E>
where
    K: Copy + Eq + Hash + Display,
    E: From<GraphError>,
    F: FnMut(K) -> Fut,
    Fut: Future<Output = Result<(), E>>,
{
    graph.order()?;

    let mut started = HashSet::new();
    let mut done = HashSet::new();
    let mut running = FuturesUnordered::new();
    let mut failure = None;

    loop {
        if failure.is_none() {
            for step in graph.ready(&done, &started) {
                log::debug!("step '{}' started", step);
                started.insert(step);
                running.push(run(step).map(move |outcome| (step, outcome)));
            }
        }

        match running.next().await {
            Some((step, Ok(()))) => {
                log::debug!("step '{}' finished", step);
                done.insert(step);
            }
            Some((step, Err(e))) => {
                log::debug!("step '{}' failed", step);
                failure.get_or_insert(e);
            }
            None => break,
        }
    }

    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
