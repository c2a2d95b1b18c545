//! Periodic validation, one tokio task per trust anchor

use crate::error::{ProcessFailure, ProcessResult};
use crate::model::ValidatedObject;
use crate::process::ValidationProcess;
use futures::future::join_all;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub struct ValidationScheduler {
    processes: BTreeMap<String, Arc<dyn ValidationProcess>>,
    interval: Duration,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ValidationScheduler {
    pub fn new(interval: Duration) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            processes: BTreeMap::new(),
            interval,
            shutdown,
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn add(&mut self, process: Arc<dyn ValidationProcess>) {
        self.processes.insert(process.trust_anchor().to_string(), process);
    }

    pub fn trust_anchors(&self) -> impl Iterator<Item = &str> {
        self.processes.keys().map(String::as_str)
    }

    /// Spawn the periodic task of every trust anchor. The first run of each
    /// starts immediately.
    pub fn start(&self) {
        let mut tasks = self.tasks.lock();
        for (name, process) in &self.processes {
            let process = process.clone();
            let mut shutdown = self.shutdown.subscribe();
            let interval = self.interval;
            let name = name.clone();

            tasks.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            // outcomes are logged and recorded by the process layers
                            let _ = process.run_process(false).await;
                        }
                        _ = shutdown.changed() => {
                            tracing::debug!(trust_anchor = %name, "Validation task stopping");
                            break;
                        }
                    }
                }
            }));
        }
        tracing::info!(trust_anchors = self.processes.len(), interval = ?self.interval, "Scheduler started");
    }

    /// Run one trust anchor now, outside its schedule
    pub async fn run_now(&self, name: &str, force_new_fetch: bool) -> ProcessResult<Vec<ValidatedObject>> {
        match self.processes.get(name) {
            Some(process) => process.run_process(force_new_fetch).await,
            None => Err(ProcessFailure::Failed(format!("Unknown trust anchor: {}", name))),
        }
    }

    /// Run every trust anchor once, concurrently
    pub async fn run_all(&self, force_new_fetch: bool) -> Vec<(String, ProcessResult<Vec<ValidatedObject>>)> {
        let runs = self.processes.iter().map(|(name, process)| async move {
            (name.clone(), process.run_process(force_new_fetch).await)
        });
        join_all(runs).await
    }

    /// Signal every task to stop and wait for them. A run in progress
    /// finishes first.
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(true);
        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        for task in join_all(tasks).await {
            if let Err(e) = task {
                tracing::error!(error = %e, "Validation task ended abnormally");
            }
        }
        tracing::info!("Scheduler stopped");
    }
}
