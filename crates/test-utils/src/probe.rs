use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::Notify;
use jobdag::JobSpec;

/// Something a probed job body did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeEvent {
    Started(String),
    Finished(String),
}

/// Shared recorder handed to job bodies in tests.
///
/// Every body built through a probe logs when it starts and finishes and how
/// many times it ran, so tests can assert on execution order and on "ran at
/// most once" without inspecting scheduler internals.
#[derive(Debug, Clone, Default)]
pub struct JobProbe {
    events: Arc<Mutex<Vec<(ProbeEvent, Instant)>>>,
    runs: Arc<Mutex<HashMap<String, usize>>>,
}

impl JobProbe {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, event: ProbeEvent) {
        if let ProbeEvent::Started(name) = &event {
            *self.runs.lock().unwrap().entry(name.clone()).or_default() += 1;
        }
        self.events.lock().unwrap().push((event, Instant::now()));
    }

    /// A body that succeeds immediately.
    pub fn job(&self, name: &str) -> JobSpec {
        self.sleeping_job(name, Duration::ZERO)
    }

    /// A body that sleeps for `duration`, then succeeds.
    pub fn sleeping_job(&self, name: &str, duration: Duration) -> JobSpec {
        let probe = self.clone();
        let name = name.to_string();
        JobSpec::new(move || async move {
            probe.record(ProbeEvent::Started(name.clone()));
            if !duration.is_zero() {
                tokio::time::sleep(duration).await;
            }
            probe.record(ProbeEvent::Finished(name));
            Ok(())
        })
    }

    /// A body that returns an error.
    pub fn failing_job(&self, name: &str, message: &str) -> JobSpec {
        let probe = self.clone();
        let name = name.to_string();
        let message = message.to_string();
        JobSpec::new(move || async move {
            probe.record(ProbeEvent::Started(name.clone()));
            probe.record(ProbeEvent::Finished(name));
            Err(anyhow::anyhow!(message))
        })
    }

    /// A body that blocks until `gate` is notified.
    pub fn gated_job(&self, name: &str, gate: Arc<Notify>) -> JobSpec {
        let probe = self.clone();
        let name = name.to_string();
        JobSpec::new(move || async move {
            probe.record(ProbeEvent::Started(name.clone()));
            gate.notified().await;
            probe.record(ProbeEvent::Finished(name));
            Ok(())
        })
    }

    /// A body that never finishes on its own.
    pub fn stuck_job(&self, name: &str) -> JobSpec {
        let probe = self.clone();
        let name = name.to_string();
        JobSpec::new(move || async move {
            probe.record(ProbeEvent::Started(name));
            std::future::pending::<()>().await;
            Ok(())
        })
    }

    pub fn events(&self) -> Vec<ProbeEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(event, _)| event.clone())
            .collect()
    }

    /// Names of started jobs, in start order.
    pub fn started(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ProbeEvent::Started(name) => Some(name),
                ProbeEvent::Finished(_) => None,
            })
            .collect()
    }

    /// Names of finished jobs, in finish order.
    pub fn finished(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ProbeEvent::Finished(name) => Some(name),
                ProbeEvent::Started(_) => None,
            })
            .collect()
    }

    /// Position of an event in the log, if it happened.
    pub fn position(&self, event: &ProbeEvent) -> Option<usize> {
        self.events().iter().position(|e| e == event)
    }

    pub fn run_count(&self, name: &str) -> usize {
        self.runs.lock().unwrap().get(name).copied().unwrap_or(0)
    }
}
