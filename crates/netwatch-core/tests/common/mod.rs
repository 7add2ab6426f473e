//! Test doubles and common utilities for connectivity contract tests
//!
//! These doubles stand in for real probes: they answer from a script,
//! count their calls, and can be made slow or broken on demand.

#![allow(dead_code)]

use netwatch_core::events::Receiver;
use netwatch_core::{
    AccessValidator, CancellationToken, ConnectivityEvent, ConnectivityService, ProbeKind,
    ValidatorConfig, ValidatorRegistry,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What a scripted validator does once its script runs out
#[derive(Debug, Clone, Copy)]
pub enum Fallback {
    /// Keep answering this value
    Answer(bool),
    /// Panic inside the probe task
    Panic,
}

/// A validator that answers from a script and counts calls
#[derive(Clone)]
pub struct ScriptedValidator {
    kind: ProbeKind,
    script: Arc<Mutex<VecDeque<bool>>>,
    fallback: Fallback,
    delay: Duration,
    calls: Arc<AtomicUsize>,
    finished: Arc<AtomicUsize>,
}

impl ScriptedValidator {
    /// Always answer `result`
    pub fn fixed(kind: ProbeKind, result: bool) -> Self {
        Self::scripted(kind, &[], Fallback::Answer(result))
    }

    /// Answer from `script`, then fall back
    pub fn scripted(kind: ProbeKind, script: &[bool], fallback: Fallback) -> Self {
        Self {
            kind,
            script: Arc::new(Mutex::new(script.iter().copied().collect())),
            fallback,
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
            finished: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Take `delay` to answer, honouring cancellation meanwhile
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of times validate_access() was called
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of calls that ran to completion (not cancelled or aborted)
    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl AccessValidator for ScriptedValidator {
    async fn validate_access(&self, cancel: &CancellationToken) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => return false,
                _ = tokio::time::sleep(self.delay) => {}
            }
        }

        self.finished.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match (next, self.fallback) {
            (Some(answer), _) => answer,
            (None, Fallback::Answer(answer)) => answer,
            (None, Fallback::Panic) => panic!("{} probe exploded", self.kind),
        }
    }

    fn kind(&self) -> ProbeKind {
        self.kind
    }
}

/// Validators registered with a test service
pub struct Probes {
    pub link: ScriptedValidator,
    pub http: ScriptedValidator,
    pub ping: ScriptedValidator,
}

impl Probes {
    /// Fixed answers for every probe
    pub fn fixed(link: bool, http: bool, ping: bool) -> Self {
        Self {
            link: ScriptedValidator::fixed(ProbeKind::Link, link),
            http: ScriptedValidator::fixed(ProbeKind::Http, http),
            ping: ScriptedValidator::fixed(ProbeKind::Ping, ping),
        }
    }

    /// Registry sharing counters with these probes
    pub fn registry(&self) -> ValidatorRegistry {
        let registry = ValidatorRegistry::new();
        registry.register(Arc::new(self.link.clone()));
        registry.register(Arc::new(self.http.clone()));
        registry.register(Arc::new(self.ping.clone()));
        registry
    }
}

/// Configuration used by the scenarios: base 100ms, max 5000ms, x1.5
pub fn test_config() -> ValidatorConfig {
    ValidatorConfig {
        base_retry_interval_ms: 100,
        max_retry_interval_ms: 5000,
        backoff_multiplier: 1.5,
        event_channel_capacity: 1024,
        ..Default::default()
    }
}

/// Build a service over `probes` with [`test_config`]
pub fn service_with(probes: &Probes) -> ConnectivityService {
    ConnectivityService::new(test_config(), probes.registry())
        .expect("service construction succeeds")
}

/// Collect every event currently buffered in `receiver`
pub fn drain(receiver: &mut Receiver<ConnectivityEvent>) -> Vec<ConnectivityEvent> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}

/// Count events matching `predicate`
pub fn count(events: &[ConnectivityEvent], predicate: impl Fn(&ConnectivityEvent) -> bool) -> usize {
    events.iter().filter(|event| predicate(event)).count()
}
