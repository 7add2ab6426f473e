//! Minimal embedding example for netwatch-core
//!
//! An application with its own notion of "the link is up" (here an
//! airplane-mode switch it controls) plugs in a custom link validator,
//! reuses the stock HTTP validator, and drives the three flows itself.

use netwatch_core::{
    AccessValidator, CancellationToken, ConnectivityEvent, ConnectivityService, ProbeKind,
    ValidationType, ValidatorConfig, ValidatorRegistry,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Link validator backed by an application-owned switch
struct AirplaneModeLink {
    airplane_mode: Arc<AtomicBool>,
}

#[async_trait::async_trait]
impl AccessValidator for AirplaneModeLink {
    async fn validate_access(&self, cancel: &CancellationToken) -> bool {
        !cancel.is_cancelled() && !self.airplane_mode.load(Ordering::SeqCst)
    }

    fn kind(&self) -> ProbeKind {
        ProbeKind::Link
    }
}

#[tokio::main]
async fn main() -> netwatch_core::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let config = Arc::new(ValidatorConfig {
        verbose_logging: true,
        ..Default::default()
    });

    let airplane_mode = Arc::new(AtomicBool::new(false));
    let registry = ValidatorRegistry::new();
    registry.register(Arc::new(AirplaneModeLink {
        airplane_mode: Arc::clone(&airplane_mode),
    }));
    netwatch_probe_http::register(&registry, &config)?;

    let service = ConnectivityService::new(config, registry)?;

    let _subscription = service.events().listen(|event| match event {
        ConnectivityEvent::StatusChanged { connected } => {
            println!("[event] connectivity is now {}", if connected { "up" } else { "down" })
        }
        other => println!("[event] {}", other.label()),
    });

    // 1. One-shot check of the link only
    let outcome = service.check_connection(ValidationType::DEFAULT).await?;
    println!("link check: {:?}", outcome);

    // 2. Bounded attempt with callbacks, link + HTTP
    let attempt = service.try_connect_with(
        Duration::from_secs(5),
        ValidationType::WEB_CHECK,
        || println!("callback: online"),
        || println!("callback: still offline after 5s"),
    );
    match attempt.await {
        Ok(result) => println!("connect attempt: {:?}", result?),
        Err(e) => println!("connect task failed: {}", e),
    }

    // 3. Tracking while the application flips airplane mode
    let handle = service.start_tracking(ValidationType::DEFAULT);
    println!("tracking session {}", handle.id());

    tokio::time::sleep(Duration::from_millis(500)).await;
    airplane_mode.store(true, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(500)).await;
    airplane_mode.store(false, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(1500)).await;

    service.stop_tracking();
    tokio::time::sleep(Duration::from_millis(50)).await;
    println!("connected after stop: {}", service.is_connected());

    service.shutdown();
    Ok(())
}
