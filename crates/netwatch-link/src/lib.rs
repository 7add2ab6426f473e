// # Link Validator
//
// This crate provides the link-level reachability probe for netwatch.
//
// ## Purpose
//
// The link check is the cheap gate evaluated before any network I/O:
// if no interface can carry traffic, HTTP and ping probes are skipped.
//
// ## Strategy
//
// 1. On Linux, read `/sys/class/net`: the link is reachable when some
//    non-loopback interface reports operstate `up`, or `unknown` with
//    carrier present (tun/ppp devices report `unknown`).
// 2. When sysfs is unavailable (other platforms, minimal containers), fall
//    back to a route probe: `connect()` an unbound UDP socket to a public
//    address. No datagram is sent; the kernel only resolves a route.
//
// Neither strategy sends packets, and the sysfs reads run on the blocking
// pool so the calling task never waits on the filesystem.

use netwatch_core::config::ValidatorConfig;
use netwatch_core::traits::AccessValidator;
use netwatch_core::{CancellationToken, ProbeKind, ValidatorRegistry};

use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::net::UdpSocket;
use tracing::{debug, trace};

/// Default sysfs directory listing network interfaces
const SYSFS_NET: &str = "/sys/class/net";

/// ARPHRD_LOOPBACK as reported in `/sys/class/net/<if>/type`
const ARPHRD_LOOPBACK: &str = "772";

/// Addresses used by the route probe (IPv4 first)
const ROUTE_PROBE_TARGETS: &[&str] = &["8.8.8.8:53", "[2001:4860:4860::8888]:53"];

/// Link-level reachability validator
pub struct LinkValidator {
    /// Directory with one subdirectory per interface
    sysfs_root: Option<PathBuf>,

    /// Whether to fall back to the route probe
    route_probe: bool,

    verbose: bool,
}

impl LinkValidator {
    /// Create a validator using the platform defaults
    pub fn new(config: &ValidatorConfig) -> Self {
        Self {
            sysfs_root: cfg!(target_os = "linux").then(|| PathBuf::from(SYSFS_NET)),
            route_probe: true,
            verbose: config.verbose_logging,
        }
    }

    /// Read interface state from `root` instead of `/sys/class/net`
    pub fn with_sysfs_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.sysfs_root = Some(root.into());
        self
    }

    /// Disable the UDP route fallback
    pub fn without_route_probe(mut self) -> Self {
        self.route_probe = false;
        self
    }

    /// Evaluate the link once
    async fn probe(&self) -> bool {
        if let Some(root) = &self.sysfs_root {
            match scan_sysfs(root.clone()).await {
                Ok(up) => {
                    if self.verbose {
                        debug!(root = %root.display(), up, "link state from sysfs");
                    }
                    return up;
                }
                Err(e) => {
                    debug!(root = %root.display(), error = %e, "sysfs unavailable, using route probe");
                }
            }
        }

        if !self.route_probe {
            return false;
        }

        let routed = route_available().await;
        if self.verbose {
            debug!(routed, "link state from route probe");
        }
        routed
    }
}

#[async_trait::async_trait]
impl AccessValidator for LinkValidator {
    async fn validate_access(&self, cancel: &CancellationToken) -> bool {
        if cancel.is_cancelled() {
            return false;
        }
        self.probe().await
    }

    fn kind(&self) -> ProbeKind {
        ProbeKind::Link
    }
}

/// Run the sysfs scan on the blocking pool
async fn scan_sysfs(root: PathBuf) -> io::Result<bool> {
    tokio::task::spawn_blocking(move || interfaces_up(&root))
        .await
        .map_err(io::Error::other)?
}

/// Whether any non-loopback interface under `root` can carry traffic
fn interfaces_up(root: &Path) -> io::Result<bool> {
    for entry in std::fs::read_dir(root)? {
        let path = entry?.path();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if is_loopback(&path, &name) {
            continue;
        }

        let operstate = read_attr(&path, "operstate").unwrap_or_default();
        let up = match operstate.as_str() {
            "up" => true,
            "unknown" => read_attr(&path, "carrier").as_deref() == Some("1"),
            _ => false,
        };

        trace!(interface = %name, %operstate, up, "interface state");
        if up {
            return Ok(true);
        }
    }

    Ok(false)
}

fn is_loopback(path: &Path, name: &str) -> bool {
    name == "lo" || read_attr(path, "type").as_deref() == Some(ARPHRD_LOOPBACK)
}

/// Read a sysfs attribute; reading `carrier` on a down link fails, so errors are `None`
fn read_attr(interface: &Path, attr: &str) -> Option<String> {
    std::fs::read_to_string(interface.join(attr))
        .ok()
        .map(|s| s.trim().to_string())
}

/// Whether the kernel has a route to any probe target
async fn route_available() -> bool {
    for target in ROUTE_PROBE_TARGETS {
        let Ok(addr) = target.parse::<SocketAddr>() else {
            continue;
        };
        match route_to(addr).await {
            Ok(()) => return true,
            Err(e) => trace!(%addr, error = %e, "no route"),
        }
    }
    false
}

async fn route_to(addr: SocketAddr) -> io::Result<()> {
    let bind: SocketAddr = if addr.is_ipv4() {
        ([0, 0, 0, 0], 0).into()
    } else {
        ([0u16; 8], 0).into()
    };
    let socket = UdpSocket::bind(bind).await?;
    socket.connect(addr).await
}

/// Register the link validator with a registry
pub fn register(registry: &ValidatorRegistry, config: &Arc<ValidatorConfig>) {
    registry.register(Arc::new(LinkValidator::new(config)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn add_interface(root: &Path, name: &str, operstate: &str, carrier: Option<&str>, kind: &str) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("operstate"), format!("{}\n", operstate)).unwrap();
        fs::write(dir.join("type"), format!("{}\n", kind)).unwrap();
        if let Some(carrier) = carrier {
            fs::write(dir.join("carrier"), format!("{}\n", carrier)).unwrap();
        }
    }

    fn validator(root: &Path) -> LinkValidator {
        LinkValidator::new(&ValidatorConfig::default())
            .with_sysfs_root(root)
            .without_route_probe()
    }

    #[tokio::test]
    async fn test_up_interface_is_reachable() {
        let root = TempDir::new().unwrap();
        add_interface(root.path(), "lo", "unknown", Some("1"), ARPHRD_LOOPBACK);
        add_interface(root.path(), "eth0", "up", Some("1"), "1");

        let cancel = CancellationToken::new();
        assert!(validator(root.path()).validate_access(&cancel).await);
    }

    #[tokio::test]
    async fn test_loopback_only_is_unreachable() {
        let root = TempDir::new().unwrap();
        add_interface(root.path(), "lo", "unknown", Some("1"), ARPHRD_LOOPBACK);
        add_interface(root.path(), "eth0", "down", None, "1");

        let cancel = CancellationToken::new();
        assert!(!validator(root.path()).validate_access(&cancel).await);
    }

    #[tokio::test]
    async fn test_unknown_operstate_uses_carrier() {
        let root = TempDir::new().unwrap();
        add_interface(root.path(), "tun0", "unknown", Some("1"), "65534");
        let cancel = CancellationToken::new();
        assert!(validator(root.path()).validate_access(&cancel).await);

        let root = TempDir::new().unwrap();
        add_interface(root.path(), "tun0", "unknown", Some("0"), "65534");
        assert!(!validator(root.path()).validate_access(&cancel).await);
    }

    #[tokio::test]
    async fn test_cancelled_token_short_circuits() {
        let root = TempDir::new().unwrap();
        add_interface(root.path(), "eth0", "up", Some("1"), "1");

        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(!validator(root.path()).validate_access(&cancel).await);
    }

    #[tokio::test]
    async fn test_missing_sysfs_without_fallback_is_unreachable() {
        let root = TempDir::new().unwrap();
        let missing = root.path().join("absent");

        let cancel = CancellationToken::new();
        assert!(!validator(&missing).validate_access(&cancel).await);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_concurrent_scans_on_single_thread_runtime() {
        let root = TempDir::new().unwrap();
        for i in 0..32 {
            add_interface(root.path(), &format!("veth{}", i), "down", None, "1");
        }
        add_interface(root.path(), "eth0", "up", Some("1"), "1");

        let validator = validator(root.path());
        let cancel = CancellationToken::new();

        let (a, b) = tokio::join!(
            validator.validate_access(&cancel),
            validator.validate_access(&cancel)
        );
        assert!(a && b);
    }

    #[test]
    fn test_register() {
        let registry = ValidatorRegistry::new();
        register(&registry, &Arc::new(ValidatorConfig::default()));
        assert!(registry.has(ProbeKind::Link));
    }
}
