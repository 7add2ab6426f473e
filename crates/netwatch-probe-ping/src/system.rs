//! Echo primitive backed by the platform `ping` command

use super::Pinger;
use netwatch_core::{Error, Result};

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

/// Runs `ping` once per call
///
/// The child is killed when the call is dropped, so the validator's
/// timeout and cancellation never leave stray processes behind.
#[derive(Debug, Clone)]
pub struct SystemPinger {
    program: String,
}

impl SystemPinger {
    pub fn new() -> Self {
        Self {
            program: "ping".to_string(),
        }
    }

    /// Use another executable with `ping`-compatible arguments and output
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for SystemPinger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(windows)]
const COUNT_FLAG: &str = "-n";

#[cfg(not(windows))]
const COUNT_FLAG: &str = "-c";

#[async_trait::async_trait]
impl Pinger for SystemPinger {
    async fn ping(&self, host: &str) -> Result<Duration> {
        let output = Command::new(&self.program)
            .args([COUNT_FLAG, "1", host])
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::ping(format!("Failed to run {}: {}", self.program, e)))?;

        if !output.status.success() {
            return Err(Error::ping(format!("No reply from {} ({})", host, output.status)));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_rtt(&stdout)
            .ok_or_else(|| Error::ping(format!("No round-trip time in reply from {}", host)))
    }
}

/// Extract the round-trip time from `ping` output
///
/// Understands `time=12.3 ms` (Linux, BSD, macOS), `time=12ms` and
/// `time<1ms` (Windows). An upper bound is reported as its bound.
pub fn parse_rtt(output: &str) -> Option<Duration> {
    output.lines().find_map(|line| {
        let start = line.find("time=").or_else(|| line.find("time<"))? + "time=".len();
        let value: String = line[start..]
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        let ms: f64 = value.parse().ok()?;
        (ms >= 0.0).then(|| Duration::from_micros((ms * 1000.0).round() as u64))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_linux_reply() {
        let output = "PING 8.8.8.8 (8.8.8.8) 56(84) bytes of data.\n\
                      64 bytes from 8.8.8.8: icmp_seq=1 ttl=117 time=12.3 ms\n\
                      \n\
                      --- 8.8.8.8 ping statistics ---\n\
                      1 packets transmitted, 1 received, 0% packet loss, time 0ms\n\
                      rtt min/avg/max/mdev = 12.3/12.3/12.3/0.000 ms\n";

        assert_eq!(parse_rtt(output), Some(Duration::from_micros(12_300)));
    }

    #[test]
    fn test_parse_windows_reply() {
        let output = "Pinging 8.8.8.8 with 32 bytes of data:\r\n\
                      Reply from 8.8.8.8: bytes=32 time=14ms TTL=117\r\n";
        assert_eq!(parse_rtt(output), Some(Duration::from_millis(14)));

        let output = "Reply from 192.168.1.1: bytes=32 time<1ms TTL=64\r\n";
        assert_eq!(parse_rtt(output), Some(Duration::from_millis(1)));
    }

    #[test]
    fn test_parse_without_reply() {
        let output = "PING 10.255.255.1 (10.255.255.1) 56(84) bytes of data.\n\
                      \n\
                      --- 10.255.255.1 ping statistics ---\n\
                      1 packets transmitted, 0 received, 100% packet loss, time 0ms\n";
        assert_eq!(parse_rtt(output), None);
        assert_eq!(parse_rtt("Request timed out.\r\n"), None);
    }

    #[tokio::test]
    async fn test_missing_program_is_an_error() {
        let pinger = SystemPinger::with_program("netwatch-no-such-ping-binary");
        let result = pinger.ping("127.0.0.1").await;
        assert!(matches!(result, Err(Error::Ping(_))));
    }
}
