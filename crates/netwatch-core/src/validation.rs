//! Probe selection for a connectivity check
//!
//! A [`ValidationType`] is a set of [`ProbeKind`]s. The combination rule is
//! fixed by the orchestrator: `Link` is a fast-fail gate evaluated first, and
//! every selected network probe (`Http`, `Ping`) must pass.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One kind of connectivity probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeKind {
    /// Local link reachability, no network I/O
    Link,
    /// HTTP reachability of the configured URLs
    Http,
    /// ICMP reachability of the configured hosts
    Ping,
}

impl ProbeKind {
    /// All probe kinds, in evaluation order
    pub const ALL: [ProbeKind; 3] = [ProbeKind::Link, ProbeKind::Http, ProbeKind::Ping];

    /// Lowercase name used in logs and configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeKind::Link => "link",
            ProbeKind::Http => "http",
            ProbeKind::Ping => "ping",
        }
    }
}

impl fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProbeKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "link" => Ok(ProbeKind::Link),
            "http" => Ok(ProbeKind::Http),
            "ping" => Ok(ProbeKind::Ping),
            other => Err(Error::config(format!("Unknown probe kind: {}", other))),
        }
    }
}

/// Set of probes that participate in a check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ValidationType {
    link: bool,
    http: bool,
    ping: bool,
}

impl ValidationType {
    /// No probes selected
    pub const NONE: Self = Self {
        link: false,
        http: false,
        ping: false,
    };

    /// Link check only
    pub const DEFAULT: Self = Self {
        link: true,
        http: false,
        ping: false,
    };

    /// Link, HTTP and ping
    pub const ALL: Self = Self {
        link: true,
        http: true,
        ping: true,
    };

    /// Link and HTTP
    pub const WEB_CHECK: Self = Self {
        link: true,
        http: true,
        ping: false,
    };

    /// Link and ping
    pub const PING_CHECK: Self = Self {
        link: true,
        http: false,
        ping: true,
    };

    /// Build a set from individual kinds
    pub fn from_kinds(kinds: &[ProbeKind]) -> Self {
        kinds.iter().fold(Self::NONE, |set, kind| set.with(*kind))
    }

    /// Return a copy of this set with `kind` added
    pub const fn with(self, kind: ProbeKind) -> Self {
        match kind {
            ProbeKind::Link => Self { link: true, ..self },
            ProbeKind::Http => Self { http: true, ..self },
            ProbeKind::Ping => Self { ping: true, ..self },
        }
    }

    /// Whether `kind` participates in the check
    pub const fn contains(&self, kind: ProbeKind) -> bool {
        match kind {
            ProbeKind::Link => self.link,
            ProbeKind::Http => self.http,
            ProbeKind::Ping => self.ping,
        }
    }

    /// Selected kinds in evaluation order
    pub fn kinds(&self) -> impl Iterator<Item = ProbeKind> + '_ {
        ProbeKind::ALL.into_iter().filter(|kind| self.contains(*kind))
    }

    /// Whether no probe is selected
    pub fn is_empty(&self) -> bool {
        *self == Self::NONE
    }
}

impl fmt::Display for ValidationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        let names: Vec<&str> = self.kinds().map(|kind| kind.as_str()).collect();
        f.write_str(&names.join(","))
    }
}

impl FromStr for ValidationType {
    type Err = Error;

    /// Parse a preset name (`default`, `all`, `web`, `ping`) or a comma
    /// separated list of probe kinds (`link,http`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" => Ok(Self::DEFAULT),
            "all" => Ok(Self::ALL),
            "web" | "web_check" => Ok(Self::WEB_CHECK),
            "ping_check" => Ok(Self::PING_CHECK),
            "none" => Ok(Self::NONE),
            list => list
                .split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .try_fold(Self::NONE, |set, part| Ok(set.with(part.parse()?))),
        }
    }
}
