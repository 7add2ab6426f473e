//! Plugin-based validator registry
//!
//! The registry holds one validator per probe kind, so probe crates can be
//! plugged in at startup instead of being hard-wired into the orchestrator.
//!
//! ## Registration
//!
//! Probe crates expose a `register` function:
//!
//! ```rust,ignore
//! # use netwatch_core::{ValidatorRegistry, ValidatorConfig};
//! # use std::sync::Arc;
//! let registry = ValidatorRegistry::new();
//! let config = Arc::new(ValidatorConfig::default());
//!
//! netwatch_link::register(&registry, &config);
//! netwatch_probe_http::register(&registry, &config)?;
//! netwatch_probe_ping::register(&registry, &config);
//! ```

use crate::error::{Error, Result};
use crate::traits::AccessValidator;
use crate::validation::ProbeKind;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Registry of validators keyed by probe kind
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes. Validators are handed out as `Arc`s so a
/// probe task can outlive the lookup.
#[derive(Default)]
pub struct ValidatorRegistry {
    validators: RwLock<HashMap<ProbeKind, Arc<dyn AccessValidator>>>,
}

impl ValidatorRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a validator under its own [`AccessValidator::kind`]
    ///
    /// A later registration for the same kind replaces the earlier one.
    pub fn register(&self, validator: Arc<dyn AccessValidator>) {
        let kind = validator.kind();
        let mut validators = self
            .validators
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if validators.insert(kind, validator).is_some() {
            tracing::debug!(%kind, "replaced registered validator");
        }
    }

    /// Look up the validator for `kind`
    ///
    /// # Returns
    ///
    /// - `Ok(Arc<dyn AccessValidator>)`: The registered validator
    /// - `Err(Error::MissingValidator)`: If nothing is registered for `kind`
    pub fn get(&self, kind: ProbeKind) -> Result<Arc<dyn AccessValidator>> {
        self.validators
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .cloned()
            .ok_or(Error::MissingValidator(kind))
    }

    /// Check if a probe kind is registered
    pub fn has(&self, kind: ProbeKind) -> bool {
        self.validators
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&kind)
    }

    /// List registered probe kinds, in evaluation order
    pub fn kinds(&self) -> Vec<ProbeKind> {
        let validators = self.validators.read().unwrap_or_else(PoisonError::into_inner);
        let mut kinds: Vec<ProbeKind> = validators.keys().copied().collect();
        kinds.sort();
        kinds
    }
}

impl std::fmt::Debug for ValidatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatorRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
