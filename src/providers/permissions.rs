//! Permission table driven by configuration.
//!
//! The broker has no OS permission probe of its own, so it reports every
//! capability as granted except those listed in `denied_capabilities`.
//! Interactive requests for a denied capability are logged; there is no
//! prompt to show.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use super::PermissionProvider;
use crate::protocol::Capability;

/// Grants everything outside a fixed deny set.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredPermissions {
    denied: HashSet<Capability>,
}

impl ConfiguredPermissions {
    /// Table denying exactly `denied`.
    pub fn new(denied: impl IntoIterator<Item = Capability>) -> Self {
        Self {
            denied: denied.into_iter().collect(),
        }
    }
}

#[async_trait]
impl PermissionProvider for ConfiguredPermissions {
    async fn ensure(&self, caps: &[Capability], interactive: bool) -> HashMap<Capability, bool> {
        caps.iter()
            .map(|&cap| {
                let granted = !self.denied.contains(&cap);
                if !granted && interactive {
                    log::info!("[Permissions] {} is denied by configuration; not prompting", cap);
                }
                (cap, granted)
            })
            .collect()
    }
}
