//! Per-resource-kind subscription cache.
//!
//! Each resource kind remembers the subscription it last resolved, keyed
//! by the label the UI selects with. A hit short-circuits the session
//! list entirely; a label change re-resolves; an unknown label is an
//! error that leaves the cached entry untouched.

use std::collections::HashMap;

use crate::types::{AzureError, AzureResult, ResourceKind, SubscriptionItem};

#[derive(Default)]
pub struct SubscriptionCache {
    slots: HashMap<ResourceKind, SubscriptionItem>,
}

impl SubscriptionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves the subscription for `kind` and `label`. Cached entries
    /// with a matching label are returned as-is; otherwise the session
    /// list is consulted and the slot replaced on success.
    pub fn ensure(
        &mut self,
        kind: ResourceKind,
        label: &str,
        session: &[SubscriptionItem],
    ) -> AzureResult<SubscriptionItem> {
        if let Some(cached) = self.slots.get(&kind) {
            if cached.label == label {
                return Ok(cached.clone());
            }
        }
        match session.iter().find(|s| s.label == label) {
            Some(found) => {
                self.slots.insert(kind, found.clone());
                Ok(found.clone())
            }
            None => Err(AzureError::subscription_not_found(label)),
        }
    }

    pub fn get(&self, kind: ResourceKind) -> Option<&SubscriptionItem> {
        self.slots.get(&kind)
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
