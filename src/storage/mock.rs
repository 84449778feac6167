// src/storage/mock.rs
use ahash::AHashMap;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::domain::{RuleEntity, RuleKind};

use super::traits::{RuleProvider, RulePublisher};

/// In-process live rule source.
///
/// Holds the serialized rule set of each (kind, app) pair, the way a
/// config center would. Failures can be switched on to exercise the
/// controller's error paths.
#[derive(Debug, Default)]
pub struct MemoryRuleSource {
    payloads: Mutex<AHashMap<(RuleKind, String), String>>,
    fail_fetch: AtomicBool,
    fail_publish: AtomicBool,
    publish_count: AtomicU64,
}

impl MemoryRuleSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent fetches fail (for testing).
    pub fn set_fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent publishes fail (for testing).
    pub fn set_fail_publish(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::SeqCst);
    }

    /// Number of successful publishes across all kinds.
    pub fn publish_count(&self) -> u64 {
        self.publish_count.load(Ordering::SeqCst)
    }

    /// Raw payload stored for a kind and app.
    pub fn payload(&self, kind: RuleKind, app: &str) -> Option<String> {
        self.payloads.lock().get(&(kind, app.to_string())).cloned()
    }

    /// Write rules directly, bypassing the dashboard (for testing).
    pub fn put_rules<T: RuleEntity>(&self, app: &str, rules: &[T]) -> anyhow::Result<()> {
        let payload = serde_json::to_string(rules)?;
        self.payloads
            .lock()
            .insert((T::KIND, app.to_string()), payload);
        Ok(())
    }
}

#[async_trait]
impl<T: RuleEntity> RuleProvider<T> for MemoryRuleSource {
    async fn get_rules(&self, app: &str) -> anyhow::Result<Vec<T>> {
        if self.fail_fetch.load(Ordering::SeqCst) {
            anyhow::bail!("rule source unavailable");
        }
        match self.payload(T::KIND, app) {
            Some(payload) => Ok(serde_json::from_str(&payload)?),
            None => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl<T: RuleEntity> RulePublisher<T> for MemoryRuleSource {
    async fn publish(&self, app: &str, rules: &[T]) -> anyhow::Result<()> {
        if self.fail_publish.load(Ordering::SeqCst) {
            anyhow::bail!("rule source rejected publish");
        }
        self.put_rules(app, rules)?;
        self.publish_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
