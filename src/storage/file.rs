// src/storage/file.rs
use anyhow::Context;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::fs;
use tokio::time::timeout;
use tracing::debug;

use crate::domain::{RuleEntity, RuleKind};

use super::traits::{RuleProvider, RulePublisher};

/// Suffix source for temp files; each write gets its own.
static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Live rule source backed by JSON files.
///
/// Layout is `{root}/{app}/{kind}.json`, each file holding the full rule
/// array of one kind for one app. Clients watching the directory pick up
/// changes; a missing file means the app has no rules of that kind.
#[derive(Debug, Clone)]
pub struct FileRuleSource {
    root: PathBuf,
    timeout: Duration,
}

impl FileRuleSource {
    pub fn new(root: impl Into<PathBuf>, timeout: Duration) -> Self {
        FileRuleSource {
            root: root.into(),
            timeout,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the rule file for a kind and app.
    pub fn rule_path(&self, kind: RuleKind, app: &str) -> anyhow::Result<PathBuf> {
        let valid = !app.is_empty()
            && app != "."
            && app != ".."
            && !app.contains(['/', '\\'])
            && !app.contains('\0');
        if !valid {
            anyhow::bail!("invalid app name for file rule source: {app:?}");
        }
        Ok(self.root.join(app).join(format!("{}.json", kind.as_str())))
    }

    async fn read(&self, path: &Path) -> anyhow::Result<Option<String>> {
        match fs::read_to_string(path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
        }
    }

    async fn write(&self, path: &Path, payload: String) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        // Write then rename so readers never observe a partial file.
        // Concurrent writers of one file must not share a temp path.
        let tmp = temp_path(path);
        if let Err(e) = fs::write(&tmp, payload).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e).with_context(|| format!("failed to write {}", tmp.display()));
        }
        if let Err(e) = fs::rename(&tmp, path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e)
                .with_context(|| format!("failed to move {} into place", tmp.display()));
        }
        Ok(())
    }
}

/// Unique sibling of `path`, e.g. `.flow.json.4242.17.tmp`.
fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
    path.with_file_name(format!(".{}.{}.{}.tmp", name, std::process::id(), seq))
}

#[async_trait]
impl<T: RuleEntity> RuleProvider<T> for FileRuleSource {
    async fn get_rules(&self, app: &str) -> anyhow::Result<Vec<T>> {
        let path = self.rule_path(T::KIND, app)?;
        let content = timeout(self.timeout, self.read(&path))
            .await
            .with_context(|| format!("timed out reading {}", path.display()))??;

        let Some(content) = content else {
            return Ok(Vec::new());
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        let rules: Vec<T> = serde_json::from_str(&content)
            .with_context(|| format!("invalid rule file {}", path.display()))?;
        debug!(kind = T::KIND.as_str(), app, count = rules.len(), "Read rules from file source");
        Ok(rules)
    }
}

#[async_trait]
impl<T: RuleEntity> RulePublisher<T> for FileRuleSource {
    async fn publish(&self, app: &str, rules: &[T]) -> anyhow::Result<()> {
        let path = self.rule_path(T::KIND, app)?;
        let payload = serde_json::to_string_pretty(rules)?;

        timeout(self.timeout, self.write(&path, payload))
            .await
            .with_context(|| format!("timed out writing {}", path.display()))??;

        debug!(kind = T::KIND.as_str(), app, count = rules.len(), "Wrote rules to file source");
        Ok(())
    }
}
