// src/storage/traits.rs
use async_trait::async_trait;

use crate::domain::RuleEntity;

/// Local keyed store of rules of one kind.
///
/// Each call is atomic for the records it touches; there is no
/// multi-call transaction.
pub trait RuleRepository<T: RuleEntity>: Send + Sync {
    /// Save a rule, assigning an id if it has none. Returns the stored copy.
    fn save(&self, entity: T) -> anyhow::Result<T>;

    /// Save several rules in one pass.
    fn save_all(&self, entities: Vec<T>) -> anyhow::Result<Vec<T>> {
        entities.into_iter().map(|e| self.save(e)).collect()
    }

    /// Replace every local rule of `app` with `entities`.
    fn replace_app(&self, app: &str, entities: Vec<T>) -> anyhow::Result<Vec<T>>;

    fn find_by_id(&self, id: i64) -> anyhow::Result<Option<T>>;

    fn find_all_by_app(&self, app: &str) -> anyhow::Result<Vec<T>>;

    fn find_all_by_machine(&self, app: &str, ip: &str, port: u16) -> anyhow::Result<Vec<T>>;

    /// Remove a rule, returning it if it existed.
    fn delete(&self, id: i64) -> anyhow::Result<Option<T>>;
}

/// Reads the authoritative rule set of an app from the live rule source.
#[async_trait]
pub trait RuleProvider<T: RuleEntity>: Send + Sync {
    async fn get_rules(&self, app: &str) -> anyhow::Result<Vec<T>>;
}

/// Pushes the full rule set of an app to the live rule source.
#[async_trait]
pub trait RulePublisher<T: RuleEntity>: Send + Sync {
    async fn publish(&self, app: &str, rules: &[T]) -> anyhow::Result<()>;
}
