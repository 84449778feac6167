// src/storage/repository.rs
use ahash::{AHashMap, AHashSet};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::domain::RuleEntity;

use super::traits::RuleRepository;

type MachineKey = (String, String, u16);

#[derive(Debug)]
struct Records<T> {
    all: AHashMap<i64, T>,
    by_app: AHashMap<String, AHashSet<i64>>,
    by_machine: AHashMap<MachineKey, AHashSet<i64>>,
}

impl<T> Default for Records<T> {
    fn default() -> Self {
        Records {
            all: AHashMap::new(),
            by_app: AHashMap::new(),
            by_machine: AHashMap::new(),
        }
    }
}

fn machine_key<T: RuleEntity>(entity: &T) -> Option<MachineKey> {
    let meta = entity.meta();
    match (&meta.ip, meta.port) {
        (Some(ip), Some(port)) => Some((meta.app_name().to_string(), ip.clone(), port)),
        _ => None,
    }
}

impl<T: RuleEntity> Records<T> {
    fn unindex(&mut self, id: i64, entity: &T) {
        if let Some(ids) = self.by_app.get_mut(entity.app()) {
            ids.remove(&id);
            if ids.is_empty() {
                self.by_app.remove(entity.app());
            }
        }
        if let Some(key) = machine_key(entity) {
            if let Some(ids) = self.by_machine.get_mut(&key) {
                ids.remove(&id);
                if ids.is_empty() {
                    self.by_machine.remove(&key);
                }
            }
        }
    }

    fn insert(&mut self, id: i64, entity: T) {
        if let Some(previous) = self.all.remove(&id) {
            self.unindex(id, &previous);
        }
        self.by_app
            .entry(entity.app().to_string())
            .or_default()
            .insert(id);
        if let Some(key) = machine_key(&entity) {
            self.by_machine.entry(key).or_default().insert(id);
        }
        self.all.insert(id, entity);
    }

    fn remove(&mut self, id: i64) -> Option<T> {
        let entity = self.all.remove(&id)?;
        self.unindex(id, &entity);
        Some(entity)
    }

    fn collect(&self, ids: Option<&AHashSet<i64>>) -> Vec<T> {
        let mut rules: Vec<T> = ids
            .into_iter()
            .flatten()
            .filter_map(|id| self.all.get(id).cloned())
            .collect();
        rules.sort_by_key(|r| r.id());
        rules
    }
}

/// In-process rule repository with app and machine indexes.
///
/// Ids come from a counter that only moves forward; saving a rule that
/// already carries an id (e.g. one read back from the rule source) keeps
/// the id and pushes the counter past it.
#[derive(Debug)]
pub struct InMemoryRuleRepository<T> {
    records: RwLock<Records<T>>,
    next_id: AtomicI64,
}

impl<T: RuleEntity> InMemoryRuleRepository<T> {
    pub fn new() -> Self {
        InMemoryRuleRepository {
            records: RwLock::new(Records::default()),
            next_id: AtomicI64::new(0),
        }
    }

    /// Number of stored rules across all apps.
    pub fn len(&self) -> usize {
        self.records.read().all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn assign_id(&self, entity: &mut T) -> i64 {
        match entity.id() {
            Some(id) if id > 0 => {
                self.next_id.fetch_max(id, Ordering::SeqCst);
                id
            }
            _ => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
                entity.meta_mut().id = Some(id);
                id
            }
        }
    }
}

impl<T: RuleEntity> Default for InMemoryRuleRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: RuleEntity> RuleRepository<T> for InMemoryRuleRepository<T> {
    fn save(&self, mut entity: T) -> anyhow::Result<T> {
        if entity.meta().app_is_blank() {
            anyhow::bail!("cannot save a {} rule without an app", T::KIND);
        }
        let id = self.assign_id(&mut entity);
        self.records.write().insert(id, entity.clone());
        Ok(entity)
    }

    fn replace_app(&self, app: &str, entities: Vec<T>) -> anyhow::Result<Vec<T>> {
        let mut records = self.records.write();

        let stale: Vec<i64> = records
            .by_app
            .get(app)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default();
        for id in stale {
            records.remove(id);
        }

        let mut saved = Vec::with_capacity(entities.len());
        for mut entity in entities {
            if entity.app() != app {
                entity.meta_mut().app = Some(app.to_string());
            }
            // Ids still present belong to another app; never overwrite them.
            if entity.id().is_some_and(|id| records.all.contains_key(&id)) {
                entity.meta_mut().id = None;
            }
            let id = self.assign_id(&mut entity);
            records.insert(id, entity.clone());
            saved.push(entity);
        }
        Ok(saved)
    }

    fn find_by_id(&self, id: i64) -> anyhow::Result<Option<T>> {
        Ok(self.records.read().all.get(&id).cloned())
    }

    fn find_all_by_app(&self, app: &str) -> anyhow::Result<Vec<T>> {
        let records = self.records.read();
        Ok(records.collect(records.by_app.get(app)))
    }

    fn find_all_by_machine(&self, app: &str, ip: &str, port: u16) -> anyhow::Result<Vec<T>> {
        let records = self.records.read();
        let key = (app.to_string(), ip.to_string(), port);
        Ok(records.collect(records.by_machine.get(&key)))
    }

    fn delete(&self, id: i64) -> anyhow::Result<Option<T>> {
        Ok(self.records.write().remove(id))
    }
}
