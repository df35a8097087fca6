// src/registry/memory.rs
use super::{BackendRecord, BackendRegistry, RegistryError};
use crate::config::SeedBackend;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone)]
struct Slot {
    seq: u64,
    record: BackendRecord,
}

/// In-process registry. Iteration order is first-insertion order; replacing
/// a record keeps its original position.
#[derive(Clone, Default)]
pub struct MemoryRegistry {
    records: Arc<DashMap<String, Slot>>,
    next_seq: Arc<AtomicU64>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seeds(seeds: &[SeedBackend]) -> Self {
        let registry = Self::new();
        for seed in seeds {
            registry.upsert(BackendRecord::new(seed.url.clone(), seed.is_leader));
        }
        tracing::info!("Seeded registry with {} backends", registry.len());
        registry
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn upsert(&self, record: BackendRecord) {
        match self.records.entry(record.url.clone()) {
            Entry::Occupied(mut slot) => {
                slot.get_mut().record = record;
            }
            Entry::Vacant(slot) => {
                let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
                slot.insert(Slot { seq, record });
            }
        }
    }
}

#[async_trait]
impl BackendRegistry for MemoryRegistry {
    async fn get_all(&self) -> Result<Vec<BackendRecord>, RegistryError> {
        let mut slots: Vec<Slot> = self
            .records
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        slots.sort_by_key(|slot| slot.seq);
        Ok(slots.into_iter().map(|slot| slot.record).collect())
    }

    async fn get(&self, url: &str) -> Result<Option<BackendRecord>, RegistryError> {
        Ok(self.records.get(url).map(|slot| slot.record.clone()))
    }

    async fn put(&self, record: BackendRecord) -> Result<(), RegistryError> {
        self.upsert(record);
        Ok(())
    }

    async fn update_health(
        &self,
        polled: &BackendRecord,
        height: Option<u64>,
        is_healthy: bool,
    ) -> Result<Option<BackendRecord>, RegistryError> {
        Ok(self.records.get_mut(&polled.url).and_then(|mut slot| {
            if slot.record.added_at != polled.added_at {
                return None;
            }
            slot.record.height = height;
            slot.record.is_healthy = is_healthy;
            Some(slot.record.clone())
        }))
    }

    async fn delete(&self, url: &str) -> Result<bool, RegistryError> {
        let removed = self.records.remove(url).is_some();
        if removed {
            tracing::info!("Removed backend: {}", url);
        }
        Ok(removed)
    }
}
