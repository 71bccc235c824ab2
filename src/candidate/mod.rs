mod configuration;

use std::{fmt::Display, sync::Arc};

use ahash::AHashMap;
use log::info;
use parking_lot::RwLock;

use crate::error::{AdvisorError, AdvisorResult};

pub use self::configuration::Configuration;

pub type IndexId = usize;

/*
    The candidate pool hands out dense ordinal ids to candidate indexes in the order they are
    discovered. Ids are never reused and indexes are never removed, a Configuration only ever
    stores these ids. Taking a snapshot is on the hot path of every profiling round, so the
    pool keeps the latest snapshot around and rebuilds it on the (rare) write path instead.
 */

#[repr(u16)]
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum IndexKind {
    BTree = 0,
    Hash = 1,
}

#[derive(Clone, Debug, PartialEq)]
pub struct IndexDescriptor {
    pub table: String,
    pub columns: Vec<String>,
    pub kind: IndexKind,
    pub creation_cost: f64,
}

// External identity of a candidate. The creation cost is an estimate and not part of it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct IndexIdentity {
    table: String,
    columns: Vec<String>,
    kind: IndexKind,
}

impl IndexDescriptor {
    pub fn new(table: &str, columns: &[&str], kind: IndexKind, creation_cost: f64) -> IndexDescriptor {
        IndexDescriptor {
            table: table.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            kind,
            creation_cost,
        }
    }

    pub fn btree(table: &str, columns: &[&str], creation_cost: f64) -> IndexDescriptor {
        IndexDescriptor::new(table, columns, IndexKind::BTree, creation_cost)
    }

    fn identity(&self) -> IndexIdentity {
        IndexIdentity {
            table: self.table.clone(),
            columns: self.columns.clone(),
            kind: self.kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Index {
    pub id: IndexId,
    pub descriptor: IndexDescriptor,
}

impl Index {
    pub fn creation_cost(&self) -> f64 {
        self.descriptor.creation_cost
    }
}

impl Display for Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.descriptor.kind {
            IndexKind::BTree => "btree",
            IndexKind::Hash => "hash",
        };
        write!(f, "#{} {}:{}({})", self.id, kind, self.descriptor.table, self.descriptor.columns.join(", "))
    }
}

// Immutable view of the pool. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Snapshot {
    indexes: Arc<[Arc<Index>]>,
    capacity: usize,
    generation: u64,
}

impl Snapshot {
    // indexes must be ordered by id and every id must be below capacity
    pub fn new(indexes: Vec<Arc<Index>>, capacity: usize, generation: u64) -> Snapshot {
        debug_assert!(indexes.windows(2).all(|w| w[0].id < w[1].id));
        debug_assert!(indexes.iter().all(|i| i.id < capacity));
        Snapshot { indexes: indexes.into(), capacity, generation }
    }

    pub fn get(&self, id: IndexId) -> Option<&Arc<Index>> {
        self.indexes.binary_search_by_key(&id, |i| i.id).ok().map(|pos| &self.indexes[pos])
    }

    pub fn contains(&self, id: IndexId) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Index>> {
        self.indexes.iter()
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    // The configuration holding every index of the snapshot. Root of every IBG built from it.
    pub fn configuration(&self) -> Configuration {
        Configuration::from_ids(self.capacity, self.indexes.iter().map(|i| i.id))
    }

    // Like the full configuration but leaving out the given ids. This is how an index gets
    // retired from later rounds without destroying it.
    pub fn excluding(&self, retired: &[IndexId]) -> Snapshot {
        let indexes = self.indexes.iter().filter(|i| !retired.contains(&i.id)).cloned().collect();
        Snapshot::new(indexes, self.capacity, self.generation)
    }
}

struct PoolInner {
    indexes: Vec<Arc<Index>>,
    by_identity: AHashMap<IndexIdentity, IndexId>,
    latest: Snapshot,
}

pub struct CandidatePool {
    inner: RwLock<PoolInner>,
    max_candidates: usize,
}

impl CandidatePool {
    pub fn new(max_candidates: usize) -> CandidatePool {
        CandidatePool {
            inner: RwLock::new(PoolInner {
                indexes: Vec::new(),
                by_identity: AHashMap::new(),
                latest: Snapshot::new(Vec::new(), 0, 0),
            }),
            max_candidates,
        }
    }

    // Returns the already pooled index if one with the same identity exists.
    pub fn add_candidate(&self, descriptor: IndexDescriptor) -> AdvisorResult<Arc<Index>> {
        let identity = descriptor.identity();
        if let Some(index) = self.find(&descriptor) {
            return Ok(index);
        }
        let mut inner = self.inner.write();
        // Someone else might have added it while we didn't hold the lock
        if let Some(&id) = inner.by_identity.get(&identity) {
            return Ok(inner.indexes[id].clone());
        }
        if inner.indexes.len() >= self.max_candidates {
            return Err(AdvisorError::CapacityExceeded { what: "candidate pool", limit: self.max_candidates });
        }
        let id = inner.indexes.len();
        let index = Arc::new(Index { id, descriptor });
        inner.indexes.push(index.clone());
        inner.by_identity.insert(identity, id);
        let generation = inner.latest.generation() + 1;
        let latest = Snapshot::new(inner.indexes.clone(), inner.indexes.len(), generation);
        inner.latest = latest;
        info!("new candidate index {}", index);
        Ok(index)
    }

    pub fn find(&self, descriptor: &IndexDescriptor) -> Option<Arc<Index>> {
        let inner = self.inner.read();
        inner.by_identity.get(&descriptor.identity()).map(|&id| inner.indexes[id].clone())
    }

    pub fn get(&self, id: IndexId) -> Option<Arc<Index>> {
        self.inner.read().indexes.get(id).cloned()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.inner.read().latest.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Bumped once per newly added index
    pub fn generation(&self) -> u64 {
        self.inner.read().latest.generation()
    }
}
