// 🏙 Region Reference Data - Records, store abstraction, ordering
//
// A region carries the per-region constants published for exactly one of the
// two formula variants. Records are loaded once at startup and treated as
// immutable for the lifetime of the process; the engine never mutates them.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

// ============================================================================
// REGION RECORD
// ============================================================================

/// Per-region constants, one set per formula variant.
///
/// Income deployments publish a single coefficient; area deployments publish
/// a market value per square meter plus a correction factor near 1.0.
/// All constants are strictly positive (enforced at import).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RegionConstants {
    Income {
        coefficient: f64,
    },
    Area {
        value_per_area: f64,
        correction_factor: f64,
    },
}

impl RegionConstants {
    pub fn is_income(&self) -> bool {
        matches!(self, RegionConstants::Income { .. })
    }

    pub fn is_area(&self) -> bool {
        matches!(self, RegionConstants::Area { .. })
    }
}

/// A region (city/subject) in the reference table.
///
/// `id` is the stable key and never changes; `name` is a display label used
/// only for output and ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionRecord {
    pub id: i64,
    pub name: String,
    #[serde(flatten)]
    pub constants: RegionConstants,
}

impl RegionRecord {
    pub fn income(id: i64, name: &str, coefficient: f64) -> Self {
        RegionRecord {
            id,
            name: name.to_string(),
            constants: RegionConstants::Income { coefficient },
        }
    }

    pub fn area(id: i64, name: &str, value_per_area: f64, correction_factor: f64) -> Self {
        RegionRecord {
            id,
            name: name.to_string(),
            constants: RegionConstants::Area {
                value_per_area,
                correction_factor,
            },
        }
    }
}

// ============================================================================
// DISPLAY-NAME ORDERING
// ============================================================================

/// Collation key for region names.
///
/// The reference data is Russian region names. Cyrillic codepoint order
/// matches the Russian alphabet except `ё`, which sorts after `я` instead of
/// next to `е` - so the key folds case and maps `ё` to `е`. The raw name is
/// kept as a tiebreak so the order stays deterministic.
fn collation_key(name: &str) -> String {
    name.chars()
        .flat_map(|c| c.to_lowercase())
        .map(|c| if c == 'ё' { 'е' } else { c })
        .collect()
}

/// Sort regions by display name, locale-aware per `collation_key`.
pub fn sort_regions(regions: &mut [RegionRecord]) {
    regions.sort_by(|a, b| {
        collation_key(&a.name)
            .cmp(&collation_key(&b.name))
            .then_with(|| a.name.cmp(&b.name))
    });
}

// ============================================================================
// STORE ABSTRACTION
// ============================================================================

/// Read-only view of the reference table.
///
/// The engine only ever needs these two operations; backing the store with
/// SQLite or an in-memory registry is a deployment detail.
pub trait RegionStore {
    /// Resolve a region by id. `Ok(None)` is the NotFound condition.
    fn lookup(&self, id: i64) -> Result<Option<RegionRecord>>;

    /// All regions, ordered by display name.
    fn list_all(&self) -> Result<Vec<RegionRecord>>;
}

// ============================================================================
// IN-MEMORY REGISTRY
// ============================================================================

/// In-memory region store.
///
/// Holds the full reference table in memory. Used as a fake store in tests
/// and as a startup-loaded cache when no database file is wanted.
#[derive(Clone)]
pub struct RegionRegistry {
    records: Arc<RwLock<Vec<RegionRecord>>>,
}

impl RegionRegistry {
    pub fn new() -> Self {
        RegionRegistry {
            records: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn from_records(records: Vec<RegionRecord>) -> Self {
        let registry = RegionRegistry::new();
        for record in records {
            registry.register(record);
        }
        registry
    }

    /// Register a region. A record with an already-known id replaces the
    /// previous one, keeping the one-record-per-id invariant.
    pub fn register(&self, record: RegionRecord) {
        let mut records = self.records.write().unwrap();
        records.retain(|r| r.id != record.id);
        records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RegionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RegionStore for RegionRegistry {
    fn lookup(&self, id: i64) -> Result<Option<RegionRecord>> {
        let records = self.records.read().unwrap();
        Ok(records.iter().find(|r| r.id == id).cloned())
    }

    fn list_all(&self) -> Result<Vec<RegionRecord>> {
        let mut records = self.records.read().unwrap().clone();
        sort_regions(&mut records);
        Ok(records)
    }
}

// ============================================================================
// TESTS
// ============================================================================
