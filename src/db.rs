// Region reference store - SQLite-backed, seeded once, read-only afterwards
//
// An embedded SQLite file holds one row per region, bootstrapped from a seed
// file (JSON or CSV) the first time the process runs. Imports are idempotent
// per region id and leave an audit event per inserted row. Calculation
// requests are never persisted here.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::regions::{sort_regions, RegionConstants, RegionRecord, RegionStore};

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // One row per region; a row carries the constants of exactly one
    // formula variant, the other columns stay NULL.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS regions (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            coefficient REAL,
            value_per_area REAL,
            correction_factor REAL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // Audit trail for reference-data imports
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_regions_name ON regions(name)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// SEED FILES
// ============================================================================

/// One row of a seed file. The unused variant's columns stay empty; the
/// conversion below enforces that exactly one variant is present.
#[derive(Debug, Deserialize)]
pub struct RawRegionRow {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub coefficient: Option<f64>,
    #[serde(default)]
    pub value_per_area: Option<f64>,
    #[serde(default)]
    pub correction_factor: Option<f64>,
}

impl RawRegionRow {
    pub fn into_record(self) -> Result<RegionRecord> {
        if self.name.trim().is_empty() {
            bail!("region {}: name must not be empty", self.id);
        }

        let constants = match (self.coefficient, self.value_per_area, self.correction_factor) {
            (Some(coefficient), None, None) => {
                if coefficient <= 0.0 {
                    bail!("region {}: coefficient must be positive", self.id);
                }
                RegionConstants::Income { coefficient }
            }
            (None, Some(value_per_area), Some(correction_factor)) => {
                if value_per_area <= 0.0 {
                    bail!("region {}: value_per_area must be positive", self.id);
                }
                if correction_factor <= 0.0 {
                    bail!("region {}: correction_factor must be positive", self.id);
                }
                RegionConstants::Area {
                    value_per_area,
                    correction_factor,
                }
            }
            _ => bail!(
                "region {}: must carry either a coefficient or value_per_area + correction_factor",
                self.id
            ),
        };

        Ok(RegionRecord {
            id: self.id,
            name: self.name,
            constants,
        })
    }
}

pub fn parse_json_regions(content: &str) -> Result<Vec<RegionRecord>> {
    let rows: Vec<RawRegionRow> =
        serde_json::from_str(content).context("Failed to parse regions JSON")?;

    rows.into_iter().map(RawRegionRow::into_record).collect()
}

pub fn parse_csv_regions<R: std::io::Read>(reader: R) -> Result<Vec<RegionRecord>> {
    let mut rdr = csv::Reader::from_reader(reader);

    let mut records = Vec::new();
    for result in rdr.deserialize() {
        let row: RawRegionRow = result.context("Failed to deserialize region row")?;
        records.push(row.into_record()?);
    }

    Ok(records)
}

/// Load a seed file, dispatching on extension (`.csv`, otherwise JSON).
pub fn load_regions(path: &Path) -> Result<Vec<RegionRecord>> {
    let is_csv = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);

    if is_csv {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open seed file: {:?}", path))?;
        parse_csv_regions(file)
    } else {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read seed file: {:?}", path))?;
        parse_json_regions(&content)
    }
}

// ============================================================================
// EVENTS (import audit trail)
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY timestamp DESC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let timestamp_str: String = row.get(1)?;
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                    .map_err(|_| rusqlite::Error::InvalidQuery)?
                    .with_timezone(&Utc),
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json)
                    .map_err(|_| rusqlite::Error::InvalidQuery)?,
                actor: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

// ============================================================================
// REGION QUERIES
// ============================================================================

/// Idempotent import: a region whose id already exists is skipped and
/// counted as a duplicate. Returns the number of rows actually inserted.
pub fn insert_regions(conn: &Connection, regions: &[RegionRecord]) -> Result<usize> {
    let mut inserted = 0;
    let mut duplicates = 0;

    for region in regions {
        let (coefficient, value_per_area, correction_factor) = match region.constants {
            RegionConstants::Income { coefficient } => (Some(coefficient), None, None),
            RegionConstants::Area {
                value_per_area,
                correction_factor,
            } => (None, Some(value_per_area), Some(correction_factor)),
        };

        let result = conn.execute(
            "INSERT INTO regions (id, name, coefficient, value_per_area, correction_factor)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                region.id,
                region.name,
                coefficient,
                value_per_area,
                correction_factor,
            ],
        );

        match result {
            Ok(_) => {
                inserted += 1;

                let event = Event::new(
                    "region_added",
                    "region",
                    &region.id.to_string(),
                    serde_json::json!({
                        "name": region.name,
                        "coefficient": coefficient,
                        "value_per_area": value_per_area,
                        "correction_factor": correction_factor,
                    }),
                    "seed_importer",
                );
                let _ = insert_event(conn, &event);
            }
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                duplicates += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    println!("✓ Inserted: {} regions", inserted);
    println!("✓ Skipped duplicates: {}", duplicates);

    Ok(inserted)
}

fn record_from_row(
    id: i64,
    name: String,
    coefficient: Option<f64>,
    value_per_area: Option<f64>,
    correction_factor: Option<f64>,
) -> Result<RegionRecord> {
    let constants = match (coefficient, value_per_area, correction_factor) {
        (Some(coefficient), _, _) => RegionConstants::Income { coefficient },
        (None, Some(value_per_area), Some(correction_factor)) => RegionConstants::Area {
            value_per_area,
            correction_factor,
        },
        _ => bail!("region {} has no usable constants", id),
    };

    Ok(RegionRecord {
        id,
        name,
        constants,
    })
}

pub fn get_region(conn: &Connection, id: i64) -> Result<Option<RegionRecord>> {
    let row = conn
        .query_row(
            "SELECT id, name, coefficient, value_per_area, correction_factor
             FROM regions WHERE id = ?1",
            params![id],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<f64>>(2)?,
                    row.get::<_, Option<f64>>(3)?,
                    row.get::<_, Option<f64>>(4)?,
                ))
            },
        )
        .optional()?;

    match row {
        Some((id, name, coefficient, value_per_area, correction_factor)) => Ok(Some(
            record_from_row(id, name, coefficient, value_per_area, correction_factor)?,
        )),
        None => Ok(None),
    }
}

/// All regions ordered by display name. SQLite's byte-wise collation does
/// not know Cyrillic, so ordering happens in memory via `sort_regions`.
pub fn get_all_regions(conn: &Connection) -> Result<Vec<RegionRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, coefficient, value_per_area, correction_factor FROM regions",
    )?;

    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<f64>>(2)?,
                row.get::<_, Option<f64>>(3)?,
                row.get::<_, Option<f64>>(4)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut regions = rows
        .into_iter()
        .map(|(id, name, coefficient, value_per_area, correction_factor)| {
            record_from_row(id, name, coefficient, value_per_area, correction_factor)
        })
        .collect::<Result<Vec<_>>>()?;

    sort_regions(&mut regions);
    Ok(regions)
}

pub fn verify_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM regions", [], |row| row.get(0))?;

    Ok(count)
}

// ============================================================================
// SQLITE-BACKED STORE
// ============================================================================

/// The production `RegionStore`: owns the connection, bootstraps the schema
/// on open. Constructed once at startup with injected configuration.
pub struct SqliteRegionStore {
    conn: Connection,
}

impl SqliteRegionStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {:?}", path))?;
        setup_database(&conn)?;
        Ok(SqliteRegionStore { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        setup_database(&conn)?;
        Ok(SqliteRegionStore { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn import(&self, regions: &[RegionRecord]) -> Result<usize> {
        insert_regions(&self.conn, regions)
    }

    /// Seed the reference table from a file if it is still empty.
    /// Returns the number of rows imported (0 when already seeded).
    pub fn seed_if_empty(&self, seed_path: &Path) -> Result<usize> {
        if verify_count(&self.conn)? > 0 {
            return Ok(0);
        }

        let regions = load_regions(seed_path)?;
        self.import(&regions)
    }
}

impl RegionStore for SqliteRegionStore {
    fn lookup(&self, id: i64) -> Result<Option<RegionRecord>> {
        get_region(&self.conn, id)
    }

    fn list_all(&self) -> Result<Vec<RegionRecord>> {
        get_all_regions(&self.conn)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn test_regions() -> Vec<RegionRecord> {
        vec![
            RegionRecord::area(1, "Москва", 90000.0, 1.2),
            RegionRecord::area(2, "Екатеринбург", 60000.0, 1.0),
            RegionRecord::income(3, "Омск", 0.8),
        ]
    }

    #[test]
    fn test_import_twice_is_idempotent() {
        let store = SqliteRegionStore::open_in_memory().unwrap();

        let inserted1 = store.import(&test_regions()).unwrap();
        let inserted2 = store.import(&test_regions()).unwrap();

        assert_eq!(inserted1, 3, "first import should insert 3 regions");
        assert_eq!(inserted2, 0, "second import should skip all duplicates");
        assert_eq!(verify_count(store.connection()).unwrap(), 3);
    }

    #[test]
    fn test_lookup_hit_and_miss() {
        let store = SqliteRegionStore::open_in_memory().unwrap();
        store.import(&test_regions()).unwrap();

        let moscow = store.lookup(1).unwrap().unwrap();
        assert_eq!(moscow.name, "Москва");
        assert_eq!(
            moscow.constants,
            RegionConstants::Area {
                value_per_area: 90000.0,
                correction_factor: 1.2
            }
        );

        let omsk = store.lookup(3).unwrap().unwrap();
        assert_eq!(omsk.constants, RegionConstants::Income { coefficient: 0.8 });

        assert!(store.lookup(42).unwrap().is_none());
    }

    #[test]
    fn test_list_all_ordered_by_name() {
        let store = SqliteRegionStore::open_in_memory().unwrap();
        store.import(&test_regions()).unwrap();

        let names: Vec<String> = store
            .list_all()
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();

        assert_eq!(names, vec!["Екатеринбург", "Москва", "Омск"]);
    }

    #[test]
    fn test_import_writes_audit_events() {
        let store = SqliteRegionStore::open_in_memory().unwrap();
        store.import(&test_regions()).unwrap();

        let events = get_events_for_entity(store.connection(), "region", "1").unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "region_added");
        assert_eq!(events[0].actor, "seed_importer");

        // Re-import inserts nothing, so no second event either
        store.import(&test_regions()).unwrap();
        let events = get_events_for_entity(store.connection(), "region", "1").unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_parse_json_seed() {
        let content = r#"[
            {"id": 1, "name": "Москва", "value_per_area": 90000, "correction_factor": 1.2},
            {"id": 3, "name": "Омск", "coefficient": 0.8}
        ]"#;

        let regions = parse_json_regions(content).unwrap();
        assert_eq!(regions.len(), 2);
        assert!(regions[0].constants.is_area());
        assert!(regions[1].constants.is_income());
    }

    #[test]
    fn test_parse_csv_seed() {
        let content = "id,name,coefficient,value_per_area,correction_factor\n\
                       1,Москва,,90000,1.2\n\
                       3,Омск,0.8,,\n";

        let regions = parse_csv_regions(content.as_bytes()).unwrap();
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].name, "Москва");
        assert!(regions[0].constants.is_area());
        assert_eq!(
            regions[1].constants,
            RegionConstants::Income { coefficient: 0.8 }
        );
    }

    #[test]
    fn test_seed_rejects_mixed_constants() {
        let content = r#"[
            {"id": 1, "name": "Москва", "coefficient": 0.8, "value_per_area": 90000, "correction_factor": 1.2}
        ]"#;

        assert!(parse_json_regions(content).is_err());
    }

    #[test]
    fn test_seed_rejects_non_positive_constants() {
        let content = r#"[{"id": 1, "name": "Омск", "coefficient": 0}]"#;
        assert!(parse_json_regions(content).is_err());

        let content =
            r#"[{"id": 1, "name": "Москва", "value_per_area": -5, "correction_factor": 1.0}]"#;
        assert!(parse_json_regions(content).is_err());
    }

    #[test]
    fn test_seed_if_empty_runs_once() {
        let dir = std::env::temp_dir().join("subsidy-calculator-test-seed");
        std::fs::create_dir_all(&dir).unwrap();
        let seed_path = dir.join("regions.json");
        std::fs::write(
            &seed_path,
            r#"[{"id": 1, "name": "Омск", "coefficient": 0.8}]"#,
        )
        .unwrap();

        let store = SqliteRegionStore::open_in_memory().unwrap();
        assert_eq!(store.seed_if_empty(&seed_path).unwrap(), 1);
        assert_eq!(store.seed_if_empty(&seed_path).unwrap(), 0);
    }
}
