// Housing Subsidy Calculator - Core Library
// Exposes the reference store, validation stage, and subsidy engine
// for use in the CLI, the web server, and tests

pub mod db;
pub mod engine;     // Subsidy Engine - pure formula functions
pub mod regions;    // Region reference data + store abstraction
pub mod validation; // Validation Stage - raw input to typed requests

// Re-export commonly used types
pub use db::{
    get_all_regions, get_events_for_entity, get_region, insert_event, insert_regions,
    load_regions, setup_database, verify_count, Event, RawRegionRow, SqliteRegionStore,
};
pub use engine::{
    calculate_area_subsidy, calculate_income_subsidy, normative_area, round_currency,
    service_coefficient, AreaBreakdown, AreaCalculation, AreaRequest, FormulaVariant,
    IncomeBreakdown, IncomeCalculation, IncomeRequest,
};
pub use regions::{sort_regions, RegionConstants, RegionRecord, RegionRegistry, RegionStore};
pub use validation::{
    validate_area_request, validate_income_request, ValidationError, ValidationKind,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
