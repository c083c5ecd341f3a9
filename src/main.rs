use anyhow::{anyhow, bail, Context, Result};
use std::env;
use std::path::{Path, PathBuf};

use subsidy_calculator::{
    calculate_area_subsidy, calculate_income_subsidy, load_regions, validate_area_request,
    validate_income_request, FormulaVariant, RegionConstants, RegionStore, SqliteRegionStore,
};

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("import") => {
            let seed = args
                .get(2)
                .ok_or_else(|| anyhow!("usage: subsidy-calculator import <seed-file>"))?;
            run_import(Path::new(seed))
        }
        Some("list") => run_list(),
        Some("calc") => run_calc(&args[2..]),
        _ => {
            print_usage();
            Ok(())
        }
    }
}

fn print_usage() {
    println!("🏠 Housing Subsidy Calculator");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Usage:");
    println!("  subsidy-calculator import <seed-file>   Import the region reference table");
    println!("  subsidy-calculator list                 Print all regions");
    println!("  subsidy-calculator calc <args>          Run one calculation:");
    println!("    income build: calc <region-id> <income> <members>");
    println!("    area build:   calc <region-id> <members> <additional> <owned> <years>");
    println!();
    println!("Environment:");
    println!("  SUBSIDY_DB_PATH   Database file (default: subsidy.db)");
    println!("  SUBSIDY_FORMULA   Formula variant: income | area (default: area)");
}

// ============================================================================
// Configuration (env with defaults, injected at startup)
// ============================================================================

fn db_path() -> PathBuf {
    PathBuf::from(env::var("SUBSIDY_DB_PATH").unwrap_or_else(|_| "subsidy.db".to_string()))
}

fn formula_variant() -> Result<FormulaVariant> {
    let name = env::var("SUBSIDY_FORMULA").unwrap_or_else(|_| "area".to_string());
    FormulaVariant::from_name(&name)
        .ok_or_else(|| anyhow!("SUBSIDY_FORMULA must be 'income' or 'area', got '{}'", name))
}

// ============================================================================
// Subcommands
// ============================================================================

fn run_import(seed_path: &Path) -> Result<()> {
    println!("🏠 Housing Subsidy Calculator - Reference Data Import");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    println!("\n📂 Loading seed file...");
    let regions = load_regions(seed_path)?;
    println!("✓ Loaded {} regions from {:?}", regions.len(), seed_path);

    println!("\n🔧 Setting up database...");
    let store = SqliteRegionStore::open(&db_path())?;
    println!("✓ Database initialized with WAL mode");

    println!("\n💾 Importing regions...");
    store.import(&regions)?;

    println!("\n🔍 Verifying database...");
    let count = subsidy_calculator::verify_count(store.connection())?;
    println!("✓ Database contains {} regions", count);

    Ok(())
}

fn run_list() -> Result<()> {
    let store = SqliteRegionStore::open(&db_path())?;
    let regions = store.list_all()?;

    if regions.is_empty() {
        println!("No regions in the database yet.");
        println!("Run: subsidy-calculator import <seed-file>");
        return Ok(());
    }

    for region in &regions {
        match region.constants {
            RegionConstants::Income { coefficient } => {
                println!("{:>4}  {}  (coefficient {})", region.id, region.name, coefficient);
            }
            RegionConstants::Area {
                value_per_area,
                correction_factor,
            } => {
                println!(
                    "{:>4}  {}  ({:.2}/m², correction {})",
                    region.id, region.name, value_per_area, correction_factor
                );
            }
        }
    }
    println!("\n✓ {} regions", regions.len());

    Ok(())
}

fn run_calc(args: &[String]) -> Result<()> {
    let variant = formula_variant()?;
    let body = calc_body(variant, args)?;

    let store = SqliteRegionStore::open(&db_path())?;

    // Route the CLI input through the same validation stage as the API
    match variant {
        FormulaVariant::Income => {
            let request = validate_income_request(&body).map_err(|e| anyhow!("{}", e))?;
            let region = store
                .lookup(request.region_id)?
                .ok_or_else(|| anyhow!("Region {} not found", request.region_id))?;
            let coefficient = match region.constants {
                RegionConstants::Income { coefficient } => coefficient,
                RegionConstants::Area { .. } => bail!(
                    "region {} has no income coefficient; this build runs the income formula",
                    region.id
                ),
            };

            let calc = calculate_income_subsidy(&region.name, coefficient, &request);
            println!("Region:           {}", calc.breakdown.region_name);
            println!("Coefficient:      {}", calc.breakdown.coefficient);
            println!("Family income:    {:.2}", calc.breakdown.family_income);
            println!("Family members:   {}", calc.breakdown.family_members);
            println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
            println!("Subsidy:          {:.2}", calc.amount);
        }
        FormulaVariant::Area => {
            let request = validate_area_request(&body).map_err(|e| anyhow!("{}", e))?;
            let region = store
                .lookup(request.region_id)?
                .ok_or_else(|| anyhow!("Region {} not found", request.region_id))?;
            let (value_per_area, correction_factor) = match region.constants {
                RegionConstants::Area {
                    value_per_area,
                    correction_factor,
                } => (value_per_area, correction_factor),
                RegionConstants::Income { .. } => bail!(
                    "region {} has no area constants; this build runs the area formula",
                    region.id
                ),
            };

            let calc =
                calculate_area_subsidy(&region.name, value_per_area, correction_factor, &request);
            let b = &calc.breakdown;
            println!("Region:             {}", b.region_name);
            println!("Value per m²:       {:.2}", b.value_per_area);
            println!("Correction factor:  {}", b.correction_factor);
            println!("Years of service:   {}", b.years_of_service);
            println!("Service coeff.:     {}", b.service_coefficient);
            println!("Family members:     {}", b.family_members);
            println!("Normative area:     {} m²", b.normative_area);
            println!("Additional area:    {} m²", b.additional_area);
            println!("Owned area:         {} m²", b.owned_area);
            println!("Total area:         {} m²", b.total_area);
            println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
            println!("Subsidy:            {:.2}", calc.amount);
        }
    }

    Ok(())
}

/// Build a request body from positional CLI arguments, so `calc` runs
/// through the exact validation rules the HTTP boundary applies.
fn calc_body(variant: FormulaVariant, args: &[String]) -> Result<serde_json::Value> {
    let parse = |i: usize, name: &str| -> Result<f64> {
        args.get(i)
            .ok_or_else(|| anyhow!("missing argument: {}", name))?
            .parse::<f64>()
            .with_context(|| format!("argument {} must be numeric", name))
    };

    match variant {
        FormulaVariant::Income => {
            if args.len() != 3 {
                bail!("usage: subsidy-calculator calc <region-id> <income> <members>");
            }
            Ok(serde_json::json!({
                "regionId": parse(0, "region-id")?,
                "familyIncome": parse(1, "income")?,
                "familyMembers": parse(2, "members")?,
            }))
        }
        FormulaVariant::Area => {
            if args.len() != 5 {
                bail!(
                    "usage: subsidy-calculator calc <region-id> <members> <additional> <owned> <years>"
                );
            }
            Ok(serde_json::json!({
                "regionId": parse(0, "region-id")?,
                "familyMembers": parse(1, "members")?,
                "additionalArea": parse(2, "additional")?,
                "ownedArea": parse(3, "owned")?,
                "yearsOfService": parse(4, "years")?,
            }))
        }
    }
}
