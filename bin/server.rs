// Housing Subsidy Calculator - Web Server
// JSON API + embedded form UI with Axum

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use subsidy_calculator::{
    calculate_area_subsidy, calculate_income_subsidy, validate_area_request,
    validate_income_request, FormulaVariant, RegionConstants, RegionRecord, RegionStore,
    SqliteRegionStore,
};

/// Shared application state
#[derive(Clone)]
struct AppState {
    store: Arc<Mutex<SqliteRegionStore>>,
    variant: FormulaVariant,
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Serialize)]
struct ConfigResponse {
    success: bool,
    variant: &'static str,
}

#[derive(Serialize)]
struct RegionsResponse {
    success: bool,
    regions: Vec<ApiRegion>,
}

/// Region as exposed to the form: flat, camelCase, only the constants the
/// record actually carries.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiRegion {
    id: i64,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    coefficient: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value_per_area: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    correction_factor: Option<f64>,
}

impl From<RegionRecord> for ApiRegion {
    fn from(record: RegionRecord) -> Self {
        let (coefficient, value_per_area, correction_factor) = match record.constants {
            RegionConstants::Income { coefficient } => (Some(coefficient), None, None),
            RegionConstants::Area {
                value_per_area,
                correction_factor,
            } => (None, Some(value_per_area), Some(correction_factor)),
        };

        Self {
            id: record.id,
            name: record.name,
            coefficient,
            value_per_area,
            correction_factor,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CalculateResponse {
    success: bool,
    subsidy: f64,
    calculation_details: Value,
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            success: false,
            error: message.to_string(),
        }),
    )
        .into_response()
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "success": true, "data": "OK" }))
}

/// GET /api/config - Which formula variant this deployment runs
async fn get_config(State(state): State<AppState>) -> impl IntoResponse {
    Json(ConfigResponse {
        success: true,
        variant: state.variant.name(),
    })
}

/// GET /api/regions - Region list, ordered by display name
async fn get_regions(State(state): State<AppState>) -> Response {
    let store = state.store.lock().unwrap();

    match store.list_all() {
        Ok(regions) => {
            let regions: Vec<ApiRegion> = regions.into_iter().map(Into::into).collect();
            (
                StatusCode::OK,
                Json(RegionsResponse {
                    success: true,
                    regions,
                }),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!("failed to list regions: {e:#}");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load region list",
            )
        }
    }
}

/// POST /api/calculate - Run the configured formula over a request body
///
/// 400: missing field / out-of-domain value; 404: unknown region;
/// 500: store failure or misconfigured reference data (detail logged,
/// never leaked).
async fn calculate(State(state): State<AppState>, Json(body): Json<Value>) -> Response {
    match state.variant {
        FormulaVariant::Income => calculate_income(&state, &body),
        FormulaVariant::Area => calculate_area(&state, &body),
    }
}

fn lookup_region(state: &AppState, region_id: i64) -> Result<Option<RegionRecord>, Response> {
    let store = state.store.lock().unwrap();
    store.lookup(region_id).map_err(|e| {
        tracing::error!("region lookup failed: {e:#}");
        error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to calculate subsidy",
        )
    })
}

fn calculate_income(state: &AppState, body: &Value) -> Response {
    let request = match validate_income_request(body) {
        Ok(request) => request,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    };

    let region = match lookup_region(state, request.region_id) {
        Ok(Some(region)) => region,
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "Region not found"),
        Err(response) => return response,
    };

    let coefficient = match region.constants {
        RegionConstants::Income { coefficient } => coefficient,
        RegionConstants::Area { .. } => {
            tracing::error!(
                "region {} carries area constants but this deployment runs the income formula",
                region.id
            );
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to calculate subsidy",
            );
        }
    };

    let calc = calculate_income_subsidy(&region.name, coefficient, &request);

    (
        StatusCode::OK,
        Json(CalculateResponse {
            success: true,
            subsidy: calc.amount,
            calculation_details: serde_json::json!(calc.breakdown),
        }),
    )
        .into_response()
}

fn calculate_area(state: &AppState, body: &Value) -> Response {
    let request = match validate_area_request(body) {
        Ok(request) => request,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    };

    let region = match lookup_region(state, request.region_id) {
        Ok(Some(region)) => region,
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "Region not found"),
        Err(response) => return response,
    };

    let (value_per_area, correction_factor) = match region.constants {
        RegionConstants::Area {
            value_per_area,
            correction_factor,
        } => (value_per_area, correction_factor),
        RegionConstants::Income { .. } => {
            tracing::error!(
                "region {} carries income constants but this deployment runs the area formula",
                region.id
            );
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to calculate subsidy",
            );
        }
    };

    let calc = calculate_area_subsidy(&region.name, value_per_area, correction_factor, &request);

    (
        StatusCode::OK,
        Json(CalculateResponse {
            success: true,
            subsidy: calc.amount,
            calculation_details: serde_json::json!(calc.breakdown),
        }),
    )
        .into_response()
}

/// GET / - Serve the calculator form
async fn serve_index() -> impl IntoResponse {
    Html(include_str!("../web/index.html"))
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    println!("🏠 Housing Subsidy Calculator - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // Configuration injected from the environment
    let db_path = PathBuf::from(
        std::env::var("SUBSIDY_DB_PATH").unwrap_or_else(|_| "subsidy.db".to_string()),
    );
    let seed_path = PathBuf::from(
        std::env::var("SUBSIDY_REGIONS_FILE").unwrap_or_else(|_| "data/regions.json".to_string()),
    );
    let variant_name = std::env::var("SUBSIDY_FORMULA").unwrap_or_else(|_| "area".to_string());
    let variant = FormulaVariant::from_name(&variant_name)
        .expect("SUBSIDY_FORMULA must be 'income' or 'area'");

    let store = SqliteRegionStore::open(&db_path).expect("Failed to open database");
    println!("✓ Database opened: {:?}", db_path);

    // Seed the reference table on first start
    if seed_path.exists() {
        let imported = store
            .seed_if_empty(&seed_path)
            .expect("Failed to seed region table");
        if imported > 0 {
            println!("✓ Seeded {} regions from {:?}", imported, seed_path);
        }
    } else if subsidy_calculator::verify_count(store.connection()).unwrap_or(0) == 0 {
        eprintln!(
            "⚠ Region table is empty and no seed file found at {:?}",
            seed_path
        );
        eprintln!("  Run: subsidy-calculator import <seed-file>");
    }

    let state = AppState {
        store: Arc::new(Mutex::new(store)),
        variant,
    };

    // Build API routes
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/config", get(get_config))
        .route("/regions", get(get_regions))
        .route("/calculate", post(calculate))
        .with_state(state.clone());

    // Build main router
    let app = Router::new()
        .route("/", get(serve_index))
        .nest("/api", api_routes)
        .nest_service("/static", ServeDir::new("web"))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = std::env::var("SUBSIDY_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    println!(
        "\n🚀 Server running on http://{} ({} formula)",
        addr,
        variant.name()
    );
    println!("   API: http://{}/api/regions", addr);
    println!("   UI:  http://{}", addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
