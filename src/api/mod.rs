pub mod cli;

use axum::{
    Router,
    extract::{
        Json, Query,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::core::{
    Engine, ParameterField, ParameterOverrides, ParameterSet, RunSummary, SavingsRow, Scenario,
    SeededDeviation, Seeding, SimError, Snapshot, run_comparison,
};

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
struct SimulatePayload {
    #[serde(alias = "start_year")]
    start_year: Option<f64>,
    #[serde(alias = "end_year")]
    end_year: Option<f64>,
    #[serde(alias = "initial_owed_on_house")]
    initial_owed_on_house: Option<f64>,
    #[serde(alias = "inflation_rate_base")]
    inflation_rate_base: Option<f64>,
    #[serde(alias = "inflation_rate_variation")]
    inflation_rate_variation: Option<f64>,
    #[serde(alias = "loan_interest_rate_base")]
    loan_interest_rate_base: Option<f64>,
    #[serde(alias = "loan_repayment_years")]
    loan_repayment_years: Option<f64>,
    #[serde(alias = "loan_base_payments")]
    loan_base_payments: Option<f64>,
    #[serde(alias = "loan_extra_payment")]
    loan_extra_payment: Option<f64>,
    #[serde(alias = "income_monthly_base")]
    income_monthly_base: Option<f64>,
    #[serde(alias = "savings_interest_rate_base")]
    savings_interest_rate_base: Option<f64>,
    #[serde(alias = "income_yearly_growth_rate")]
    income_yearly_growth_rate: Option<f64>,
    #[serde(alias = "monthly_expenses")]
    monthly_expenses: Option<f64>,

    seed: Option<u64>,
    #[serde(alias = "include_series")]
    include_series: Option<bool>,
}

impl SimulatePayload {
    fn overrides(&self) -> ParameterOverrides {
        let mut overrides = ParameterOverrides::new();
        for (field, value) in [
            (ParameterField::StartYear, self.start_year),
            (ParameterField::EndYear, self.end_year),
            (ParameterField::InitialOwedOnHouse, self.initial_owed_on_house),
            (ParameterField::InflationRateBase, self.inflation_rate_base),
            (
                ParameterField::InflationRateVariation,
                self.inflation_rate_variation,
            ),
            (ParameterField::LoanInterestRateBase, self.loan_interest_rate_base),
            (ParameterField::LoanRepaymentYears, self.loan_repayment_years),
            (ParameterField::LoanBasePayments, self.loan_base_payments),
            (ParameterField::LoanExtraPayment, self.loan_extra_payment),
            (ParameterField::IncomeMonthlyBase, self.income_monthly_base),
            (
                ParameterField::SavingsInterestRateBase,
                self.savings_interest_rate_base,
            ),
            (
                ParameterField::IncomeYearlyGrowthRate,
                self.income_yearly_growth_rate,
            ),
            (ParameterField::MonthlyExpenses, self.monthly_expenses),
        ] {
            if let Some(v) = value {
                overrides.insert(field, v);
            }
        }
        overrides
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
struct ComparePayload {
    base: ParameterOverrides,
    scenarios: Vec<Scenario>,
    seed: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SimulateResponse {
    parameters: ParameterSet,
    seed: Option<u64>,
    summary: Option<RunSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    snapshots: Option<Vec<Snapshot>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScenarioResponse {
    name: String,
    parameters: ParameterSet,
    summary: Option<RunSummary>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CompareResponse {
    seed: Option<u64>,
    scenarios: Vec<ScenarioResponse>,
    savings_table: Vec<SavingsRow>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

pub(crate) fn simulate(
    parameters: ParameterSet,
    seed: Option<u64>,
    include_series: bool,
) -> Result<SimulateResponse, SimError> {
    parameters.check_span()?;
    let snapshots = match seed {
        Some(seed) => {
            let mut engine = Engine::with_deviation(parameters.clone(), SeededDeviation::new(seed));
            engine.run_to_completion();
            engine.into_snapshots()
        }
        None => {
            let mut engine = Engine::new(parameters.clone());
            engine.run_to_completion();
            engine.into_snapshots()
        }
    };
    let summary = RunSummary::from_snapshots(&snapshots);
    debug!(months = snapshots.len(), ?seed, "simulation complete");

    Ok(SimulateResponse {
        parameters,
        seed,
        summary,
        snapshots: include_series.then_some(snapshots),
    })
}

pub(crate) fn compare(
    base: &ParameterSet,
    scenarios: &[Scenario],
    seed: Option<u64>,
) -> Result<CompareResponse, SimError> {
    let seeding = seed.map_or(Seeding::Entropy, Seeding::Fixed);
    let comparison = run_comparison(base, scenarios, seeding)?;
    let savings_table = comparison.savings_table();
    Ok(CompareResponse {
        seed,
        scenarios: comparison
            .runs
            .into_iter()
            .map(|run| ScenarioResponse {
                name: run.name,
                parameters: run.parameters,
                summary: run.summary,
            })
            .collect(),
        savings_table,
    })
}

pub fn app() -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/defaults", get(defaults_handler))
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .route("/api/compare", post(compare_handler))
        .fallback(not_found_handler)
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "homesim HTTP API listening");
    info!("local access: http://127.0.0.1:{port}/api/defaults");

    axum::serve(listener, app()).await
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn defaults_handler() -> Response {
    json_response(StatusCode::OK, ParameterSet::default())
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_get_handler(
    payload: Result<Query<SimulatePayload>, QueryRejection>,
) -> Response {
    match payload {
        Ok(Query(payload)) => simulate_handler_impl(payload),
        Err(rejection) => error_response(StatusCode::BAD_REQUEST, &rejection.body_text()),
    }
}

async fn simulate_post_handler(payload: Result<Json<SimulatePayload>, JsonRejection>) -> Response {
    match payload {
        Ok(Json(payload)) => simulate_handler_impl(payload),
        Err(rejection) => error_response(StatusCode::BAD_REQUEST, &rejection.body_text()),
    }
}

async fn compare_handler(payload: Result<Json<ComparePayload>, JsonRejection>) -> Response {
    let payload = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => {
            return error_response(StatusCode::BAD_REQUEST, &rejection.body_text());
        }
    };
    let response = ParameterSet::default()
        .derive_with(&payload.base)
        .and_then(|base| compare(&base, &payload.scenarios, payload.seed));
    match response {
        Ok(response) => json_response(StatusCode::OK, response),
        Err(e) => error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    }
}

fn simulate_handler_impl(payload: SimulatePayload) -> Response {
    let parameters = match ParameterSet::default().derive_with(&payload.overrides()) {
        Ok(parameters) => parameters,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    };
    match simulate(
        parameters,
        payload.seed,
        payload.include_series.unwrap_or(true),
    ) {
        Ok(response) => json_response(StatusCode::OK, response),
        Err(e) => error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}
