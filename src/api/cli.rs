use clap::{Args, Parser, Subcommand};
use thiserror::Error;
use tracing::info;

use super::{compare, simulate};
use crate::core::{ParameterField, ParameterOverrides, ParameterSet, Scenario, SimError};

#[derive(Parser, Debug)]
#[command(
    name = "homesim",
    about = "Month-by-month mortgage payoff, savings and home equity projection"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the JSON API
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
    /// Run one projection and print it as JSON
    Run(RunArgs),
    /// Run several scenarios derived from one base and print a comparison
    Compare(CompareArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    #[arg(
        long = "set",
        value_name = "FIELD=VALUE",
        value_parser = parse_assignment,
        help = "Override a parameter, e.g. --set loanExtraPayment=500 (repeatable)"
    )]
    pub set: Vec<(ParameterField, f64)>,
    #[arg(long, help = "Seed for reproducible inflation noise; OS entropy when omitted")]
    pub seed: Option<u64>,
    #[arg(long, help = "Print only the summary, not the monthly series")]
    pub summary_only: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct CompareArgs {
    #[arg(
        long = "set",
        value_name = "FIELD=VALUE",
        value_parser = parse_assignment,
        help = "Override a base parameter shared by every scenario (repeatable)"
    )]
    pub set: Vec<(ParameterField, f64)>,
    #[arg(
        long = "scenario",
        value_name = "NAME[:FIELD=VALUE,...]",
        value_parser = parse_scenario,
        required = true,
        help = "Named scenario with its own overrides, e.g. 'overpay:loanExtraPayment=1000'"
    )]
    pub scenarios: Vec<Scenario>,
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Sim(#[from] SimError),
    #[error("failed to encode output: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn execute_run(args: &RunArgs) -> Result<String, CliError> {
    let parameters = base_parameters(&args.set)?;
    info!(
        start_year = parameters.start_year,
        end_year = parameters.end_year,
        seed = ?args.seed,
        "running projection"
    );
    let response = simulate(parameters, args.seed, !args.summary_only)?;
    Ok(serde_json::to_string_pretty(&response)?)
}

pub fn execute_compare(args: &CompareArgs) -> Result<String, CliError> {
    let base = base_parameters(&args.set)?;
    info!(
        scenarios = args.scenarios.len(),
        seed = ?args.seed,
        "running comparison"
    );
    let response = compare(&base, &args.scenarios, args.seed)?;
    Ok(serde_json::to_string_pretty(&response)?)
}

fn base_parameters(set: &[(ParameterField, f64)]) -> Result<ParameterSet, SimError> {
    let mut overrides = ParameterOverrides::new();
    for &(field, value) in set {
        overrides.insert(field, value);
    }
    ParameterSet::default().derive_with(&overrides)
}

fn parse_assignment(raw: &str) -> Result<(ParameterField, f64), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=VALUE, got '{raw}'"))?;
    let field = key.parse::<ParameterField>().map_err(|e| e.to_string())?;
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid number for {field}: {e}"))?;
    Ok((field, value))
}

fn parse_scenario(raw: &str) -> Result<Scenario, String> {
    let (name, rest) = raw.split_once(':').unwrap_or((raw, ""));
    let name = name.trim();
    if name.is_empty() {
        return Err(SimError::EmptyScenarioName.to_string());
    }
    let mut modifiers = ParameterOverrides::new();
    for part in rest.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (field, value) = parse_assignment(part)?;
        modifiers.insert(field, value);
    }
    Ok(Scenario::new(name, modifiers))
}
