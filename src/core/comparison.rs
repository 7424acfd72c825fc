use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::deviation::{DeviationSource, EntropyDeviation, SeededDeviation, derive_seed};
use super::engine::Engine;
use super::error::{Result, SimError};
use super::types::{ParameterOverrides, ParameterSet, RunSummary, Snapshot};

/// A named set of overrides layered over a shared base.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default, alias = "overrides")]
    pub modifiers: ParameterOverrides,
}

impl Scenario {
    pub fn new(name: impl Into<String>, modifiers: ParameterOverrides) -> Self {
        Self {
            name: name.into(),
            modifiers,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Seeding {
    Entropy,
    /// Each scenario gets its own stream derived from this seed and its index.
    Fixed(u64),
}

#[derive(Debug, Clone)]
pub struct ScenarioRun {
    pub name: String,
    pub parameters: ParameterSet,
    pub snapshots: Vec<Snapshot>,
    pub summary: Option<RunSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavingsRow {
    pub label: String,
    pub values: BTreeMap<String, f64>,
}

#[derive(Debug, Clone)]
pub struct Comparison {
    pub runs: Vec<ScenarioRun>,
}

impl Comparison {
    /// Savings per scenario, aligned on the first scenario's months.
    pub fn savings_table(&self) -> Vec<SavingsRow> {
        let Some(lead) = self.runs.first() else {
            return Vec::new();
        };
        lead.snapshots
            .iter()
            .enumerate()
            .map(|(index, row)| SavingsRow {
                label: row.calendar().label(),
                values: self
                    .runs
                    .iter()
                    .filter_map(|run| {
                        run.snapshots
                            .get(index)
                            .map(|other| (run.name.clone(), other.savings))
                    })
                    .collect(),
            })
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&ScenarioRun> {
        self.runs.iter().find(|run| run.name == name)
    }
}

/// Runs a single parameter set to completion.
pub fn run_scenario<D: DeviationSource>(
    name: &str,
    parameters: ParameterSet,
    deviation: D,
) -> ScenarioRun {
    let mut engine = Engine::with_deviation(parameters, deviation);
    engine.run_to_completion();
    let parameters = engine.parameters().clone();
    let snapshots = engine.into_snapshots();
    let summary = RunSummary::from_snapshots(&snapshots);
    debug!(
        scenario = name,
        months = snapshots.len(),
        final_savings = summary.map(|s| s.final_savings),
        "scenario finished"
    );
    ScenarioRun {
        name: name.to_string(),
        parameters,
        snapshots,
        summary,
    }
}

/// Derives one parameter set per scenario and runs each on its own engine.
/// All scenarios are validated before any simulation starts.
pub fn run_comparison(
    base: &ParameterSet,
    scenarios: &[Scenario],
    seeding: Seeding,
) -> Result<Comparison> {
    let mut seen = HashSet::new();
    let mut derived = Vec::with_capacity(scenarios.len());
    for scenario in scenarios {
        let name = scenario.name.trim();
        if name.is_empty() {
            return Err(SimError::EmptyScenarioName);
        }
        if !seen.insert(name) {
            return Err(SimError::DuplicateScenario(name.to_string()));
        }
        let params = base.derive_with(&scenario.modifiers)?;
        params.check_span()?;
        derived.push((name, params));
    }

    let runs = derived
        .into_iter()
        .enumerate()
        .map(|(index, (name, params))| match seeding {
            Seeding::Entropy => run_scenario(name, params, EntropyDeviation::new()),
            Seeding::Fixed(seed) => run_scenario(
                name,
                params,
                SeededDeviation::new(derive_seed(seed, index as u32)),
            ),
        })
        .collect();

    Ok(Comparison { runs })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{CalendarMonth, ParameterField};

    fn quiet_base() -> ParameterSet {
        ParameterSet {
            end_year: 2025,
            inflation_rate_variation: 0.0,
            ..ParameterSet::default()
        }
    }

    #[test]
    fn scenarios_run_independently_from_a_shared_base() {
        let base = quiet_base();
        let scenarios = vec![
            Scenario::new("baseline", ParameterOverrides::new()),
            Scenario::new(
                "overpay",
                ParameterOverrides::new().with(ParameterField::LoanExtraPayment, 1_000.0),
            ),
        ];

        let comparison = run_comparison(&base, &scenarios, Seeding::Fixed(5)).expect("valid");
        assert_eq!(comparison.runs.len(), 2);

        let baseline = comparison.get("baseline").expect("baseline run");
        let overpay = comparison.get("overpay").expect("overpay run");
        assert_eq!(baseline.parameters, base);
        assert_eq!(overpay.parameters.loan_extra_payment, 1_000.0);
        assert_eq!(overpay.parameters.monthly_expenses, base.monthly_expenses);

        let last_base = baseline.snapshots.last().expect("rows");
        let last_over = overpay.snapshots.last().expect("rows");
        assert!(last_over.loan_principal < last_base.loan_principal);
        assert!(last_over.savings < last_base.savings);
    }

    #[test]
    fn fixed_seeding_is_reproducible() {
        let mut base = ParameterSet::default();
        base.end_year = 2030;
        let scenarios = vec![
            Scenario::new("a", ParameterOverrides::new()),
            Scenario::new(
                "b",
                ParameterOverrides::new().with(ParameterField::InflationRateVariation, 0.02),
            ),
        ];

        let first = run_comparison(&base, &scenarios, Seeding::Fixed(99)).expect("valid");
        let second = run_comparison(&base, &scenarios, Seeding::Fixed(99)).expect("valid");
        for (left, right) in first.runs.iter().zip(second.runs.iter()) {
            assert_eq!(left.snapshots, right.snapshots);
        }
    }

    #[test]
    fn rejects_duplicate_and_empty_names() {
        let base = quiet_base();
        let duplicate = vec![
            Scenario::new("x", ParameterOverrides::new()),
            Scenario::new(" x ", ParameterOverrides::new()),
        ];
        assert_eq!(
            run_comparison(&base, &duplicate, Seeding::Entropy).unwrap_err(),
            SimError::DuplicateScenario("x".to_string())
        );

        let empty = vec![Scenario::new("  ", ParameterOverrides::new())];
        assert_eq!(
            run_comparison(&base, &empty, Seeding::Entropy).unwrap_err(),
            SimError::EmptyScenarioName
        );
    }

    #[test]
    fn invalid_override_fails_before_any_run() {
        let base = quiet_base();
        let scenarios = vec![Scenario::new(
            "bad",
            ParameterOverrides::new().with(ParameterField::EndYear, 2030.5),
        )];
        let err = run_comparison(&base, &scenarios, Seeding::Fixed(1)).unwrap_err();
        assert!(matches!(err, SimError::InvalidFieldValue { field: "endYear", .. }));
    }

    #[test]
    fn savings_table_aligns_on_first_scenario() {
        let base = quiet_base();
        let scenarios = vec![
            Scenario::new("long", ParameterOverrides::new()),
            Scenario::new(
                "short",
                ParameterOverrides::new().with(ParameterField::EndYear, 2023.0),
            ),
        ];

        let comparison = run_comparison(&base, &scenarios, Seeding::Fixed(0)).expect("valid");
        let table = comparison.savings_table();
        assert_eq!(table.len(), 36);
        assert_eq!(table[0].label, "2023-2");
        assert_eq!(table[11].label, "2024-1");
        assert_eq!(table[11].values.len(), 2);
        assert_eq!(table[12].values.len(), 1);
        assert!(table[12].values.contains_key("long"));
    }

    #[test]
    fn summary_reports_payoff_and_final_values() {
        let base = ParameterSet {
            start_year: 2023,
            end_year: 2024,
            initial_owed_on_house: 10_000.0,
            inflation_rate_base: 0.0,
            inflation_rate_variation: 0.0,
            loan_interest_rate_base: 0.0,
            loan_base_payments: 2_500.0,
            income_monthly_base: 3_000.0,
            monthly_expenses: 0.0,
            savings_interest_rate_base: 0.0,
            income_yearly_growth_rate: 0.0,
            ..ParameterSet::default()
        };
        let run = run_scenario("payoff", base, SeededDeviation::new(1));
        let summary = run.summary.expect("non-empty run");

        assert_eq!(summary.months, 24);
        // Balance hits zero on the fourth advance; the third is the last owing month.
        assert_eq!(
            summary.loan_payoff,
            Some(CalendarMonth {
                year: 2023,
                month: 3
            })
        );
        assert_eq!(summary.final_house_value, 10_000.0);
        assert_eq!(summary.final_savings, 24.0 * 3_000.0 - 4.0 * 2_500.0);
        assert_eq!(summary.final_net_worth, 10_000.0 + summary.final_savings);
    }

    #[test]
    fn unpaid_loan_reports_the_final_month() {
        let mut base = quiet_base();
        base.end_year = base.start_year;
        let run = run_scenario("slow", base, SeededDeviation::new(1));
        assert_eq!(
            run.summary.expect("rows").loan_payoff,
            Some(CalendarMonth {
                year: 2024,
                month: 0
            })
        );
    }

    #[test]
    fn overlong_scenario_fails_before_any_run() {
        let base = quiet_base();
        let scenarios = vec![
            Scenario::new("fine", ParameterOverrides::new()),
            Scenario::new(
                "forever",
                ParameterOverrides::new().with(ParameterField::EndYear, 99_999.0),
            ),
        ];
        let err = run_comparison(&base, &scenarios, Seeding::Fixed(1)).unwrap_err();
        assert!(matches!(err, SimError::SpanTooLong { .. }));
    }
}
