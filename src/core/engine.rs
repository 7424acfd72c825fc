use tracing::debug;

use super::deviation::{DeviationSource, EntropyDeviation};
use super::error::{Result, SimError};
use super::types::{EngineState, ParameterSet, Snapshot};

const MONTHS_PER_YEAR: u32 = 12;
/// Upper bound on the snapshot buffer reserved up front.
const MAX_PREALLOCATED_MONTHS: usize = 1 << 16;

/// Month-by-month projection bound to a single parameter set.
///
/// The engine owns a copy of its parameters and its deviation source, so
/// independent engines never share state.
#[derive(Debug)]
pub struct Engine<D = EntropyDeviation> {
    params: ParameterSet,
    deviation: D,
    state: EngineState,
    rows: Vec<Snapshot>,
}

impl Engine<EntropyDeviation> {
    pub fn new(params: ParameterSet) -> Self {
        Self::with_deviation(params, EntropyDeviation::new())
    }
}

impl<D: DeviationSource> Engine<D> {
    pub fn with_deviation(params: ParameterSet, deviation: D) -> Self {
        let state = EngineState {
            loan_principal: params.initial_owed_on_house,
            savings: 0.0,
            house_value: params.initial_owed_on_house,
            equity: 0.0,
            inflation_multiplier: 1.0,
            year: params.start_year,
            month: 0,
            finished: params.start_year > params.end_year,
        };
        let capacity = expected_months(&params);
        Self {
            params,
            deviation,
            state,
            rows: Vec::with_capacity(capacity),
        }
    }

    pub fn parameters(&self) -> &ParameterSet {
        &self.params
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        self.state.finished
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.rows
    }

    pub fn into_snapshots(self) -> Vec<Snapshot> {
        self.rows
    }

    /// Simulates one month and records it. Errors once the engine has
    /// finished, leaving state and series untouched.
    pub fn advance_month(&mut self) -> Result<&Snapshot> {
        if self.state.finished {
            return Err(SimError::EngineFinished);
        }

        let p = &self.params;
        let s = &mut self.state;

        let deviation = self.deviation.next_deviation(p.inflation_rate_variation);
        s.inflation_multiplier *= 1.0 + (p.inflation_rate_base + deviation) / 12.0;
        s.house_value = p.initial_owed_on_house * s.inflation_multiplier;

        let elapsed_years = s.year.saturating_sub(p.start_year);
        let income = p.income_monthly_base * (1.0 + p.income_yearly_growth_rate).powi(elapsed_years);
        let expenses = p.monthly_expenses * s.inflation_multiplier;
        let savings_growth = 1.0 + p.savings_interest_rate_base / 12.0;

        if s.loan_principal > 0.0 {
            let total_payment = p.loan_base_payments + p.loan_extra_payment;
            let interest = s.loan_principal * (p.loan_interest_rate_base / 12.0);
            // Negative when the payment does not cover interest; the balance grows.
            let principal_payment = (total_payment - interest).min(s.loan_principal);
            s.loan_principal -= principal_payment;
            s.equity = s.house_value - s.loan_principal;
            s.savings = (s.savings + income - total_payment - expenses) * savings_growth;

            if s.loan_principal <= 0.0 {
                debug!(
                    year = s.year,
                    month = s.month,
                    equity = s.equity,
                    "loan paid off"
                );
            }
        } else {
            // Equity keeps its last loan-outstanding value.
            s.savings = (s.savings + income - expenses) * savings_growth;
        }

        s.month += 1;
        if s.month >= MONTHS_PER_YEAR {
            s.month = 0;
            match s.year.checked_add(1) {
                Some(next) => s.year = next,
                // No later year exists, so the run ends here.
                None => s.finished = true,
            }
        }

        if s.year > p.end_year {
            s.finished = true;
        }
        if s.finished {
            debug!(
                months = self.rows.len() + 1,
                savings = s.savings,
                loan_principal = s.loan_principal,
                "simulation finished"
            );
        }

        self.rows.push(Snapshot {
            year: s.year,
            month: s.month,
            loan_principal: s.loan_principal,
            savings: s.savings,
            house_value: s.house_value,
            equity: s.equity,
            inflation_multiplier: s.inflation_multiplier,
        });
        Ok(&self.rows[self.rows.len() - 1])
    }

    /// Advances until finished and returns the full series.
    pub fn run_to_completion(&mut self) -> &[Snapshot] {
        while !self.state.finished {
            if self.advance_month().is_err() {
                break;
            }
        }
        &self.rows
    }
}

fn expected_months(params: &ParameterSet) -> usize {
    if params.end_year < params.start_year {
        return 0;
    }
    let years = (params.end_year as i64 - params.start_year as i64 + 1) as usize;
    years
        .saturating_mul(MONTHS_PER_YEAR as usize)
        .min(MAX_PREALLOCATED_MONTHS)
}
