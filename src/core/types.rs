use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use super::error::{Result, SimError};

/// Years accepted by `startYear` / `endYear` overrides.
pub const MIN_YEAR: i32 = -100_000;
pub const MAX_YEAR: i32 = 100_000;

/// Longest run, in years, that the API and CLI will simulate.
pub const MAX_SIMULATION_YEARS: i64 = 1_000;

/// Economic constants driving one projection run.
///
/// Rates are fractional per year (`0.03` is 3%/yr). Currency amounts are
/// monthly unless the name says otherwise.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterSet {
    pub start_year: i32,
    pub end_year: i32,
    pub initial_owed_on_house: f64,
    pub inflation_rate_base: f64,
    pub inflation_rate_variation: f64,
    pub loan_interest_rate_base: f64,
    /// Informational only; payoff emerges from payment vs. interest.
    pub loan_repayment_years: u32,
    pub loan_base_payments: f64,
    pub loan_extra_payment: f64,
    pub income_monthly_base: f64,
    pub savings_interest_rate_base: f64,
    pub income_yearly_growth_rate: f64,
    pub monthly_expenses: f64,
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self {
            start_year: 2023,
            end_year: 2050,
            initial_owed_on_house: 500_000.0,
            inflation_rate_base: 0.03,
            inflation_rate_variation: 0.005,
            loan_interest_rate_base: 0.035,
            loan_repayment_years: 30,
            loan_base_payments: 2_500.0,
            loan_extra_payment: 0.0,
            income_monthly_base: 8_000.0,
            savings_interest_rate_base: 0.01,
            income_yearly_growth_rate: 0.03,
            monthly_expenses: 3_000.0,
        }
    }
}

impl ParameterSet {
    pub fn get(&self, field: ParameterField) -> f64 {
        match field {
            ParameterField::StartYear => self.start_year as f64,
            ParameterField::EndYear => self.end_year as f64,
            ParameterField::InitialOwedOnHouse => self.initial_owed_on_house,
            ParameterField::InflationRateBase => self.inflation_rate_base,
            ParameterField::InflationRateVariation => self.inflation_rate_variation,
            ParameterField::LoanInterestRateBase => self.loan_interest_rate_base,
            ParameterField::LoanRepaymentYears => self.loan_repayment_years as f64,
            ParameterField::LoanBasePayments => self.loan_base_payments,
            ParameterField::LoanExtraPayment => self.loan_extra_payment,
            ParameterField::IncomeMonthlyBase => self.income_monthly_base,
            ParameterField::SavingsInterestRateBase => self.savings_interest_rate_base,
            ParameterField::IncomeYearlyGrowthRate => self.income_yearly_growth_rate,
            ParameterField::MonthlyExpenses => self.monthly_expenses,
        }
    }

    /// Returns a copy with one field replaced.
    pub fn with_field(&self, field: ParameterField, value: f64) -> Result<Self> {
        let mut next = self.clone();
        next.set(field, value)?;
        Ok(next)
    }

    /// Returns an independent copy with every field in `overrides` replaced.
    /// The receiver is never touched.
    pub fn derive_with(&self, overrides: &ParameterOverrides) -> Result<Self> {
        let mut next = self.clone();
        for (&field, &value) in overrides.iter() {
            next.set(field, value)?;
        }
        Ok(next)
    }

    /// String-keyed variant of [`ParameterSet::derive_with`]. Unknown names
    /// are rejected rather than ignored.
    pub fn derive_with_named<'a, I>(&self, overrides: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let overrides = ParameterOverrides::from_named(overrides)?;
        self.derive_with(&overrides)
    }

    /// Number of simulated years; zero when `end_year < start_year`.
    pub fn span_years(&self) -> i64 {
        (self.end_year as i64 - self.start_year as i64 + 1).max(0)
    }

    /// Rejects runs longer than [`MAX_SIMULATION_YEARS`].
    pub fn check_span(&self) -> Result<()> {
        let years = self.span_years();
        if years > MAX_SIMULATION_YEARS {
            return Err(SimError::SpanTooLong {
                years,
                max: MAX_SIMULATION_YEARS,
            });
        }
        Ok(())
    }

    fn set(&mut self, field: ParameterField, value: f64) -> Result<()> {
        match field {
            ParameterField::StartYear => self.start_year = year_value(field, value)?,
            ParameterField::EndYear => self.end_year = year_value(field, value)?,
            ParameterField::InitialOwedOnHouse => self.initial_owed_on_house = value,
            ParameterField::InflationRateBase => self.inflation_rate_base = value,
            ParameterField::InflationRateVariation => self.inflation_rate_variation = value,
            ParameterField::LoanInterestRateBase => self.loan_interest_rate_base = value,
            ParameterField::LoanRepaymentYears => {
                self.loan_repayment_years = whole_value(field, value, 0.0, u32::MAX as f64)? as u32
            }
            ParameterField::LoanBasePayments => self.loan_base_payments = value,
            ParameterField::LoanExtraPayment => self.loan_extra_payment = value,
            ParameterField::IncomeMonthlyBase => self.income_monthly_base = value,
            ParameterField::SavingsInterestRateBase => self.savings_interest_rate_base = value,
            ParameterField::IncomeYearlyGrowthRate => self.income_yearly_growth_rate = value,
            ParameterField::MonthlyExpenses => self.monthly_expenses = value,
        }
        Ok(())
    }
}

fn year_value(field: ParameterField, value: f64) -> Result<i32> {
    whole_value(field, value, MIN_YEAR as f64, MAX_YEAR as f64).map(|v| v as i32)
}

fn whole_value(field: ParameterField, value: f64, min: f64, max: f64) -> Result<f64> {
    if !value.is_finite() || value.fract() != 0.0 {
        return Err(SimError::InvalidFieldValue {
            field: field.name(),
            value,
            reason: "must be a whole number",
        });
    }
    if value < min || value > max {
        return Err(SimError::InvalidFieldValue {
            field: field.name(),
            value,
            reason: "out of range",
        });
    }
    Ok(value)
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum ParameterField {
    StartYear,
    EndYear,
    InitialOwedOnHouse,
    InflationRateBase,
    InflationRateVariation,
    LoanInterestRateBase,
    LoanRepaymentYears,
    LoanBasePayments,
    LoanExtraPayment,
    IncomeMonthlyBase,
    SavingsInterestRateBase,
    IncomeYearlyGrowthRate,
    MonthlyExpenses,
}

impl ParameterField {
    pub const ALL: [ParameterField; 13] = [
        ParameterField::StartYear,
        ParameterField::EndYear,
        ParameterField::InitialOwedOnHouse,
        ParameterField::InflationRateBase,
        ParameterField::InflationRateVariation,
        ParameterField::LoanInterestRateBase,
        ParameterField::LoanRepaymentYears,
        ParameterField::LoanBasePayments,
        ParameterField::LoanExtraPayment,
        ParameterField::IncomeMonthlyBase,
        ParameterField::SavingsInterestRateBase,
        ParameterField::IncomeYearlyGrowthRate,
        ParameterField::MonthlyExpenses,
    ];

    /// External (camelCase) name used by the API and CLI.
    pub fn name(self) -> &'static str {
        match self {
            ParameterField::StartYear => "startYear",
            ParameterField::EndYear => "endYear",
            ParameterField::InitialOwedOnHouse => "initialOwedOnHouse",
            ParameterField::InflationRateBase => "inflationRateBase",
            ParameterField::InflationRateVariation => "inflationRateVariation",
            ParameterField::LoanInterestRateBase => "loanInterestRateBase",
            ParameterField::LoanRepaymentYears => "loanRepaymentYears",
            ParameterField::LoanBasePayments => "loanBasePayments",
            ParameterField::LoanExtraPayment => "loanExtraPayment",
            ParameterField::IncomeMonthlyBase => "incomeMonthlyBase",
            ParameterField::SavingsInterestRateBase => "savingsInterestRateBase",
            ParameterField::IncomeYearlyGrowthRate => "incomeYearlyGrowthRate",
            ParameterField::MonthlyExpenses => "monthlyExpenses",
        }
    }

    fn snake_name(self) -> &'static str {
        match self {
            ParameterField::StartYear => "start_year",
            ParameterField::EndYear => "end_year",
            ParameterField::InitialOwedOnHouse => "initial_owed_on_house",
            ParameterField::InflationRateBase => "inflation_rate_base",
            ParameterField::InflationRateVariation => "inflation_rate_variation",
            ParameterField::LoanInterestRateBase => "loan_interest_rate_base",
            ParameterField::LoanRepaymentYears => "loan_repayment_years",
            ParameterField::LoanBasePayments => "loan_base_payments",
            ParameterField::LoanExtraPayment => "loan_extra_payment",
            ParameterField::IncomeMonthlyBase => "income_monthly_base",
            ParameterField::SavingsInterestRateBase => "savings_interest_rate_base",
            ParameterField::IncomeYearlyGrowthRate => "income_yearly_growth_rate",
            ParameterField::MonthlyExpenses => "monthly_expenses",
        }
    }
}

impl fmt::Display for ParameterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ParameterField {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim();
        ParameterField::ALL
            .into_iter()
            .find(|field| field.name() == key || field.snake_name() == key)
            .ok_or_else(|| SimError::UnknownField(key.to_string()))
    }
}

/// A partial mapping of field to value, applied over a base set.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "BTreeMap<String, f64>")]
pub struct ParameterOverrides(BTreeMap<ParameterField, f64>);

impl ParameterOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_named<'a, I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let mut overrides = Self::new();
        for (name, value) in pairs {
            overrides.insert(name.parse()?, value);
        }
        Ok(overrides)
    }

    pub fn with(mut self, field: ParameterField, value: f64) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: ParameterField, value: f64) -> Option<f64> {
        self.0.insert(field, value)
    }

    pub fn get(&self, field: ParameterField) -> Option<f64> {
        self.0.get(&field).copied()
    }

    pub fn contains(&self, field: ParameterField) -> bool {
        self.0.contains_key(&field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ParameterField, &f64)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<BTreeMap<String, f64>> for ParameterOverrides {
    type Error = SimError;

    fn try_from(raw: BTreeMap<String, f64>) -> Result<Self> {
        Self::from_named(raw.iter().map(|(k, v)| (k.as_str(), *v)))
    }
}

impl Serialize for ParameterOverrides {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (field, value) in &self.0 {
            map.serialize_entry(field.name(), value)?;
        }
        map.end()
    }
}

/// Zero-based month within a calendar year.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Serialize)]
pub struct CalendarMonth {
    pub year: i32,
    pub month: u32,
}

impl CalendarMonth {
    /// `"2031-4"` style label, with the month shown one-based.
    pub fn label(self) -> String {
        format!("{}-{}", self.year, self.month + 1)
    }
}

/// One month's recorded state, taken after calendar advancement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub year: i32,
    pub month: u32,
    pub loan_principal: f64,
    pub savings: f64,
    pub house_value: f64,
    pub equity: f64,
    pub inflation_multiplier: f64,
}

impl Snapshot {
    pub fn calendar(&self) -> CalendarMonth {
        CalendarMonth {
            year: self.year,
            month: self.month,
        }
    }

    pub fn net_worth(&self) -> f64 {
        self.equity + self.savings
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineState {
    pub loan_principal: f64,
    pub savings: f64,
    pub house_value: f64,
    pub equity: f64,
    pub inflation_multiplier: f64,
    pub year: i32,
    pub month: u32,
    pub finished: bool,
}

/// Headline numbers of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub months: usize,
    pub loan_payoff: Option<CalendarMonth>,
    pub final_net_worth: f64,
    pub final_savings: f64,
    pub final_house_value: f64,
}

impl RunSummary {
    /// `None` for an empty series.
    ///
    /// `loan_payoff` is the last month that still owed at least 1. A loan
    /// that is never paid off therefore reports the final month, and a loan
    /// that never owed 1 reports `None`.
    pub fn from_snapshots(rows: &[Snapshot]) -> Option<Self> {
        let last = rows.last()?;
        let loan_payoff = rows
            .iter()
            .rfind(|row| row.loan_principal >= 1.0)
            .map(Snapshot::calendar);
        Some(Self {
            months: rows.len(),
            loan_payoff,
            final_net_worth: last.net_worth(),
            final_savings: last.savings,
            final_house_value: last.house_value,
        })
    }
}
