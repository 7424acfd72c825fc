mod comparison;
mod deviation;
mod engine;
mod error;
mod types;

pub use comparison::{
    Comparison, SavingsRow, Scenario, ScenarioRun, Seeding, run_comparison, run_scenario,
};
pub use deviation::{
    DeviationSource, EntropyDeviation, FixedDeviations, NoDeviation, SeededDeviation,
};
pub use engine::Engine;
pub use error::{Result, SimError};
pub use types::{
    CalendarMonth, EngineState, MAX_SIMULATION_YEARS, MAX_YEAR, MIN_YEAR, ParameterField,
    ParameterOverrides, ParameterSet, RunSummary, Snapshot,
};
