use std::fmt;

use crate::Scenario;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    Failed(String),
}

impl Outcome {
    pub fn is_passed(&self) -> bool {
        matches!(self, Outcome::Passed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioReport {
    pub scenario: Scenario,
    pub outcome: Outcome,
}

/// Outcomes of one suite run, in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuiteReport {
    pub reports: Vec<ScenarioReport>,
}

impl SuiteReport {
    pub fn push(&mut self, scenario: Scenario, outcome: Outcome) {
        self.reports.push(ScenarioReport { scenario, outcome });
    }

    pub fn all_passed(&self) -> bool {
        self.reports.iter().all(|report| report.outcome.is_passed())
    }

    pub fn passed(&self) -> impl Iterator<Item = Scenario> + '_ {
        self.reports
            .iter()
            .filter(|report| report.outcome.is_passed())
            .map(|report| report.scenario)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ScenarioReport> {
        self.reports
            .iter()
            .filter(|report| !report.outcome.is_passed())
    }

    pub fn outcome_of(&self, scenario: Scenario) -> Option<&Outcome> {
        self.reports
            .iter()
            .find(|report| report.scenario == scenario)
            .map(|report| &report.outcome)
    }
}

impl fmt::Display for SuiteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for report in &self.reports {
            match &report.outcome {
                Outcome::Passed => writeln!(f, "✅ {}", report.scenario.description())?,
                Outcome::Failed(reason) => {
                    writeln!(f, "❌ {}: {}", report.scenario.description(), reason)?
                }
            }
        }
        write!(
            f,
            "{} passed, {} failed",
            self.passed().count(),
            self.failures().count()
        )
    }
}
