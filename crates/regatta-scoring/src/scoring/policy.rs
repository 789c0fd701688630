use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::domain::ResultCode;

/// One step of the discard schedule: from `from_races` scored races on, `discards` apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscardStep {
    pub from_races: u32,
    pub discards: u32,
}

/// Monotonic step function from races scored to discards allowed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiscardSchedule(pub Vec<DiscardStep>);

impl DiscardSchedule {
    pub fn from_steps<I>(steps: I) -> Self
    where
        I: IntoIterator<Item = (u32, u32)>,
    {
        Self(
            steps
                .into_iter()
                .map(|(from_races, discards)| DiscardStep {
                    from_races,
                    discards,
                })
                .collect(),
        )
    }

    /// A schedule that never grants a discard.
    pub fn none() -> Self {
        Self::from_steps([(1, 0)])
    }

    pub fn steps(&self) -> &[DiscardStep] {
        &self.0
    }

    pub fn discards_for(&self, races_scored: u32) -> u32 {
        self.0
            .iter()
            .take_while(|step| step.from_races <= races_scored)
            .last()
            .map(|step| step.discards)
            .unwrap_or(0)
    }

    /// First race count at which any discard applies.
    pub fn first_discard_threshold(&self) -> Option<u32> {
        self.0
            .iter()
            .find(|step| step.discards > 0)
            .map(|step| step.from_races)
    }
}

/// Which fleet count a non-finish score is derived from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FleetBasis {
    /// Boats that finished the race in question.
    Finishers,
    /// Every entry on the regatta roster.
    #[default]
    ConfirmedEntries,
}

/// Points for non-finish codes: `count(basis) + increment`, optionally per code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPointPolicy {
    #[serde(default)]
    pub basis: FleetBasis,
    #[serde(default = "default_increment")]
    pub increment: u32,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub overrides: BTreeMap<ResultCode, FleetBasis>,
}

fn default_increment() -> u32 {
    1
}

impl Default for StatusPointPolicy {
    fn default() -> Self {
        Self {
            basis: FleetBasis::default(),
            increment: default_increment(),
            overrides: BTreeMap::new(),
        }
    }
}

impl StatusPointPolicy {
    pub fn basis_for(&self, code: ResultCode) -> FleetBasis {
        self.overrides.get(&code).copied().unwrap_or(self.basis)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreakPolicy {
    /// Count of firsts, seconds, ... then the last race, then earlier races backwards.
    #[default]
    Countback,
    /// Last race, then earlier races backwards.
    HeadToHead,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalPolicy {
    /// Keep withdrawn entries; races not sailed are scored DNC.
    #[default]
    Retain,
    /// Leave withdrawn entries out of the standings.
    Exclude,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnstartedPolicy {
    /// List entries with no recorded result last, with zero points.
    #[default]
    RankLast,
    Exclude,
}

/// Per-regatta scoring configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default)]
    pub discard_schedule: DiscardSchedule,
    #[serde(default)]
    pub status_points: StatusPointPolicy,
    #[serde(default)]
    pub tie_break: TieBreakPolicy,
    #[serde(default)]
    pub min_races_for_discard: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_races: Option<u32>,
    #[serde(default)]
    pub withdrawal: WithdrawalPolicy,
    #[serde(default)]
    pub unstarted: UnstartedPolicy,
}

impl ScoringConfig {
    pub fn with_schedule<I>(steps: I) -> Self
    where
        I: IntoIterator<Item = (u32, u32)>,
    {
        Self {
            discard_schedule: DiscardSchedule::from_steps(steps),
            ..Self::default()
        }
    }
}
