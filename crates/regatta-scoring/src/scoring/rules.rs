//! Scoring rules resolver: discard counts and non-finish point values for a configuration.

use rust_decimal::Decimal;
use std::collections::BTreeMap;

use super::domain::ResultCode;
use super::errors::ConfigurationIssue;
use super::policy::{FleetBasis, ScoringConfig, TieBreakPolicy, UnstartedPolicy, WithdrawalPolicy};

/// Validated view over a regatta's scoring configuration.
#[derive(Debug, Clone)]
pub struct ScoringRules {
    config: ScoringConfig,
}

impl ScoringRules {
    pub fn resolve(config: &ScoringConfig) -> Result<Self, ConfigurationIssue> {
        validate(config)?;
        Ok(Self {
            config: config.clone(),
        })
    }

    /// Discards applicable once `races_scored` races have at least one result.
    pub fn discards_for(&self, races_scored: u32) -> u32 {
        self.config.discard_schedule.discards_for(races_scored)
    }

    pub fn min_races_for_discard(&self) -> u32 {
        self.config.min_races_for_discard
    }

    pub fn tie_break(&self) -> TieBreakPolicy {
        self.config.tie_break
    }

    pub fn withdrawal(&self) -> WithdrawalPolicy {
        self.config.withdrawal
    }

    pub fn unstarted(&self) -> UnstartedPolicy {
        self.config.unstarted
    }

    /// Resolves the non-finish point table for one race.
    pub fn status_points(&self, finishers: u32, confirmed_entries: u32) -> StatusPoints {
        let policy = &self.config.status_points;
        let values = ResultCode::ordered()
            .into_iter()
            .map(|code| {
                let fleet = match policy.basis_for(code) {
                    FleetBasis::Finishers => finishers,
                    FleetBasis::ConfirmedEntries => confirmed_entries,
                };
                let points = u64::from(fleet) + u64::from(policy.increment);
                (code, Decimal::from(points))
            })
            .collect();

        StatusPoints { values }
    }
}

/// Point value per result code for a single race.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusPoints {
    values: BTreeMap<ResultCode, Decimal>,
}

impl StatusPoints {
    pub fn points_for(&self, code: ResultCode) -> Decimal {
        self.values.get(&code).copied().unwrap_or(Decimal::ZERO)
    }
}

pub fn validate(config: &ScoringConfig) -> Result<(), ConfigurationIssue> {
    let steps = config.discard_schedule.steps();
    if steps.is_empty() {
        return Err(ConfigurationIssue::MissingDiscardSchedule);
    }

    let mut previous: Option<(u32, u32)> = None;
    for step in steps {
        if step.from_races == 0 {
            return Err(ConfigurationIssue::ZeroThreshold);
        }
        if step.discards >= step.from_races {
            return Err(ConfigurationIssue::DiscardsExceedRaces {
                from_races: step.from_races,
                discards: step.discards,
            });
        }
        if let Some((from_races, discards)) = previous {
            if step.from_races <= from_races {
                return Err(ConfigurationIssue::UnorderedSchedule {
                    previous: from_races,
                    next: step.from_races,
                });
            }
            if step.discards < discards {
                return Err(ConfigurationIssue::DecreasingDiscards {
                    from_races: step.from_races,
                });
            }
        }
        previous = Some((step.from_races, step.discards));
    }

    if let Some(scheduled) = config.scheduled_races {
        if scheduled == 0 {
            return Err(ConfigurationIssue::ZeroScheduledRaces);
        }
        let grants_discards = config.discard_schedule.first_discard_threshold().is_some();
        if grants_discards && config.min_races_for_discard > scheduled {
            return Err(ConfigurationIssue::UnreachableDiscardThreshold {
                min_races: config.min_races_for_discard,
                scheduled,
            });
        }
    }

    Ok(())
}
