use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::policy::ScoringConfig;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegattaId(pub String);

impl fmt::Display for RegattaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RegattaId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub String);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntryId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// 1-based race number, unique within a regatta.
pub type RaceNumber = u32;

/// A series of races scored together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Regatta {
    pub regatta_id: RegattaId,
    pub name: String,
    pub scoring: ScoringConfig,
}

/// One competing boat on the regatta roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub entry_id: EntryId,
    pub regatta_id: RegattaId,
    pub sail_number: String,
    pub boat_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipper_name: Option<String>,
    #[serde(default)]
    pub withdrawn: bool,
}

/// Race metadata. Scoring never depends on `completed`; results are provisional until it is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Race {
    pub number: RaceNumber,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub division: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

impl Race {
    pub fn new(number: RaceNumber) -> Self {
        Self {
            number,
            division: None,
            completed: false,
        }
    }
}

/// Non-finish scoring abbreviations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResultCode {
    #[serde(rename = "DNF")]
    Dnf,
    #[serde(rename = "DNS")]
    Dns,
    #[serde(rename = "DSQ")]
    Dsq,
    #[serde(rename = "OCS")]
    Ocs,
    #[serde(rename = "DNC")]
    Dnc,
    #[serde(rename = "RET")]
    Ret,
}

impl ResultCode {
    pub const fn ordered() -> [Self; 6] {
        [
            Self::Dnf,
            Self::Dns,
            Self::Dsq,
            Self::Ocs,
            Self::Dnc,
            Self::Ret,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Dnf => "DNF",
            Self::Dns => "DNS",
            Self::Dsq => "DSQ",
            Self::Ocs => "OCS",
            Self::Dnc => "DNC",
            Self::Ret => "RET",
        }
    }

    /// Whether the boat was out on the course for this race.
    pub const fn counts_as_sailed(self) -> bool {
        !matches!(self, Self::Dnc | Self::Dns)
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ResultCode {
    type Err = OutcomeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_uppercase();
        Self::ordered()
            .into_iter()
            .find(|code| code.label() == normalized)
            .ok_or_else(|| OutcomeError::UnknownStatus(value.trim().to_string()))
    }
}

/// Status column as it appears on the wire: `finished` or one of the result codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeStatus {
    Finished,
    Code(ResultCode),
}

impl OutcomeStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Finished => "finished",
            Self::Code(code) => code.label(),
        }
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for OutcomeStatus {
    type Err = OutcomeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "finished" | "fin" => Ok(Self::Finished),
            _ => value.parse().map(Self::Code),
        }
    }
}

impl Serialize for OutcomeStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for OutcomeStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// What happened to one entry in one race.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaceOutcome {
    Finished { position: u32 },
    Status(ResultCode),
}

impl RaceOutcome {
    /// Builds an outcome from the loose wire pair, enforcing that exactly one of a finishing
    /// position or a result code is present.
    pub fn from_parts(
        status: Option<OutcomeStatus>,
        position: Option<u32>,
    ) -> Result<Self, OutcomeError> {
        match (status, position) {
            (_, Some(0)) => Err(OutcomeError::ZeroPosition),
            (Some(OutcomeStatus::Finished) | None, Some(position)) => {
                Ok(Self::Finished { position })
            }
            (Some(OutcomeStatus::Finished), None) => Err(OutcomeError::FinishWithoutPosition),
            (Some(OutcomeStatus::Code(code)), None) => Ok(Self::Status(code)),
            (Some(OutcomeStatus::Code(code)), Some(position)) => {
                Err(OutcomeError::PositionWithCode { code, position })
            }
            (None, None) => Err(OutcomeError::MissingStatus),
        }
    }

    pub fn position(self) -> Option<u32> {
        match self {
            Self::Finished { position } => Some(position),
            Self::Status(_) => None,
        }
    }

    pub fn code(self) -> Option<ResultCode> {
        match self {
            Self::Finished { .. } => None,
            Self::Status(code) => Some(code),
        }
    }

    pub fn status(self) -> OutcomeStatus {
        match self {
            Self::Finished { .. } => OutcomeStatus::Finished,
            Self::Status(code) => OutcomeStatus::Code(code),
        }
    }

    pub fn counts_as_sailed(self) -> bool {
        match self {
            Self::Finished { .. } => true,
            Self::Status(code) => code.counts_as_sailed(),
        }
    }

    /// Short form used in results tables: the position, or the code.
    pub fn label(self) -> String {
        match self {
            Self::Finished { position } => position.to_string(),
            Self::Status(code) => code.label().to_string(),
        }
    }
}

impl Serialize for RaceOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.label())
    }
}

/// The atomic fact: (regatta, race, entry) -> outcome, with an optional manual points value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RaceResultRecord", into = "RaceResultRecord")]
pub struct RaceResult {
    pub regatta_id: RegattaId,
    pub race: RaceNumber,
    pub entry_id: EntryId,
    pub outcome: RaceOutcome,
    pub points_override: Option<Decimal>,
}

impl RaceResult {
    pub fn finished(
        regatta_id: RegattaId,
        race: RaceNumber,
        entry_id: EntryId,
        position: u32,
    ) -> Self {
        Self {
            regatta_id,
            race,
            entry_id,
            outcome: RaceOutcome::Finished { position },
            points_override: None,
        }
    }

    pub fn status(
        regatta_id: RegattaId,
        race: RaceNumber,
        entry_id: EntryId,
        code: ResultCode,
    ) -> Self {
        Self {
            regatta_id,
            race,
            entry_id,
            outcome: RaceOutcome::Status(code),
            points_override: None,
        }
    }

    pub fn with_override(mut self, points: Decimal) -> Self {
        self.points_override = Some(points);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RaceResultRecord {
    regatta_id: RegattaId,
    race: RaceNumber,
    entry_id: EntryId,
    #[serde(default)]
    status: Option<OutcomeStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    position: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    points_override: Option<Decimal>,
}

impl TryFrom<RaceResultRecord> for RaceResult {
    type Error = OutcomeError;

    fn try_from(record: RaceResultRecord) -> Result<Self, Self::Error> {
        let submission = ResultSubmission {
            status: record.status,
            position: record.position,
            points_override: record.points_override,
        };
        submission.into_result(record.regatta_id, record.race, record.entry_id)
    }
}

impl From<RaceResult> for RaceResultRecord {
    fn from(result: RaceResult) -> Self {
        Self {
            regatta_id: result.regatta_id,
            race: result.race,
            entry_id: result.entry_id,
            status: Some(result.outcome.status()),
            position: result.outcome.position(),
            points_override: result.points_override,
        }
    }
}

/// Body of a race-committee result submission; the key comes from the request path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSubmission {
    #[serde(default)]
    pub status: Option<OutcomeStatus>,
    #[serde(default)]
    pub position: Option<u32>,
    #[serde(default)]
    pub points_override: Option<Decimal>,
}

impl ResultSubmission {
    pub fn into_result(
        self,
        regatta_id: RegattaId,
        race: RaceNumber,
        entry_id: EntryId,
    ) -> Result<RaceResult, OutcomeError> {
        if race == 0 {
            return Err(OutcomeError::ZeroRace);
        }
        if let Some(points) = self.points_override {
            if points.is_sign_negative() {
                return Err(OutcomeError::NegativeOverride(points));
            }
        }

        Ok(RaceResult {
            regatta_id,
            race,
            entry_id,
            outcome: RaceOutcome::from_parts(self.status, self.position)?,
            points_override: self.points_override,
        })
    }
}

/// Reasons a submitted result cannot be represented.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OutcomeError {
    #[error("unknown result status '{0}'")]
    UnknownStatus(String),
    #[error("a finished result requires a position")]
    FinishWithoutPosition,
    #[error("status {code} cannot carry a finishing position (found {position})")]
    PositionWithCode { code: ResultCode, position: u32 },
    #[error("finishing positions start at 1")]
    ZeroPosition,
    #[error("race numbers start at 1")]
    ZeroRace,
    #[error("either a status or a finishing position is required")]
    MissingStatus,
    #[error("points override must not be negative (found {0})")]
    NegativeOverride(Decimal),
}
