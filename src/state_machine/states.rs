use serde::{Deserialize, Serialize};
use std::fmt;

/// Tracking status of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingStatus {
    /// Handed to the processor, acceptance not yet recorded
    Submitted,
    /// Accepted by the processor and awaiting an outcome
    Processing,
    /// Processor reported success
    Completed,
    /// Processor reported failure, or checks were exhausted
    Failed,
    /// Request outlived the maximum age
    TimedOut,
}

impl TrackingStatus {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::TimedOut)
    }

    /// Check if the poller should still query the processor for this state
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Submitted | Self::Processing)
    }

    pub const ACTIVE: [TrackingStatus; 2] = [Self::Submitted, Self::Processing];
    pub const TERMINAL: [TrackingStatus; 3] = [Self::Completed, Self::Failed, Self::TimedOut];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
        }
    }
}

impl fmt::Display for TrackingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TrackingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "submitted" => Ok(Self::Submitted),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "timed_out" => Ok(Self::TimedOut),
            _ => Err(format!("Invalid tracking status: {s}")),
        }
    }
}

/// External processor status, after mapping its raw vocabulary
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExternalStatus {
    Completed,
    Failed,
    InProgress,
    /// A string outside the configured vocabulary; treated as non-terminal
    Unknown(String),
}

impl ExternalStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for ExternalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Unknown(raw) => write!(f, "unknown({raw})"),
        }
    }
}
