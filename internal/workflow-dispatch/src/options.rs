//! Caller-facing trigger and schedule options.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::DispatchError;
use crate::proto;

/// Free-form metadata attached to a run.
pub type AdditionalMetadata = Map<String, Value>;

/// Options for a single workflow trigger.
///
/// Values set here override what would otherwise be derived from the
/// [`ExecutionContext`](crate::ExecutionContext) of the caller. Derive
/// variants with struct update syntax rather than mutating a shared value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerWorkflowOptions {
    pub parent_id: Option<String>,
    pub parent_step_run_id: Option<String>,
    /// Explicit spawn index. Used for deterministic replays; when unset an
    /// index is allocated for the calling run.
    pub child_index: Option<u32>,
    pub child_key: Option<String>,
    pub namespace: Option<String>,
    /// Pin the new run to the worker of the calling step.
    pub sticky: bool,
    pub desired_worker_id: Option<String>,
    pub additional_metadata: AdditionalMetadata,
    /// Idempotency key. Sent as the child key when `child_key` is unset.
    pub key: Option<String>,
    pub priority: Option<i32>,
}

/// Options accepted by scheduled triggers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleTriggerWorkflowOptions {
    pub parent_id: Option<String>,
    pub parent_step_run_id: Option<String>,
    pub child_index: Option<u32>,
    pub child_key: Option<String>,
    pub namespace: Option<String>,
    pub additional_metadata: AdditionalMetadata,
    pub priority: Option<i32>,
}

/// One entry of a bulk trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRunTriggerConfig {
    pub workflow_name: String,
    pub input: Value,
    #[serde(default)]
    pub options: TriggerWorkflowOptions,
}

impl WorkflowRunTriggerConfig {
    pub fn new(workflow_name: impl Into<String>, input: Value) -> Self {
        Self {
            workflow_name: workflow_name.into(),
            input,
            options: TriggerWorkflowOptions::default(),
        }
    }

    pub fn with_options(mut self, options: TriggerWorkflowOptions) -> Self {
        self.options = options;
        self
    }
}

/// Window over which a rate limit applies.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum RateLimitDuration {
    #[default]
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl From<RateLimitDuration> for proto::RateLimitDuration {
    fn from(duration: RateLimitDuration) -> Self {
        match duration {
            RateLimitDuration::Second => Self::Second,
            RateLimitDuration::Minute => Self::Minute,
            RateLimitDuration::Hour => Self::Hour,
            RateLimitDuration::Day => Self::Day,
            RateLimitDuration::Week => Self::Week,
            RateLimitDuration::Month => Self::Month,
            RateLimitDuration::Year => Self::Year,
        }
    }
}

/// A point in time at which a scheduled run should start.
#[derive(Debug, Clone, PartialEq)]
pub enum Schedule {
    At(DateTime<Utc>),
    /// Already in wire form.
    Timestamp(proto::Timestamp),
}

impl Schedule {
    /// Converts to the wire timestamp, truncating sub-second precision to
    /// whole nanoseconds.
    pub fn to_timestamp(&self) -> Result<proto::Timestamp, DispatchError> {
        match self {
            Self::At(at) => Ok(proto::Timestamp {
                seconds: at.timestamp(),
                // `timestamp_subsec_nanos` is below 1_000_000_000 except during
                // a leap second, which the wire format cannot represent.
                nanos: at.timestamp_subsec_nanos().min(999_999_999) as i32,
            }),
            Self::Timestamp(timestamp) => {
                if !(0..1_000_000_000).contains(&timestamp.nanos) {
                    return Err(DispatchError::Validation(format!(
                        "Invalid schedule timestamp: nanos must be in [0, 1e9), got {}",
                        timestamp.nanos
                    )));
                }
                Ok(timestamp.clone())
            }
        }
    }
}

impl From<DateTime<Utc>> for Schedule {
    fn from(at: DateTime<Utc>) -> Self {
        Self::At(at)
    }
}

impl From<proto::Timestamp> for Schedule {
    fn from(timestamp: proto::Timestamp) -> Self {
        Self::Timestamp(timestamp)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn test_calendar_timestamp_truncates_to_nanos() {
        let at = NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.and_hms_milli_opt(0, 0, 0, 250))
            .expect("valid date")
            .and_utc();
        let timestamp = Schedule::from(at).to_timestamp().expect("convertible");
        assert_eq!(timestamp.seconds, 1_704_067_200);
        assert_eq!(timestamp.nanos, 250_000_000);
    }

    #[test]
    fn test_wire_timestamp_passes_through() {
        let wire = proto::Timestamp {
            seconds: 1_704_067_200,
            nanos: 5,
        };
        assert_eq!(
            Schedule::from(wire.clone()).to_timestamp().expect("valid"),
            wire
        );
    }

    #[test]
    fn test_wire_timestamp_with_bad_nanos_is_rejected() {
        let wire = proto::Timestamp {
            seconds: 0,
            nanos: -1,
        };
        let err = Schedule::Timestamp(wire)
            .to_timestamp()
            .expect_err("negative nanos must be rejected");
        assert!(matches!(err, DispatchError::Validation(_)), "{err:?}");
    }

    #[test]
    fn test_rate_limit_duration_parsing_and_wire_values() {
        assert_eq!(
            "Hour".parse::<RateLimitDuration>().expect("parses"),
            RateLimitDuration::Hour
        );
        assert_eq!(RateLimitDuration::Week.to_string(), "week");
        assert_eq!(
            proto::RateLimitDuration::from(RateLimitDuration::Year) as i32,
            6
        );
        assert_eq!(
            proto::RateLimitDuration::from(RateLimitDuration::default()) as i32,
            0
        );
    }
}
