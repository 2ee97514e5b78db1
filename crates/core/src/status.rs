//! Run-request status and its transition graph.
//!
//! The enum discriminants match the seed rows of the
//! `run_request_statuses` lookup table (1-based).
//!
//! ```text
//! CREATED ──► RUNNING ──► PASSED | FAILED | ERRORED
//!    │                        ▲
//!    └────────────────────────┘   (executor failed before pickup)
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Status ID type matching SMALLINT in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:literal => $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Every variant in seed order.
            pub const ALL: &'static [$name] = &[$( $name::$variant ),+];

            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }

            /// Resolve a database status ID back to a variant.
            pub fn from_id(id: StatusId) -> Option<Self> {
                match id {
                    $( $val => Some($name::$variant), )+
                    _ => None,
                }
            }

            /// Upper-case wire name (also the `name` column of the lookup table).
            pub fn as_str(self) -> &'static str {
                match self {
                    $( $name::$variant => $label, )+
                }
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $label => Ok($name::$variant), )+
                    other => Err(format!("\"{other}\" is not a valid choice.")),
                }
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

define_status_enum! {
    /// Lifecycle status of a run request.
    RunStatus {
        Created = 1 => "CREATED",
        Running = 2 => "RUNNING",
        Passed = 3 => "PASSED",
        Failed = 4 => "FAILED",
        Errored = 5 => "ERRORED",
    }
}

impl RunStatus {
    /// PASSED, FAILED and ERRORED have no outgoing transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Passed | Self::Failed | Self::Errored)
    }

    /// Whether the executor may move a request from `self` to `next`.
    ///
    /// `CREATED` is only ever set at insertion, so nothing transitions into
    /// it. Self-loops are rejected.
    pub fn can_transition_to(self, next: RunStatus) -> bool {
        match self {
            Self::Created => next == Self::Running || next.is_terminal(),
            Self::Running => next.is_terminal(),
            Self::Passed | Self::Failed | Self::Errored => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_status_ids_match_seed_data() {
        assert_eq!(RunStatus::Created.id(), 1);
        assert_eq!(RunStatus::Running.id(), 2);
        assert_eq!(RunStatus::Passed.id(), 3);
        assert_eq!(RunStatus::Failed.id(), 4);
        assert_eq!(RunStatus::Errored.id(), 5);
    }

    #[test]
    fn status_id_round_trips() {
        for status in RunStatus::ALL {
            assert_eq!(RunStatus::from_id(status.id()), Some(*status));
        }
        assert_eq!(RunStatus::from_id(0), None);
        assert_eq!(RunStatus::from_id(6), None);
    }

    #[test]
    fn status_into_status_id() {
        let id: StatusId = RunStatus::Running.into();
        assert_eq!(id, 2);
    }

    #[test]
    fn created_may_move_to_running_or_any_terminal() {
        assert!(RunStatus::Created.can_transition_to(RunStatus::Running));
        assert!(RunStatus::Created.can_transition_to(RunStatus::Passed));
        assert!(RunStatus::Created.can_transition_to(RunStatus::Failed));
        assert!(RunStatus::Created.can_transition_to(RunStatus::Errored));
        assert!(!RunStatus::Created.can_transition_to(RunStatus::Created));
    }

    #[test]
    fn running_only_moves_to_terminal() {
        assert!(!RunStatus::Running.can_transition_to(RunStatus::Created));
        assert!(!RunStatus::Running.can_transition_to(RunStatus::Running));
        assert!(RunStatus::Running.can_transition_to(RunStatus::Passed));
        assert!(RunStatus::Running.can_transition_to(RunStatus::Failed));
        assert!(RunStatus::Running.can_transition_to(RunStatus::Errored));
    }

    #[test]
    fn terminal_states_have_no_outgoing_transitions() {
        for from in RunStatus::ALL.iter().filter(|s| s.is_terminal()) {
            for to in RunStatus::ALL {
                assert!(!from.can_transition_to(*to), "{from} -> {to} must be rejected");
            }
        }
    }

    #[test]
    fn serializes_as_upper_case_name() {
        let json = serde_json::to_value(RunStatus::Created).unwrap();
        assert_eq!(json, "CREATED");
        let parsed: RunStatus = serde_json::from_value(serde_json::json!("ERRORED")).unwrap();
        assert_eq!(parsed, RunStatus::Errored);
    }

    #[test]
    fn unknown_name_is_rejected() {
        let err = "DONE".parse::<RunStatus>().unwrap_err();
        assert_eq!(err, "\"DONE\" is not a valid choice.");
        assert!(serde_json::from_value::<RunStatus>(serde_json::json!("running")).is_err());
    }
}
