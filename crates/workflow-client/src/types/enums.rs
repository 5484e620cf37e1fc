/*
[INPUT]:  API schema definitions and serde requirements
[OUTPUT]: Typed Rust enums with serialization support
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When API schema changes or new types added
*/

use serde::{Deserialize, Serialize};

/// Which task list to query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskScope {
    /// Tasks assigned to the current user
    #[serde(rename = "my")]
    Mine,
    /// Tasks the current user may claim
    Candidate,
}

impl TaskScope {
    pub fn path_segment(&self) -> &'static str {
        match self {
            TaskScope::Mine => "my",
            TaskScope::Candidate => "candidate",
        }
    }
}

/// Which process instance list to query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessScope {
    Active,
    Completed,
}

impl ProcessScope {
    pub fn path_segment(&self) -> &'static str {
        match self {
            ProcessScope::Active => "active",
            ProcessScope::Completed => "completed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_path_segments() {
        assert_eq!(TaskScope::Mine.path_segment(), "my");
        assert_eq!(TaskScope::Candidate.path_segment(), "candidate");
        assert_eq!(ProcessScope::Active.path_segment(), "active");
        assert_eq!(ProcessScope::Completed.path_segment(), "completed");
    }

    #[test]
    fn test_task_scope_serde_matches_path() {
        assert_eq!(serde_json::to_string(&TaskScope::Mine).unwrap(), "\"my\"");
        assert_eq!(
            serde_json::from_str::<TaskScope>("\"candidate\"").unwrap(),
            TaskScope::Candidate
        );
    }
}
