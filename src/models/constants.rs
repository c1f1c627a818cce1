//! Code tables rendered by clients as select options.

use serde::Serialize;
use utoipa::ToSchema;

use super::case::CASE_PRIORITIES;
use super::job::{CaseStatus, JOB_LEVELS, JOB_TYPES, JobStatus};

/// One selectable code.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ConstantItem {
    pub value: i16,
    pub label: &'static str,
}

fn items(table: &[(i16, &'static str)]) -> Vec<ConstantItem> {
    table
        .iter()
        .map(|&(value, label)| ConstantItem { value, label })
        .collect()
}

/// Job code tables.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct JobConstants {
    pub level: Vec<ConstantItem>,
    #[serde(rename = "TYPE")]
    pub job_type: Vec<ConstantItem>,
    pub status: Vec<ConstantItem>,
    pub case_status: Vec<ConstantItem>,
}

impl JobConstants {
    pub fn new() -> Self {
        Self {
            level: items(&JOB_LEVELS),
            job_type: items(&JOB_TYPES),
            status: JobStatus::ALL
                .iter()
                .map(|s| ConstantItem {
                    value: s.code(),
                    label: s.label(),
                })
                .collect(),
            case_status: CaseStatus::ALL
                .iter()
                .map(|s| ConstantItem {
                    value: s.code(),
                    label: s.label(),
                })
                .collect(),
        }
    }
}

impl Default for JobConstants {
    fn default() -> Self {
        Self::new()
    }
}

/// Case code tables.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct CaseConstants {
    pub level: Vec<ConstantItem>,
}

impl CaseConstants {
    pub fn new() -> Self {
        Self {
            level: items(&CASE_PRIORITIES),
        }
    }
}

impl Default for CaseConstants {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_constants_serialize_with_upper_keys() {
        let value = serde_json::to_value(JobConstants::new()).unwrap();
        assert!(value.get("LEVEL").is_some());
        assert!(value.get("TYPE").is_some());
        assert_eq!(value["STATUS"].as_array().map(Vec::len), Some(6));
        assert_eq!(value["CASE_STATUS"][2]["label"], "blocked");
    }
}
