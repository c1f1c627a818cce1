//! JobToCase entity: the per-case result record within a job.

use sea_orm::entity::prelude::*;
use serde_json::Value as JsonValue;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "job_cases")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub job_id: Uuid,
    pub case_id: Uuid,
    /// 0 pending, 1 passed, 2 blocked, 3 failed, 4 skipped
    pub case_status: i16,
    pub test_detail: Option<String>,
    /// JSON array of attachment ids owned by this record
    #[sea_orm(column_type = "JsonBinary")]
    pub attachments: JsonValue,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl Model {
    /// Attachment ids stored on the record; malformed entries are skipped.
    pub fn attachment_ids(&self) -> Vec<String> {
        match &self.attachments {
            JsonValue::Array(items) => items
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::job::Entity",
        from = "Column::JobId",
        to = "super::job::Column::Id",
        on_delete = "Cascade"
    )]
    Job,
    #[sea_orm(
        belongs_to = "super::case::Entity",
        from = "Column::CaseId",
        to = "super::case::Column::Id",
        on_delete = "Cascade"
    )]
    Case,
}

impl Related<super::job::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Job.def()
    }
}

impl Related<super::case::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Case.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_attachment_ids_skips_non_strings() {
        let now = Utc::now();
        let model = Model {
            id: Uuid::now_v7(),
            job_id: Uuid::now_v7(),
            case_id: Uuid::now_v7(),
            case_status: 0,
            test_detail: None,
            attachments: serde_json::json!(["a.png", 7, "b.png"]),
            created_at: now,
            updated_at: now,
        };
        assert_eq!(model.attachment_ids(), vec!["a.png", "b.png"]);
    }
}
