//! Job entity: a test run scoping cases to testers with a deadline.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "jobs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub task_no: i64,
    pub task_name: String,
    pub task_detail: Option<String>,
    /// 0 new, 1 ready, 2 assigned, 3 in progress, 4 closed, 5 other
    pub status: i16,
    pub level: i16,
    #[sea_orm(column_name = "type")]
    pub job_type: i16,
    pub is_active: bool,
    pub create_user_id: Uuid,
    pub product: Option<String>,
    pub frontend: Option<String>,
    pub backend: Option<String>,
    pub prd_no: Option<String>,
    pub expect_end_time: DateTimeUtc,
    /// Set only when the job is closed
    pub actual_end_time: Option<DateTimeUtc>,
    pub is_delay: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::CreateUserId",
        to = "super::user::Column::Id",
        on_delete = "Restrict"
    )]
    Creator,
    #[sea_orm(has_many = "super::job_case::Entity")]
    JobCases,
    #[sea_orm(has_many = "super::job_tester::Entity")]
    JobTesters,
}

impl Related<super::job_case::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::JobCases.def()
    }
}

impl Related<super::job_tester::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::JobTesters.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
