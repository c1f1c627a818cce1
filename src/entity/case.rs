//! Case entity: a reusable test-case definition and its detail fields.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "cases")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub no: String,
    pub name: String,
    /// 1 = high, 2 = medium, 3 = low
    pub priority: i16,
    pub is_active: bool,
    pub is_auto: bool,
    pub version: Option<String>,
    pub code_time: Option<String>,
    pub case_type: Option<String>,
    pub author: String,
    pub module_id: Uuid,
    pub creator_id: Option<Uuid>,
    pub reviser_id: Option<Uuid>,
    pub description: Option<String>,
    pub step: Option<String>,
    pub expectation: Option<String>,
    pub path: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::module::Entity",
        from = "Column::ModuleId",
        to = "super::module::Column::Id",
        on_delete = "Restrict"
    )]
    Module,
    #[sea_orm(has_many = "super::job_case::Entity")]
    JobCases,
}

impl Related<super::module::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Module.def()
    }
}

impl Related<super::job_case::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::JobCases.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
