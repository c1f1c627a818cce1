//! User entity. Users are testers and creators; authentication lives upstream.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub username: String,
    pub nickname: Option<String>,
    pub email: Option<String>,
    pub is_active: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::job_tester::Entity")]
    JobTesters,
}

impl Related<super::job_tester::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::JobTesters.def()
    }
}

impl Related<super::job::Entity> for Entity {
    fn to() -> RelationDef {
        super::job_tester::Relation::Job.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::job_tester::Relation::Tester.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
