//! SeaORM database migrations.

pub use sea_orm_migration::prelude::*;

mod m20261017_000001_create_users;
mod m20261017_000002_create_modules;
mod m20261017_000003_create_cases;
mod m20261017_000004_create_jobs;
mod m20261017_000005_create_job_cases;
mod m20261017_000006_create_job_testers;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20261017_000001_create_users::Migration),
            Box::new(m20261017_000002_create_modules::Migration),
            Box::new(m20261017_000003_create_cases::Migration),
            Box::new(m20261017_000004_create_jobs::Migration),
            Box::new(m20261017_000005_create_job_cases::Migration),
            Box::new(m20261017_000006_create_job_testers::Migration),
        ]
    }
}
