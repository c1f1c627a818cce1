//! SeaORM entity definitions for PostgreSQL database.

pub mod case;
pub mod job;
pub mod job_case;
pub mod job_tester;
pub mod module;
pub mod user;
