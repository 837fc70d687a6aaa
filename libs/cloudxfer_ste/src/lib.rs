//! The transfer execution engine boundary (spec §6) and job-plan
//! persistence.

pub mod engine;
pub mod plan;

pub use engine::{
    ConcurrencySettings, CopyJobPartOrderRequest, InProcessEngine, JobDetail, StartPartResponse,
    TransferEngine,
};
pub use plan::{plan_file_name, plan_file_path, remove_job_files, JobPartPlan, PLAN_SCHEMA_VERSION};
