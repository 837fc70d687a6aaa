//! Job-plan file persistence (spec §6 "Persisted state"): one file per
//! job part, named `{JobID}--{PartNo:05}.steV{schema}`, under the
//! process-wide plan folder.

use camino::{Utf8Path, Utf8PathBuf};
use cloudxfer_core::JobId;
use serde::{Deserialize, Serialize};

/// Current on-disk schema version, embedded in the plan-file extension
/// so a future incompatible format change can coexist with old files
/// left over from a previous binary.
pub const PLAN_SCHEMA_VERSION: u32 = 1;

pub fn plan_file_name(job_id: JobId, part_number: u32) -> String {
    format!("{job_id}--{part_number:05}.steV{PLAN_SCHEMA_VERSION}")
}

pub fn plan_file_path(plan_folder: &Utf8Path, job_id: JobId, part_number: u32) -> Utf8PathBuf {
    plan_folder.join(plan_file_name(job_id, part_number))
}

/// The on-disk representation of one `CopyJobPartOrderRequest` (spec
/// §3), serialized verbatim so a resumed job can rehydrate it without
/// re-running enumeration (spec §7 "Recovery").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPartPlan {
    pub job_id: JobId,
    pub part_number: u32,
    pub from_to: String,
    pub is_final_part: bool,
    pub source_root: String,
    pub destination_root: String,
    pub transfers: cloudxfer_core::Transfers,
}

impl JobPartPlan {
    pub async fn write(&self, plan_folder: &Utf8Path) -> anyhow::Result<Utf8PathBuf> {
        tokio::fs::create_dir_all(plan_folder).await?;
        let path = plan_file_path(plan_folder, self.job_id, self.part_number);
        let bytes = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(path.as_std_path(), bytes).await?;
        Ok(path)
    }

    pub async fn read(path: &Utf8Path) -> anyhow::Result<Self> {
        let bytes = tokio::fs::read(path.as_std_path()).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Lists every plan-file path already persisted for `job_id`, in
    /// ascending part-number order, used to rehydrate a resumed job.
    pub async fn list_parts(
        plan_folder: &Utf8Path,
        job_id: JobId,
    ) -> anyhow::Result<Vec<Utf8PathBuf>> {
        let prefix = format!("{job_id}--");
        let mut entries = tokio::fs::read_dir(plan_folder.as_std_path()).await?;
        let mut parts = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(&prefix) {
                parts.push(Utf8PathBuf::try_from(entry.path())?);
            }
        }
        parts.sort();
        Ok(parts)
    }
}

/// Removes every persisted plan file for `job_id`, returning the count
/// removed. Backs the STE's `RemoveJobFiles` operation.
pub async fn remove_job_files(plan_folder: &Utf8Path, job_id: JobId) -> anyhow::Result<usize> {
    let parts = JobPartPlan::list_parts(plan_folder, job_id).await?;
    for part in &parts {
        tokio::fs::remove_file(part.as_std_path()).await?;
    }
    Ok(parts.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_file_name_is_zero_padded() {
        let job_id = JobId::new();
        let name = plan_file_name(job_id, 7);
        assert!(name.ends_with("--00007.steV1"));
    }

    #[tokio::test]
    async fn round_trips_a_plan_file() {
        let dir = tempfile::tempdir().unwrap();
        let folder = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
        let job_id = JobId::new();
        let plan = JobPartPlan {
            job_id,
            part_number: 0,
            from_to: "LocalBlob".to_string(),
            is_final_part: true,
            source_root: "/a".to_string(),
            destination_root: "https://acct.blob.core.windows.net/c".to_string(),
            transfers: cloudxfer_core::Transfers::default(),
        };
        plan.write(&folder).await.unwrap();
        let parts = JobPartPlan::list_parts(&folder, job_id).await.unwrap();
        assert_eq!(parts.len(), 1);
        let read_back = JobPartPlan::read(&parts[0]).await.unwrap();
        assert_eq!(read_back.part_number, 0);
    }
}
