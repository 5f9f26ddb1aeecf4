//! Per-job artifact layout under the project root.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use uuid::Uuid;

/// Directory holding per-job stage outputs.
const ARTIFACTS_DIR_NAME: &str = ".pipeline_artifacts";

/// Directory where stage 2 writes generated tests.
///
/// Shared across jobs by design. Two concurrently processed jobs would
/// collide here; only the single-worker guarantee makes this safe.
const TEST_DIR_NAME: &str = "test_bugfix";

/// Resolved filesystem paths for one job's artifacts.
///
/// The artifact directory name is deterministic from the job id, so two
/// submissions with identical descriptions still write to distinct
/// directories.
#[derive(Debug, Clone)]
pub struct JobPaths {
    pub artifacts_dir: PathBuf,
    pub tests_dir: PathBuf,
    pub step1_path: PathBuf,
    pub step2_path: PathBuf,
    pub step3_path: PathBuf,
}

impl JobPaths {
    pub fn new(project_root: &Path, job_id: Uuid) -> Self {
        let artifacts_dir = project_root
            .join(ARTIFACTS_DIR_NAME)
            .join(format!("item_{}", job_id.simple()));
        Self {
            tests_dir: project_root.join(TEST_DIR_NAME),
            step1_path: artifacts_dir.join("step1.md"),
            step2_path: artifacts_dir.join("step2.md"),
            step3_path: artifacts_dir.join("step3.md"),
            artifacts_dir,
        }
    }

    /// Create the artifact and test directories. Idempotent: safe to call
    /// when they already exist.
    pub fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(&self.artifacts_dir)
            .with_context(|| format!("create artifact dir {}", self.artifacts_dir.display()))?;
        fs::create_dir_all(&self.tests_dir)
            .with_context(|| format!("create test dir {}", self.tests_dir.display()))?;
        Ok(())
    }
}

/// Write a stage output file as UTF-8 text, replacing previous contents.
pub fn write_step(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("write {}", path.display()))
}
