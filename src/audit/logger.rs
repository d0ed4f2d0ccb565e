use super::{AuditRun, InvocationAudit, RunConfig, RunOutcome};
use crate::session::SessionKey;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Writes one run's audit trail under `audit_dir`.
///
/// While a run is active it is mirrored to `current-{id}.json` after every
/// entry; `finish_run` moves it to `runs/{timestamp}_{id}.json`.
pub struct AuditLogger {
    audit_dir: PathBuf,
    current_run: Option<AuditRun>,
}

impl AuditLogger {
    pub fn new(audit_dir: &Path) -> Self {
        Self {
            audit_dir: audit_dir.to_path_buf(),
            current_run: None,
        }
    }

    fn runs_dir(&self) -> PathBuf {
        self.audit_dir.join("runs")
    }

    fn current_run_file(&self, run: &AuditRun) -> PathBuf {
        self.audit_dir
            .join(format!("current-{}.json", &run.run_id.to_string()[..8]))
    }

    pub fn start_run(&mut self, session: SessionKey, config: RunConfig) -> Result<()> {
        fs::create_dir_all(self.runs_dir()).context("Failed to create audit runs directory")?;
        self.current_run = Some(AuditRun::new(session, config));
        self.save_current()
    }

    /// Append an entry to the active run.
    ///
    /// Errors when no run is active.
    pub fn record(&mut self, invocation: InvocationAudit) -> Result<()> {
        let run = self
            .current_run
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("record called with no active run"))?;
        run.invocations.push(invocation);
        self.save_current()
    }

    pub fn finish_run(&mut self, outcome: RunOutcome) -> Result<PathBuf> {
        let mut run = self
            .current_run
            .take()
            .ok_or_else(|| anyhow::anyhow!("No current run to finish"))?;
        run.finish(outcome);

        let filename = format!(
            "{}_{}.json",
            run.started_at.format("%Y-%m-%dT%H-%M-%S"),
            &run.run_id.to_string()[..8]
        );
        let run_file = self.runs_dir().join(&filename);
        let json = serde_json::to_string_pretty(&run).context("Failed to serialize audit run")?;
        fs::write(&run_file, json).context("Failed to write audit run file")?;

        let current = self.current_run_file(&run);
        if current.exists() {
            fs::remove_file(&current).context("Failed to remove current run file")?;
        }
        Ok(run_file)
    }

    fn save_current(&self) -> Result<()> {
        if let Some(ref run) = self.current_run {
            let json =
                serde_json::to_string_pretty(run).context("Failed to serialize current run")?;
            fs::write(self.current_run_file(run), json)
                .context("Failed to write current run file")?;
        }
        Ok(())
    }

    pub fn current_run(&self) -> Option<&AuditRun> {
        self.current_run.as_ref()
    }

    /// Finished runs, most recent first.
    pub fn list_runs(&self) -> Result<Vec<PathBuf>> {
        let runs_dir = self.runs_dir();
        if !runs_dir.exists() {
            return Ok(Vec::new());
        }

        let mut runs: Vec<PathBuf> = fs::read_dir(&runs_dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().map(|e| e == "json").unwrap_or(false))
            .collect();

        runs.sort();
        runs.reverse();
        Ok(runs)
    }

    pub fn load_run(&self, path: &Path) -> Result<AuditRun> {
        let content = fs::read_to_string(path).context("Failed to read audit run file")?;
        let run: AuditRun =
            serde_json::from_str(&content).context("Failed to parse audit run file")?;
        Ok(run)
    }

    pub fn latest_run(&self) -> Result<Option<AuditRun>> {
        match self.list_runs()?.first() {
            Some(path) => Ok(Some(self.load_run(path)?)),
            None => Ok(None),
        }
    }
}
