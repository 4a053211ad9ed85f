use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;

use crate::pipeline::job::JobReport;
use crate::report::{BatchSummary, DiagnosticsSink, ReportError};

/// Writes `jobs.jsonl` per source file and one `run_summary.jsonl` under
/// `<debug_root>/<run_id>/`.
pub struct JsonlSink {
    run_id: String,
    tool_version: String,
    config_hash: String,
    run_dir: PathBuf,
    job_writers: Mutex<HashMap<PathBuf, BufWriter<File>>>,
    run_writer: Mutex<BufWriter<File>>,
}

#[derive(Serialize)]
struct JobRecord<'a> {
    #[serde(flatten)]
    report: &'a JobReport,
    preserved: bool,
    run_id: &'a str,
    tool_version: &'a str,
    config_hash: &'a str,
}

#[derive(Serialize)]
struct RunSummaryRecord<'a> {
    #[serde(flatten)]
    summary: &'a BatchSummary,
    run_id: &'a str,
    tool_version: &'a str,
    config_hash: &'a str,
}

impl JsonlSink {
    pub fn new(
        run_id: &str,
        tool_version: &str,
        config_hash: &str,
        debug_root: &Path,
    ) -> Result<Self, ReportError> {
        let run_dir = debug_root.join(run_id);
        std::fs::create_dir_all(&run_dir)?;
        let run_file = File::create(run_dir.join("run_summary.jsonl"))?;
        Ok(Self {
            run_id: run_id.to_string(),
            tool_version: tool_version.to_string(),
            config_hash: config_hash.to_string(),
            run_dir,
            job_writers: Mutex::new(HashMap::new()),
            run_writer: Mutex::new(BufWriter::new(run_file)),
        })
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Directory holding the job records for one source file.
    pub fn job_dir(&self, source: &Path) -> PathBuf {
        let scope = source
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unnamed".to_string());
        self.run_dir.join(scope)
    }

    /// Flush, then delete this run's directory and the debug root if that
    /// leaves it empty.
    pub fn remove(self) -> Result<(), ReportError> {
        self.flush()?;
        let run_dir = self.run_dir.clone();
        drop(self);
        std::fs::remove_dir_all(&run_dir)?;
        if let Some(root) = run_dir.parent() {
            let empty = std::fs::read_dir(root)
                .map(|mut entries| entries.next().is_none())
                .unwrap_or(false);
            if empty {
                std::fs::remove_dir(root)?;
            }
        }
        Ok(())
    }
}

impl DiagnosticsSink for JsonlSink {
    fn record_job(&self, report: &JobReport) -> Result<(), ReportError> {
        let record = JobRecord {
            report,
            preserved: report.verdict.preserved(),
            run_id: &self.run_id,
            tool_version: &self.tool_version,
            config_hash: &self.config_hash,
        };
        let dir = self.job_dir(&report.job.input);
        let mut guard = self
            .job_writers
            .lock()
            .map_err(|_| ReportError::Other("job writers lock poisoned".into()))?;
        if !guard.contains_key(&dir) {
            std::fs::create_dir_all(&dir)?;
            let file = File::create(dir.join("jobs.jsonl"))?;
            guard.insert(dir.clone(), BufWriter::new(file));
        }
        let writer = guard
            .get_mut(&dir)
            .ok_or_else(|| ReportError::Other("job writer missing".into()))?;
        serde_json::to_writer(&mut *writer, &record)?;
        writer.write_all(b"\n")?;
        Ok(())
    }

    fn record_summary(&self, summary: &BatchSummary) -> Result<(), ReportError> {
        let record = RunSummaryRecord {
            summary,
            run_id: &self.run_id,
            tool_version: &self.tool_version,
            config_hash: &self.config_hash,
        };
        let mut guard = self
            .run_writer
            .lock()
            .map_err(|_| ReportError::Other("run writer lock poisoned".into()))?;
        serde_json::to_writer(&mut *guard, &record)?;
        guard.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&self) -> Result<(), ReportError> {
        let mut jobs = self
            .job_writers
            .lock()
            .map_err(|_| ReportError::Other("job writers lock poisoned".into()))?;
        let mut run = self
            .run_writer
            .lock()
            .map_err(|_| ReportError::Other("run writer lock poisoned".into()))?;
        for writer in jobs.values_mut() {
            writer.flush()?;
        }
        run.flush()?;
        Ok(())
    }
}
