//! # Pipeline Module
//!
//! Channel extraction: per-channel transcoder jobs, the batch and single-file
//! drivers built on them, and background execution with progress events.
//!
//! Within a run, files are processed in sorted order and channels in
//! ascending index order, one transcoder process at a time.

pub mod cancel;
pub mod command;
pub mod events;
pub mod job;
pub mod verify;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{debug, error, info, warn};

use crate::config::{Config, LoadedConfig};
use crate::constants::EVENT_CHANNEL_CAPACITY;
use crate::error::{Result, SplitError};
use crate::metadata::MetadataReader;
use crate::process::{self, ProcessError};
use crate::report::{BatchSummary, DiagnosticReport, DiagnosticsSink, JsonlSink};
use crate::tools::{StreamProber, Tool, ToolError, ToolLocator};

pub use cancel::CancelToken;
pub use events::PipelineEvent;
pub use job::{BitDepth, ExtractionJob, ExtractionSettings, JobOutcome, JobReport, NamingScheme};
pub use verify::PreservationVerdict;

use command::TranscodeOptions;

/// Split every matching file in a directory.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub settings: ExtractionSettings,
}

/// Split one file, optionally restricted to some channels.
#[derive(Debug, Clone)]
pub struct FileRequest {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    /// Zero-based channel indexes; `None` selects every channel
    pub channels: Option<Vec<u32>>,
    pub settings: ExtractionSettings,
}

/// Shared state for the files of one run.
struct RunContext<'a> {
    output_dir: &'a Path,
    settings: &'a ExtractionSettings,
    cancel: &'a CancelToken,
    events: &'a Sender<PipelineEvent>,
    sink: Option<&'a dyn DiagnosticsSink>,
}

impl RunContext<'_> {
    fn emit(&self, event: PipelineEvent) {
        let _ = self.events.send(event);
    }
}

/// Runs extraction jobs against resolved transcoder and prober executables.
pub struct ChannelSplitter {
    config: Config,
    config_hash: String,
    transcoder: PathBuf,
    prober: StreamProber,
}

impl ChannelSplitter {
    /// Resolve both tools up front; a missing tool is a precondition failure.
    pub fn new(loaded: LoadedConfig, locator: &dyn ToolLocator) -> Result<Self> {
        let transcoder = locator.resolve(Tool::Transcoder)?;
        let prober_path = locator.resolve(Tool::Prober)?;
        let prober = StreamProber::new(prober_path, loaded.config.probe_timeout());
        Ok(Self {
            config: loaded.config,
            config_hash: loaded.config_hash,
            transcoder,
            prober,
        })
    }

    /// Number of audio channels in the first audio stream of `path`.
    pub fn probe_channels(&self, path: &Path, cancel: &CancelToken) -> std::result::Result<u32, ToolError> {
        let channels = self.prober.channel_count(path, cancel)?;
        if channels == 0 {
            return Err(ToolError::BadOutput {
                tool: Tool::Prober,
                output: "0".to_string(),
            });
        }
        Ok(channels)
    }

    /// Extract one channel and verify what metadata survived.
    pub fn extract_channel(
        &self,
        job: &ExtractionJob,
        cancel: &CancelToken,
        sink: Option<&dyn DiagnosticsSink>,
    ) -> JobOutcome {
        if cancel.is_cancelled() {
            return JobOutcome::Cancelled;
        }
        if !job.input.is_file() {
            return JobOutcome::PreconditionFailed(format!(
                "input file does not exist: {}",
                job.input.display()
            ));
        }
        if let Some(channels) = job.source_channels {
            if job.channel_index >= channels {
                return JobOutcome::PreconditionFailed(format!(
                    "channel {} out of range ({} channel(s) in {})",
                    job.channel_number(),
                    channels,
                    job.input.display()
                ));
            }
        }
        if let Some(parent) = job.output.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(err) = fs::create_dir_all(parent) {
                return JobOutcome::PreconditionFailed(format!(
                    "cannot create output directory {}: {err}",
                    parent.display()
                ));
            }
        }

        let source = MetadataReader::open_with(&job.input, &self.config.metadata).into_readout();
        let (bit_depth, source_bits) = self.resolve_bit_depth(job, cancel);
        let opts = TranscodeOptions {
            metadata_header_padding: self.config.metadata_header_padding,
            forward_originator_reference: self.config.forward_originator_reference,
        };
        let args = command::build_args(job, bit_depth, &source.fields, &opts);
        let command_line = process::display_command(&self.transcoder, &args);
        info!(
            "extract input={} channel={} output={} codec={}",
            job.input.display(),
            job.channel_number(),
            job.output.display(),
            bit_depth.codec()
        );
        debug!("command {command_line}");

        match process::run(&self.transcoder, &args, self.config.transcoder_timeout(), cancel) {
            Ok(output) if output.success() => {}
            Ok(output) => {
                let stderr = output.stderr.trim();
                error!(
                    "transcoder failed input={} channel={} status={} stderr={}",
                    job.input.display(),
                    job.channel_number(),
                    output.status,
                    stderr
                );
                return JobOutcome::TranscoderFailed(format!("{}: {}", output.status, stderr));
            }
            Err(ProcessError::Cancelled { .. }) => {
                remove_partial(&job.output);
                return JobOutcome::Cancelled;
            }
            Err(err) => {
                error!(
                    "transcoder failed input={} channel={} err={err}",
                    job.input.display(),
                    job.channel_number()
                );
                if matches!(err, ProcessError::TimedOut { .. }) {
                    remove_partial(&job.output);
                }
                return JobOutcome::TranscoderFailed(err.to_string());
            }
        }

        let output = MetadataReader::open_with(&job.output, &self.config.metadata).into_readout();

        let mut source_metadata = source.fields.to_snapshot();
        enrich_snapshot(&mut source_metadata, job.source_channels, source_bits);
        let output_metadata = output.fields.to_snapshot();
        let verdict = verify::verify(&source_metadata, &output_metadata);
        if verdict.preserved() {
            debug!(
                "metadata preserved output={} fields={}",
                job.output.display(),
                verdict.checked.len()
            );
        } else {
            warn!(
                "metadata not preserved output={} missing={:?} changed={:?}",
                job.output.display(),
                verdict.missing,
                verdict.changed
            );
        }

        let report = JobReport {
            job: job.clone(),
            bit_depth,
            command: command_line,
            source_metadata,
            output_metadata,
            source_issues: source.issues,
            output_issues: output.issues,
            verdict,
        };
        if let Some(sink) = sink {
            if let Err(err) = sink.record_job(&report) {
                warn!("diagnostics write failed output={} err={err}", job.output.display());
            }
        }
        JobOutcome::Success(Box::new(report))
    }

    /// Split every matching file in `request.input_dir`.
    ///
    /// Returns `Err` only when the run cannot start. Probe and transcoder
    /// failures are recorded in the summary.
    pub fn run_batch(
        &self,
        request: &BatchRequest,
        cancel: &CancelToken,
        events: &Sender<PipelineEvent>,
    ) -> Result<BatchSummary> {
        if !request.input_dir.is_dir() {
            return Err(SplitError::precondition(format!(
                "input directory does not exist: {}",
                request.input_dir.display()
            )));
        }
        prepare_output_dir(&request.output_dir)?;
        let files = find_input_files(&request.input_dir, &self.config)?;
        if files.is_empty() {
            return Err(SplitError::precondition(format!(
                "no audio files found in {}",
                request.input_dir.display()
            )));
        }
        info!(
            "batch input={} output={} files={}",
            request.input_dir.display(),
            request.output_dir.display(),
            files.len()
        );

        let sink = self.open_sink(&request.output_dir);
        let ctx = RunContext {
            output_dir: &request.output_dir,
            settings: &request.settings,
            cancel,
            events,
            sink: sink.as_ref().map(|s| s as &dyn DiagnosticsSink),
        };
        let mut summary = BatchSummary::new(self.config.run_id.clone(), request.output_dir.clone());
        summary.files_total = files.len();
        ctx.emit(PipelineEvent::FilesFound { total: files.len() });

        for (index, file) in files.iter().enumerate() {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }
            ctx.emit(PipelineEvent::FileStarted {
                path: file.clone(),
                index,
                total: files.len(),
            });
            summary.report.push(format!("Processing file: {}", display_name(file)));

            match self.probe_channels(file, cancel) {
                Ok(channels) => {
                    summary
                        .report
                        .push(format!("Detected {channels} channel(s) in {}", display_name(file)));
                    ctx.emit(PipelineEvent::ChannelsDetected {
                        path: file.clone(),
                        channels,
                    });
                    let selected: Vec<u32> = (0..channels).collect();
                    let ok = self.split_channels(file, &selected, channels, &ctx, &mut summary, |_| {});
                    record_file_result(&mut summary, ok);
                }
                Err(ToolError::Process {
                    source: ProcessError::Cancelled { .. },
                    ..
                }) => {
                    summary.cancelled = true;
                }
                Err(err) => {
                    error!("probe failed path={} err={err}", file.display());
                    let message = format!("Error processing {}: {err}", display_name(file));
                    ctx.emit(PipelineEvent::Warning {
                        message: message.clone(),
                    });
                    summary.report.push(message);
                    summary.files_failed += 1;
                }
            }
            if summary.cancelled {
                break;
            }
            ctx.emit(PipelineEvent::Progress {
                completed: index + 1,
                total: files.len(),
            });
        }

        Ok(self.finish(summary, sink, events))
    }

    /// Split one file; `request.channels` restricts which channels are
    /// extracted. Indexes beyond the probed channel count are dropped.
    pub fn run_file(
        &self,
        request: &FileRequest,
        cancel: &CancelToken,
        events: &Sender<PipelineEvent>,
    ) -> Result<BatchSummary> {
        if !request.input.is_file() {
            return Err(SplitError::precondition(format!(
                "input file does not exist: {}",
                request.input.display()
            )));
        }
        prepare_output_dir(&request.output_dir)?;
        let channels = self.probe_channels(&request.input, cancel)?;
        let selected = select_channels(request.channels.as_deref(), channels);
        if selected.is_empty() {
            return Err(SplitError::precondition(format!(
                "no valid channels selected ({} channel(s) in {})",
                channels,
                request.input.display()
            )));
        }
        info!(
            "file input={} output={} channels={:?}",
            request.input.display(),
            request.output_dir.display(),
            selected
        );

        let sink = self.open_sink(&request.output_dir);
        let ctx = RunContext {
            output_dir: &request.output_dir,
            settings: &request.settings,
            cancel,
            events,
            sink: sink.as_ref().map(|s| s as &dyn DiagnosticsSink),
        };
        let mut summary = BatchSummary::new(self.config.run_id.clone(), request.output_dir.clone());
        summary.files_total = 1;
        ctx.emit(PipelineEvent::FilesFound { total: 1 });
        ctx.emit(PipelineEvent::FileStarted {
            path: request.input.clone(),
            index: 0,
            total: 1,
        });
        ctx.emit(PipelineEvent::ChannelsDetected {
            path: request.input.clone(),
            channels,
        });
        summary
            .report
            .push(format!("Processing file: {}", display_name(&request.input)));
        summary.report.push(format!(
            "Detected {channels} channel(s) in {}",
            display_name(&request.input)
        ));

        let total = selected.len();
        let ok = self.split_channels(&request.input, &selected, channels, &ctx, &mut summary, |done| {
            ctx.emit(PipelineEvent::Progress {
                completed: done,
                total,
            })
        });
        if !summary.cancelled {
            record_file_result(&mut summary, ok);
        }

        Ok(self.finish(summary, sink, events))
    }

    /// Run the selected channels of one file in order. Returns whether every
    /// channel succeeded.
    fn split_channels(
        &self,
        file: &Path,
        selected: &[u32],
        source_channels: u32,
        ctx: &RunContext<'_>,
        summary: &mut BatchSummary,
        mut on_channel: impl FnMut(usize),
    ) -> bool {
        let mut all_ok = true;
        for (done, &channel_index) in selected.iter().enumerate() {
            if ctx.cancel.is_cancelled() {
                summary.cancelled = true;
                return false;
            }
            let output = ctx
                .settings
                .naming
                .output_path(ctx.output_dir, file, channel_index);
            let job = ExtractionJob::new(file, channel_index, output)
                .with_settings(ctx.settings)
                .with_source_channels(Some(source_channels));

            // `-y` would silently replace an output written earlier in this run,
            // e.g. `take.wav` and `take.bwf` both map to `take_chan1.wav`.
            let outcome = if summary.outputs.contains(&job.output) {
                warn!(
                    "output collision input={} channel={} output={}",
                    file.display(),
                    job.channel_number(),
                    job.output.display()
                );
                JobOutcome::PreconditionFailed(format!(
                    "{} was already written earlier in this run",
                    display_name(&job.output)
                ))
            } else {
                self.extract_channel(&job, ctx.cancel, ctx.sink)
            };
            let (success, preserved) = match &outcome {
                JobOutcome::Success(report) => {
                    summary.channels_ok += 1;
                    summary.outputs.push(job.output.clone());
                    if report.verdict.preserved() {
                        summary.report.push(format!(
                            "Channel {}: OK -> {}",
                            job.channel_number(),
                            display_name(&job.output)
                        ));
                    } else {
                        summary.metadata_warnings += 1;
                        summary.report.push(format!(
                            "Channel {}: OK -> {} (metadata not fully preserved: {})",
                            job.channel_number(),
                            display_name(&job.output),
                            report.verdict
                        ));
                    }
                    (true, report.verdict.preserved())
                }
                JobOutcome::TranscoderFailed(detail) | JobOutcome::PreconditionFailed(detail) => {
                    summary.channels_failed += 1;
                    all_ok = false;
                    summary
                        .report
                        .push(format!("Channel {}: FAILED: {detail}", job.channel_number()));
                    (false, false)
                }
                JobOutcome::Cancelled => {
                    summary.cancelled = true;
                    summary
                        .report
                        .push(format!("Channel {}: cancelled", job.channel_number()));
                    return false;
                }
            };
            ctx.emit(PipelineEvent::ChannelFinished {
                path: file.to_path_buf(),
                channel_index,
                output: job.output.clone(),
                success,
                metadata_preserved: preserved,
            });
            on_channel(done + 1);
        }
        all_ok
    }

    fn resolve_bit_depth(&self, job: &ExtractionJob, cancel: &CancelToken) -> (BitDepth, Option<u32>) {
        if let Some(depth) = job.bit_depth {
            return (depth, None);
        }
        let fallback = BitDepth::try_from(self.config.default_bit_depth).unwrap_or_default();
        if !self.config.inherit_source_bit_depth {
            return (fallback, None);
        }
        match self.prober.bits_per_sample(&job.input, cancel) {
            Ok(bits) => match BitDepth::try_from(bits) {
                Ok(depth) => (depth, Some(bits)),
                Err(msg) => {
                    warn!("source bit depth not usable path={} {msg}", job.input.display());
                    (fallback, Some(bits))
                }
            },
            Err(err) => {
                warn!("bit depth probe failed path={} err={err}", job.input.display());
                (fallback, None)
            }
        }
    }

    fn open_sink(&self, output_dir: &Path) -> Option<JsonlSink> {
        let debug_root = output_dir.join(&self.config.debug_dir_name);
        match JsonlSink::new(
            &self.config.run_id,
            env!("CARGO_PKG_VERSION"),
            &self.config_hash,
            &debug_root,
        ) {
            Ok(sink) => Some(sink),
            Err(err) => {
                warn!("diagnostics disabled root={} err={err}", debug_root.display());
                None
            }
        }
    }

    fn finish(
        &self,
        mut summary: BatchSummary,
        sink: Option<JsonlSink>,
        events: &Sender<PipelineEvent>,
    ) -> BatchSummary {
        let mut closing = DiagnosticReport::new();
        for line in summary.summary_text().lines() {
            closing.push(line);
        }
        summary.report.extend(closing);

        if let Some(sink) = sink {
            if let Err(err) = sink.record_summary(&summary) {
                warn!("run summary write failed err={err}");
            }
            if self.config.keep_debug_artifacts {
                if let Err(err) = sink.flush() {
                    warn!("diagnostics flush failed err={err}");
                }
                info!("debug artifacts kept at {}", sink.run_dir().display());
            } else if let Err(err) = sink.remove() {
                warn!("debug artifact cleanup failed err={err}");
            }
        }

        info!(
            "run_summary run_id={} files_total={} files_processed={} files_failed={} channels_ok={} channels_failed={} metadata_warnings={} cancelled={}",
            summary.run_id,
            summary.files_total,
            summary.files_processed,
            summary.files_failed,
            summary.channels_ok,
            summary.channels_failed,
            summary.metadata_warnings,
            summary.cancelled
        );
        let _ = events.send(PipelineEvent::Finished(Box::new(summary.clone())));
        summary
    }
}

/// Run a batch on a named worker thread.
pub fn spawn_batch(
    splitter: Arc<ChannelSplitter>,
    request: BatchRequest,
    cancel: CancelToken,
) -> Result<(JoinHandle<Result<BatchSummary>>, Receiver<PipelineEvent>)> {
    let (tx, rx) = bounded(EVENT_CHANNEL_CAPACITY);
    let handle = thread::Builder::new()
        .name("wavsplit-batch".to_string())
        .spawn(move || splitter.run_batch(&request, &cancel, &tx))?;
    Ok((handle, rx))
}

/// Run a single-file split on a named worker thread.
pub fn spawn_file(
    splitter: Arc<ChannelSplitter>,
    request: FileRequest,
    cancel: CancelToken,
) -> Result<(JoinHandle<Result<BatchSummary>>, Receiver<PipelineEvent>)> {
    let (tx, rx) = bounded(EVENT_CHANNEL_CAPACITY);
    let handle = thread::Builder::new()
        .name("wavsplit-file".to_string())
        .spawn(move || splitter.run_file(&request, &cancel, &tx))?;
    Ok((handle, rx))
}

/// Regular files in `dir` with a configured extension, sorted by name.
pub fn find_input_files(dir: &Path, config: &Config) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|err| {
        SplitError::precondition(format!("cannot read input directory {}: {err}", dir.display()))
    })?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && config.matches_extension(&path) {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Keep requested indexes below `channels`, deduplicated, in ascending order.
pub fn select_channels(requested: Option<&[u32]>, channels: u32) -> Vec<u32> {
    match requested {
        None => (0..channels).collect(),
        Some(requested) => {
            let mut selected: Vec<u32> = requested.iter().copied().filter(|&c| c < channels).collect();
            selected.sort_unstable();
            selected.dedup();
            selected
        }
    }
}

/// Create `dir` and check that files can be created in it.
fn prepare_output_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|err| {
        SplitError::precondition(format!("cannot create output directory {}: {err}", dir.display()))
    })?;
    tempfile::NamedTempFile::new_in(dir).map_err(|err| {
        SplitError::precondition(format!("output directory is not writable {}: {err}", dir.display()))
    })?;
    Ok(())
}

fn record_file_result(summary: &mut BatchSummary, ok: bool) {
    if summary.cancelled {
        return;
    }
    if ok {
        summary.files_processed += 1;
    } else {
        summary.files_failed += 1;
    }
}

fn enrich_snapshot(snapshot: &mut BTreeMap<String, String>, channels: Option<u32>, bits: Option<u32>) {
    if let Some(channels) = channels {
        snapshot.insert("channels".to_string(), channels.to_string());
    }
    if let Some(bits) = bits {
        snapshot.insert("bits_per_sample".to_string(), bits.to_string());
    }
}

fn remove_partial(path: &Path) {
    if path.is_file() {
        if let Err(err) = fs::remove_file(path) {
            warn!("could not remove partial output {}: {err}", path.display());
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
