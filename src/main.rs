use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use tracing::{error, info, warn};

use wavsplit::{
    cli::{self, Command, InspectArgs},
    config::{self, LoadedConfig},
    logging,
    metadata::{FieldMap, MetadataReader, ParseIssue},
    pipeline::{self, BatchRequest, CancelToken, ChannelSplitter, FileRequest, PipelineEvent},
    report::BatchSummary,
    tools::SystemToolLocator,
};

#[derive(Serialize)]
struct InspectOutput<'a> {
    path: &'a Path,
    fields: &'a FieldMap,
    issues: &'a [ParseIssue],
}

fn main() -> Result<()> {
    let cli_opts = cli::parse();
    logging::init_logging_with_format(cli_opts.log_format, cli_opts.log_file.as_deref());

    let loaded = match cli_opts.load_config() {
        Ok(loaded) => loaded,
        Err(err) => {
            error!("config failed err={err}");
            fail(&err.to_string())
        }
    };
    let cancel = CancelToken::new();

    let spawned = match &cli_opts.command {
        Command::Inspect(args) => return inspect(args, &loaded.config),
        Command::SplitDir(args) => pipeline::spawn_batch(
            build_splitter(loaded),
            BatchRequest {
                input_dir: args.input.clone(),
                output_dir: args.output.clone(),
                settings: args.extract.settings(),
            },
            cancel,
        ),
        Command::SplitFile(args) => pipeline::spawn_file(
            build_splitter(loaded),
            FileRequest {
                input: args.input.clone(),
                output_dir: args.output.clone(),
                channels: args.channel_indexes(),
                settings: args.extract.settings(),
            },
            cancel,
        ),
    };
    let (handle, events) = match spawned {
        Ok(spawned) => spawned,
        Err(err) => fail(&err.to_string()),
    };

    for event in events.iter() {
        log_event(&event);
    }

    match handle.join() {
        Ok(Ok(summary)) => finish(&summary),
        Ok(Err(err)) => {
            error!("run failed kind={} err={err}", err.kind());
            fail(&err.to_string())
        }
        Err(_) => fail("worker thread panicked"),
    }
}

fn build_splitter(loaded: LoadedConfig) -> Arc<ChannelSplitter> {
    info!(
        "starting run_id={} config_hash={}",
        loaded.config.run_id, loaded.config_hash
    );
    let locator = SystemToolLocator::from_config(&loaded.config.tools);
    match ChannelSplitter::new(loaded, &locator) {
        Ok(splitter) => Arc::new(splitter),
        Err(err) => fail(&err.to_string()),
    }
}

fn log_event(event: &PipelineEvent) {
    match event {
        PipelineEvent::FilesFound { total } => info!("files_found={total}"),
        PipelineEvent::FileStarted { path, index, total } => {
            info!("file {}/{} path={}", index + 1, total, path.display())
        }
        PipelineEvent::ChannelsDetected { path, channels } => {
            info!("channels={channels} path={}", path.display())
        }
        PipelineEvent::ChannelFinished {
            channel_index,
            output,
            success,
            metadata_preserved,
            ..
        } => info!(
            "channel={} success={} metadata_preserved={} output={}",
            channel_index + 1,
            success,
            metadata_preserved,
            output.display()
        ),
        PipelineEvent::Progress { .. } => {
            if let Some(percent) = event.percent() {
                info!("progress={percent}%");
            }
        }
        PipelineEvent::Warning { message } => warn!("{message}"),
        PipelineEvent::Finished(_) => {}
    }
}

fn finish(summary: &BatchSummary) -> Result<()> {
    for line in summary.report.lines() {
        info!("{line}");
    }
    println!("{}", summary.summary_text());
    println!("{}", summary.notification());
    if !summary.succeeded() {
        std::process::exit(1);
    }
    Ok(())
}

fn fail(message: &str) -> ! {
    println!("ERROR: {message}");
    std::process::exit(1);
}

fn inspect(args: &InspectArgs, cfg: &config::Config) -> Result<()> {
    let reader = MetadataReader::open_with(&args.input, &cfg.metadata);
    if args.json {
        let output = InspectOutput {
            path: reader.path(),
            fields: reader.fields(),
            issues: reader.issues(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }
    println!("{}", reader.path().display());
    if reader.fields().is_empty() {
        println!("  (no BEXT/iXML metadata)");
    }
    for (field, value) in reader.fields().iter() {
        println!("  {field}: {value}");
    }
    for issue in reader.issues() {
        println!("  ! {issue}");
    }
    Ok(())
}
