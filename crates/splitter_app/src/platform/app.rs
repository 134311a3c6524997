use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context};
use engine_logging::{engine_info, engine_warn};
use log::LevelFilter;
use splitter_core::{
    render, update, AppState, ArtifactStatus, ContentHandle, Contract, ControllerConfig, Msg,
    Phase, Severity, SourceFile, DEFAULT_MAX_PART_MB,
};
use splitter_engine::{EngineHandle, EngineSettings};

use super::console::Console;
use super::effects::EffectRunner;
use super::logging::{self, LogDestination};

/// Split a PDF into size-limited parts on a remote splitting service.
#[derive(Debug, clap::Parser)]
#[command(name = "splitter", version)]
pub struct Args {
    /// Base URL of the splitting service.
    #[arg(long)]
    pub server: String,
    /// PDF file to split.
    #[arg(long)]
    pub file: PathBuf,
    /// Maximum size of each part, in MB.
    #[arg(long, default_value_t = DEFAULT_MAX_PART_MB)]
    pub max_part_mb: f64,
    /// Directory the resulting ZIP is written to.
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,
    /// Use the legacy single-request `/split` endpoint.
    #[arg(long)]
    pub single_shot: bool,
    /// Give up when the progress stream stays silent this long. 0 waits forever.
    #[arg(long, default_value_t = 300)]
    pub idle_timeout_secs: u64,
    #[arg(long, value_enum, default_value_t = LogDestination::Terminal)]
    pub log: LogDestination,
    /// Log at debug level.
    #[arg(long)]
    pub verbose: bool,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Saved(PathBuf),
    /// The server finished the job but the archive could not be stored.
    SaveFailed,
    Failed,
}

impl Outcome {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Outcome::Saved(_) => ExitCode::SUCCESS,
            Outcome::SaveFailed | Outcome::Failed => ExitCode::FAILURE,
        }
    }
}

pub fn run_app(args: Args) -> anyhow::Result<Outcome> {
    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    logging::initialize(args.log, level);

    let source = read_source(&args.file)?;
    let idle_timeout = (args.idle_timeout_secs > 0).then_some(args.idle_timeout_secs);

    let settings = EngineSettings {
        base_url: args.server.clone(),
        idle_timeout: idle_timeout.map(Duration::from_secs),
        output_dir: args.output_dir.clone(),
        ..EngineSettings::default()
    };
    let engine = EngineHandle::new(settings).context("starting engine")?;
    let runner = EffectRunner::new(engine);

    let config = ControllerConfig {
        contract: if args.single_shot {
            Contract::SingleShot
        } else {
            Contract::Streamed
        },
        max_part_mb: DEFAULT_MAX_PART_MB,
        idle_timeout_secs: idle_timeout,
    };
    engine_info!(
        "splitting {} via {} ({:?}, max part {} MB)",
        source.name,
        args.server,
        config.contract,
        args.max_part_mb
    );

    let mut app = App {
        state: AppState::with_config(config),
        runner,
        console: Console::stdout(),
    };
    app.dispatch(Msg::FileSelected(Some(source)))?;
    app.dispatch(Msg::MaxPartSizeChanged(args.max_part_mb))?;
    if app.rejected_input() {
        return Ok(Outcome::Failed);
    }
    app.dispatch(Msg::SubmitClicked)?;

    loop {
        if let Some(outcome) = app.outcome() {
            if let Outcome::Saved(path) = &outcome {
                engine_info!("finished; archive at {}", path.display());
            }
            return Ok(outcome);
        }
        match app.runner.next_msg() {
            Some(msg) => app.dispatch(msg)?,
            None => bail!("engine stopped before the job finished"),
        }
    }
}

fn read_source(path: &Path) -> anyhow::Result<SourceFile> {
    let meta = std::fs::metadata(path)
        .with_context(|| format!("reading {}", path.display()))?;
    if !meta.is_file() {
        bail!("{} is not a file", path.display());
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .with_context(|| format!("{} has no file name", path.display()))?;
    Ok(SourceFile::new(
        name,
        meta.len(),
        ContentHandle::Path(path.to_path_buf()),
    ))
}

struct App {
    state: AppState,
    runner: EffectRunner,
    console: Console<std::io::Stdout>,
}

impl App {
    fn dispatch(&mut self, msg: Msg) -> anyhow::Result<()> {
        let state = std::mem::take(&mut self.state);
        let (mut state, effects) = update(state, msg);
        let dirty = state.consume_dirty();
        let view = state.view();
        self.state = state;

        self.runner.enqueue(effects);
        if dirty {
            self.console.apply(render(&view)).context("writing to terminal")?;
        }
        Ok(())
    }

    fn rejected_input(&self) -> bool {
        self.state
            .view()
            .status
            .is_some_and(|status| status.severity == Severity::Error)
    }

    /// `Some` once nothing more can happen for the current job.
    fn outcome(&self) -> Option<Outcome> {
        let job = self.state.job()?;
        match (job.phase, &job.artifact) {
            (Phase::Failed, _) => Some(Outcome::Failed),
            (Phase::Completed, ArtifactStatus::Saved(path)) => Some(Outcome::Saved(path.clone())),
            (Phase::Completed, ArtifactStatus::SaveFailed(err)) => {
                engine_warn!("archive not saved: {}", err);
                Some(Outcome::SaveFailed)
            }
            _ => None,
        }
    }
}
