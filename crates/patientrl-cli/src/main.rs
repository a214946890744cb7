//! CLI for patientrl.
//!
//! Evaluates and trains per-patient response-strategy policies against a
//! directory of JSON models, and replays outcome feedback logs with a
//! resumable line cursor.

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use patientrl_agent::{AgentConfig, AgentRegistry, FileStore, Hyperparameters, UpdateReport};
use patientrl_core::{Action, OutcomeEvent, State, StateInputs};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding one JSON model per patient
    #[arg(long, env = "PATIENTRL_STORE_DIR", default_value = "data/models", global = true)]
    store_dir: PathBuf,

    /// JSON file with alpha/gamma/epsilon, rewards and markers
    #[arg(long, env = "PATIENTRL_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Debug, Clone)]
struct StateArgs {
    /// Category of the current state
    #[arg(long)]
    category: String,

    /// Risk assessment text of the current state
    #[arg(long)]
    risk: Option<String>,
}

impl StateArgs {
    fn inputs(&self) -> StateInputs {
        StateInputs::new(self.category.clone(), self.risk.as_deref())
    }
}

#[derive(clap::Args, Debug, Clone)]
struct NextStateArgs {
    /// Category of the follow-up state; omit for a terminal transition
    #[arg(long)]
    next_category: Option<String>,

    /// Risk assessment text of the follow-up state
    #[arg(long, requires = "next_category")]
    next_risk: Option<String>,
}

impl NextStateArgs {
    fn inputs(&self) -> Option<StateInputs> {
        self.next_category
            .as_ref()
            .map(|c| StateInputs::new(c.clone(), self.next_risk.as_deref()))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Choose an action for a patient's current state
    Decide {
        #[arg(long)]
        patient: String,
        #[command(flatten)]
        state: StateArgs,
    },
    /// Apply a raw reward to a (state, action) pair
    Update {
        #[arg(long)]
        patient: String,
        #[command(flatten)]
        state: StateArgs,
        /// Action id (0 or 1)
        #[arg(long)]
        action: Action,
        #[arg(long, allow_hyphen_values = true)]
        reward: f64,
        #[command(flatten)]
        next: NextStateArgs,
    },
    /// Report whether the chosen action worked; the reward comes from the reward table
    Feedback {
        #[arg(long)]
        patient: String,
        #[command(flatten)]
        state: StateArgs,
        /// Action id (0 or 1)
        #[arg(long)]
        action: Action,
        /// Whether the response helped the patient
        #[arg(long, action = ArgAction::Set)]
        works: bool,
        #[command(flatten)]
        next: NextStateArgs,
    },
    /// Replay outcome events from a JSONL file
    Replay {
        /// Input file path
        #[arg(long)]
        path: PathBuf,

        /// Start from line number (0-based) - overrides state
        #[arg(long)]
        line_offset: Option<u64>,

        /// Path to the replay state file
        #[arg(long, default_value = "data/patientrl.replay.state.json")]
        state_file: PathBuf,
    },
    /// Print a patient's learned table and greedy policy
    Inspect {
        #[arg(long)]
        patient: String,
    },
}

#[derive(Serialize, Deserialize, Debug)]
struct ReplayState {
    cursor: u64,
    #[serde(with = "time::serde::iso8601::option")]
    last_ok: Option<OffsetDateTime>,
    last_error: Option<String>,
}

impl ReplayState {
    fn load(path: &Path) -> Result<Option<Self>> {
        match File::open(path) {
            Ok(file) => Ok(Some(serde_json::from_reader(BufReader::new(file))?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Replaces the state file through a temp file, so an interrupted
    /// write leaves the previous cursor intact.
    fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        serde_json::to_writer_pretty(File::create(&tmp)?, self)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    fn checkpoint(path: &Path, cursor: u64) -> Result<()> {
        ReplayState {
            cursor,
            last_ok: Some(OffsetDateTime::now_utc()),
            last_error: None,
        }
        .save(path)
        .with_context(|| format!("Failed to save replay cursor {cursor}"))
    }
}

/// Summary of one replay run.
#[derive(Serialize, Debug, Default)]
struct ReplayStats {
    applied: u64,
    unsaved: u64,
    by_patient: BTreeMap<String, u64>,
    cursor: u64,
}

/// Events past the cursor, each paired with the cursor value that marks it
/// as done.
struct EventBatch {
    events: Vec<(u64, OutcomeEvent)>,
    next_cursor: u64,
}

#[derive(Serialize)]
struct InspectRow {
    state: State,
    values: [f64; Action::COUNT],
    greedy: Option<Action>,
}

#[derive(Serialize)]
struct InspectReport {
    patient_id: String,
    #[serde(flatten)]
    params: Hyperparameters,
    states: Vec<InspectRow>,
}

fn read_events(path: &Path, offset: u64) -> Result<EventBatch> {
    let file = File::open(path).context("Failed to open input file")?;
    let mut events = Vec::new();
    let mut next_cursor = offset;

    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line_no = idx as u64;
        if line_no < offset {
            continue;
        }
        let line = line?;
        next_cursor = line_no.checked_add(1).context("Cursor overflow")?;
        if line.trim().is_empty() {
            continue;
        }
        let event: OutcomeEvent = serde_json::from_str(&line)
            .with_context(|| format!("Invalid outcome event on line {line_no}"))?;
        events.push((next_cursor, event));
    }

    Ok(EventBatch {
        events,
        next_cursor,
    })
}

fn record_state_error(state_file: &Path, cursor: u64, err_msg: &str) -> Result<()> {
    let old_last_ok = match ReplayState::load(state_file) {
        Ok(Some(s)) => s.last_ok,
        _ => None,
    };

    let state = ReplayState {
        cursor,
        last_ok: old_last_ok,
        last_error: Some(err_msg.to_string()),
    };

    if let Err(e) = state.save(state_file) {
        tracing::error!(
            "Failed to save error state to {:?}. Original error: {}. Save error: {}",
            state_file,
            err_msg,
            e
        );
        return Err(e);
    }

    Ok(())
}

async fn process_replay(
    registry: &AgentRegistry,
    batch: Result<EventBatch>,
    state_file: &Path,
    current_cursor: &mut u64,
) -> Result<ReplayStats> {
    let batch = match batch {
        Ok(batch) => batch,
        Err(e) => {
            let err_msg = format!("{e:#}");
            tracing::error!("Replay failed: {}", err_msg);
            if let Err(e) = record_state_error(state_file, *current_cursor, &err_msg) {
                tracing::error!("Failed to record error state: {}", e);
            }
            return Err(e.context("Replay cycle failed"));
        }
    };

    let mut stats = ReplayStats::default();
    for (done, event) in &batch.events {
        let report = match registry.apply(event).await {
            Ok(report) => report,
            Err(e) => {
                let err_msg = format!(
                    "Failed to apply outcome for {} on line {}: {e}",
                    event.patient_id,
                    done - 1
                );
                tracing::error!("Replay stopped: {}", err_msg);
                if let Err(save_err) = record_state_error(state_file, *current_cursor, &err_msg) {
                    tracing::error!("Failed to record error state: {}", save_err);
                }
                return Err(anyhow::Error::new(e).context("Replay cycle failed"));
            }
        };
        stats.applied += 1;
        if !report.persistence.is_saved() {
            stats.unsaved += 1;
        }
        *stats.by_patient.entry(event.patient_id.clone()).or_insert(0) += 1;

        // The model is already saved; advance past this event before the next.
        *current_cursor = *done;
        ReplayState::checkpoint(state_file, *current_cursor)?;
    }

    // Trailing blank lines.
    *current_cursor = batch.next_cursor;
    stats.cursor = *current_cursor;
    ReplayState::checkpoint(state_file, *current_cursor)?;

    tracing::info!(
        "Replayed {} events, cursor now {}",
        stats.applied,
        *current_cursor
    );
    Ok(stats)
}

async fn inspect(registry: &AgentRegistry, patient: &str) -> InspectReport {
    let handle = registry.agent(patient).await;
    let agent = handle.lock().await;
    let learner = agent.learner();
    let states = learner
        .table()
        .iter()
        .map(|(state, values)| InspectRow {
            state: state.clone(),
            values: *values,
            greedy: learner.table().best_action(state),
        })
        .collect();
    InspectReport {
        patient_id: patient.to_string(),
        params: learner.params,
        states,
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    serde_json::to_writer_pretty(std::io::stdout(), value)?;
    println!();
    Ok(())
}

fn print_update(report: &UpdateReport) -> Result<()> {
    if !report.persistence.is_saved() {
        tracing::warn!(
            "update for {} applied in memory only",
            report.patient_id
        );
    }
    print_json(report)
}

fn load_config(path: Option<&Path>) -> Result<AgentConfig> {
    match path {
        Some(p) => AgentConfig::from_path(p)
            .with_context(|| format!("Failed to load config from {}", p.display())),
        None => Ok(AgentConfig::default()),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    let store = Arc::new(FileStore::new(&cli.store_dir));
    let registry = AgentRegistry::new(store, config);

    match cli.command {
        Commands::Decide { patient, state } => {
            let decision = registry.decide(&patient, &state.inputs()).await;
            print_json(&decision)?;
        }
        Commands::Update {
            patient,
            state,
            action,
            reward,
            next,
        } => {
            let report = registry
                .update_model(
                    &patient,
                    &state.inputs(),
                    action,
                    reward,
                    next.inputs().as_ref(),
                )
                .await?;
            print_update(&report)?;
        }
        Commands::Feedback {
            patient,
            state,
            action,
            works,
            next,
        } => {
            let report = registry
                .record_outcome(
                    &patient,
                    &state.inputs(),
                    action,
                    works,
                    next.inputs().as_ref(),
                )
                .await?;
            print_update(&report)?;
        }
        Commands::Replay {
            path,
            line_offset,
            state_file,
        } => {
            let mut current_cursor = line_offset.unwrap_or(0);

            if line_offset.is_none() {
                if let Ok(Some(state)) = ReplayState::load(&state_file) {
                    current_cursor = state.cursor;
                    tracing::info!("Resuming from line offset: {}", current_cursor);
                }
            }

            let stats = process_replay(
                &registry,
                read_events(&path, current_cursor),
                &state_file,
                &mut current_cursor,
            )
            .await?;
            print_json(&stats)?;
        }
        Commands::Inspect { patient } => {
            let report = inspect(&registry, &patient).await;
            print_json(&report)?;
        }
    }

    Ok(())
}
