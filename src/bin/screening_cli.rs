use std::collections::BTreeMap;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use hearing_screen::audio::backend::{SilentToneBackend, ThreadTimer, WavToneBackend};
use hearing_screen::audio::{Clock, SystemClock, Timer, ToneBackend};
use hearing_screen::calibration::CalibrationStore;
use hearing_screen::config::AppConfig;
use hearing_screen::error::log_session_error;
use hearing_screen::testing::{ManualTimer, OfflineScorer, SimulatedListener, StubClock};
use hearing_screen::{
    ErrorCode, Frequency, Gender, Level, PatientIdentity, ResponseOutcome, ResultSubmitter,
    ScreeningResult, SessionDeps, SessionError, StepSize, TestSession, ToneScheduler, Trial,
};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(
    name = "screening_cli",
    about = "Adaptive pure-tone hearing screening from the command line"
)]
struct Cli {
    /// JSON configuration file (defaults apply when missing)
    #[arg(long, default_value = "assets/screening_config.json")]
    config: PathBuf,
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Debug)]
struct PatientArgs {
    #[arg(long)]
    last_name: String,
    #[arg(long)]
    first_name: String,
    #[arg(long, default_value = "")]
    middle_name: String,
    /// ISO date, e.g. 1984-03-21
    #[arg(long)]
    birth_date: String,
    #[arg(long, value_enum, default_value_t = GenderArg::M)]
    gender: GenderArg,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run an interactive screening, answering y/n on stdin
    Run {
        #[command(flatten)]
        patient: PatientArgs,
        #[arg(long, value_enum, default_value_t = BackendArg::Device)]
        backend: BackendArg,
        /// Directory for --backend wav
        #[arg(long, default_value = "tones")]
        wav_dir: PathBuf,
        /// Initial step size in dB (1, 2 or 5)
        #[arg(long)]
        step: Option<u8>,
    },
    /// Run a full session against a simulated listener and print the trial log
    Simulate {
        /// Listener threshold in dB for every frequency
        #[arg(long, conflicts_with_all = ["threshold_at", "pattern"])]
        threshold: Option<u8>,
        /// Per-frequency threshold, e.g. 4000=45 (repeatable)
        #[arg(long, value_parser = parse_threshold, conflicts_with = "pattern")]
        threshold_at: Vec<(Frequency, Level)>,
        /// Fixed answers cycled through, e.g. yynyn
        #[arg(long)]
        pattern: Option<String>,
        #[arg(long)]
        step: Option<u8>,
        /// Record every presented tone as WAV into this directory
        #[arg(long)]
        wav_dir: Option<PathBuf>,
        /// Post the log to the configured scoring service
        #[arg(long)]
        submit: bool,
        /// Write the report here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print the effective calibration table
    Calibration,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum GenderArg {
    M,
    F,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum BackendArg {
    /// Default output device
    Device,
    /// Write each tone to a WAV file
    Wav,
    /// No output
    Silent,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = AppConfig::load_from_file(&cli.config);

    match cli.command {
        Commands::Run {
            patient,
            backend,
            wav_dir,
            step,
        } => run_interactive(&config, patient.into(), backend, wav_dir, step),
        Commands::Simulate {
            threshold,
            threshold_at,
            pattern,
            step,
            wav_dir,
            submit,
            output,
        } => {
            let listener = build_listener(threshold, threshold_at, pattern)?;
            run_simulation(&config, listener, step, wav_dir, submit, output)
        }
        Commands::Calibration => run_calibration(&config),
    }
}

impl From<PatientArgs> for PatientIdentity {
    fn from(args: PatientArgs) -> Self {
        PatientIdentity {
            last_name: args.last_name,
            first_name: args.first_name,
            middle_name: args.middle_name,
            gender: match args.gender {
                GenderArg::M => Gender::Male,
                GenderArg::F => Gender::Female,
            },
            birth_date: args.birth_date,
            ..Default::default()
        }
    }
}

fn parse_threshold(raw: &str) -> Result<(Frequency, Level), String> {
    let (hz, db) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected HZ=DB, got '{}'", raw))?;
    let hz: u32 = hz.trim().parse().map_err(|e| format!("bad frequency: {e}"))?;
    let db: u8 = db.trim().parse().map_err(|e| format!("bad level: {e}"))?;
    let frequency = Frequency::try_from(hz)?;
    Ok((frequency, Level::new(db)))
}

fn parse_step(step: Option<u8>) -> Result<Option<StepSize>> {
    step.map(|db| StepSize::try_from(db).map_err(anyhow::Error::msg))
        .transpose()
}

fn build_listener(
    threshold: Option<u8>,
    threshold_at: Vec<(Frequency, Level)>,
    pattern: Option<String>,
) -> Result<SimulatedListener> {
    if let Some(pattern) = pattern {
        let answers = pattern
            .chars()
            .map(|c| match c.to_ascii_lowercase() {
                'y' | '1' => Ok(true),
                'n' | '0' => Ok(false),
                other => Err(anyhow::anyhow!("pattern may only contain y/n, got '{}'", other)),
            })
            .collect::<Result<Vec<bool>>>()?;
        if answers.is_empty() {
            bail!("pattern must not be empty");
        }
        return Ok(SimulatedListener::pattern(answers));
    }
    if !threshold_at.is_empty() {
        let map: BTreeMap<Frequency, Level> = threshold_at.into_iter().collect();
        return Ok(SimulatedListener::PerFrequency(map));
    }
    Ok(SimulatedListener::threshold(threshold.unwrap_or(30)))
}

fn build_submitter(config: &AppConfig, offline: bool) -> Result<Arc<dyn ResultSubmitter>> {
    if offline {
        return Ok(Arc::new(OfflineScorer));
    }
    let submitter = config
        .submission
        .build()
        .map_err(|e| anyhow::anyhow!(e.message()))
        .context("creating scoring-service client")?;
    Ok(Arc::new(submitter))
}

fn build_backend(
    config: &AppConfig,
    backend: BackendArg,
    wav_dir: PathBuf,
) -> Result<Arc<dyn ToneBackend>> {
    match backend {
        BackendArg::Device => device_backend(config),
        BackendArg::Wav => {
            let wav = WavToneBackend::new(wav_dir, config.audio.sample_rate, config.audio.fade())
                .map_err(|e| anyhow::anyhow!(e.message()))
                .context("preparing WAV output directory")?;
            Ok(Arc::new(wav))
        }
        BackendArg::Silent => Ok(Arc::new(SilentToneBackend::new())),
    }
}

#[cfg(feature = "cpal-output")]
fn device_backend(config: &AppConfig) -> Result<Arc<dyn ToneBackend>> {
    Ok(Arc::new(hearing_screen::audio::CpalToneBackend::new(
        config.audio.fade(),
    )))
}

#[cfg(not(feature = "cpal-output"))]
fn device_backend(_config: &AppConfig) -> Result<Arc<dyn ToneBackend>> {
    bail!("built without the cpal-output feature; use --backend wav or --backend silent")
}

fn run_interactive(
    config: &AppConfig,
    patient: PatientIdentity,
    backend: BackendArg,
    wav_dir: PathBuf,
    step: Option<u8>,
) -> Result<ExitCode> {
    let mut session_config = config.session.clone();
    if let Some(step) = parse_step(step)? {
        session_config.step_size_db = step;
    }

    let backend = build_backend(config, backend, wav_dir)?;
    let timer: Arc<dyn Timer> = Arc::new(ThreadTimer::default());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::default());
    let mut session = TestSession::new(
        session_config,
        SessionDeps {
            scheduler: ToneScheduler::new(backend, timer),
            calibration_source: config.calibration.build(),
            submitter: build_submitter(config, false)?,
            clock,
        },
    )
    .map_err(session_error("new"))?;

    session
        .start(patient)
        .map_err(session_error("start"))
        .context("starting session")?;

    println!("Answer y (heard) or n (not heard). s1/s2/s5 change the step, q ends early.");
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        let (Some(frequency), Some(level)) = (session.current_frequency(), session.current_level())
        else {
            break;
        };
        print!("[{} @ {}] heard? ", frequency, level);
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            println!();
            return finish_early(&mut session);
        };
        let answer = line?.trim().to_ascii_lowercase();
        let heard = match answer.as_str() {
            "y" | "yes" => true,
            "n" | "no" => false,
            "q" | "quit" => return finish_early(&mut session),
            step if step.starts_with('s') => {
                match step[1..].parse::<u8>().ok().map(StepSize::try_from) {
                    Some(Ok(size)) => session.set_step_size(size),
                    _ => println!("Step must be s1, s2 or s5"),
                }
                continue;
            }
            _ => {
                println!("Please answer y or n");
                continue;
            }
        };

        let outcome = session
            .record_response(heard)
            .map_err(session_error("record_response"))?;
        match outcome {
            ResponseOutcome::NextTrial { .. } => {}
            ResponseOutcome::FrequencyAdvanced { frequency, .. } => {
                println!("--- {} ---", frequency);
            }
            ResponseOutcome::Completed { submission } => {
                return report_submission(
                    submission.map_err(|e| logged_message(&e, "submit")),
                    session.trial_log(),
                );
            }
        }
    }
    Ok(ExitCode::from(0))
}

fn session_error(context: &'static str) -> impl Fn(SessionError) -> anyhow::Error {
    move |err| anyhow::anyhow!(logged_message(&err, context))
}

fn logged_message(err: &SessionError, context: &str) -> String {
    log_session_error(err, context);
    err.message()
}

fn finish_early(session: &mut TestSession) -> Result<ExitCode> {
    let submission = session.end().map_err(|e| logged_message(&e, "end"));
    report_submission(submission, session.trial_log())
}

fn report_submission(
    submission: std::result::Result<ScreeningResult, String>,
    trials: &[Trial],
) -> Result<ExitCode> {
    println!("{} trials recorded", trials.len());
    match submission {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(ExitCode::from(0))
        }
        Err(message) => {
            eprintln!("Submission failed: {message}");
            Ok(ExitCode::from(2))
        }
    }
}

#[derive(Serialize)]
struct SimulationReport<'a> {
    patient: &'a PatientIdentity,
    trials: &'a [Trial],
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<ScreeningResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn run_simulation(
    config: &AppConfig,
    listener: SimulatedListener,
    step: Option<u8>,
    wav_dir: Option<PathBuf>,
    submit: bool,
    output: Option<PathBuf>,
) -> Result<ExitCode> {
    let mut session_config = config.session.clone();
    if let Some(step) = parse_step(step)? {
        session_config.step_size_db = step;
    }

    let backend = match wav_dir {
        Some(dir) => build_backend(config, BackendArg::Wav, dir)?,
        None => build_backend(config, BackendArg::Silent, PathBuf::new())?,
    };
    let timer = Arc::new(ManualTimer::new());
    let mut session = TestSession::new(
        session_config,
        SessionDeps {
            scheduler: ToneScheduler::new(backend, timer.clone()),
            calibration_source: config.calibration.build(),
            submitter: build_submitter(config, !submit)?,
            clock: Arc::new(StubClock::default()),
        },
    )
    .map_err(session_error("new"))?;

    let patient = PatientIdentity {
        last_name: "Listener".to_string(),
        first_name: "Simulated".to_string(),
        birth_date: "1970-01-01".to_string(),
        ..Default::default()
    };
    session
        .start(patient.clone())
        .map_err(session_error("start"))?;

    let submission = loop {
        let (Some(frequency), Some(level)) = (session.current_frequency(), session.current_level())
        else {
            bail!("session stopped without completing");
        };
        let heard = listener.hears(frequency, level);
        let outcome = session
            .record_response(heard)
            .map_err(session_error("record_response"))?;
        timer.run_until_idle();
        if let ResponseOutcome::Completed { submission } = outcome {
            break submission.map_err(|e| logged_message(&e, "submit"));
        }
    };

    let (result, error) = match submission {
        Ok(result) => (Some(result), None),
        Err(message) => (None, Some(message)),
    };
    let failed = error.is_some();
    let report = SimulationReport {
        patient: &patient,
        trials: session.trial_log(),
        result,
        error,
    };
    let json = serde_json::to_string_pretty(&report)?;
    match output {
        Some(path) => fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?,
        None => println!("{json}"),
    }

    Ok(ExitCode::from(if failed { 2 } else { 0 }))
}

fn run_calibration(config: &AppConfig) -> Result<ExitCode> {
    let source = config.calibration.build();
    let store = CalibrationStore::load(source.as_ref());
    println!(
        "Calibration from {}{}",
        source.describe(),
        if store.is_default() { " (built-in defaults)" } else { "" }
    );
    for (frequency, entry) in store.effective_table() {
        match entry {
            Some(entry) => println!(
                "{:>8}  factor {:>6.3}  max {:>5.1} dB",
                frequency, entry.gain_factor, entry.max_level
            ),
            None => println!("{:>8}  missing", frequency),
        }
    }
    Ok(ExitCode::from(0))
}
