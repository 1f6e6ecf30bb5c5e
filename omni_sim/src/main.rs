//! Omni-Engine Simulator CLI
//!
//! Runs the deterministic scenario catalog, or drives one live viewer on
//! the tokio clock (`--realtime`).

use clap::Parser;
use omni_core::viewer::ViewerHandle;
use omni_env::{ContentGenerator, ServiceController, TokioContext};
use omni_sim::scenarios::ScenarioId;
use omni_sim::{
    fixtures, FileGenerator, ScenarioResult, ScenarioRunner, ScriptedAssistant, ScriptedGenerator,
    SimConfig, SimError, SimServiceController,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Omni-Engine Deterministic Simulation CLI
#[derive(Parser, Debug)]
#[command(name = "omni-sim")]
#[command(about = "Run deterministic simulations of the Omni-Engine scene runtime", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Scenario to run (solar_system, mid_swap, camera_storm, ..., all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Number of consecutive seeds to test (for CI mode)
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// Length of open-ended phases in seconds (input storm, soak, realtime session)
    #[arg(short, long, default_value = "10")]
    duration: f64,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Export sampled frames of a single scenario to a JSON file
    #[arg(long)]
    export: Option<PathBuf>,

    /// Scene document served by the generator in realtime mode
    #[arg(long)]
    document: Option<PathBuf>,

    /// JSON file with frame rate, latency and viewer settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Drive one viewer on the real clock instead of running scenarios
    #[arg(long)]
    realtime: bool,

    /// Prompt used in realtime mode
    #[arg(long, default_value = "Show me how the earth orbits the sun")]
    query: String,
}

fn load_config(path: Option<&Path>) -> Result<SimConfig, SimError> {
    let Some(path) = path else {
        return Ok(SimConfig::default());
    };
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Runs one viewer against the tokio clock and logs its progress.
async fn realtime_session<G: ContentGenerator>(
    context: Arc<TokioContext>,
    generator: Arc<G>,
    config: &SimConfig,
    query: &str,
    duration: f64,
) -> bool {
    let assistant_controller = SimServiceController::new(config.seed);
    assistant_controller.set_latency_ms(config.latency_ms.0, config.latency_ms.1);
    let assistant = Arc::new(ScriptedAssistant::new(context.clone(), assistant_controller));
    let handle = ViewerHandle::new(context, generator, assistant, config.viewer.clone());

    info!("Generating: \"{}\"", query);
    if let Err(e) = handle.generate(query).await {
        error!("Generation failed: {}", e);
        return false;
    }
    {
        let viewer = handle.lock();
        let view = viewer.view();
        info!(
            "Loaded \"{}\" ({} steps)",
            view.title.as_deref().unwrap_or("untitled"),
            view.segments.len()
        );
        if let Some(verdict) = view.verdict {
            info!("Verdict: {}", verdict);
        }
    }

    let frames = handle.start_frame_loop();
    let mut rx = frames.subscribe();
    let end = tokio::time::sleep(Duration::from_secs_f64(duration.max(0.0)));
    tokio::pin!(end);
    let mut last_label = String::new();

    loop {
        tokio::select! {
            _ = &mut end => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    warn!("frame loop ended early");
                    break;
                }
                let view = handle.lock().view();
                if view.step_label != last_label {
                    info!("{} | {}", view.step_label, view.chapter_title);
                    if let Some(text) = view.explanation {
                        info!("  {}", text);
                    }
                    last_label = view.step_label;
                }
            }
        }
    }
    let rendered = frames.latest().map_or(0, |frame| frame.sequence);
    frames.stop();
    info!("Rendered {} frames", rendered);

    let question = handle
        .lock()
        .chat()
        .suggested_questions()
        .first()
        .cloned()
        .unwrap_or_else(|| "What am I looking at?".to_string());
    handle.send_chat(&question).await;
    if let Some(reply) = handle.lock().chat().messages().last() {
        info!("Q: {}", question);
        info!("A: {}", reply.text);
    }
    true
}

fn run_realtime(args: &Args, config: &SimConfig) -> Result<bool, SimError> {
    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    let passed = runtime.block_on(async {
        let context = TokioContext::shared();
        match &args.document {
            Some(path) => {
                let generator = Arc::new(FileGenerator::new(path));
                realtime_session(context, generator, config, &args.query, args.duration).await
            }
            None => {
                let controller = SimServiceController::new(config.seed);
                controller.set_latency_ms(config.latency_ms.0, config.latency_ms.1);
                let generator = Arc::new(
                    ScriptedGenerator::new(context.clone(), controller).with_fallback(fixtures::SOLAR_SYSTEM),
                );
                realtime_session(context, generator, config, &args.query, args.duration).await
            }
        }
    });
    Ok(passed)
}

fn log_result(result: &ScenarioResult) {
    if result.passed {
        info!("✓ {} (seed={}) PASSED", result.scenario.name(), result.seed);
    } else {
        error!(
            "✗ {} (seed={}) FAILED: {}",
            result.scenario.name(),
            result.seed,
            result.failure_reason.as_deref().unwrap_or("unknown")
        );
    }
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    let mut config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    // Determine base seed
    let base_seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(1)
    } else {
        args.seed
    };
    config.seed = base_seed;
    config.max_duration_secs = args.duration;

    if !args.json {
        info!("Omni-Engine Simulator v0.1.0");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    if args.realtime {
        match run_realtime(&args, &config) {
            Ok(true) => return,
            Ok(false) => std::process::exit(1),
            Err(e) => {
                error!("Realtime session failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    // Parse scenarios
    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        match args.scenario.parse() {
            Ok(scenario) => vec![scenario],
            Err(e) => {
                eprintln!("Error: {}", SimError::UnknownScenario(e));
                let names: Vec<&str> = ScenarioId::all().iter().map(|s| s.name()).collect();
                eprintln!("Available scenarios: {}, all", names.join(", "));
                std::process::exit(1);
            }
        }
    };

    // Handle --export mode
    if let Some(export_path) = &args.export {
        if scenarios.len() > 1 {
            eprintln!("Error: --export only supports a single scenario, not 'all'");
            std::process::exit(1);
        }

        let (result, export) = ScenarioRunner::from_config(&config).run_with_export(scenarios[0]);
        log_result(&result);
        match export.write_to_file(export_path) {
            Ok(()) => info!("Exported {} frames to {}", export.frames.len(), export_path.display()),
            Err(e) => error!("Failed to write export: {}", e),
        }

        if !result.passed {
            std::process::exit(1);
        }
        return;
    }

    // Run simulations
    let mut all_results: Vec<ScenarioResult> = Vec::new();
    let mut failed_count = 0;

    for seed_offset in 0..args.seeds {
        let seed = base_seed.wrapping_add(seed_offset as u64);
        let runner = ScenarioRunner::from_config(&config).with_seed(seed);

        for scenario in &scenarios {
            let result = runner.run(*scenario);
            if !args.json {
                log_result(&result);
            }
            if !result.passed {
                failed_count += 1;
            }
            all_results.push(result);
        }
    }

    // Summary
    let total = all_results.len();
    let passed = total - failed_count;

    if args.json {
        // JSON output for CI parsing
        let summary = serde_json::json!({
            "total": total,
            "passed": passed,
            "failed": failed_count,
            "results": all_results.iter().map(|r| {
                serde_json::json!({
                    "scenario": r.scenario.name(),
                    "seed": r.seed,
                    "passed": r.passed,
                    "frames": r.total_frames,
                    "time_secs": r.final_time_secs,
                    "failure_reason": r.failure_reason,
                    "metrics": r.metrics,
                })
            }).collect::<Vec<_>>(),
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("Failed to serialize summary: {}", e),
        }
    } else {
        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        if failed_count == 0 {
            info!("✅ All {} scenario runs passed!", total);
        } else {
            error!("❌ {}/{} scenario runs failed!", failed_count, total);

            for result in all_results.iter().filter(|r| !r.passed) {
                error!(
                    "  - {} seed={}: {}",
                    result.scenario.name(),
                    result.seed,
                    result.failure_reason.as_deref().unwrap_or("unknown")
                );
            }
        }
    }

    // Exit with proper code for CI
    if failed_count > 0 {
        std::process::exit(1);
    }
}
