use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tokio::sync::mpsc;

use hotbind_lib::hotkey::{BackendKind, DispatchRouter, HotkeyEvent, create_backend};
use hotbind_lib::platform;
use hotbind_lib::script::{ScriptOptions, ScriptRuntime};
use hotbind_lib::state::{AppConfig, ConfigManager, GlobalConfig};
use hotbind_lib::utils::logging::init_logging;
use hotbind_lib::utils::{AppError, AppResult};

const USAGE: &str = "Usage: hotbind [--config PATH] [--script PATH] [--simulate]";

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    script: Option<PathBuf>,
    simulate: bool,
}

impl Args {
    fn parse() -> Result<Self> {
        let mut args = Self::default();
        let mut iter = std::env::args().skip(1);

        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--config" => {
                    args.config = Some(iter.next().context("--config requires a path")?.into());
                }
                "--script" => {
                    args.script = Some(iter.next().context("--script requires a path")?.into());
                }
                "--simulate" => args.simulate = true,
                "-h" | "--help" => {
                    println!("{USAGE}");
                    std::process::exit(0);
                }
                other => bail!("unknown argument '{other}'\n{USAGE}"),
            }
        }
        Ok(args)
    }
}

fn load_config(args: &Args) -> AppResult<AppConfig> {
    let mut config = match &args.config {
        Some(path) => ConfigManager::load_from(path)?,
        None => ConfigManager::load()?,
    };

    if args.simulate {
        config.backend = BackendKind::Simulated;
    }
    if let Some(script) = &args.script {
        config.script.path = Some(script.clone());
    }
    Ok(config)
}

async fn log_events(mut events: mpsc::Receiver<HotkeyEvent>) {
    while let Some(event) = events.recv().await {
        tracing::info!(id = event.id, is_down = event.is_down, "Hotkey event");
    }
}

/// 把错误以用户可读的形式输出到终端
fn report_failure(err: &AppError) {
    let ctx = err.context();
    tracing::error!(code = ?ctx.code, detail = ?ctx.detail, recoverable = ctx.recoverable, "hotbind failed");
    eprintln!("hotbind: {ctx}");
}

fn run(config: &GlobalConfig) -> AppResult<()> {
    let snapshot = config.get();
    tracing::info!(
        backend = ?snapshot.backend,
        strict = config.strict(),
        bindings = snapshot.hotkeys.bindings.len(),
        "Starting hotbind"
    );

    let router = DispatchRouter::global();
    let backend = create_backend(snapshot.backend, Arc::clone(&router))?;

    let runtime = ScriptRuntime::new(
        backend,
        router,
        ScriptOptions {
            strict: config.strict(),
            script_id_base: snapshot.script.script_id_base,
        },
    )?;

    for binding in &snapshot.hotkeys.bindings {
        match runtime.bridge().register(binding.id, binding.keys) {
            Ok(_) => tracing::info!(id = binding.id, hotkey = %binding.display_name(), "Config hotkey registered"),
            Err(e) => {
                let err = AppError::from(e);
                tracing::warn!(id = binding.id, error = %err, hint = ?err.recovery_hint(), "Failed to register config hotkey");
            }
        }
    }

    if let Some(path) = &snapshot.script.path {
        runtime.load_file(path)?;
    }

    let tokio_runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .map_err(|e| AppError::Internal(format!("failed to create tokio runtime: {e}")))?;
    tokio_runtime.spawn(log_events(runtime.bridge().subscribe()));

    platform::run_event_loop()?;

    let released = runtime.shutdown();
    tracing::info!(released, "hotbind stopped");
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse()?;
    let config = match load_config(&args) {
        Ok(config) => GlobalConfig::new(config),
        Err(e) => {
            report_failure(&e);
            return Err(e.into());
        }
    };
    init_logging(&config.get().logging.filter);

    if let Err(e) = run(&config) {
        report_failure(&e);
        return Err(e.into());
    }
    Ok(())
}
