use clap::Parser;
use rollout_cli::commands::{cli, plugins, run, validate, version};
use rollout_core::api::{AppConfig, CliError, LoggingConfig};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

static LOG_GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
    std::sync::OnceLock::new();

#[tokio::main]
async fn main() {
    let exit = match real_main().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e}");
            exit_code_for_error(&e)
        }
    };

    std::process::exit(exit);
}

async fn real_main() -> Result<i32, CliError> {
    let args = cli::Args::parse();
    let mut cfg = load_config(&args)?;
    if args.verbose {
        cfg.logging.level = "debug".to_string();
    }
    init_tracing(&cfg.logging).map_err(CliError::Config)?;

    match args.command {
        cli::Commands::Run(run_args) => {
            let cancel = CancellationToken::new();
            spawn_ctrl_c(cancel.clone());
            run::run_plan(&run_args, &cfg, cancel).await
        }
        cli::Commands::Validate(validate_args) => {
            println!("{}", validate::validate_plan(&validate_args, args.verbose)?);
            Ok(0)
        }
        cli::Commands::Plugins(plugins_args) => {
            println!("{}", plugins::list_plugins(&plugins_args, &cfg)?);
            Ok(0)
        }
        cli::Commands::Version => {
            println!("{}", version::version_text());
            Ok(0)
        }
    }
}

fn load_config(args: &cli::Args) -> Result<AppConfig, CliError> {
    let loaded = match &args.config {
        Some(path) => rollout_core::api::load_from_path(path),
        None => rollout_core::api::load_default(),
    };
    loaded.map_err(|e| CliError::Config(format!("{e:#}")))
}

/// First Ctrl-C stops dispatching new work; jobs already running finish.
fn spawn_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling execution");
            cancel.cancel();
        }
    });
}

fn exit_code_for_error(e: &CliError) -> i32 {
    // 0: success
    // 11: config / plan error
    // 20: IO error
    // 30: execution failed
    // 31: execution cancelled
    // 50: internal/uncategorized
    match e {
        CliError::Config(_) => 11,
        CliError::Plan(_) => 11,
        CliError::Io(_) => 20,
        CliError::Command(_) => 20,
        CliError::Run(failure) if failure.cause.is_cancelled() => 31,
        CliError::Run(_) => 30,
        CliError::Plugin(_) => 50,
        CliError::Anyhow(_) => 50,
    }
}

fn init_tracing(logging: &LoggingConfig) -> Result<(), String> {
    if !logging.enabled {
        return Ok(());
    }

    let filter = match std::env::var("RUST_LOG") {
        Ok(v) if !v.trim().is_empty() => EnvFilter::from_default_env(),
        _ => EnvFilter::try_new(logging.level.clone()).map_err(|e| e.to_string())?,
    };

    let mut maybe_writer = None;

    if logging.file {
        let dir = match logging
            .directory
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            Some(d) => std::path::PathBuf::from(shellexpand::tilde(d).into_owned()),
            None => std::env::temp_dir().join("rollout"),
        };

        std::fs::create_dir_all(&dir).map_err(|e| format!("create log dir failed: {e}"))?;
        let file_name = format!("rollout.{}.log", std::process::id());
        let appender = tracing_appender::rolling::never(dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        let _ = LOG_GUARD.set(guard);
        maybe_writer = Some(non_blocking);
    }

    if !logging.console && maybe_writer.is_none() {
        return Err("logging disabled for both console and file".to_string());
    }

    let console_layer = logging.console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(atty::is(atty::Stream::Stderr))
    });

    let file_layer = maybe_writer.map(|w| {
        tracing_subscriber::fmt::layer()
            .with_writer(w)
            .with_ansi(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(())
}
