use clap::Parser;
use phasegate_cli::commands::{self, cli};
use phasegate_core::error::CliError;
use phasegate_core::AppContext;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

static LOG_GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
    std::sync::OnceLock::new();

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let exit = match real_main().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e}");
            commands::exit_code_for_error(&e)
        }
    };

    std::process::exit(exit);
}

async fn real_main() -> Result<i32, CliError> {
    let args = cli::Args::parse();
    let mut cfg = phasegate_core::config::load(args.config.as_deref())
        .map_err(|e| CliError::Config(format!("{e:#}")))?;
    if let cli::Commands::Run(run_args) = &args.command {
        commands::run::apply_overrides(&mut cfg, run_args);
    }
    init_tracing(&cfg.logging).map_err(CliError::Config)?;

    let project_root = match args.project {
        Some(root) => root,
        None => std::env::current_dir()?,
    };
    let services = phasegate_plugins::build_services(&cfg)
        .map_err(|e| CliError::Config(format!("{e:#}")))?;
    let ctx = AppContext::new(cfg, project_root, services)?;

    match args.command {
        cli::Commands::Run(run_args) => commands::run::run(run_args, &ctx).await,
        cli::Commands::Graph(out) => commands::graph::graph(out, &ctx),
        cli::Commands::Status(out) => commands::status::status(out, &ctx),
        cli::Commands::Check(check_args) => commands::check::check(check_args, &ctx).await,
    }
}

fn init_tracing(logging: &phasegate_core::config::LoggingConfig) -> Result<(), String> {
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
            Some(d) => std::path::PathBuf::from(d),
            None => std::env::temp_dir().join("phasegate"),
        };

        std::fs::create_dir_all(&dir).map_err(|e| format!("create log dir failed: {e}"))?;
        let file_name = format!("phasegate.{}.log", std::process::id());
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
