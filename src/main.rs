use std::io;
use std::process::ExitCode;

use meta_composer::{Config, build_registry, program};
use resource_registry::{EXIT_FAILURE, GlobalFlags, dispatch};
use tracing::warn;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn main() -> ExitCode {
    // A broken config must not take `--help` or `--version` down with it.
    let (config, config_error) = match Config::load() {
        Ok(config) => (config, None),
        Err(err) => (Config::default(), Some(err)),
    };
    let registry = match build_registry(&config) {
        Ok(registry) => registry,
        Err(err) => {
            eprintln!("error: {err}");
            return exit_code(EXIT_FAILURE);
        }
    };

    let code = dispatch(
        program(&registry),
        std::env::args_os(),
        &mut io::stdout(),
        &mut io::stderr(),
        |flags| {
            init_tracing(flags);
            if let Some(err) = config_error {
                warn!(error = %err, "ignoring configuration, using defaults");
            }
        },
    );
    exit_code(code)
}

/// Logs go to stderr so stdout only ever carries command output.
fn init_tracing(flags: GlobalFlags) {
    let default_level = if flags.debug {
        "debug"
    } else if flags.verbose {
        "info"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(false),
        )
        .try_init();
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
