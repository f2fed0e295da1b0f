//! vigil endpoint agent.
//!
//! `-m agent` (the default) runs the long-lived runtime: bootstrap with
//! retry, the broker-fed task pipeline, heartbeats, and shutdown on an
//! authenticated terminate order. Any other `-m` value names an inspection
//! module: the process runs it against the single positional argument,
//! writes one JSON object to stdout, and exits — this is the re-exec
//! protocol the module supervisor speaks with its children.

mod broker;
mod config;
mod context;
mod dispatch;
mod error;
mod heartbeat;
mod ingress;
mod logfanin;
mod publisher;
mod runtime;
mod supervisor;

use std::path::PathBuf;

use anyhow::{bail, Context as _};
use clap::Parser;
use tracing::warn;

use crate::config::AgentConfig;
use crate::context::Context;

#[derive(Parser)]
#[command(
    name = "vigil-agent",
    about = "Fleet investigation endpoint agent",
    version
)]
struct Cli {
    /// Run mode: "agent" for the runtime, anything else names a module
    #[arg(short = 'm', long = "mode", default_value = "agent")]
    mode: String,

    /// AMQP broker URL
    #[arg(long, env = "VIGIL_BROKER_URL", default_value = config::DEFAULT_BROKER_URL)]
    broker_url: String,

    /// Armored public keyring trusted to sign actions
    #[arg(long, env = "VIGIL_KEYRING", default_value = config::DEFAULT_KEYRING_PATH)]
    keyring: PathBuf,

    /// Module arguments: one JSON value, passed through verbatim
    args: Vec<String>,
}

fn main() {
    let cli = Cli::parse();

    let result = if cli.mode == "agent" {
        run_agent(cli)
    } else {
        run_module(&cli.mode, &cli.args)
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

/// Module mode: resolve the named module, hand it the single positional
/// argument as opaque bytes, print its JSON result.
///
/// Exactly one positional argument is accepted — the supervisor always
/// marshals the whole `Arguments` value into one argv element, and
/// tolerating more would silently change what a module sees.
fn run_module(name: &str, args: &[String]) -> anyhow::Result<()> {
    let module = vigil_modules::by_name(name)
        .ok_or_else(|| anyhow::anyhow!("unknown module '{name}'"))?;
    if args.len() > 1 {
        bail!("module mode takes a single argument, got {}", args.len());
    }
    let raw = args.first().map(String::as_str).unwrap_or_default();

    match module.run(raw.as_bytes()) {
        Ok(value) => {
            println!("{}", serde_json::to_string(&value)?);
            Ok(())
        }
        Err(e) => {
            // Failures still produce a result envelope on stdout; the
            // nonzero exit is what marks the run as failed.
            println!("{}", serde_json::json!({ "error": e.to_string() }));
            std::process::exit(1);
        }
    }
}

fn run_agent(cli: Cli) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_target(false)
        .init();

    let cfg = AgentConfig::new(cli.broker_url, cli.keyring);
    let rt = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    rt.block_on(async {
        // The agent must not die because the broker is unreachable at boot:
        // keep retrying until a context comes up.
        let (ctx, pipes) = loop {
            match Context::init(&cfg).await {
                Ok(wired) => break wired,
                Err(e) => {
                    warn!(error = %e, "initialisation failed, sleeping before retry");
                    tokio::time::sleep(cfg.init_retry_delay).await;
                }
            }
        };
        runtime::run(ctx, pipes).await;
    });
    Ok(())
}
