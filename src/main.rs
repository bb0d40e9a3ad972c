mod access_controller;
mod console;
mod error;
mod executor;
mod grant_timer;
mod program_config;
mod rule_store;
mod service_control;
mod source_address;

use crate::access_controller::AccessController;
use crate::console::Console;
use crate::executor::dry_run::DryRunExecutor;
use crate::executor::system::SystemExecutor;
use crate::executor::Executor;
use crate::grant_timer::GrantTimer;
use crate::program_config::{ExecutorKind, ProgramConfig};
use crate::rule_store::{RuleStore, RuleStoreConfig};
use crate::service_control::{MasterSwitch, ServiceManager};
use anyhow::Context;
use env_logger::Env;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::signal::unix::{signal, SignalKind};
use tokio::time::Duration;

fn main() -> anyhow::Result<()> {
    // Parse options
    let config = ProgramConfig::parse();

    // Set up logging
    env_logger::Builder::from_env(Env::default().default_filter_or(if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }))
    .format_timestamp(None)
    .format_module_path(false)
    .init();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;

    let result = runtime.block_on(run(config));

    // The stdin reader may still be blocked in a read that only returns on the next line
    runtime.shutdown_background();

    result
}

async fn run(config: ProgramConfig) -> anyhow::Result<()> {
    let executor: Arc<dyn Executor> = match config.executor {
        ExecutorKind::system => Arc::new(SystemExecutor::new()),
        ExecutorKind::dry_run => Arc::new(DryRunExecutor::new()),
    };

    let firewall = config.firewall;
    let rule_store = RuleStore::new(
        executor.clone(),
        RuleStoreConfig {
            iptables: firewall.iptables,
            persist_program: firewall.persist_program,
            chain: firewall.chain,
            port: firewall.port,
        },
    );
    let grant_timer = GrantTimer::new(
        MasterSwitch::new(executor.clone(), firewall.switch_script.clone()),
        Duration::from_secs(config.poll_interval),
    );
    let controller = AccessController::new(
        rule_store,
        grant_timer,
        MasterSwitch::new(executor.clone(), firewall.switch_script),
        ServiceManager::new(executor, config.service.service_unit),
    );

    let console = Console::new(Arc::new(controller));

    let mut sigint = signal(SignalKind::interrupt()).context("Failed to listen for SIGINT")?;
    let mut sigterm = signal(SignalKind::terminate()).context("Failed to listen for SIGTERM")?;
    let mut sigquit = signal(SignalKind::quit()).context("Failed to listen for SIGQUIT")?;

    log::info!("Ready, reading commands from stdin");

    // Run until stdin is closed or one of the specified signals is received.
    // An active grant is not persisted: access stays as the firewall script left it.
    (tokio::select! {
        r = console.run(BufReader::new(tokio::io::stdin())) => r,
        _ = sigint.recv() => Ok(()),
        _ = sigterm.recv() => Ok(()),
        _ = sigquit.recv() => Ok(()),
    })?;

    log::info!("Stopped.");

    Ok(())
}
