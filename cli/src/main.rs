//! Tether CLI - runs a component lifecycle scenario against an in-memory scene.
//!
//! ```text
//! tether <scenario.toml>
//!   -> ManagerConfig (~/.tether/config.toml, overridden by [manager])
//!   -> InMemoryScene + ComponentManager
//!   -> register [[component]]s -> run [[step]]s -> print live bindings
//! ```
//!
//! Logs go to stderr and honor `RUST_LOG` (default `info`); the binding
//! report goes to stdout.

mod scenario;

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use tether_config::ManagerConfig;
use tether_core::StartState;

use crate::scenario::{BindingRow, Scenario};

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::try_new("warn").expect("warn filter is valid"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

fn state_label(state: &StartState) -> String {
    match state {
        StartState::Pending => "pending".to_string(),
        StartState::Started => "started".to_string(),
        StartState::Failed(message) => format!("failed: {message}"),
        StartState::Cancelled => "cancelled".to_string(),
    }
}

fn print_report(rows: &[BindingRow]) {
    if rows.is_empty() {
        println!("no live bindings");
        return;
    }
    let component_width = rows.iter().map(|row| row.component.len()).max().unwrap_or(0);
    let entity_width = rows.iter().map(|row| row.entity.len()).max().unwrap_or(0);
    for row in rows {
        println!(
            "{:<component_width$}  {:<entity_width$}  {}",
            row.component,
            row.entity,
            state_label(&row.state)
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let path = env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .context("usage: tether <scenario.toml>")?;
    let scenario = Scenario::load(&path)?;

    let config = match &scenario.manager {
        Some(config) => config.clone(),
        None => ManagerConfig::load_default()?.unwrap_or_default(),
    };
    tracing::debug!(?config, "Manager configuration");

    let rows = scenario::run(scenario, &config).await?;
    print_report(&rows);
    Ok(())
}
