use anyhow::{bail, Context, Result};
use clap::Parser;
use respira_monitor::ingest::IngestEvent;
use respira_monitor::{monitor, Config, ConnectionError, ConnectionManager};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "respira-monitor")]
#[command(about = "Live breathing-rate monitor for serial respiration sensors")]
struct Args {
    /// Serial port to open (defaults to the configured port, then the first one found)
    #[arg(short, long)]
    port: Option<String>,

    /// Baud rate override
    #[arg(short, long)]
    baud: Option<u32>,

    /// List available serial ports and exit
    #[arg(short, long)]
    list: bool,

    /// Directory for session exports
    #[arg(short, long)]
    export_dir: Option<PathBuf>,

    /// Config file to use instead of the platform default
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Skip the session export on exit
    #[arg(long)]
    no_export: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("loading configuration")?;

    if let Some(baud) = args.baud {
        config.serial.baud_rate = baud;
    }
    if let Some(dir) = args.export_dir.clone() {
        config.export_dir = dir;
    }

    let mut manager = ConnectionManager::from_config(&config);

    if args.list {
        return print_endpoints(&manager);
    }

    let port = match args.port.clone().or_else(|| config.serial.port.clone()) {
        Some(port) => port,
        None => match manager.list_endpoints()?.into_iter().next() {
            Some(endpoint) => endpoint.name,
            None => bail!("No serial ports found"),
        },
    };

    manager.connect(&port)?;

    println!("Connected to {}. {}", port, monitor::healthy_range(&manager.thresholds()));
    println!("Press Ctrl-C to stop.");

    watch(&manager, &config).await;

    // The session is already complete; a stuck reader only delays the port
    match manager.disconnect() {
        Ok(()) => {}
        Err(e @ ConnectionError::ShutdownPending { .. }) => log::warn!("{}", e),
        Err(e) => return Err(e.into()),
    }

    if args.no_export {
        return Ok(());
    }
    match manager.export(&config.export_dir) {
        Ok(path) => println!("Session saved to {}", path.display()),
        Err(e) if e.is_nothing_to_export() => println!("No data to save"),
        Err(e) => return Err(e).context("saving session"),
    }

    Ok(())
}

fn print_endpoints(manager: &ConnectionManager) -> Result<()> {
    let endpoints = manager.list_endpoints()?;
    if endpoints.is_empty() {
        println!("No serial ports found");
    }
    for endpoint in endpoints {
        if endpoint.description.is_empty() {
            println!("{}", endpoint.name);
        } else {
            println!("{}\t{}", endpoint.name, endpoint.description);
        }
    }
    Ok(())
}

/// Refresh the readouts on two cadences until Ctrl-C
async fn watch(manager: &ConnectionManager, config: &Config) {
    let events = manager.events();
    let mut fast = tokio::time::interval(Duration::from_millis(config.display.fast_refresh_ms.max(1)));
    let mut slow = tokio::time::interval(Duration::from_millis(config.display.slow_refresh_ms.max(1)));

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut stdout = std::io::stdout();
    loop {
        tokio::select! {
            _ = fast.tick() => {
                for event in events.try_iter() {
                    match event {
                        IngestEvent::ReadError(e) => println!("\nRead error, retrying: {}", e),
                        IngestEvent::Recovered => println!("\nConnection recovered"),
                        IngestEvent::Stopped => {}
                    }
                }
                let line = monitor::live_line(&manager.readings(), &manager.fast_window());
                print!("\r{:<100}", line);
                let _ = stdout.flush();
            }
            _ = slow.tick() => {
                println!("\n{}", monitor::history_line(&manager.rate_history()));
            }
            _ = &mut shutdown => {
                println!();
                break;
            }
        }
    }
}
