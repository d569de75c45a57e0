//! `tibd` – instrument controller daemon on a simulated bench.
//!
//! 1. Loads `~/.tib/config.toml` (or `$TIB_CONFIG`) and initialises tracing.
//! 2. Builds a simulated bench, installs the switch topology and starts the
//!    pipeline behind a loopback transport.
//! 3. Reads `<key> <json>` request lines from stdin and prints every published
//!    message as a JSON line.
//! 4. Stops on **Ctrl-C** or end of input, letting queued commands finish.

mod config;
mod console;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use colored::Colorize;
use tib_hal::{PhotodiodeSampler, SimBench};
use tib_middleware::{LoopbackTransport, OutboundPublish};
use tib_runtime::{InstrumentContext, Pipeline, init_tracing};
use tib_types::{PHOTODIODE_TOPIC, TibError};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

fn main() {
    let _guard = init_tracing("tibd");

    print_banner();

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!();
        eprintln!("{}", "⚠  Ctrl-C received – finishing queued commands …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "failed to install Ctrl-C handler; stop with end of input instead");
    }

    let cfg = match config::load() {
        Ok(cfg) => {
            eprintln!("  Config: {}", config::config_path().display().to_string().bold());
            cfg
        }
        Err(e) => {
            eprintln!("{}: {e}", "Config error".red());
            eprintln!("  Using default configuration.");
            config::Config::default()
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{}: {e}", "Failed to start runtime".red());
            std::process::exit(1);
        }
    };
    let result = runtime.block_on(run(cfg, shutdown));
    // The stdin reader sits on a blocking thread that may never return.
    runtime.shutdown_timeout(Duration::from_millis(100));

    if let Err(e) = result {
        eprintln!("{}: {e}", "tibd stopped with an error".red().bold());
        std::process::exit(1);
    }
}

async fn run(cfg: config::Config, shutdown: Arc<AtomicBool>) -> Result<(), TibError> {
    let bench = SimBench::new().build();
    let ctx = InstrumentContext::simulated(&bench, cfg.switch_settle(), cfg.laser_boot_wait())?;
    let (transport, client) = LoopbackTransport::with_default_capacity();
    let sampler = PhotodiodeSampler::new(Box::new(bench.adc.clone()));

    let printer = tokio::spawn(print_published(client.subscribe(), cfg.echo_samples));
    let pipeline = Pipeline::spawn(
        Arc::new(transport),
        ctx,
        sampler,
        Some(Box::new(bench.watchdog.clone())),
        cfg.pipeline(),
    )?;

    eprintln!("  Ready.  Enter requests as {}.\n", "<key> <json>".bold().cyan());

    let seq = AtomicU64::new(1);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = wait_for(&shutdown) => break,
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    let Some((key, body)) = console::parse_request_line(&line) else {
                        continue;
                    };
                    let id = seq.fetch_add(1, Ordering::Relaxed);
                    let request = console::to_request(key, body, id);
                    if let Err(e) = client.send(request).await {
                        warn!(error = %e, "request not delivered");
                        break;
                    }
                }
                Ok(None) => {
                    info!("end of input");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "stdin read failed");
                    break;
                }
            },
        }
    }

    let ctx = pipeline.shutdown().await?;
    // Let the printer catch up with the final flush.
    tokio::time::sleep(Duration::from_millis(50)).await;
    printer.abort();

    eprintln!();
    for switch in ctx.router.switches() {
        eprintln!("  {:<16} {}", switch.name(), switch.state().to_string().bold());
    }
    eprintln!("{}", "  ✓ Controller stopped.".green());
    Ok(())
}

async fn wait_for(flag: &AtomicBool) {
    while !flag.load(Ordering::SeqCst) {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

async fn print_published(mut rx: broadcast::Receiver<OutboundPublish>, echo_samples: bool) {
    loop {
        match rx.recv().await {
            Ok(msg) if msg.topic == PHOTODIODE_TOPIC && !echo_samples => {}
            Ok(msg) => println!("{}", console::format_publish(&msg)),
            Err(RecvError::Lagged(n)) => warn!(skipped = n, "console fell behind"),
            Err(RecvError::Closed) => break,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    eprintln!();
    eprintln!("{}", r#"  _   _ _         _ "#.bold().cyan());
    eprintln!("{}", r#" | |_(_) |__   __| |"#.bold().cyan());
    eprintln!("{}", r#" | __| | '_ \ / _` |"#.bold().cyan());
    eprintln!("{}", r#" | |_| | |_) | (_| |"#.bold().cyan());
    eprintln!("{}", r#"  \__|_|_.__/ \__,_|"#.bold().cyan());
    eprintln!();
    eprintln!("  {} {}", "tibd".bold(), format!("v{}", env!("CARGO_PKG_VERSION")).dimmed());
    eprintln!("  Fiber injection bench controller (simulated hardware)");
    eprintln!();
}
