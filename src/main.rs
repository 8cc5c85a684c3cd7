//! `spindle` binary: starts the process-wide pool, runs a demo workload on it
//! and tears it down.

use anyhow::Context;
use clap::error::{ContextKind, ContextValue, ErrorKind};
use clap::{CommandFactory, FromArgMatches, Parser};
use log::{info, warn};
use spindle::{runtime, Config};
use std::ffi::OsString;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Parser)]
#[command(name = "spindle", version, about = "Run a demo workload on a fixed-size thread pool")]
struct Cli {
    /// Worker threads (defaults to the logical core count)
    #[arg(short = 't', long)]
    threads: Option<usize>,

    /// Fire-and-forget tasks to submit
    #[arg(short = 'n', long, default_value_t = 256)]
    tasks: u64,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,
}

/// Parse the command line, dropping options clap does not recognize.
///
/// Returns the parsed arguments and the options that were skipped. Logging is
/// not up yet at this point, so the caller reports them.
fn parse_args() -> (Cli, Vec<String>) {
    let mut args: Vec<OsString> = std::env::args_os().collect();
    let mut skipped = Vec::new();

    loop {
        let err = match Cli::try_parse_from(&args) {
            Ok(cli) => return (cli, skipped),
            Err(err) => err,
        };

        if err.kind() != ErrorKind::UnknownArgument {
            err.exit();
        }

        let bad = match err.get(ContextKind::InvalidArg) {
            Some(ContextValue::String(s)) => s.clone(),
            _ => break,
        };
        let position = args.iter().skip(1).position(|a| {
            a.to_str()
                .map_or(false, |a| a == bad || a.starts_with(&format!("{}=", bad)))
        });

        match position {
            Some(i) => {
                args.remove(i + 1);
                skipped.push(bad);
            }
            None => break,
        }
    }

    // unknown option we could not locate (bundled short flags); parse leniently
    let matches = Cli::command().ignore_errors(true).get_matches_from(&args);
    match Cli::from_arg_matches(&matches) {
        Ok(cli) => (cli, skipped),
        Err(err) => err.exit(),
    }
}

fn main() -> anyhow::Result<()> {
    let (cli, skipped) = parse_args();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_micros()
        .init();

    for option in &skipped {
        warn!("ignoring unrecognized option '{}'", option);
    }

    let mut builder = Config::builder();
    if let Some(threads) = cli.threads {
        builder = builder.num_threads(threads);
    }
    let config = builder.build().context("invalid pool configuration")?;

    runtime::init_with_config(config).context("failed to start the pool")?;
    let rt = runtime::current()?;
    info!(
        "started {} workers on {}",
        rt.pool().workers(),
        rt.hardware()
    );

    let start = Instant::now();
    let total = Arc::new(AtomicU64::new(0));
    for i in 0..cli.tasks {
        let total = total.clone();
        rt.pool().execute(move || {
            total.fetch_add(i * i, Ordering::Relaxed);
        })?;
    }

    let handles = (1..=8u64)
        .map(|n| rt.pool().submit(move || fib(20 + n)))
        .collect::<spindle::Result<Vec<_>>>()?;
    for (n, handle) in (1..=8u64).zip(handles) {
        info!("fib({}) = {}", 20 + n, handle.wait()?);
    }

    rt.pool().stop()?;
    let stats = rt.pool().stats();
    info!(
        "sum of squares below {} = {} ({} tasks in {:?}, {} panicked)",
        cli.tasks,
        total.load(Ordering::Relaxed),
        stats.tasks_executed,
        start.elapsed(),
        stats.tasks_panicked
    );
    for worker in &stats.per_worker {
        info!(
            "worker {}: {} tasks, busy {}us",
            worker.id,
            worker.tasks_executed,
            worker.busy_time_ns / 1_000
        );
    }

    drop(rt);
    runtime::shutdown().context("pool teardown failed")?;
    Ok(())
}

fn fib(n: u64) -> u64 {
    match n {
        0 | 1 => n,
        _ => fib(n - 1) + fib(n - 2),
    }
}
