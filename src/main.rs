use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use cell_recorder_rs::sensors::TermuxPlatform;
use cell_recorder_rs::session::{snapshot, RecordingSession, SessionConfig};

#[derive(Parser, Debug)]
#[command(name = "cell_recorder")]
#[command(about = "Record cell tower info alongside GPS fixes", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Record a session until Ctrl-C or the duration elapses
    Record {
        /// Duration in seconds (0 = continuous)
        #[arg(value_name = "SECONDS", default_value = "0")]
        duration: u64,

        /// Location poll interval in milliseconds
        #[arg(long, default_value = "1000")]
        interval_ms: u64,

        /// Output directory for session files
        #[arg(long, default_value = "cell_recorder_sessions")]
        output_dir: PathBuf,
    },
    /// Print a single current reading without recording anything
    Snapshot,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    match args.command {
        Command::Record {
            duration,
            interval_ms,
            output_dir,
        } => record(duration, interval_ms, output_dir).await,
        Command::Snapshot => {
            let platform = TermuxPlatform::new();
            let row = snapshot(&platform)?;
            println!("{}", serde_json::to_string_pretty(&row)?);
            Ok(())
        }
    }
}

async fn record(duration: u64, interval_ms: u64, output_dir: PathBuf) -> Result<()> {
    println!("[{}] Cell Recorder Starting", ts_now());
    println!("  Duration: {} seconds (0=continuous)", duration);
    println!("  Interval: {} ms", interval_ms);
    println!("  Output Dir: {}", output_dir.display());

    let platform = Arc::new(TermuxPlatform::new());
    let mut session = RecordingSession::new(
        platform,
        SessionConfig {
            interval: Duration::from_millis(interval_ms),
            output_dir,
        },
    );
    session.start()?;
    println!("[{}] Recording... press Ctrl-C to stop", ts_now());

    let stop = async {
        let deadline = async {
            if duration > 0 {
                sleep(Duration::from_secs(duration)).await;
            } else {
                std::future::pending::<()>().await;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => println!("[{}] Stop requested", ts_now()),
            _ = deadline => println!("[{}] Duration reached, stopping...", ts_now()),
        }
    };
    status_loop(&session, stop).await;

    let rows = session.row_count();
    match session.stop().await? {
        Some(path) => println!("[{}] Saved {} rows to {}", ts_now(), rows, path.display()),
        None => println!("[{}] Session was not active", ts_now()),
    }
    Ok(())
}

/// Print a status line every few seconds until the stop future resolves.
/// The stop future is pinned once and polled across iterations, so the
/// Ctrl-C listener inside it is registered exactly once for the whole run.
async fn status_loop(session: &RecordingSession, stop: impl std::future::Future<Output = ()>) {
    tokio::pin!(stop);
    loop {
        tokio::select! {
            _ = &mut stop => break,
            _ = sleep(Duration::from_secs(5)) => {
                let counters = session.counters();
                println!(
                    "[session] {} rows collected ({} ticks, {} skipped)",
                    session.row_count(),
                    counters.ticks.load(Ordering::Relaxed),
                    counters.dropped.load(Ordering::Relaxed),
                );
            }
        }
    }
}

fn ts_now() -> String {
    Utc::now().format("%H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_status_loop_exits_when_stop_resolves() {
        let session = RecordingSession::new(Arc::new(TermuxPlatform::new()), SessionConfig::default());
        tokio::time::timeout(
            Duration::from_secs(2),
            status_loop(&session, sleep(Duration::from_millis(20))),
        )
        .await
        .expect("status loop exits once the stop future resolves");
    }
}
