//! vitalscan command line entry point

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use vitalscan::config::ScanConfig;
use vitalscan::report::{parse_report, ReportBlock, Segment};
use vitalscan::session::{SessionState, HEALTH_POLL_INTERVAL};
use vitalscan::storage::FileScanStore;
use vitalscan::vitals::{HealthProbe, VitalsClient};

#[derive(Parser, Debug)]
#[command(name = "vitalscan")]
#[command(author, version, about = "Face-video vital sign scans with AI interpretation")]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    config: ScanConfig,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Record a clip and run the full scan pipeline
    Scan {
        /// Stop recording after this many seconds instead of the 15 second ceiling
        #[arg(long)]
        stop_after: Option<u64>,
    },
    /// Check the vitals service once, or keep polling
    Health {
        #[arg(long)]
        watch: bool,
    },
    /// Render a saved interpretation report
    Parse { file: PathBuf },
    /// List locally stored scans
    History,
    /// List cameras available to the configured backend
    Cameras,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    vitalscan::init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Scan { stop_after } => scan(&cli.config, stop_after).await,
        Command::Health { watch } => health(&cli.config, watch).await,
        Command::Parse { file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            print_report(&text);
            Ok(())
        }
        Command::History => history(&cli.config),
        Command::Cameras => {
            for camera in vitalscan::list_cameras(&cli.config)? {
                println!("{}", serde_json::to_string(&camera)?);
            }
            Ok(())
        }
    }
}

async fn scan(config: &ScanConfig, stop_after: Option<u64>) -> anyhow::Result<()> {
    let mut controller = vitalscan::build_controller(config)?;
    let mut events = controller.subscribe();
    controller.start_health_polling(Arc::new(VitalsClient::new(config.endpoints())));
    controller.start();

    let mut stop_at = stop_after.map(|secs| Instant::now() + Duration::from_secs(secs));
    loop {
        let state = match stop_at {
            Some(deadline) => match tokio::time::timeout_at(deadline, events.recv()).await {
                Ok(state) => state?,
                Err(_) => {
                    controller.request_stop();
                    stop_at = None;
                    continue;
                }
            },
            None => events.recv().await?,
        };

        match state {
            SessionState::Capturing { elapsed_seconds } => {
                println!("recording... {}s", elapsed_seconds)
            }
            SessionState::Processing => println!("analyzing..."),
            SessionState::Result(completed) => {
                let scan = &completed.result;
                println!(
                    "heart rate {} bpm | hrv {} ms | bp {} | stress {:?} | saved {:?}",
                    scan.heart_rate.round(),
                    scan.hrv.round(),
                    scan.blood_pressure.display(),
                    scan.stress_level,
                    completed.storage
                );
                print_report(&scan.ai_interpretation);
                if let Some(status) = controller.service_status() {
                    println!("vitals service: {}", status.message);
                }
                break;
            }
            SessionState::Error { message } => {
                controller.shutdown().await;
                anyhow::bail!(message);
            }
            SessionState::Idle => {}
        }
    }

    controller.shutdown().await;
    Ok(())
}

async fn health(config: &ScanConfig, watch: bool) -> anyhow::Result<()> {
    config.validate()?;
    let client = VitalsClient::new(config.endpoints());
    let options = config.session_options();

    loop {
        let status = client.check_health(options.mode(), options.use_proxy).await;
        println!("{}", serde_json::to_string(&status)?);
        if !watch {
            return Ok(());
        }
        tokio::time::sleep(HEALTH_POLL_INTERVAL).await;
    }
}

fn history(config: &ScanConfig) -> anyhow::Result<()> {
    let store = FileScanStore::new(config.history_dir.clone());
    for stored in store.load_history()? {
        let scan = &stored.scan;
        println!(
            "{}  {}  {:>3} bpm  bp {}  {:?}  [{}]",
            scan.timestamp.format("%Y-%m-%d %H:%M"),
            scan.id,
            scan.heart_rate.round(),
            scan.blood_pressure.display(),
            scan.stress_level,
            stored.mode.as_str()
        );
    }
    Ok(())
}

fn print_report(text: &str) {
    for block in parse_report(text).blocks {
        match block {
            ReportBlock::StatusBanner {
                status,
                severity_class,
            } => println!("== {} ({:?}) ==", status, severity_class),
            ReportBlock::FindingLine { segments } => {
                let line: String = segments
                    .iter()
                    .map(|segment| match segment {
                        Segment::PlainText { text } => text.clone(),
                        Segment::MetricTag { kind, value } => format!("<{:?} {}>", kind, value),
                    })
                    .collect();
                println!("  * {}", line.trim());
            }
            ReportBlock::VerdictBlock { text } => println!("Verdict: {}", text),
            ReportBlock::Heading { text } => println!("\n{}", text),
            ReportBlock::PlainLine { text } => println!("{}", text),
        }
    }
}
