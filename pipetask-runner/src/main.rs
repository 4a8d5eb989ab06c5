//! Pipetask
//!
//! Runs one build-pipeline task inside an agent job. The agent supplies the
//! task's inputs and build variables through the environment and reads the
//! task's logging commands from stdout.

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use pipetask_runner::host::EnvTaskHost;
use pipetask_runner::tasks::{android_signing, docker_push};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "pipetask")]
#[command(about = "Build pipeline task runner", long_about = None)]
struct Cli {
    /// Tracing filter for diagnostic output on stderr
    #[arg(long, env = "PIPETASK_LOG", default_value = "pipetask_runner=info")]
    log: String,

    #[command(subcommand)]
    task: Task,
}

#[derive(Subcommand)]
enum Task {
    /// Push a repository's image tags and publish the image details
    DockerPush,
    /// Sign and align Android APK files
    AndroidSigning,
}

impl Task {
    fn name(&self) -> &'static str {
        match self {
            Task::DockerPush => "docker-push",
            Task::AndroidSigning => "android-signing",
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // stdout belongs to the agent protocol
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&cli.log))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting task {}", cli.task.name());

    let host = EnvTaskHost::new();
    let result = match cli.task {
        Task::DockerPush => docker_push::execute(&host).await,
        Task::AndroidSigning => android_signing::execute(&host).await,
    };

    if result.is_success() {
        eprintln!("{} {}", "✓".green(), result.message);
        if let Some(path) = &result.output_path {
            eprintln!("  output: {}", path.dimmed());
        }
    } else {
        eprintln!("{} {}", "✗".red(), result.message);
    }

    std::process::exit(result.exit_code());
}
