use clap::{Parser, Subcommand};
use serde_json::Value;

use request_tracker::config::TrackerConfig;
use request_tracker::events::{Event, LogEvent, LogLevel};
use request_tracker::policy::PolicyGate;
use request_tracker::transmit::Transmitter;

#[derive(Parser)]
#[command(name = "tracker-cli")]
#[command(about = "Inspect a tracking service the way the tracker sees it", long_about = None)]
struct Cli {
    #[arg(short, long, env = "TRACKER_URL", default_value = "http://localhost:3000")]
    url: String,

    #[arg(short, long, env = "TRACKER_API_KEY")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the policy served for a path
    Policy {
        #[arg(long)]
        path: String,
    },
    /// Show whether a path is currently rate limited
    Rate {
        #[arg(long)]
        path: String,
    },
    /// Send a single log event to the track endpoint
    Ping {
        #[arg(default_value = "tracker-cli ping")]
        message: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = TrackerConfig::new(cli.url, cli.key);

    match cli.command {
        Commands::Policy { path } => {
            let gate = PolicyGate::new(&config)?;
            let policy = gate.fetch_policy(&path).await?;
            print_json(&serde_json::to_value(policy)?);
        }
        Commands::Rate { path } => {
            let gate = PolicyGate::new(&config)?;
            let status = gate.fetch_rate_status(&path).await?;
            print_json(&serde_json::to_value(status)?);
        }
        Commands::Ping { message } => {
            let transmitter = Transmitter::new(&config)?;
            let event = Event::Log(LogEvent::new(LogLevel::Info, message));
            transmitter.send(&[event]).await?;
            println!("Delivered to {}", transmitter.endpoint());
        }
    }

    Ok(())
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(_) => println!("{value}"),
    }
}
