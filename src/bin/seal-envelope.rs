use anyhow::{bail, Context, Result};
use clap::Parser;
use iot_agent::config::SharedSecret;
use iot_agent::pipeline::seal;
use rand::RngCore;
use serde_json::Value;
use std::{fs, io::Read, path::PathBuf};

/// Seal a plaintext telemetry record into an agent envelope, the same way a
/// field node does. Handy for exercising a deployed agent by hand.
#[derive(Parser, Debug)]
#[command(name = "seal-envelope", version, about = "Encrypt a telemetry record for the ingest endpoint")]
struct Cli {
    /// Path to the plaintext JSON record ("-" reads stdin)
    path: PathBuf,

    /// Shared secret; defaults to AGENT_TOKEN
    #[arg(long, env = "AGENT_TOKEN", hide_env_values = true)]
    secret: String,

    /// POST the envelope to this ingest URL instead of printing it
    #[arg(long)]
    post: Option<String>,
}

fn read_record(path: &PathBuf) -> Result<Value> {
    let data = if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        buf
    } else {
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?
    };
    serde_json::from_str(&data).with_context(|| format!("Failed to parse JSON in {}", path.display()))
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Cli::parse();
    if args.secret.is_empty() {
        bail!("secret must not be empty");
    }

    let record = read_record(&args.path)?;
    let mut iv = [0u8; 12];
    rand::thread_rng().fill_bytes(&mut iv);

    let envelope = seal(&record, &SharedSecret::new(args.secret), iv)
        .context("Failed to seal record")?;
    let wire = serde_json::to_string(&envelope.to_wire())?;

    match args.post {
        None => println!("{wire}"),
        Some(url) => {
            let resp = reqwest::blocking::Client::new()
                .post(&url)
                .header("Content-Type", "application/json")
                .body(wire)
                .send()
                .with_context(|| format!("Failed to POST to {url}"))?;
            let status = resp.status();
            println!("{} {}", status.as_u16(), resp.text().unwrap_or_default());
            if !status.is_success() {
                std::process::exit(1);
            }
        }
    }
    Ok(())
}
