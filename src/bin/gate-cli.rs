use clap::{Parser, Subcommand};
use reqwest::header::COOKIE;
use std::path::PathBuf;

use sitegate::auth::claims::{Identity, SubjectId};
use sitegate::auth::codec;
use sitegate::auth::SessionSecret;
use sitegate::clock::{Clock, SystemClock};
use sitegate::config::GateConfig;
use sitegate::lifecycle::startup;

#[derive(Parser)]
#[command(name = "gate-cli")]
#[command(about = "Operator CLI for sitegate session credentials", long_about = None)]
struct Cli {
    /// Config file holding the session secret and lifetimes.
    #[arg(short, long, env = "SITEGATE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mint a session credential for a user
    Issue {
        #[arg(long)]
        subject: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        admin: bool,
    },
    /// Decode and verify a credential
    Inspect { credential: String },
    /// Ask a running server who a credential belongs to
    Whoami {
        credential: String,
        #[arg(short, long, default_value = "http://localhost:8080")]
        url: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = startup::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Issue {
            subject,
            username,
            email,
            admin,
        } => {
            let secret = configured_secret(&config)?;
            let identity = Identity {
                subject_id: SubjectId::new(subject),
                display_name: username,
                email,
                is_admin: admin,
            };
            let settings = sitegate::auth::SessionSettings::new(
                &config.session,
                config.environment,
                secret,
            );
            let credential = settings.issue(&identity, SystemClock.now()?)?;
            println!("{}", credential);
        }
        Commands::Inspect { credential } => {
            let secret = configured_secret(&config)?;
            match codec::decode(&credential, &secret, SystemClock.now()?) {
                Ok(claims) => println!("{}", serde_json::to_string_pretty(&claims)?),
                Err(e) => {
                    eprintln!("Credential rejected: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Whoami { credential, url } => {
            let res = reqwest::Client::new()
                .get(format!("{}/api/auth/me", url.trim_end_matches('/')))
                .header(COOKIE, format!("{}={}", config.session.cookie_name, credential))
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

/// A generated development secret would never match the server's.
fn configured_secret(config: &GateConfig) -> Result<SessionSecret, String> {
    config
        .session
        .secret
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(SessionSecret::new)
        .ok_or_else(|| "no session secret configured (set SITEGATE_SESSION_SECRET)".to_string())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    let pretty = serde_json::from_str::<serde_json::Value>(&text)
        .and_then(|json| serde_json::to_string_pretty(&json))
        .unwrap_or(text);

    if status.is_success() {
        println!("{}", pretty);
    } else {
        eprintln!("Error: server returned status {}", status);
        eprintln!("{}", pretty);
        std::process::exit(1);
    }
    Ok(())
}
