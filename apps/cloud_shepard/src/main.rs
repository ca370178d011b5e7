use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{error::ErrorKind, CommandFactory, Parser, Subcommand};
use droplet_api::DigitalOceanClient;
use shepard_core::{
    config::DEFAULT_GROUP_NAME, fingerprint::md5_fingerprint, DestroyOutcome, Shepard,
    TerminalProgress,
};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

mod settings;

use settings::load_settings;

#[derive(Parser, Debug)]
#[command(
    name = "cloud-shepard",
    version,
    about = "A very kind cloud control automation tool"
)]
struct Cli {
    /// Name shared by every droplet of the group.
    #[arg(short = 'a', long, global = true, default_value = DEFAULT_GROUP_NAME)]
    name: String,
    /// DigitalOcean API key.
    #[arg(
        short = 'p',
        long,
        global = true,
        env = "DIGITALOCEAN_API_KEY",
        hide_env_values = true
    )]
    api_key: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create droplets and print the inventory once all of them are active.
    Create {
        /// Public ssh key file installed on every droplet.
        #[arg(short = 's', long)]
        ssh_key: PathBuf,
        /// Number of droplets to create.
        #[arg(short = 'n', long, default_value_t = 3)]
        number: usize,
    },
    /// Delete every droplet of the group and wait until they are gone.
    Destroy,
    /// Print the provider records of the group.
    List,
    /// Print the group inventory.
    Inventory,
}

/// The flag (or `DIGITALOCEAN_API_KEY`) wins over the settings layers.
fn resolve_api_key(
    from_cli: Option<String>,
    from_settings: Option<String>,
) -> Result<String, clap::Error> {
    from_cli
        .or(from_settings)
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| {
            Cli::command().error(ErrorKind::MissingRequiredArgument, "No API key provided!")
        })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = load_settings()?;

    let api_key = match resolve_api_key(cli.api_key.clone(), settings.api_key.clone()) {
        Ok(api_key) => api_key,
        Err(usage) => usage.exit(),
    };

    let client = DigitalOceanClient::new(settings.client_config(api_key))?;
    let cancel = CancellationToken::new();
    let shepard = Shepard::new(Arc::new(client), settings.shepard_config(cli.name.clone()))
        .with_cancellation(cancel.clone());

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted; abandoning the current wait");
            cancel.cancel();
        }
    });

    let mut progress = TerminalProgress::stderr();
    match cli.command {
        Command::Create { ssh_key, number } => {
            let fingerprint = md5_fingerprint(&ssh_key).with_context(|| {
                format!("could not fingerprint ssh key '{}'", ssh_key.display())
            })?;
            let outcome = shepard.create(number, &fingerprint, &mut progress).await?;
            println!("{}", outcome.inventory);
        }
        Command::Destroy => match shepard.destroy(&mut progress).await? {
            DestroyOutcome::NothingToDo => {
                eprintln!("No droplets named '{}' to destroy", cli.name);
            }
            DestroyOutcome::Destroyed { .. } => {}
        },
        Command::List => {
            let droplets = shepard.list().await?;
            println!("{}", serde_json::to_string_pretty(&droplets)?);
        }
        Command::Inventory => {
            println!("{}", shepard.inventory().await?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn create_requires_ssh_key_and_defaults_to_three() {
        let err = Cli::try_parse_from(["cloud-shepard", "create", "-p", "token"])
            .expect_err("ssh key required");
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);

        let cli = Cli::try_parse_from(["cloud-shepard", "create", "-p", "token", "-s", "id.pub"])
            .expect("parse");
        match cli.command {
            Command::Create { ssh_key, number } => {
                assert_eq!(ssh_key, PathBuf::from("id.pub"));
                assert_eq!(number, 3);
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert_eq!(cli.name, "cloud-shepard");
    }

    #[test]
    fn api_key_flag_wins_over_settings() {
        let key = resolve_api_key(Some("from-flag".into()), Some("from-settings".into()))
            .expect("key");
        assert_eq!(key, "from-flag");
    }

    #[test]
    fn api_key_falls_back_to_settings() {
        let key = resolve_api_key(None, Some("from-settings".into())).expect("key");
        assert_eq!(key, "from-settings");
    }

    #[test]
    fn missing_api_key_is_a_usage_error() {
        let err = resolve_api_key(None, None).expect_err("no key");
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        assert!(err.to_string().contains("No API key provided!"));

        let err = resolve_api_key(Some("  ".into()), None).expect_err("blank key");
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn unknown_mode_is_a_usage_error() {
        let err = Cli::try_parse_from(["cloud-shepard", "explode"]).expect_err("unknown");
        assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::try_parse_from(["cloud-shepard", "inventory", "-a", "web", "-p", "token"])
            .expect("parse");
        assert_eq!(cli.name, "web");
        assert_eq!(cli.api_key.as_deref(), Some("token"));
        assert!(matches!(cli.command, Command::Inventory));
    }
}
