use clap::{Parser, Subcommand};
use galleryd::address::{AddressStore, Identifier};
use galleryd::{config, server};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "galleryd")]
#[command(about = "Local image-gallery server")]
#[command(long_about = "\
Local image-gallery server

Directories are exposed under short opaque identifiers instead of their
filesystem paths. Register a directory once, then browse it at the printed
URL:

  $ galleryd register ~/Pictures/2024
  /id/AbX9_k2-Qm1z0w/

Per identifier, the `type` query selects the representation:

  /id/{id}/{path}              gallery viewer (client/gallery/index.html)
  /id/{id}/{path}?type=index   JSON description, directories list children
  /id/{id}/{path}?type=image   original image
  /id/{id}/{path}?type=thumb   cached thumbnail

Any other path is served from the client directory.

Run 'galleryd gen-config' to generate a documented galleryd.toml.")]
#[command(version)]
struct Cli {
    /// Config file (missing file = defaults)
    #[arg(long, default_value = config::CONFIG_FILENAME, global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server
    Serve {
        /// Listen address, overriding server.bind
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
    /// Persist a directory's identifier and print its gallery URL
    Register {
        /// Directory to expose
        dir: PathBuf,
    },
    /// Print the path recorded for an identifier
    Resolve {
        identifier: String,
    },
    /// Print a stock galleryd.toml with all options documented
    GenConfig,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve { bind } => {
            let config = config::load_config(&cli.config)?;
            server::run(&config, bind).await?;
        }
        Command::Register { dir } => {
            let config = config::load_config(&cli.config)?;
            let dir = std::fs::canonicalize(&dir)?;
            if !dir.is_dir() {
                return Err(format!("not a directory: {}", dir.display()).into());
            }
            let path = dir
                .to_str()
                .ok_or_else(|| format!("path is not valid UTF-8: {}", dir.display()))?;
            let store = AddressStore::new(config.records_dir(), config.salt.clone());
            let id = store.compute(path);
            store.save(&id, path).await?;
            println!("/id/{id}/");
        }
        Command::Resolve { identifier } => {
            let config = config::load_config(&cli.config)?;
            let store = AddressStore::new(config.records_dir(), config.salt.clone());
            let id = Identifier::parse(&identifier)?;
            match store.path_for(&id).await {
                Some(path) => println!("{path}"),
                None => return Err(format!("no record for {id}").into()),
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}
