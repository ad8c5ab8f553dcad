//! pressnative CLI tool
//!
//! ## Commands
//!
//! - `compile <file>`: encode markers, compile, print the blocks as JSON
//! - `encode <file>`: print the marker-encoded markup
//! - `warm <content-dir>`: recompile every `<id>.html` file into the SQLite cache (requires the
//!   `service` feature)

use clap::{Parser, Subcommand};
use pressnative_core::config::{ConfigProvider, PressNativeConfig, TomlConfigProvider};
use std::{fs::read_to_string, path::PathBuf};

#[derive(Parser)]
#[command(name = "pressnative")]
#[command(author, version, about = "Compile rendered HTML into native UI blocks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile one HTML file and print its blocks as JSON
    Compile {
        /// Path to the rendered HTML
        file: PathBuf,

        /// Path to a pressnative.toml
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Pretty-print the JSON output
        #[arg(short, long)]
        pretty: bool,
    },

    /// Replace catalog shortcodes with marker comments and print the result
    Encode {
        /// Path to the raw HTML
        file: PathBuf,

        /// Path to a pressnative.toml
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Recompile a directory of `<id>.html` files into the compiled cache
    Warm {
        /// Directory holding the content files
        content_dir: PathBuf,

        /// SQLite cache file (overrides the config file)
        #[arg(long)]
        db: Option<PathBuf>,

        /// Path to a pressnative.toml
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn load_config(path: Option<PathBuf>) -> Result<PressNativeConfig, Box<dyn std::error::Error>> {
    Ok(match path {
        Some(path) => TomlConfigProvider::new(path).get_config()?,
        None => PressNativeConfig::default(),
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Compile {
            file,
            config,
            pretty,
        } => {
            let config = load_config(config)?;
            let raw = read_to_string(&file)?;
            let encoded = config.marker_codec()?.encode(&raw).into_owned();
            let blocks = config.compiler().compile(&encoded);
            let json = if pretty {
                serde_json::to_string_pretty(&blocks)?
            } else {
                serde_json::to_string(&blocks)?
            };
            println!("{json}");
        }

        Commands::Encode { file, config } => {
            let config = load_config(config)?;
            let raw = read_to_string(&file)?;
            print!("{}", config.marker_codec()?.encode(&raw));
        }

        Commands::Warm {
            content_dir,
            db,
            config,
        } => {
            #[cfg(not(feature = "service"))]
            {
                let _ = (content_dir, db, config);
                eprintln!("Error: The 'warm' subcommand requires the 'service' feature.");
                eprintln!("Please rebuild with: cargo build --features \"bin service\"");
                std::process::exit(1);
            }

            #[cfg(feature = "service")]
            {
                let config = load_config(config)?;
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()?;
                runtime.block_on(warm(content_dir, db, config))?;
            }
        }
    }

    Ok(())
}

#[cfg(feature = "service")]
async fn warm(
    content_dir: PathBuf,
    db: Option<PathBuf>,
    config: PressNativeConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    use pressnative_core::{
        batch::BatchRecompiler,
        cache::CompiledCache,
        db::{DbConnection, PRESSNATIVE_CACHE_DB},
        event::CacheEvent,
        source::DirContentSource,
    };
    use tokio::sync::mpsc::unbounded_channel;

    let db_path = db
        .or_else(|| config.database.clone())
        .unwrap_or_else(|| PathBuf::from(PRESSNATIVE_CACHE_DB));
    let connection = DbConnection::open(db_path).await?;
    let source = DirContentSource::new(&content_dir, config.marker_codec()?)?;

    let (tx, mut rx) = unbounded_channel::<CacheEvent>();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if let CacheEvent::BatchProgress(progress) = event {
                println!(
                    "{}: {}/{} ({:.0}%)",
                    progress.status,
                    progress.compiled,
                    progress.total,
                    progress.fraction() * 100.0
                );
            }
        }
    });

    let cache = CompiledCache::new(connection.clone())
        .with_compiler(config.compiler())
        .with_events(tx);
    let recompiler =
        BatchRecompiler::new(cache, source, connection.clone()).with_batch_size(config.batch_size);
    recompiler.schedule().await?;
    let progress = recompiler.run_to_completion().await?;

    drop(recompiler);
    printer.await?;
    println!(
        "Warmed {} of {} documents; cache holds {} entries",
        progress.compiled,
        progress.total,
        connection.entry_count().await?
    );
    Ok(())
}
