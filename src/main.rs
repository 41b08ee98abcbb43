use clap::{value_parser, Arg, ArgAction, Command};
use funnytunes::configuration::{create_config, ConfigFolder};
use funnytunes::startup::{import, run};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn page_arg() -> Arg {
    Arg::new("page")
        .long("page")
        .value_name("N")
        .value_parser(value_parser!(usize))
        .help("Also show page N (starting at 1) of the artist listing")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("funnytunes=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Command::new("funnytunes")
        .about("🎵 Listening statistics from your Spotify streaming history 🎵")
        .subcommand(
            Command::new("config").about("🛠️ Create or update the configuration file"),
        )
        .subcommand(
            Command::new("import")
                .about("📥 Build the encrypted listening database from a streaming-history export")
                .arg(
                    Arg::new("path")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Export directory or zip archive"),
                ),
        )
        .subcommand(
            Command::new("run")
                .about("🚀 Show your statistics and fetch missing details from Last.fm")
                .arg(page_arg())
                .arg(
                    Arg::new("offline")
                        .long("offline")
                        .action(ArgAction::SetTrue)
                        .help("Skip Last.fm lookups"),
                ),
        )
        .subcommand(
            Command::new("report")
                .about("📊 Show your statistics without going online")
                .arg(page_arg()),
        )
        .get_matches();

    let cfg_folder = ConfigFolder::new()?;
    let page = |m: &clap::ArgMatches| m.get_one::<usize>("page").map(|p| p.saturating_sub(1));

    match args.subcommand() {
        Some(("config", _)) => {
            println!("\x1b[1m\x1b[34mConfiguring funnytunes...\x1b[0m");
            create_config(&cfg_folder)?;
        }
        Some(("import", m)) => {
            let Some(path) = m.get_one::<PathBuf>("path") else {
                print_usage();
                return Ok(());
            };
            import(&cfg_folder, path)?;
        }
        Some(("run", m)) => {
            println!("\x1b[1m\x1b[34mLoading your listening statistics...\x1b[0m");
            run(&cfg_folder, page(m), m.get_flag("offline")).await?;
        }
        Some(("report", m)) => run(&cfg_folder, page(m), true).await?,
        _ => print_usage(),
    }
    Ok(())
}

fn print_usage() {
    println!("\x1b[1m\x1b[31mInvalid command!\x1b[0m\n");
    println!("📖 Available Commands:");
    println!("  \x1b[1m\x1b[32mfunnytunes config\x1b[0m          - 🛠️  Create or update configuration file");
    println!("  \x1b[1m\x1b[32mfunnytunes import <PATH>\x1b[0m   - 📥 Import a streaming-history export");
    println!("  \x1b[1m\x1b[32mfunnytunes run [--page N]\x1b[0m  - 🚀 Show statistics and enrich them");
    println!("  \x1b[1m\x1b[32mfunnytunes report\x1b[0m          - 📊 Show statistics offline");
    println!("\x1b[33mRequest your data at spotify.com/account/privacy to get an export.\x1b[0m\n");
}
