use clap::Parser;
use tracing_subscriber::EnvFilter;

use passvault::cli::commands::generate::Exclusions;
use passvault::cli::{Cli, Commands};

/// Log to stderr, filtered by `PASSVAULT_LOG`, then `RUST_LOG`, else `warn`.
fn init_tracing() {
    let filter = std::env::var("PASSVAULT_LOG")
        .ok()
        .and_then(|v| EnvFilter::try_new(v).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init {
            random_key,
            ref key_out,
        } => passvault::cli::commands::init::execute(&cli, random_key, key_out.as_deref()).await,
        Commands::Add {
            ref site,
            ref username,
            ref password,
            generate,
            length,
        } => {
            passvault::cli::commands::add::execute(
                &cli,
                site,
                username,
                password.as_deref(),
                generate,
                length,
            )
            .await
        }
        Commands::List { ref search, show } => {
            passvault::cli::commands::list::execute(&cli, search.as_deref(), show).await
        }
        Commands::Get { ref id, copy } => {
            passvault::cli::commands::get::execute(&cli, id, copy).await
        }
        Commands::Delete { ref id, force } => {
            passvault::cli::commands::delete::execute(&cli, id, force).await
        }
        Commands::Generate {
            length,
            no_upper,
            no_lower,
            no_digits,
            no_symbols,
            copy,
        } => passvault::cli::commands::generate::execute(
            length,
            Exclusions {
                upper: no_upper,
                lower: no_lower,
                digits: no_digits,
                symbols: no_symbols,
            },
            copy,
        ),
        Commands::Strength { ref password } => {
            passvault::cli::commands::strength::execute(password.as_deref())
        }
        Commands::EscrowKeygen { ref out } => {
            passvault::cli::commands::escrow_keygen::execute(out)
        }
        Commands::Completions { shell } => passvault::cli::commands::completions::execute(shell),
    };

    if let Err(e) = result {
        tracing::debug!(kind = ?e.kind(), "command failed");
        passvault::cli::output::report(&e);
        std::process::exit(1);
    }
}
