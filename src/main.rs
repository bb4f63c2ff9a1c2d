use alpha_scanner::cli::{Cli, Commands};
use alpha_scanner::config::Config;
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration; only a missing file falls back to the bundled defaults
    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) if Config::is_missing_file(&e) => {
            eprintln!("Warning: {} not found, using default configuration", cli.config);
            Config::bundled()?
        }
        Err(e) => return Err(e.context(format!("Invalid config file {}", cli.config))),
    };

    // Initialize telemetry
    alpha_scanner::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Scan(args) => {
            config.validate()?;
            tracing::info!("Starting scan");
            args.execute(&config).await?;
        }
        Commands::Evaluate(args) => {
            config.database_url()?;
            config.validate_settings()?;
            tracing::info!("Starting evaluation");
            args.execute(&config).await?;
        }
        Commands::Reconcile(args) => {
            config.database_url()?;
            tracing::info!("Starting reconciliation");
            args.execute(&config).await?;
        }
        Commands::History(args) => {
            config.database_url()?;
            args.execute(&config).await?;
        }
        Commands::Export(args) => {
            config.database_url()?;
            tracing::info!("Starting export");
            args.execute(&config).await?;
        }
        Commands::Config => {
            let scanner = &config.scanner;
            let evaluator = &config.evaluator;
            println!("Current configuration:");
            println!(
                "  Scanner: {} bars, model {}, top {}, tiers {}/{}",
                scanner.timeframe_hours,
                scanner.model_id,
                scanner.top_k,
                scanner.large_threshold,
                scanner.mid_threshold
            );
            println!(
                "  Exchange: {} ({})",
                config.exchange.base_url, config.exchange.symbol_suffix
            );
            println!(
                "  Inference: {}",
                config.inference.url.as_deref().unwrap_or("<unset>")
            );
            println!(
                "  Store: {}",
                config.store.database_url.as_deref().unwrap_or("<unset>")
            );
            println!(
                "  Evaluator: horizons {:?}h, margin {}h, bound {}",
                evaluator.horizons_hours, evaluator.safety_margin_hours, evaluator.return_bound
            );
            if let Err(e) = config.validate() {
                println!("  Invalid: {}", e);
            }
        }
    }

    Ok(())
}
