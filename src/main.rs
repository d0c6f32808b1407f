use std::process;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use workspace_provisioner::cli::{
    env_file_arg, format_failure, format_plan, format_result, format_status, load_env_file,
    plan_request, resolve_config, run_provision, run_status, Cli, CommandError, Commands,
};

#[tokio::main]
async fn main() {
    // Load .env file first so clap's env fallbacks and RUST_LOG see it
    if let Some(env_file) = env_file_arg(std::env::args_os()) {
        if let Err(e) = load_env_file(&env_file) {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }

    let cli = Cli::parse();

    // Initialize logging
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    let config = match resolve_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    };

    match &cli.command {
        Commands::Validate(args) => match plan_request(args) {
            Ok(request) => print!("{}", format_plan(&request, &config)),
            Err(e) => {
                eprintln!("Validation: FAILED\n{}", e);
                process::exit(1);
            }
        },

        Commands::Provision(args) if args.dry_run => match plan_request(&args.request) {
            Ok(request) => {
                print!("{}", format_plan(&request, &config));
                println!("Ready to provision. Remove --dry-run to execute.");
            }
            Err(e) => {
                eprintln!("Validation: FAILED\n{}", e);
                process::exit(1);
            }
        },

        Commands::Provision(args) => {
            info!("Provisioning against {}", config.api_url);
            match run_provision(&config, args).await {
                Ok(result) if args.json => match serde_json::to_string_pretty(&result) {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        error!("Failed to serialize result: {}", e);
                        process::exit(1);
                    }
                },
                Ok(result) => print!("{}", format_result(&result)),
                Err(CommandError::Provisioning(e)) => {
                    eprint!("{}", format_failure(&e));
                    process::exit(1);
                }
                Err(e) => {
                    eprintln!("Error: {}", e);
                    process::exit(1);
                }
            }
        }

        Commands::Status(args) => match run_status(&config, args).await {
            Ok(status) => print!("{}", format_status(&status)),
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        },
    }
}
