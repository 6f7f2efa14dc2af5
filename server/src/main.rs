mod auth;
mod config;
mod notify;
mod server;

use std::path::PathBuf;
use std::process;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::auth::JwtKeys;
use crate::config::Config;
use intake_core::models::NewNutrient;
use intake_core::service::IntakeService;

#[derive(Parser)]
#[command(
    name = "intake",
    version,
    about = "A self-hosted nutrition and weight tracking backend"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value_t = 3000)]
        port: u16,
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,
        /// Database path (default: in the data directory)
        #[arg(long)]
        db: Option<PathBuf>,
        /// JWT signing secret (default: loaded or generated in the data directory)
        #[arg(long)]
        jwt_secret: Option<String>,
        /// Disable the daily push-notification sweep
        #[arg(long)]
        no_notifications: bool,
    },
    /// Manage the reference food table used by custom-nutrition lookups
    Nutrient {
        #[command(subcommand)]
        command: NutrientCommands,
    },
}

#[derive(Subcommand)]
enum NutrientCommands {
    /// Add a food with per-gram macro values
    Add {
        /// Food name
        name: String,
        /// Calories per gram
        #[arg(long)]
        calories: f64,
        /// Protein grams per gram
        #[arg(long, default_value_t = 0.0)]
        protein: f64,
        /// Carb grams per gram
        #[arg(long, default_value_t = 0.0)]
        carbs: f64,
        /// Fat grams per gram
        #[arg(long, default_value_t = 0.0)]
        fat: f64,
    },
    /// List stored foods
    List,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;

    match cli.command {
        Commands::Serve {
            port,
            bind,
            db,
            jwt_secret,
            no_notifications,
        } => {
            let db_path = db.unwrap_or_else(|| config.db_path.clone());
            let svc = IntakeService::new(&db_path)?;
            let secret = match jwt_secret {
                Some(secret) => secret,
                None => config.load_or_create_jwt_secret()?,
            };
            let keys = JwtKeys::new(secret.as_bytes());
            server::start_server(svc, port, &bind, keys, !no_notifications).await
        }
        Commands::Nutrient { command } => {
            let svc = IntakeService::new(&config.db_path)?;
            match command {
                NutrientCommands::Add {
                    name,
                    calories,
                    protein,
                    carbs,
                    fat,
                } => {
                    let nutrient = svc.add_nutrient(&NewNutrient {
                        name,
                        calories_per_g: calories,
                        protein_per_g: protein,
                        carbs_per_g: carbs,
                        fat_per_g: fat,
                    })?;
                    println!("Added {} (id {})", nutrient.name, nutrient.id);
                }
                NutrientCommands::List => {
                    for n in svc.list_nutrients()? {
                        println!(
                            "{:<28} {:>6.2} kcal/g  protein {:.3}  carbs {:.3}  fat {:.3}",
                            n.name, n.calories_per_g, n.protein_per_g, n.carbs_per_g, n.fat_per_g
                        );
                    }
                }
            }
            Ok(())
        }
    }
}
