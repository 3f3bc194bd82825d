//! Next-game points prediction CLI
//!
//! Generates player histories, builds rolling features, trains an MLP
//! regressor and predicts a player's points from their last five games.

use clap::{Parser, Subcommand};
use hoops::predict::OutputFormat;
use hoops::{Config, Result};

#[derive(Parser)]
#[command(name = "hoops")]
#[command(about = "Predict a basketball player's points in their next game", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Data management commands
    Data {
        #[command(subcommand)]
        action: DataCommands,
    },
    /// Train the points regressor on the featured CSV
    Train {
        /// Override number of epochs
        #[arg(long)]
        epochs: Option<usize>,
        /// Override the feature schema (core-v1 or home-v2)
        #[arg(long)]
        schema: Option<String>,
    },
    /// Predict next-game points (interactive without --games or --player)
    Predict {
        /// CSV with exactly five games, oldest first
        #[arg(long, conflicts_with = "player")]
        games: Option<String>,
        /// Use the last five games of a player from the raw history
        #[arg(long)]
        player: Option<String>,
        /// Output format
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },
    /// Model management commands
    Model {
        #[command(subcommand)]
        action: ModelCommands,
    },
    /// Show logged predictions
    History {
        /// Number of predictions to show
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Initialize a new project with default config
    Init,
}

#[derive(Subcommand)]
enum DataCommands {
    /// Generate a synthetic season history
    Generate {
        /// Override the random seed
        #[arg(long)]
        seed: Option<u64>,
        /// Override games per player
        #[arg(long)]
        games: Option<usize>,
    },
    /// Build the featured training CSV from the raw history
    Features,
    /// Show data and prediction log status
    Status,
}

#[derive(Subcommand)]
enum ModelCommands {
    /// Show model information
    Info,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load or create config
    let config = if std::path::Path::new(&cli.config).exists() {
        match Config::load(&cli.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    // Run command
    let result = match cli.command {
        Commands::Data { action } => match action {
            DataCommands::Generate { seed, games } => {
                commands::data_generate(&config, seed, games)
            }
            DataCommands::Features => commands::data_features(&config),
            DataCommands::Status => commands::data_status(&config),
        },
        Commands::Train { epochs, schema } => commands::train(&config, epochs, schema),
        Commands::Predict {
            games,
            player,
            format,
        } => commands::predict(&config, games, player, format),
        Commands::Model { action } => match action {
            ModelCommands::Info => commands::model_info(&config),
        },
        Commands::History { limit } => commands::history(&config, limit),
        Commands::Init => commands::init(&cli.config),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

mod commands {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use hoops::data::database::Database;
    use hoops::data::dataset::{build_featured_rows, read_featured, write_featured, PointsDataset};
    use hoops::data::history::{
        find_player, group_by_player, read_history, read_session_games, write_history,
    };
    use hoops::data::session::{GameSession, SESSION_CAPACITY};
    use hoops::data::synthetic::SyntheticGenerator;
    use hoops::features::FeatureSchema;
    use hoops::model::artifact::{artifact_exists, load_metadata};
    use hoops::model::RegressorConfig;
    use hoops::predict::console::{log_prediction, render_report, Console};
    use hoops::predict::Predictor;
    use hoops::training::RegressionTrainer;
    use hoops::HoopsError;
    use std::path::Path;

    type MyBackend = NdArray<f32>;
    type MyAutodiffBackend = Autodiff<MyBackend>;

    fn configured_schema(config: &Config) -> Result<FeatureSchema> {
        config.features.schema.parse()
    }

    pub fn init(config_path: &str) -> Result<()> {
        let config = Config::default();
        config.save(config_path)?;
        println!("Created default config at {}", config_path);

        for path in [&config.data.raw_path, &config.data.featured_path, &config.data.model_path] {
            if let Some(parent) = Path::new(path).parent() {
                std::fs::create_dir_all(parent)?;
            }
        }
        println!("Created data/ and model/ directories");

        println!("\nNext steps:");
        println!("  1. Edit {} to customize settings", config_path);
        println!("  2. Run 'hoops data generate' to create a season of games");
        println!("  3. Run 'hoops data features' to build the training table");
        println!("  4. Run 'hoops train' to train the model");
        println!("  5. Run 'hoops predict' to enter five games and predict the next one");

        Ok(())
    }

    pub fn data_generate(config: &Config, seed: Option<u64>, games: Option<usize>) -> Result<()> {
        let mut synthetic = config.synthetic.clone();
        if let Some(seed) = seed {
            synthetic.seed = seed;
        }
        if let Some(games) = games {
            synthetic.games_per_player = games;
        }

        println!(
            "Generating {} games for {} players (seed {})...",
            synthetic.games_per_player,
            synthetic.players.len(),
            synthetic.seed
        );
        let rows = SyntheticGenerator::new(synthetic).generate();
        write_history(&config.data.raw_path, &rows)?;
        println!("Wrote {} games to {}", rows.len(), config.data.raw_path);

        Ok(())
    }

    pub fn data_features(config: &Config) -> Result<()> {
        let rows = read_history(&config.data.raw_path)?;
        let histories = group_by_player(&rows)?;
        println!(
            "Loaded {} games for {} players from {}",
            rows.len(),
            histories.len(),
            config.data.raw_path
        );

        let featured = build_featured_rows(&histories);
        write_featured(&config.data.featured_path, &featured)?;
        println!(
            "Wrote {} feature rows to {} ({} rows without a full window skipped)",
            featured.len(),
            config.data.featured_path,
            rows.len() - featured.len()
        );

        Ok(())
    }

    pub fn data_status(config: &Config) -> Result<()> {
        println!("Data Status");
        println!("───────────────────────────────");

        if Path::new(&config.data.raw_path).exists() {
            let rows = read_history(&config.data.raw_path)?;
            let histories = group_by_player(&rows)?;
            println!(
                "  Raw history:  {} ({} games, {} players)",
                config.data.raw_path,
                rows.len(),
                histories.len()
            );
            for h in &histories {
                let first = h.games.first().and_then(|g| g.game_date());
                let last = h.games.last().and_then(|g| g.game_date());
                if let (Some(first), Some(last)) = (first, last) {
                    println!(
                        "    {:<12} {:>3} games  {} to {}",
                        h.name,
                        h.games.len(),
                        first,
                        last
                    );
                }
            }
        } else {
            println!("  Raw history:  {} (missing)", config.data.raw_path);
        }

        if Path::new(&config.data.featured_path).exists() {
            let featured = read_featured(&config.data.featured_path)?;
            println!("  Features:     {} ({} rows)", config.data.featured_path, featured.len());
        } else {
            println!("  Features:     {} (missing)", config.data.featured_path);
        }

        let model_state = if artifact_exists(&config.data.model_path) {
            "trained"
        } else {
            "missing"
        };
        println!("  Model:        {} ({})", config.data.model_path, model_state);

        if Path::new(&config.data.database_path).exists() {
            let stats = Database::open(&config.data.database_path)?.get_stats()?;
            println!("  Predictions:  {}", stats.prediction_count);
            if let (Some(first), Some(last)) = (stats.first_prediction, stats.last_prediction) {
                println!("  Range:        {} to {}", first, last);
            }
        }

        Ok(())
    }

    pub fn train(config: &Config, epochs: Option<usize>, schema: Option<String>) -> Result<()> {
        let schema = match schema {
            Some(s) => s.parse()?,
            None => configured_schema(config)?,
        };
        let mut training = config.training.clone();
        if let Some(epochs) = epochs {
            training.epochs = epochs;
        }

        println!("Initializing training...");
        if !Path::new(&config.data.featured_path).exists() {
            return Err(HoopsError::Config(format!(
                "{} not found - run 'hoops data features' first",
                config.data.featured_path
            )));
        }
        let rows = read_featured(&config.data.featured_path)?;
        let dataset = PointsDataset::from_featured(&rows, schema)?;
        println!(
            "Loaded {} rows, schema {} ({} features)",
            dataset.len(),
            schema,
            schema.dim()
        );

        let regressor =
            RegressorConfig::for_schema(schema, training.hidden_dims.clone(), training.dropout);
        println!("Creating model (hidden layers {:?})...", regressor.hidden_dims);

        let device = Default::default();
        let trainer = RegressionTrainer::<MyAutodiffBackend>::new(regressor, training, device);

        println!("\nStarting training...\n");
        let outcome = trainer.train(dataset)?;

        println!("\nSaving model to {}...", config.data.model_path);
        outcome.artifact.save(&config.data.model_path)?;

        println!("\nTraining complete!");
        println!("  Epochs run:     {}", outcome.history.epochs_run());
        println!("  Best epoch:     {}", outcome.history.best_epoch + 1);
        println!("  Best val loss:  {:.4}", outcome.history.best_val_loss);
        if let Some(metrics) = outcome.artifact.metadata.metrics {
            println!("  Test MAE:       {:.2} pts", metrics.mae);
            println!("  Test RMSE:      {:.2} pts", metrics.rmse);
            println!("  Test R²:        {:.3}", metrics.r2);
        }

        Ok(())
    }

    pub fn predict(
        config: &Config,
        games: Option<String>,
        player: Option<String>,
        format: OutputFormat,
    ) -> Result<()> {
        let device = Default::default();
        let predictor = Predictor::<MyBackend>::load(&config.data.model_path, device)?;
        let db = Database::open(&config.data.database_path)?;

        let (session, label) = match (games, player) {
            (Some(path), _) => {
                let file = std::fs::File::open(&path).map_err(|e| {
                    HoopsError::Io(std::io::Error::new(e.kind(), format!("{}: {}", path, e)))
                })?;
                (GameSession::from_games(read_session_games(file)?)?, None)
            }
            (None, Some(name)) => {
                let rows = read_history(&config.data.raw_path)?;
                let histories = group_by_player(&rows)?;
                let history = find_player(&histories, &name)?;
                let recent = history.last_games(SESSION_CAPACITY)?;
                (GameSession::from_games(recent.iter().cloned())?, Some(history.name.clone()))
            }
            (None, None) => {
                let stdin = std::io::stdin();
                let mut stdout = std::io::stdout();
                let mut console = Console::new(&predictor, format).with_log(&db);
                console.run(stdin.lock(), &mut stdout)?;
                log::info!("Session ended after {} predictions", console.predictions());
                return Ok(());
            }
        };

        let report = predictor.predict_session(&session)?;
        log_prediction(&db, &report, label.as_deref())?;
        println!("{}", render_report(&report, label.as_deref(), format)?);

        Ok(())
    }

    pub fn model_info(config: &Config) -> Result<()> {
        if !artifact_exists(&config.data.model_path) {
            return Err(HoopsError::ModelLoad(format!(
                "{} not found - run 'hoops train' first",
                config.data.model_path
            )));
        }
        let metadata = load_metadata(&config.data.model_path)?;

        println!("Model Information");
        println!("───────────────────────────────");
        println!("  Path:           {}", config.data.model_path);
        println!("  Schema:         {}", metadata.schema);
        println!("  Features:       {}", metadata.schema.names().join(", "));
        println!("  Hidden layers:  {:?}", metadata.regressor.hidden_dims);
        println!("  Dropout:        {}", metadata.regressor.dropout);
        println!("  Train samples:  {}", metadata.train_samples);
        println!("  Test samples:   {}", metadata.test_samples);
        println!("  Trained at:     {}", metadata.trained_at);
        if let Some(metrics) = metadata.metrics {
            println!("  Test metrics:   {}", metrics);
        }

        Ok(())
    }

    pub fn history(config: &Config, limit: usize) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let predictions = db.recent_predictions(limit)?;

        if predictions.is_empty() {
            println!("No predictions logged yet.");
            return Ok(());
        }

        println!("{:>4}  {:<19}  {:<10}  {:<8}  {:>6}", "ID", "Time", "Player", "Schema", "Points");
        println!("──────────────────────────────────────────────────────────");
        for p in predictions {
            println!(
                "{:>4}  {:<19}  {:<10}  {:<8}  {:>6.1}",
                p.id,
                p.created_at,
                p.player.as_deref().unwrap_or("-"),
                p.schema,
                p.predicted_points
            );
        }

        Ok(())
    }
}
