use catalog_migrator::cli::{self as stage, ExtractOptions, LoadOptions, TransformOptions};
use catalog_migrator::config::SettingsChain;
use clap::{Args, Parser, Subcommand, builder::styling};
use eyre::Result;
use owo_colors::OwoColorize;
use std::path::PathBuf;

// CLI Styling
const STYLES: styling::Styles = styling::Styles::styled()
    .header(styling::AnsiColor::BrightWhite.on_default())
    .usage(styling::AnsiColor::BrightWhite.on_default())
    .literal(styling::AnsiColor::Green.on_default())
    .placeholder(styling::AnsiColor::Cyan.on_default());

/// Catalog Migrator: move data catalog records from MongoDB into PostgreSQL, one stage at a time
#[derive(Parser)]
#[command(name = "catmig", version, styles = STYLES)]
struct Cli {
    /// The dotenv file to source connection settings from (optional)
    #[arg(short, long, global = true, default_value = ".env")]
    env: String,

    /// More verbose logging
    #[arg(long, global = true)]
    debug: bool,

    /// Never prompt; fail when a required setting is missing from the environment
    #[arg(long, global = true)]
    no_prompt: bool,

    /// Command to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct OutputDir {
    /// Directory holding the intermediate files
    #[arg(short, long)]
    output_dir: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Read the source collections into extracted_data.json
    Extract {
        #[command(flatten)]
        output: OutputDir,

        #[command(flatten)]
        options: ExtractOptions,
    },

    /// Reshape extracted_data.json into transformed_data.json
    Transform {
        #[command(flatten)]
        output: OutputDir,

        #[command(flatten)]
        options: TransformOptions,
    },

    /// Upsert transformed_data.json into the target table
    Load {
        #[command(flatten)]
        output: OutputDir,

        #[command(flatten)]
        options: LoadOptions,
    },

    /// Remove generated files, keeping placeholders such as .gitkeep
    Clean {
        #[command(flatten)]
        output: OutputDir,
    },

    /// Run extract, transform and load, stopping at the first failure
    Run {
        #[command(flatten)]
        output: OutputDir,

        #[command(flatten)]
        extract: ExtractOptions,

        #[command(flatten)]
        transform: TransformOptions,

        #[command(flatten)]
        load: LoadOptions,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.debug {
        true => "debug",
        false => "info",
    };
    let env = env_logger::Env::default().filter_or("LOG_LEVEL", log_level);
    env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .init();

    match dotenvy::from_filename(&cli.env) {
        Ok(path) => log::debug!("Sourced settings from {}", path.display()),
        Err(e) if e.not_found() => log::debug!("No {} file, using the environment", cli.env),
        Err(e) => return Err(e.into()),
    }

    let settings = SettingsChain::standard(!cli.no_prompt);

    match cli.command {
        Commands::Extract { output, options } => {
            let count = stage::extract(&output.output_dir, &options, &settings).await?;
            println!("Extracted {} record(s)", count.green());
        }
        Commands::Transform { output, options } => {
            let summary = stage::transform(&output.output_dir, &options).await?;
            println!(
                "Transformed {} of {} record(s)",
                summary.loaded.green(),
                summary.extracted
            );
        }
        Commands::Load { output, options } => {
            let summary = stage::load(&output.output_dir, &options, &settings).await?;
            println!(
                "Upserted {} of {} record(s)",
                summary.loaded.green(),
                summary.extracted
            );
        }
        Commands::Clean { output } => {
            let removed = stage::clean(&output.output_dir)?;
            println!("Removed {} file(s)", removed);
        }
        Commands::Run {
            output,
            extract,
            transform,
            load,
        } => {
            let summary =
                stage::run_all(&output.output_dir, &extract, &transform, &load, &settings).await?;
            println!(
                "Upserted {} of {} record(s)",
                summary.loaded.green(),
                summary.extracted
            );
        }
    }

    Ok(())
}
