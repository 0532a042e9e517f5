use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "translation-generator",
    about = "Translation Generator - Get the lyrics of a YouTube song, formatted and translated",
    version,
    long_about = "Downloads the video and audio of a YouTube song, transcribes it with AssemblyAI and uses OpenAI to format the lyrics into verses and translate them. Runs as an HTTP service or as a one-off command."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP service (POST /generate-translation)
    Serve {
        /// Address to listen on (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Process a single video from the command line
    Generate {
        /// YouTube link (youtube.com/watch?v=..., youtu.be/..., youtube.com/embed/...)
        #[arg(value_name = "LINK")]
        link: String,

        /// Language to deliver the lyrics in
        #[arg(short, long, default_value = "es")]
        target_language: String,

        /// OpenAI API key (falls back to config / OPENAI_API_KEY)
        #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Output file path (prints to console if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Delete media files older than the retention window
    Cleanup {
        /// Override the configured retention, in hours
        #[arg(long, value_name = "HOURS")]
        max_age_hours: Option<u64>,

        /// Only list what would be deleted
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the most recent saved translations
    History {
        /// Number of records to show
        #[arg(short, long, default_value = "10")]
        limit: i64,
    },

    /// List supported target languages
    Languages,

    /// Show or create the configuration file
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },
}

#[derive(ValueEnum, Clone, Debug)]
pub enum OutputFormat {
    /// Plain text
    Text,
    /// JSON with every field of the result
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_generate_defaults() {
        let cli = Cli::parse_from(["translation-generator", "generate", "https://youtu.be/abc"]);
        match cli.command {
            Commands::Generate { link, target_language, format, .. } => {
                assert_eq!(link, "https://youtu.be/abc");
                assert_eq!(target_language, "es");
                assert!(matches!(format, OutputFormat::Text));
            }
            _ => panic!("expected generate"),
        }
    }
}
