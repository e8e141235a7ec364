use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use codepilot::logging::{self, LogFormat, LogOptions};

mod cmd;

#[derive(Parser)]
#[command(name = "codepilot")]
#[command(version, about = "Generate, package and publish code with an LLM")]
pub struct Cli {
    /// Path to codepilot.toml (defaults to ./codepilot.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, value_enum, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Write logs to daily-rotated files in this directory
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        #[arg(long)]
        host: Option<String>,

        #[arg(short, long)]
        port: Option<u16>,

        /// Open the browser once the server is listening
        #[arg(long)]
        open: bool,
    },
    /// Generate code from a prompt
    Generate {
        prompt: String,

        /// Reference files included in the prompt, in order
        #[arg(short, long = "file")]
        files: Vec<PathBuf>,

        /// Generate a Kivy/Android Python app
        #[arg(long)]
        mobile: bool,

        /// Write the code to this file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Package a Python source file into an executable
    Build { source: PathBuf },
    /// Commit a file's content to a GitHub branch
    Publish {
        #[arg(long)]
        repo: String,

        #[arg(long)]
        branch: String,

        #[arg(short, long)]
        message: String,

        /// Personal access token (defaults to GITHUB_TOKEN)
        #[arg(long)]
        token: Option<String>,

        content_file: PathBuf,
    },
    /// Fetch the top-level files of a GitHub repository
    Import {
        repo_url: String,

        /// Write the fetched files into this directory
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Manage the persisted LLM API key
    Key {
        #[command(subcommand)]
        command: KeyCommands,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum KeyCommands {
    /// Persist an API key (an empty value clears it)
    Set { value: String },
    /// Show which key is in effect, masked
    Show,
    /// Ask the provider whether the key in effect is valid
    Check,
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Validate configuration and list any problems
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let _log_guard = logging::init(&LogOptions {
        verbose: cli.verbose,
        format: cli.log_format,
        dir: cli.log_dir.clone(),
    })?;

    let config = cmd::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { host, port, open } => {
            cmd::cmd_serve(config, host, port, open).await?;
        }
        Commands::Generate {
            prompt,
            files,
            mobile,
            out,
        } => {
            cmd::cmd_generate(&config, &prompt, &files, mobile, out.as_deref()).await?;
        }
        Commands::Build { source } => cmd::cmd_build(&config, &source).await?,
        Commands::Publish {
            repo,
            branch,
            message,
            token,
            content_file,
        } => {
            cmd::cmd_publish(&config, repo, branch, message, token, &content_file).await?;
        }
        Commands::Import { repo_url, out } => {
            cmd::cmd_import(&config, &repo_url, out.as_deref()).await?;
        }
        Commands::Key { command } => cmd::cmd_key(&config, command).await?,
        Commands::Config { command } => cmd::cmd_config(&config, command)?,
    }

    Ok(())
}
