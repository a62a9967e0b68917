use anyhow::Result;
use clap::{CommandFactory, Parser};
use parley::app::{
    SessionOptions, run_ask_command, run_learn_command, run_notes_command, run_scene_command,
};
use parley::cli::{Cli, Commands, ConfigAction};
use parley::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let options = SessionOptions {
        service_url: cli.service_url.clone(),
        language: cli.language.clone(),
        silence: cli.silence,
        quiet: cli.quiet,
        verbosity: cli.verbose,
    };
    if cli.verbose > 0 && !cli.quiet {
        eprintln!("parley {}", parley::version_string());
    }

    match cli.command {
        Commands::Learn { subject } => {
            let config = load_config(cli.config.as_deref())?;
            run_learn_command(config, subject, options).await?;
        }
        Commands::Ask { description } => {
            let config = load_config(cli.config.as_deref())?;
            run_ask_command(config, description, options).await?;
        }
        Commands::Scene { image } => {
            let config = load_config(cli.config.as_deref())?;
            run_scene_command(config, image, options).await?;
        }
        Commands::Notes { output } => {
            let config = load_config(cli.config.as_deref())?;
            run_notes_command(config, output, options).await?;
        }
        Commands::Config { action } => {
            handle_config_command(action, cli.config.as_deref())?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "parley", &mut std::io::stdout());
        }
    }

    Ok(())
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config)
/// 2. Default config path (~/.config/parley/config.toml)
/// 3. Built-in defaults with environment variable overrides
fn load_config(custom_path: Option<&std::path::Path>) -> Result<Config> {
    let config = if let Some(path) = custom_path {
        Config::load(path)?
    } else {
        Config::load_or_default(&Config::default_path())?
    };

    Ok(config.with_env_overrides())
}

/// Handle configuration commands.
fn handle_config_command(
    action: ConfigAction,
    custom_path: Option<&std::path::Path>,
) -> Result<()> {
    let config_path = custom_path
        .map(std::path::PathBuf::from)
        .unwrap_or_else(Config::default_path);

    match action {
        ConfigAction::Get { key } => {
            let config = Config::load_or_default(&config_path)?.with_env_overrides();
            match config.get_value_by_path(&key) {
                Ok(value) => println!("{}", value),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            }
        }
        ConfigAction::List { section } => {
            let config = Config::load_or_default(&config_path)?.with_env_overrides();
            let rendered = match section.as_deref() {
                Some(section) => config.get_value_by_path(section),
                None => config.to_toml(),
            };
            match rendered {
                Ok(toml) => println!("{}", toml.trim_end()),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            }
        }
        ConfigAction::Dump => {
            print!("{}", Config::default().to_toml()?);
        }
        ConfigAction::Path => {
            println!("{}", config_path.display());
        }
    }

    Ok(())
}
