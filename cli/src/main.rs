//! SMIB CLI - Command-line interface for the SMIB chat bot

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use console::Style;
use smib_core::{
    ChannelInfo, ChannelManager, CommandDirectory, Config, ConfigError, ConsoleClient, Dispatcher,
    MessageBus, SlackChannel, SmibError, UserInfo, load_config, save_config,
};
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::EnvFilter;

const SMIB_LOGO: &str = r#"
  ___ __  __ ___ ___
 / __|  \/  |_ _| _ )
 \__ \ |\/| || || _ \
 |___/_|  |_|___|___/
"#;

/// SMIB - runs scripts from chat
#[derive(Parser, Debug)]
#[command(name = "smib")]
#[command(version)]
#[command(about = "SMIB - runs scripts from chat", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Initialize smib configuration and command directory
    Onboard,

    /// Connect to Slack and serve commands
    Gateway {
        /// Slack bot token
        #[arg(short, long)]
        token: Option<String>,
        /// Command directory
        #[arg(short, long)]
        commands: Option<String>,
        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Dispatch a single message locally, printing replies to stdout
    Run {
        /// Message text, e.g. "?countdown"
        text: String,
        /// Name of the user sending the message
        #[arg(short, long, default_value = "local")]
        user: String,
        /// Channel the message is sent in (a direct message if omitted)
        #[arg(long)]
        channel: Option<String>,
        /// Command directory
        #[arg(short, long)]
        commands: Option<String>,
    },

    /// List available commands
    Commands {
        /// Command directory
        #[arg(short, long)]
        commands: Option<String>,
    },

    /// Show smib status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Onboard => {
            command_onboard().await?;
        }
        Commands::Gateway {
            token,
            commands,
            verbose,
        } => {
            command_gateway(token, commands, verbose).await?;
        }
        Commands::Run {
            text,
            user,
            channel,
            commands,
        } => {
            command_run(text, user, channel, commands).await?;
        }
        Commands::Commands { commands } => {
            command_commands(commands).await?;
        }
        Commands::Status => {
            command_status().await?;
        }
    }

    Ok(())
}

/// Install the tracing subscriber. Logs go to stderr so command output on
/// stdout stays clean.
fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::builder().parse("debug")?
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

/// Load the config file, falling back to defaults when there is none
async fn load_or_default() -> Result<Config> {
    match load_config().await {
        Ok(config) => Ok(config),
        Err(SmibError::Config(ConfigError::NotFound(path))) => {
            tracing::debug!("No config at {}, using defaults", path.display());
            let mut config = Config::default();
            config.apply_env_overrides();
            Ok(config)
        }
        Err(e) => Err(e).context("Failed to load config"),
    }
}

/// Initialize smib configuration
async fn command_onboard() -> Result<()> {
    let green = Style::new().green();

    println!("{}{} SMIB SETUP", SMIB_LOGO, green.apply_to(">>>"));

    let config_path = smib_core::get_config_path();

    if config_path.exists() {
        println!("\n⚠️  Config already exists at {}", config_path.display());
        println!("Leaving it in place.");
    } else {
        save_config(&Config::default()).await?;
        println!("\n✅ Created config at {}", config_path.display());
    }

    let config = load_or_default().await?;
    let commands = config.commands_path();
    tokio::fs::create_dir_all(&commands)
        .await
        .with_context(|| format!("Failed to create {}", commands.display()))?;
    println!("✅ Command directory at {}", commands.display());

    println!("\n{}{} smib is ready!", SMIB_LOGO, green.apply_to(">>>"));
    println!("\nNext steps:");
    println!("  1. Add your Slack bot token to {}", config_path.display());
    println!("  2. Drop executable scripts into {}", commands.display());
    println!("  3. Try one: smib run \"?name some args\"");
    println!("  4. Go live: smib gateway");

    Ok(())
}

/// Connect to Slack and dispatch commands until interrupted
async fn command_gateway(
    token: Option<String>,
    commands: Option<String>,
    verbose: bool,
) -> Result<()> {
    init_logging(verbose)?;

    let mut config = load_or_default().await?;
    config.apply_overrides(token, commands);

    if !config.slack.enabled {
        bail!("Slack is disabled in {}", smib_core::get_config_path().display());
    }
    if config.slack_token().is_none() {
        bail!(
            "No Slack token configured (set it in the config, {} or --token)",
            smib_core::config::ENV_SLACK_TOKEN
        );
    }

    println!("{} Starting smib gateway...", SMIB_LOGO);

    let bus = MessageBus::new();
    let slack = Arc::new(
        SlackChannel::new(config.slack.clone(), bus.clone())
            .context("Failed to initialize Slack")?,
    );

    let channel_manager = ChannelManager::new();
    channel_manager.register_channel(slack.clone()).await;

    let commands = Arc::new(CommandDirectory::new(config.commands_path()));
    let dispatcher = Dispatcher::new(slack, commands, bus, config.commands.trigger);

    println!("✅ Channels: {}", channel_manager.enabled_channels().await.join(", "));
    println!("✅ Commands: {}", config.commands_path().display());
    println!("✅ Ready!");

    tokio::select! {
        result = dispatcher.run() => {
            result?;
        }
        result = channel_manager.start_all() => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            println!("\nShutting down...");
            dispatcher.stop().await;
            channel_manager.stop_all().await?;
        }
    }

    Ok(())
}

/// Dispatch one message through the console transport
async fn command_run(
    text: String,
    user: String,
    channel: Option<String>,
    commands: Option<String>,
) -> Result<()> {
    init_logging(false)?;

    let mut config = load_or_default().await?;
    config.apply_overrides(None, commands);

    let user = UserInfo::new(user.clone(), user);
    let channel = channel.map(|name| ChannelInfo::new(name.clone(), name));
    let console = Arc::new(ConsoleClient::new(user, channel));
    let msg = console.message(text);

    if smib_core::CommandInvocation::parse(&msg.content, config.commands.trigger).is_none() {
        println!(
            "{}",
            console::style(format!(
                "Not a command, messages start with {}",
                config.commands.trigger
            ))
            .dim()
        );
        return Ok(());
    }

    let runner = Arc::new(CommandDirectory::new(config.commands_path()));
    let dispatcher = Dispatcher::new(console, runner, MessageBus::new(), config.commands.trigger);

    dispatcher
        .handle_message(&msg)
        .await
        .map_err(|e| anyhow!("{}", e))?;

    Ok(())
}

/// List invocable command names
async fn command_commands(commands: Option<String>) -> Result<()> {
    let mut config = load_or_default().await?;
    config.apply_overrides(None, commands);

    let dir = CommandDirectory::new(config.commands_path());
    let names = dir
        .list()
        .await
        .with_context(|| format!("Failed to list {}", dir.path().display()))?;

    if names.is_empty() {
        println!("No commands in {}", dir.path().display());
        return Ok(());
    }

    let green = Style::new().green();
    for name in names {
        println!("  {}{}", green.apply_to(config.commands.trigger), name);
    }

    Ok(())
}

/// Show status
async fn command_status() -> Result<()> {
    let green = Style::new().green();

    println!("{}\nsmib Status\n", SMIB_LOGO);

    let config_path = smib_core::get_config_path();
    println!(
        "Config: {} {}",
        config_path.display(),
        if config_path.exists() {
            green.apply_to("✅")
        } else {
            console::style("❌").red()
        }
    );

    let config = load_or_default().await?;
    let commands = config.commands_path();
    println!(
        "Commands: {} {}",
        commands.display(),
        if commands.is_dir() {
            green.apply_to("✅")
        } else {
            console::style("❌").red()
        }
    );

    println!("Trigger: {}", config.commands.trigger);
    println!(
        "Slack: {}",
        match (config.slack.enabled, config.slack_token().is_some()) {
            (false, _) => console::style("disabled").dim(),
            (true, true) => green.apply_to("token set ✅"),
            (true, false) => console::style("token not set").dim(),
        }
    );

    Ok(())
}
