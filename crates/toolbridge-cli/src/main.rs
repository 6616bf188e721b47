//! toolbridge - inspect and call tools exposed by MCP servers

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;

use commands::{Cli, Commands, SpecFormat};
use config::CliConfig;
use toolbridge_mcp_client::{ConnectionManager, FailurePhase};
use toolbridge_tools::{adapt_tools, BoxedTool, ToolFormat, ToolOutput};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = CliConfig::load();

    let default_filter = if config.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .init();

    if !config.colors {
        colored::control::set_override(false);
    }

    let result = match &cli.command {
        Commands::Tools { json, format } => run_tools(&cli, &config, *json, *format).await,
        Commands::Call { tool, args } => run_call(&cli, tool, args).await,
    };

    if let Err(e) = result {
        eprintln!("{}: {e:#}", "Error".red().bold());
        std::process::exit(1);
    }
}

async fn run_tools(
    cli: &Cli,
    config: &CliConfig,
    json: bool,
    format: Option<SpecFormat>,
) -> anyhow::Result<()> {
    let (manager, tools) = start_manager(cli).await?;

    let format = format.or_else(|| {
        config
            .default_provider
            .as_deref()
            .and_then(SpecFormat::from_provider)
    });

    if let Some(format) = format {
        let specs: Vec<_> = tools
            .iter()
            .map(|tool| ToolFormat::from(format).render(tool.as_ref()))
            .collect();
        println!("{}", serde_json::to_string_pretty(&specs)?);
    } else if json {
        let descriptors: Vec<_> = tools
            .iter()
            .map(|tool| {
                serde_json::json!({
                    "name": tool.name(),
                    "description": tool.description(),
                    "inputSchema": tool.input_schema(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&descriptors)?);
    } else if tools.is_empty() {
        println!("{}", "No tools discovered.".dimmed());
    } else {
        for tool in &tools {
            println!("{}", tool.name().cyan().bold());
            if !tool.description().is_empty() {
                println!("  {}", tool.description().dimmed());
            }
        }
    }

    finish(manager).await
}

async fn run_call(cli: &Cli, tool_name: &str, args: &str) -> anyhow::Result<()> {
    let arguments: serde_json::Value =
        serde_json::from_str(args).context("--args must be valid JSON")?;

    let (manager, tools) = start_manager(cli).await?;

    let result = match tools.iter().find(|tool| tool.name() == tool_name) {
        Some(tool) => tool.invoke(arguments).await.map_err(anyhow::Error::from),
        None => Err(anyhow::anyhow!("unknown tool '{tool_name}'")),
    };

    // Tear everything down before reporting, so a failed call still
    // releases every server.
    finish(manager).await?;

    match result? {
        ToolOutput::Text(text) => println!("{text}"),
        ToolOutput::Json(value) => println!("{}", serde_json::to_string_pretty(&value)?),
    }
    Ok(())
}

async fn start_manager(cli: &Cli) -> anyhow::Result<(ConnectionManager, Vec<BoxedTool>)> {
    let mut manager = ConnectionManager::new();
    manager.load_servers(&cli.config)?;

    let bound = manager.start().await;
    Ok((manager, adapt_tools(bound)))
}

/// Shut the server group down and print the failure summary.
async fn finish(mut manager: ConnectionManager) -> anyhow::Result<()> {
    manager.shutdown().await;

    for report in manager.failures() {
        eprintln!("{} {}", "!".yellow().bold(), report);
    }

    if manager
        .failures()
        .iter()
        .any(|report| report.phase == FailurePhase::Start)
    {
        anyhow::bail!("one or more MCP servers failed to start");
    }

    Ok(())
}
