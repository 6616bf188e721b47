//! CLI argument definitions

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use toolbridge_tools::ToolFormat;

#[derive(Parser)]
#[command(name = "toolbridge", version, about = "Inspect and call MCP server tools")]
pub struct Cli {
    /// Path to the mcpServers config document
    #[arg(short, long, global = true, default_value = "mcp_config.json")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List tools discovered from every configured server
    Tools {
        /// Emit the raw descriptors as JSON
        #[arg(long)]
        json: bool,

        /// Render tool specs for a specific framework
        #[arg(long, value_enum, conflicts_with = "json")]
        format: Option<SpecFormat>,
    },

    /// Call one tool and print its result
    Call {
        /// Qualified tool name, e.g. mcp__filesystem__read_file
        tool: String,

        /// Tool arguments as a JSON object
        #[arg(long, default_value = "{}")]
        args: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SpecFormat {
    Anthropic,
    Openai,
}

impl SpecFormat {
    pub fn from_provider(provider: &str) -> Option<Self> {
        match provider.to_lowercase().as_str() {
            "anthropic" => Some(Self::Anthropic),
            "openai" => Some(Self::Openai),
            _ => None,
        }
    }
}

impl From<SpecFormat> for ToolFormat {
    fn from(format: SpecFormat) -> Self {
        match format {
            SpecFormat::Anthropic => ToolFormat::Anthropic,
            SpecFormat::Openai => ToolFormat::OpenAi,
        }
    }
}
