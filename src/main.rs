use clap::Parser;
use hub_mcp::app::App;
use hub_mcp::config::HubConfig;
use hub_mcp::mcp::server::McpServer;
use hub_mcp::services::logger::LogLevel;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "hub-mcp", version, about = "MCP server for the Insight Hub error monitoring API")]
struct Cli {
    /// API endpoint override (also `INSIGHT_HUB_ENDPOINT`).
    #[arg(long, value_name = "URL")]
    endpoint: Option<String>,
    /// Scope the server to one project (also `INSIGHT_HUB_PROJECT_API_KEY`).
    #[arg(long, value_name = "KEY")]
    project_api_key: Option<String>,
    /// error, warn, info or debug (also `HUB_LOG_LEVEL`).
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<LogLevel>,
    /// Resolve organization and projects on first use instead of at startup.
    #[arg(long)]
    skip_initialize: bool,
}

impl Cli {
    fn apply(self, config: &mut HubConfig) {
        if let Some(endpoint) = self.endpoint {
            config.endpoint = Some(endpoint);
        }
        if let Some(key) = self.project_api_key {
            config.project_api_key = Some(key);
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        config.skip_initialize |= self.skip_initialize;
    }
}

async fn run(cli: Cli) -> Result<(), hub_mcp::errors::ToolError> {
    let mut config = HubConfig::from_env()?;
    cli.apply(&mut config);
    let app = Arc::new(App::initialize(config)?);
    app.warm_up().await?;
    McpServer::new(app).run_stdio().await
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("hub-mcp: {}", err);
        if let Some(hint) = &err.hint {
            eprintln!("hint: {}", hint);
        }
        std::process::exit(1);
    }
}
