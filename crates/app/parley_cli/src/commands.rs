use std::path::Path;
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use parley_core::adapter::{ProxyTool, adapt, build_tools, is_denied};
use parley_core::agent::{AgentTool, ToolSpec};
use parley_core::config::Config;
use parley_core::mcp::stdio::{StdioServerConfig, StdioToolServer};
use parley_core::mcp::{ToolDescriptor, ToolServer};
use parley_core::search::{FirecrawlClient, SearchContract, SearchTool, WebSearch};
use parley_core::session::{SessionOptions, Variant, prepare_agent, run_session};

use crate::runtime::StdioRuntime;
use crate::{Error, Result};

/// Runs one assistant session over stdin/stdout.
pub async fn run(variant: Variant, strict_transport: bool) -> Result<()> {
    let config = Config::from_env();
    config.validate(variant, strict_transport)?;
    info!(%variant, "Starting Parley session");

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, shutting down");
            ctrl_c.cancel();
        }
    });

    let (search, server) = if variant.uses_tools() {
        let search: Arc<dyn WebSearch> = Arc::new(FirecrawlClient::from_config(&config)?);
        (Some(search), connect_database(&config).await)
    } else {
        (None, None)
    };

    let result = serve(variant, search, server.clone(), cancel).await;

    if let Some(server) = server {
        server.close();
    }
    result
}

async fn serve(
    variant: Variant,
    search: Option<Arc<dyn WebSearch>>,
    server: Option<Arc<StdioToolServer>>,
    cancel: CancellationToken,
) -> Result<()> {
    let server = server.map(|s| s as Arc<dyn ToolServer>);
    let agent = prepare_agent(variant, search, server).await?;
    let options = SessionOptions::for_variant(variant);

    let mut runtime = StdioRuntime::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout());
    run_session(&mut runtime, &agent, &options, cancel).await?;
    Ok(())
}

/// Connects the Supabase MCP server, or logs why the session continues without it.
async fn connect_database(config: &Config) -> Option<Arc<StdioToolServer>> {
    let server_config = match StdioServerConfig::supabase(config) {
        Ok(server_config) => server_config,
        Err(e) => {
            error!("Failed to initialize Supabase MCP: {e}");
            return None;
        }
    };

    info!("Connecting to Supabase MCP server...");
    let server = match StdioToolServer::connect(&server_config).await {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to initialize Supabase MCP: {e}");
            return None;
        }
    };

    match server.list_tools().await {
        Ok(tools) => {
            info!(count = tools.len(), "Connected to Supabase MCP server");
            Some(Arc::new(server))
        }
        Err(e) => {
            error!("Failed to initialize Supabase MCP: {e}");
            server.close();
            None
        }
    }
}

async fn connect_required(config: &Config) -> Result<Arc<StdioToolServer>> {
    let server_config = StdioServerConfig::supabase(config)?;
    Ok(Arc::new(StdioToolServer::connect(&server_config).await?))
}

pub async fn tools_list(json: bool) -> Result<()> {
    let server = connect_required(&Config::from_env()).await?;
    let tools = build_tools(server.clone()).await;
    server.close();

    let specs = tools.iter().map(|tool| tool.spec());
    print_specs(specs, json)
}

pub async fn tools_call(name: &str, args: &str) -> Result<()> {
    let arguments = parse_arguments(args)?;
    let server = connect_required(&Config::from_env()).await?;
    let result = call_one(server.clone(), name, arguments).await;
    server.close();

    println!("{}", serde_json::to_string_pretty(&result?)?);
    Ok(())
}

async fn call_one(
    server: Arc<StdioToolServer>,
    name: &str,
    arguments: Map<String, Value>,
) -> Result<Value> {
    let tool: ProxyTool = build_tools(server)
        .await
        .into_iter()
        .find(|tool| tool.descriptor().name == name)
        .ok_or_else(|| Error::Custom(format!("Tool '{name}' is not available.")))?;
    Ok(tool.call(arguments).await?)
}

fn parse_arguments(args: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(args)? {
        Value::Object(map) => Ok(map),
        other => Err(Error::Custom(format!(
            "--args must be a JSON object, got {other}"
        ))),
    }
}

/// Adapts descriptors from a file without connecting to a server.
pub fn tools_inspect(path: &Path, json: bool) -> Result<()> {
    let descriptors = read_descriptors(path)?;

    let mut specs = Vec::new();
    for descriptor in &descriptors {
        if is_denied(&descriptor.name) {
            warn!(tool = %descriptor.name, "Skipping denied tool");
            continue;
        }
        match adapt(descriptor) {
            Ok(spec) => specs.push(spec),
            Err(e) => warn!(tool = %descriptor.name, "Skipping tool: {e}"),
        }
    }
    print_specs(specs.iter(), json)
}

fn read_descriptors(path: &Path) -> Result<Vec<ToolDescriptor>> {
    let text = std::fs::read_to_string(path)?;
    let value = match serde_json::from_str::<Value>(&text)? {
        Value::Object(mut listing) => listing
            .remove("tools")
            .ok_or_else(|| Error::Custom("expected a list of tools or {\"tools\": [...]}".into()))?,
        value => value,
    };
    Ok(serde_json::from_value(value)?)
}

fn print_specs<'a>(
    specs: impl Iterator<Item = &'a ToolSpec>,
    json: bool,
) -> Result<()> {
    if json {
        let declarations: Vec<Value> = specs.map(|spec| spec.to_json()).collect();
        println!("{}", serde_json::to_string_pretty(&declarations)?);
    } else {
        for spec in specs {
            println!("{}", spec.signature());
        }
    }
    Ok(())
}

pub async fn search(query: &str, limit: u32, legacy: bool) -> Result<()> {
    let config = Config::from_env();
    let client = FirecrawlClient::from_config(&config)?;
    let contract = if legacy {
        SearchContract::Legacy
    } else {
        SearchContract::Rich
    };

    let tool = SearchTool::new(Arc::new(client), contract)?;
    println!("{}", tool.search(query, limit).await);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn arguments_must_be_an_object() {
        assert_eq!(parse_arguments(r#"{"a":1}"#).unwrap().len(), 1);
        assert!(matches!(parse_arguments("[1]"), Err(Error::Custom(_))));
        assert!(matches!(parse_arguments("{"), Err(Error::Json(_))));
    }

    #[test]
    fn descriptors_read_from_list_or_listing() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"tools":[{{"name":"a","inputSchema":{{"type":"object"}}}}]}}"#
        )
        .unwrap();
        let descriptors = read_descriptors(file.path()).unwrap();
        assert_eq!(descriptors[0].name, "a");

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"[{{"name":"b"}}]"#).unwrap();
        let descriptors = read_descriptors(file.path()).unwrap();
        assert_eq!(descriptors[0].name, "b");
        assert_eq!(descriptors[0].description, "");

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"items":[]}}"#).unwrap();
        assert!(read_descriptors(file.path()).is_err());
    }
}
