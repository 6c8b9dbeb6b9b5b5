//! marzgate - command-line access to a Marzban panel.
//!
//! Each invocation runs one panel operation and prints the JSON result to
//! stdout. Connection settings come from `MARZBAN_*` environment variables
//! (a `.env` file is honored) or `~/.config/marzgate/config.json`.

use std::io;

use anyhow::{bail, Context, Result};
use marzgate_core::{ApiError, ClientConfig, SessionClient, UserFields, UserStatus, UsersQuery};
use serde_json::Value;
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const USAGE: &str = "\
Usage: marzgate <command> [args]

Commands:
  stats                         Show system statistics
  users [status] [offset] [limit]
                                List users
  user <name>                   Show one user
  create <name> [json-fields]   Create a user (fields merged over defaults)
  update <name> <json-fields>   Update a user
  delete <name>                 Delete a user
  usage <name>                  Show a user's traffic usage
  reset <name>                  Reset a user's traffic
  revoke <name>                 Revoke a user's subscription
  nodes                         List nodes
  node <id>                     Show one node";

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        eprintln!("{USAGE}");
        std::process::exit(2);
    };
    if command == "-h" || command == "--help" {
        println!("{USAGE}");
        return Ok(());
    }

    let config = ClientConfig::load().context("Failed to load panel configuration")?;
    debug!(?config, "Configuration loaded");
    let client = SessionClient::new(&config)?;

    let output = run(&client, command, &args[1..]).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);

    info!(command = %command, "Done");
    Ok(())
}

async fn run(client: &SessionClient, command: &str, args: &[String]) -> Result<Value> {
    let output = match command {
        "stats" => client.get_system_stats().await?,
        "users" => {
            let query = parse_users_query(args)?;
            Value::Array(client.list_users(&query).await?)
        }
        "user" => match client.get_user(arg(args, 0, "name")?).await? {
            Some(user) => user,
            None => bail!("User not found"),
        },
        "create" => {
            let mut fields = parse_fields(args.get(1).map(String::as_str))?;
            fields.insert("username".to_string(), Value::String(arg(args, 0, "name")?.to_string()));
            client.create_user(fields).await?
        }
        "update" => {
            let fields = parse_fields(Some(arg(args, 1, "json-fields")?))?;
            client.update_user(arg(args, 0, "name")?, fields).await?
        }
        "delete" => {
            let deleted = client.delete_user(arg(args, 0, "name")?).await?;
            serde_json::json!({ "deleted": deleted })
        }
        "usage" => client.get_usage(arg(args, 0, "name")?).await?,
        "reset" => client.reset_traffic(arg(args, 0, "name")?).await?,
        "revoke" => client.revoke_subscription(arg(args, 0, "name")?).await?,
        "nodes" => Value::Array(client.list_nodes().await?),
        "node" => {
            let id = arg(args, 0, "id")?;
            let id: i64 = id.parse().with_context(|| format!("Invalid node id: {id}"))?;
            client.get_node(id).await.map_err(describe)?
        }
        other => bail!("Unknown command: {other}\n\n{USAGE}"),
    };
    Ok(output)
}

fn arg<'a>(args: &'a [String], index: usize, name: &str) -> Result<&'a str> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| anyhow::anyhow!("Missing argument <{name}>\n\n{USAGE}"))
}

fn parse_fields(raw: Option<&str>) -> Result<UserFields> {
    let Some(raw) = raw else {
        return Ok(UserFields::new());
    };
    match serde_json::from_str::<Value>(raw).context("Fields must be a JSON object")? {
        Value::Object(map) => Ok(map),
        _ => bail!("Fields must be a JSON object"),
    }
}

fn parse_users_query(args: &[String]) -> Result<UsersQuery> {
    let mut query = UsersQuery::default();
    if let Some(status) = args.first().filter(|s| s.as_str() != "all") {
        query.status = Some(status.parse::<UserStatus>().map_err(anyhow::Error::msg)?);
    }
    if let Some(offset) = args.get(1) {
        query.offset = offset.parse().with_context(|| format!("Invalid offset: {offset}"))?;
    }
    if let Some(limit) = args.get(2) {
        query.limit = limit.parse().with_context(|| format!("Invalid limit: {limit}"))?;
    }
    Ok(query)
}

/// Turn a 404 on node lookup into a readable message.
fn describe(err: ApiError) -> anyhow::Error {
    if err.is_not_found() {
        anyhow::anyhow!("Node not found")
    } else {
        err.into()
    }
}
