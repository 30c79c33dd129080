//! Queueinator CLI - Command-line client for the queue browser daemon

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tabled::{Table, Tabled};

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:9531";
const BODY_PREVIEW_CHARS: usize = 60;
const PARTIAL_MOVE_CODE: i32 = 4090;

#[derive(Parser)]
#[command(name = "queueinator")]
#[command(about = "Queueinator queue browser CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// RPC server URL
    #[arg(long, env = "QUEUEINATOR_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,
}

/// Nodes are written `host`, `<class>` or `<class>:<path>`, e.g.
/// `private:orders.eu`. A trailing `#` addresses the queue of a folder
/// that is also a queue (`private:orders#`).
#[derive(Subcommand)]
enum Commands {
    /// Print the navigation tree
    Tree {
        /// Re-enumerate all queues before printing
        #[arg(long)]
        rebuild: bool,
    },

    /// Re-count one node and show the change
    Refresh {
        node: String,
    },

    /// List the messages of a queue
    Messages {
        queue: String,
    },

    /// Show one message in detail
    Show {
        queue: String,
        message_id: String,
    },

    /// Move messages to another queue
    Move {
        source: String,
        target: String,
        #[arg(required = true)]
        message_ids: Vec<String>,
    },

    /// Copy messages to another queue
    Copy {
        source: String,
        target: String,
        #[arg(required = true)]
        message_ids: Vec<String>,
    },

    /// Send a text message to a queue
    Insert {
        queue: String,
        content: String,
    },

    /// Create a queue below a class or folder
    Create {
        parent: String,
        name: String,
    },

    /// Delete a queue
    Delete {
        queue: String,
    },

    /// Remove all messages from a queue
    Purge {
        queue: String,
    },
}

#[derive(Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: serde_json::Value,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    #[allow(dead_code)]
    jsonrpc: String,
    #[allow(dead_code)]
    id: u64,
    result: Option<serde_json::Value>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RPC error ({}): {}", self.code, self.message)
    }
}

impl std::error::Error for JsonRpcError {}

#[derive(Deserialize, Tabled)]
struct MessageRow {
    id: String,
    #[tabled(rename = "size")]
    size_display: String,
    #[tabled(rename = "response queue", display_with = "display_option")]
    response_queue: Option<String>,
    #[tabled(rename = "created", display_with = "display_option")]
    response_queue_created: Option<String>,
    #[tabled(display_with = "preview")]
    body: String,
}

fn display_option(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| "-".to_string())
}

fn preview(body: &str) -> String {
    let line = body.lines().next().unwrap_or_default();
    let mut shown: String = line.chars().take(BODY_PREVIEW_CHARS).collect();
    if shown.len() < body.len() {
        shown.push('…');
    }
    shown
}

/// Parse `host`, `<class>`, `<class>:<path>` or `<class>:<path>#` into a node key
fn parse_node(text: &str) -> Result<serde_json::Value> {
    let text = text.trim();
    if text.is_empty() || text.eq_ignore_ascii_case("host") {
        return Ok(json!({ "class": null, "path": "", "marker": false }));
    }

    let (class, rest) = text.split_once(':').unwrap_or((text, ""));
    let class = match class.to_ascii_lowercase().as_str() {
        "private" => "PRIVATE",
        "public" => "PUBLIC",
        "system" => "SYSTEM",
        other => anyhow::bail!("Unknown queue class '{}' in node '{}'", other, text),
    };
    let (path, marker) = match rest.strip_suffix('#') {
        Some(path) => (path, true),
        None => (rest, false),
    };
    if marker && path.is_empty() {
        anyhow::bail!("Queue marker needs a path: '{}'", text);
    }

    Ok(json!({ "class": class, "path": path, "marker": marker }))
}

/// Indented tree lines, colored by count change
fn render_tree(node: &serde_json::Value, depth: usize, out: &mut Vec<String>) {
    let label = node["display_label"].as_str().unwrap_or_default();
    let count = node["message_count"].as_u64().unwrap_or(0);
    let mut caption = format!("{} ({})", label, count);
    if node["kind"] == "QUEUE_MARKER" {
        caption = format!("{} [queue]", caption);
    }
    let caption = match node["highlight"].as_str() {
        Some("INCREASED") => caption.green().to_string(),
        Some("DECREASED") => caption.red().to_string(),
        _ => caption,
    };
    out.push(format!("{}{}", "  ".repeat(depth), caption));

    if let Some(children) = node["children"].as_array() {
        for child in children {
            render_tree(child, depth + 1, out);
        }
    }
}

fn queue_name(queue: &serde_json::Value) -> String {
    format!(
        "{}:{}",
        queue["class"].as_str().unwrap_or("?").to_ascii_lowercase(),
        queue["logical_name"].as_str().unwrap_or_default()
    )
}

fn print_refreshed(refreshed: &serde_json::Value) {
    for outcome in refreshed.as_array().into_iter().flatten() {
        let before = outcome["previous_message_count"].as_u64().unwrap_or(0);
        let after = outcome["message_count"].as_u64().unwrap_or(0);
        let path = outcome["key"]["path"].as_str().unwrap_or_default();
        let line = format!("  {} {} → {}", path, before, after);
        match outcome["change"]["kind"].as_str() {
            Some("INCREASED") => println!("{}", line.green()),
            Some("DECREASED") => println!("{}", line.red()),
            _ => println!("{}", line),
        }
    }
}

async fn call_rpc(url: &str, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
    let request = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        method: method.to_string(),
        params,
        id: 1,
    };

    let client = reqwest::Client::new();
    let response: JsonRpcResponse = client
        .post(url)
        .json(&request)
        .send()
        .await
        .context("Failed to connect to daemon")?
        .json()
        .await
        .context("Failed to parse response")?;

    if let Some(error) = response.error {
        return Err(error.into());
    }

    response
        .result
        .ok_or_else(|| anyhow::anyhow!("No result in response"))
}

async fn transfer(
    url: &str,
    mode: &str,
    source: &str,
    target: &str,
    message_ids: Vec<String>,
) -> Result<()> {
    let params = json!({
        "source": parse_node(source)?,
        "target": parse_node(target)?,
        "message_ids": message_ids,
        "mode": mode,
    });

    match call_rpc(url, "message.transfer.v1", params).await {
        Ok(result) => {
            let completed = result["completed"].as_array().map(Vec::len).unwrap_or(0);
            println!(
                "{}",
                format!("✓ {} message(s) {}", completed, mode.to_ascii_lowercase())
                    .green()
                    .bold()
            );
            for outcome in result["completed"].as_array().into_iter().flatten() {
                println!(
                    "  {} → {}",
                    outcome["original_id"].as_str().unwrap_or_default(),
                    outcome["written"]["id"].as_str().unwrap_or_default()
                );
            }
            print_refreshed(&result["refreshed"]);
            Ok(())
        }
        Err(e) => {
            if let Some(rpc) = e.downcast_ref::<JsonRpcError>() {
                if let Some(data) = &rpc.data {
                    let done = data["completed"].as_array().map(Vec::len).unwrap_or(0);
                    println!("  {} completed, {} skipped", done, data["skipped"]);
                    if rpc.code == PARTIAL_MOVE_CODE {
                        println!(
                            "  {} {} was written to {} as {} but is still in {}",
                            "!".yellow().bold(),
                            data["message_id"].as_str().unwrap_or_default(),
                            data["target"].as_str().unwrap_or_default(),
                            data["written_id"].as_str().unwrap_or_default(),
                            data["source"].as_str().unwrap_or_default(),
                        );
                    }
                }
            }
            Err(e)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Tree { rebuild } => {
            let method = if rebuild { "tree.build.v1" } else { "tree.get.v1" };
            let result = call_rpc(&cli.rpc_url, method, json!({})).await?;

            let mut lines = Vec::new();
            render_tree(&result["tree"], 0, &mut lines);
            for line in lines {
                println!("{}", line);
            }
        }

        Commands::Refresh { node } => {
            let params = json!({ "node": parse_node(&node)? });
            let result = call_rpc(&cli.rpc_url, "tree.refresh_node.v1", params).await?;

            println!("{}", format!("Refreshed {}", node).cyan().bold());
            print_refreshed(&json!([result]));
        }

        Commands::Messages { queue } => {
            let params = json!({ "node": parse_node(&queue)? });
            let result = call_rpc(&cli.rpc_url, "queue.messages.v1", params).await?;
            let rows: Vec<MessageRow> = serde_json::from_value(result["messages"].clone())?;

            println!(
                "{}",
                format!("{} ({} messages)", queue_name(&result["queue"]), rows.len())
                    .cyan()
                    .bold()
            );
            if rows.is_empty() {
                println!("{}", "Queue is empty".yellow());
            } else {
                println!("{}", Table::new(rows));
            }
        }

        Commands::Show { queue, message_id } => {
            let params = json!({
                "node": parse_node(&queue)?,
                "message_id": message_id,
            });
            let fields = call_rpc(&cli.rpc_url, "message.inspect.v1", params).await?;

            println!("{}", format!("Message {}", message_id).cyan().bold());
            println!();
            for (title, key) in [
                ("Label:", "label"),
                ("Size:", "size_display"),
                ("Arrived:", "arrived_at"),
                ("Response queue:", "response_queue"),
                ("Created:", "response_queue_created"),
                ("Extension:", "extension_display"),
            ] {
                println!("  {} {}", title.bold(), fields[key].as_str().unwrap_or("-"));
            }
            println!();
            println!("{}", fields["body_display"].as_str().unwrap_or_default());
        }

        Commands::Move {
            source,
            target,
            message_ids,
        } => transfer(&cli.rpc_url, "MOVE", &source, &target, message_ids).await?,

        Commands::Copy {
            source,
            target,
            message_ids,
        } => transfer(&cli.rpc_url, "COPY", &source, &target, message_ids).await?,

        Commands::Insert { queue, content } => {
            let params = json!({
                "node": parse_node(&queue)?,
                "content": content,
            });
            let result = call_rpc(&cli.rpc_url, "message.insert.v1", params).await?;

            println!(
                "{}",
                format!(
                    "✓ Message {} sent to {}",
                    result["message_id"].as_str().unwrap_or_default(),
                    queue_name(&result["queue"])
                )
                .green()
                .bold()
            );
        }

        Commands::Create { parent, name } => {
            let params = json!({
                "parent": parse_node(&parent)?,
                "name": name,
            });
            let result = call_rpc(&cli.rpc_url, "queue.create.v1", params).await?;

            println!(
                "{}",
                format!("✓ Queue {} created", queue_name(&result["queue"]))
                    .green()
                    .bold()
            );
        }

        Commands::Delete { queue } => {
            let params = json!({ "node": parse_node(&queue)? });
            let result = call_rpc(&cli.rpc_url, "queue.delete.v1", params).await?;

            if result["deleted"].as_bool().unwrap_or(false) {
                println!("{}", format!("✓ Queue {} deleted", queue).green().bold());
            } else {
                println!("{}", format!("Queue {} was not deleted", queue).yellow());
            }
        }

        Commands::Purge { queue } => {
            let params = json!({ "node": parse_node(&queue)? });
            let result = call_rpc(&cli.rpc_url, "queue.purge.v1", params).await?;

            println!(
                "{}",
                format!("✓ {} message(s) removed from {}", result["removed"], queue)
                    .green()
                    .bold()
            );
        }
    }

    Ok(())
}
