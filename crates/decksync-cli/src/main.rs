//! # decksync-cli
//!
//! Terminal consumer for a shared deck session. Connects to the realtime
//! server, follows snapshots and viewer counts as they arrive, and turns
//! stdin lines like `draw` into gameplay intents. With `--catalog` it also
//! fetches and prints the card catalog first.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::AsyncBufReadExt;

use decksync_catalog::{CardSource, CatalogConfig, SheetsCatalog};
use decksync_client::{
    ClientConfig, ConnectionFailed, ConnectionUpdate, ServerError, SessionClient, StateUpdate,
};
use decksync_core::Intent;
use decksync_logging::LogFormat;
use decksync_settings::DeckSettings;

/// Follow a shared card-deck session from the terminal.
#[derive(Parser, Debug)]
#[command(name = "decksync-cli", version, about)]
struct Cli {
    /// Websocket URL of the deck server; overrides the settings file.
    #[arg(long)]
    url: Option<String>,

    /// Path to the settings file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level directive; overrides the settings file.
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,

    /// Fetch and print the card catalog before connecting.
    #[arg(long)]
    catalog: bool,
}

fn client_config(settings: &DeckSettings, url_override: Option<String>) -> ClientConfig {
    let server = &settings.server;
    ClientConfig {
        url: url_override.unwrap_or_else(|| server.url.clone()),
        reconnect: server.reconnect.clone(),
        keepalive_interval_ms: server.keepalive_interval_ms,
        poll_interval_ms: server.poll_interval_ms,
        connect_timeout_ms: server.connect_timeout_ms,
    }
}

fn catalog_config(settings: &DeckSettings) -> CatalogConfig {
    CatalogConfig {
        spreadsheet_id: settings.catalog.spreadsheet_id.clone(),
        api_key: settings.catalog.api_key.clone(),
        range: settings.catalog.range.clone(),
        base_url: settings.catalog.base_url.clone(),
    }
}

fn parse_intent(line: &str) -> Option<Intent> {
    match line {
        "draw" => Some(Intent::Draw),
        "shuffle" => Some(Intent::Shuffle),
        "peek" => Some(Intent::Peek),
        "discard" => Some(Intent::Discard),
        "reset" => Some(Intent::Reset),
        "return" => Some(Intent::ReturnPeeked),
        _ => None,
    }
}

fn print_status(client: &SessionClient) {
    let state = client.connection_state();
    println!(
        "status: {:?} / viewers {} / sent {} / dropped {}",
        state.status,
        state.active_connections,
        client.emitted_messages(),
        client.dropped_messages()
    );
}

fn handle_command(client: &SessionClient, line: &str) {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return;
    }
    if trimmed == "status" {
        print_status(client);
        return;
    }
    match parse_intent(trimmed) {
        Some(intent) => client.send(intent),
        None => println!("commands: draw, shuffle, peek, discard, reset, return, status"),
    }
}

async fn print_catalog(settings: &DeckSettings) -> Result<()> {
    let catalog = SheetsCatalog::new(catalog_config(settings));
    let cards = catalog
        .fetch_cards()
        .await
        .context("failed to fetch the card catalog")?;
    println!("catalog: {} cards", cards.len());
    for card in &cards {
        if card.attributes.is_empty() {
            println!("  {}: {}", card.id, card.name);
        } else {
            let mut attributes: Vec<String> = card
                .attributes
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect();
            attributes.sort();
            println!("  {}: {} ({})", card.id, card.name, attributes.join(", "));
        }
    }
    Ok(())
}

fn subscribe_printers(client: &SessionClient) -> Vec<decksync_client::Subscription> {
    vec![
        client.subscribe::<StateUpdate>(|snapshot| {
            println!(
                "state: deck {} / drawn {} / discard {} / peeked {}",
                snapshot.cards.len(),
                snapshot.drawn_cards.len(),
                snapshot.discard_pile.len(),
                snapshot.peeked_cards.len()
            );
        }),
        client.subscribe::<ConnectionUpdate>(|count| {
            println!("viewers: {count}");
        }),
        client.subscribe::<ServerError>(|message| {
            eprintln!("server error: {message}");
        }),
        client.subscribe::<ConnectionFailed>(|failure| {
            eprintln!(
                "connection failed after {} attempts; type any command to retry or press ctrl-c",
                failure.attempts
            );
        }),
    ]
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let settings_path = args
        .config
        .clone()
        .unwrap_or_else(decksync_settings::settings_path);
    let settings = decksync_settings::load_settings_from_path(&settings_path)
        .with_context(|| format!("failed to load settings from {}", settings_path.display()))?;

    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| settings.logging.level.clone());
    let format = if args.json_logs || settings.logging.json {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };
    decksync_logging::init(&level, format);

    if args.catalog {
        if settings.catalog.is_configured() {
            print_catalog(&settings).await?;
        } else {
            anyhow::bail!(
                "catalog is not configured: set catalog.spreadsheetId and catalog.apiKey \
                 in the settings file or the DECKSYNC_SHEETS_ID / DECKSYNC_SHEETS_API_KEY \
                 environment variables"
            );
        }
    }

    let config = client_config(&settings, args.url);
    tracing::info!(url = %config.url, "starting deck session");
    let client = SessionClient::new(config);
    let _printers = subscribe_printers(&client);
    client.connect();

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("failed to listen for ctrl-c")?;
                break;
            }
            line = lines.next_line() => {
                match line? {
                    Some(line) => handle_command(&client, &line),
                    None => {
                        // stdin closed; stay on the session until ctrl-c.
                        tokio::signal::ctrl_c()
                            .await
                            .context("failed to listen for ctrl-c")?;
                        break;
                    }
                }
            }
        }
    }

    tracing::info!("shutting down");
    client.disconnect();
    Ok(())
}
