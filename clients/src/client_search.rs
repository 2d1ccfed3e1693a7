use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use url::Url;

use lib_common::{
    resolve_endpoint, BuildMode, DeviceStore, DiagnosticSink, EndpointConfig, EventBus,
    FixedPositionProvider, GeoCoordinate, LocationOutcome, LogSink, PositionProvider,
    SearchEvent, SearchStreamClient, StreamConfig,
};

mod search_logic;
use search_logic::{config, logger};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let config = config::load_config();
    let log_dir = config.log_dir.clone().unwrap_or_else(|| "./logs".into());
    let log_level = config.log_level.clone().unwrap_or_else(|| "info".into());
    logger::setup_logging(&log_dir, &log_level)?;

    // Composition root: every collaborator is constructed here and passed by
    // reference. The client has no global accessor.
    let sink: Arc<dyn DiagnosticSink> = Arc::new(LogSink);
    let store = Arc::new(DeviceStore::open(
        config
            .store_path
            .clone()
            .unwrap_or_else(DeviceStore::default_path),
    ));
    let bus = Arc::new(EventBus::new(Arc::clone(&sink)));

    let provider: Option<Arc<dyn PositionProvider>> = match (config.lat, config.lon) {
        (Some(lat), Some(lon)) => Some(Arc::new(FixedPositionProvider::new(GeoCoordinate {
            lat,
            lon,
        }))),
        _ => None,
    };

    let endpoint = match &config.endpoint {
        Some(raw) => Url::parse(raw).with_context(|| format!("invalid endpoint: {raw}"))?,
        None => {
            let mode = match config.mode.as_deref() {
                Some("development") => BuildMode::Development,
                _ => BuildMode::Production,
            };
            let backend_url = config
                .backend_url
                .as_deref()
                .and_then(|raw| Url::parse(raw).ok());
            // A terminal client has no embedding page to derive an endpoint from.
            resolve_endpoint(&EndpointConfig {
                mode,
                backend_url,
                page_origin: None,
            })
        }
    };

    let mut stream_config = StreamConfig::new(endpoint);
    if let Some(ms) = config.reconnect_base_delay_ms {
        stream_config.reconnect_base_delay = Duration::from_millis(ms);
    }
    if let Some(ms) = config.reconnect_max_delay_ms {
        stream_config.reconnect_max_delay = Duration::from_millis(ms);
    }
    if let Some(secs) = config.location_fix_timeout_seconds {
        stream_config.location_fix_timeout = Duration::from_secs(secs);
    }

    let client = Arc::new(SearchStreamClient::new(
        stream_config,
        Arc::clone(&bus),
        store,
        provider,
        sink,
    ));

    let _chat = bus.on_chat_message(|message| {
        match message
            .get("parameters")
            .and_then(|p| p.get("message"))
            .and_then(|m| m.as_str())
        {
            Some(text) => println!("assistant> {text}"),
            None => println!("assistant> {message}"),
        }
    });
    let _search = bus.on_search_results(print_search_event);
    let _location = bus.on_location_outcome(|outcome| match outcome {
        LocationOutcome::Granted => println!("[location shared with the search service]"),
        LocationOutcome::Denied => println!("[location request denied]"),
    });

    let (shutdown_tx, _) = tokio::sync::broadcast::channel(1);
    let runner = tokio::spawn({
        let client = Arc::clone(&client);
        let shutdown = shutdown_tx.subscribe();
        async move { client.run(shutdown).await }
    });

    println!("Type a query and press enter (ctrl-c to quit).");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                log::info!("Ctrl-C received, initiating shutdown.");
                break;
            }
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        let query = line.trim();
                        if !query.is_empty() {
                            client.send_query(query);
                        }
                    }
                    Ok(None) => break, // stdin closed
                    Err(e) => {
                        log::error!("Failed to read stdin: {}", e);
                        break;
                    }
                }
            }
        }
    }

    // Send shutdown signal and wait for the connection loop to finish
    let _ = shutdown_tx.send(());
    let _ = runner.await;

    log::info!("Shutdown complete.");
    Ok(())
}

fn print_search_event(event: &SearchEvent) {
    println!("-- {} result(s)", event.flat_results.len());
    for item in event.flat_results.iter().take(5) {
        let rating = item
            .rating
            .map(|r| format!(" [{r:.1}]"))
            .unwrap_or_default();
        println!("   {}{}", item.name, rating);
    }
    if event.flat_results.len() > 5 {
        println!("   ...");
    }
    if let Some(filters) = &event.dynamic_filters {
        let ids: Vec<&str> = filters.iter().map(|f| f.id.as_str()).collect();
        println!("   filters: {}", ids.join(", "));
    }
    if let Some(summary) = &event.human_summary {
        println!("   {summary}");
    }
}
