//! edge-dispatch - Edge request dispatch with hexagonal architecture
//!
//! This is the composition root that wires together all the components.

use edge_dispatch::adapters::inbound::ApiServer;
use edge_dispatch::adapters::outbound::{InMemoryDataStore, SqliteDataStore};
use edge_dispatch::application::{EdgeNetwork, EdgeNode};
use edge_dispatch::config::{load_config, Config};
use edge_dispatch::domain::entities::Params;
use edge_dispatch::domain::ports::DataStore;
use edge_dispatch::infrastructure::{shutdown_signal, ShutdownController};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::fmt::format::FmtSpan;

/// Upper bound on waiting for in-flight HTTP requests at shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from environment
    let cfg = load_config()?;

    // Setup logging
    let log_level = if cfg.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    tracing::info!(
        "starting edge-dispatch listen={} nodes={} strategy={}",
        cfg.listen_addr,
        cfg.nodes.len(),
        cfg.strategy
    );

    // ===== COMPOSITION ROOT =====

    // 1. Nodes, each with its own data store
    let network = Arc::new(EdgeNetwork::new(cfg.network_config())?);
    for (id, region) in &cfg.nodes {
        let store = open_store(&cfg, id)?;
        let node = EdgeNode::new(cfg.node_config(id, region), store)?;
        register_builtin_resolvers(&node);
        network.add_node(Arc::new(node));
    }

    // 2. Background health checking and sync
    network.start();

    // 3. Inbound adapter
    let shutdown = network.shutdown_controller();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    let server = ApiServer::new(
        network.clone(),
        cfg.listen_addr.clone(),
        cfg.request_timeout(),
        shutdown.clone(),
    );
    let served = server.run().await;

    // 4. Drain and close
    drain(&shutdown).await;
    network.shutdown().await;

    served
}

fn open_store(cfg: &Config, node_id: &str) -> anyhow::Result<Arc<dyn DataStore>> {
    match &cfg.data_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let path = Path::new(dir).join(format!("{}.db", node_id));
            let store = SqliteDataStore::open(&path)?;
            tracing::info!("node {} data store at {}", node_id, path.display());
            Ok(Arc::new(store))
        }
        None => Ok(Arc::new(InMemoryDataStore::new())),
    }
}

/// Resolvers every node serves out of the box.
fn register_builtin_resolvers(node: &EdgeNode) {
    node.register_handler("query:echo", |_ctx, params: Params| async move {
        Ok(json!(params))
    });

    let id = node.id().to_string();
    let region = node.region().to_string();
    node.register_handler("query:node", move |_ctx, _params| {
        let info = json!({ "id": id, "region": region });
        async move { Ok(info) }
    });
}

async fn drain(shutdown: &ShutdownController) {
    // The server may have exited on an error rather than a signal
    shutdown.shutdown();
    if shutdown.wait_for_drain(DRAIN_TIMEOUT).await {
        tracing::info!("all in-flight requests drained");
    }
}
