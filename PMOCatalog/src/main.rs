use pmocatalog::{CatalogServerExt, PageRequest};
use pmoserver::{LoggingOptions, ServerBuilder};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ========== PHASE 1 : Infrastructure ==========
    let mut server = ServerBuilder::new_configured().build();
    server.init_logging(LoggingOptions::from_config()).await;

    info!(
        "📁 Configuration loaded from {}",
        pmoconfig::get_config().directory()
    );

    server
        .add_route("/info", || async {
            serde_json::json!({
                "name": "PMOCatalog",
                "version": env!("CARGO_PKG_VERSION"),
            })
        })
        .await;

    // ========== PHASE 2 : Catalogue ==========
    info!("🎵 Initializing song catalog...");
    let catalog = server.init_catalog_configured().await?;
    let (_, songs) = catalog.list_songs(PageRequest::first()).await?;
    let (_, playlists) = catalog.list_playlists(PageRequest::first()).await?;
    info!("✅ Catalog ready: {} song(s), {} playlist(s)", songs, playlists);

    // ========== PHASE 3 : Démarrage du serveur ==========
    info!("🌐 Starting HTTP server...");
    server.start().await?;

    info!("✅ PMOCatalog is ready!");
    info!("Press Ctrl+C to stop...");
    server.wait().await;

    Ok(())
}
