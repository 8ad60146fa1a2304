//! Extension de pmoserver pour monter l'API du catalogue

use crate::api::{ApiState, catalog_api_router};
use crate::catalog::Catalog;
use crate::config_ext::CatalogConfigExt;
use crate::store::CatalogStore;
use tracing::info;

/// Trait pour étendre un serveur HTTP avec l'API du catalogue.
///
/// Les routes `/songs` et `/playlists` sont montées à la racine du serveur.
pub trait CatalogServerExt {
    /// Enregistre les routes du catalogue pour un service déjà construit.
    async fn init_catalog(&mut self, catalog: Catalog, public_url: &str) -> Catalog;

    /// Ouvre la base et lit les politiques depuis `pmoconfig::Config`.
    async fn init_catalog_configured(&mut self) -> anyhow::Result<Catalog>;
}

impl CatalogServerExt for pmoserver::Server {
    async fn init_catalog(&mut self, catalog: Catalog, public_url: &str) -> Catalog {
        let router = catalog_api_router(ApiState::new(catalog.clone(), public_url));
        self.add_router("/", router).await;
        info!("Catalog API mounted on /songs and /playlists");
        catalog
    }

    async fn init_catalog_configured(&mut self) -> anyhow::Result<Catalog> {
        let config = pmoconfig::get_config();
        let db_path = config.catalog_db_path()?;
        let store = CatalogStore::open(&db_path)?;
        let policy = config.catalog_policy();
        info!(
            "Catalog database: {} (duplicates rejected: {}, song delete policy: {})",
            db_path.display(),
            policy.reject_duplicate_songs,
            policy.song_delete_policy
        );

        let catalog = Catalog::new(store, policy);
        Ok(self.init_catalog(catalog, &config.public_url()).await)
    }
}
