//! # pmoserver - Serveur web haut niveau basé sur Axum
//!
//! Cette crate fournit une abstraction simple pour créer des serveurs HTTP
//! avec Axum, utilisée par le catalogue PMOCatalog.
//!
//! ## Fonctionnalités
//!
//! - **API de haut niveau** : interface simple pour monter des routes et des sous-routers
//! - **Logs** : initialisation `tracing` avec buffer mémoire consultable via `/log-dump`
//! - **Niveau de log dynamique** : `GET/POST /api/log_setup`
//! - **Arrêt gracieux** : gestion propre de l'arrêt sur Ctrl+C
//!
//! ## Exemple d'utilisation
//!
//! ```rust,no_run
//! use pmoserver::{ServerBuilder, logs::LoggingOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut server = ServerBuilder::new("MyServer", "localhost", 8080).build();
//!     server.init_logging(LoggingOptions::default()).await;
//!
//!     server.add_route("/api/status", || async {
//!         serde_json::json!({"status": "ok"})
//!     }).await;
//!
//!     server.start().await?;
//!     server.wait().await;
//!     Ok(())
//! }
//! ```

pub mod logs;
pub mod server;

pub use logs::{BufferLayer, LogState, LoggingOptions, log_dump};
pub use server::{Server, ServerBuilder, ServerInfo};
