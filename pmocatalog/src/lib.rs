//! # pmocatalog - Catalogue de morceaux et de playlists ordonnées
//!
//! Cette crate fournit :
//! - Un store SQLite transactionnel (morceaux, playlists, appartenances)
//! - Un moteur d'ordonnancement maintenant des positions denses `1..N`
//!   sous insertion, déplacement et retrait
//! - Une pagination fixe (10 éléments) avec filtre par sous-chaîne
//! - Une API REST axum (`/songs`, `/playlists`)
//!
//! # Architecture
//!
//! - **CatalogStore** : connexion SQLite partagée, unités de travail `BEGIN IMMEDIATE`
//! - **ordering** : insert / move / remove / compact sur le trait `MembershipStore`
//! - **Catalog** : façade asynchrone, une unité de travail par opération
//! - **api** : handlers HTTP et correspondance erreur → statut
//!
//! # Exemple d'utilisation
//!
//! ```no_run
//! use pmocatalog::{Catalog, CatalogPolicy, CatalogStore, NewSong};
//!
//! # #[tokio::main]
//! # async fn main() -> pmocatalog::Result<()> {
//! let catalog = Catalog::new(CatalogStore::open_in_memory()?, CatalogPolicy::default());
//!
//! let song = catalog
//!     .create_song(NewSong {
//!         name: "Song".into(),
//!         artist: "Band".into(),
//!         release_year: 1999,
//!     })
//!     .await?;
//!
//! let playlist = catalog.create_playlist("Favorites".into(), vec![song.id]).await?;
//! catalog.move_song(playlist.id, song.id, 1).await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
mod catalog;
mod error;
pub mod listing;
mod model;
pub mod ordering;
mod store;
pub mod validation;

#[cfg(feature = "pmoconfig")]
mod config_ext;

#[cfg(feature = "pmoserver")]
mod pmoserver_ext;

// Réexports publics
pub use api::{ApiState, catalog_api_router};
pub use catalog::{Catalog, CatalogPolicy, SongDeletePolicy};
pub use error::{Error, FieldErrors, Result};
pub use listing::{PAGE_SIZE, Page, PageRequest, page_link};
pub use model::{Membership, NewSong, Playlist, PlaylistDetail, PlaylistSong, Song};
pub use ordering::MembershipStore;
pub use store::{CatalogStore, UnitOfWork};

#[cfg(feature = "pmoconfig")]
pub use config_ext::CatalogConfigExt;

#[cfg(feature = "pmoserver")]
pub use pmoserver_ext::CatalogServerExt;
