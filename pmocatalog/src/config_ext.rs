//! Extension de pmoconfig pour le catalogue

use crate::catalog::{CatalogPolicy, SongDeletePolicy};
use std::path::PathBuf;
use tracing::warn;

/// Trait d'extension pour pmoconfig::Config
pub trait CatalogConfigExt {
    /// Retourne le chemin de la base de données du catalogue
    ///
    /// Le répertoire (`catalog.database.directory`) est créé si nécessaire.
    fn catalog_db_path(&self) -> anyhow::Result<PathBuf>;

    /// Refuser deux morceaux de même nom et même artiste
    fn reject_duplicate_songs(&self) -> bool;

    /// Politique de suppression d'un morceau référencé
    fn song_delete_policy(&self) -> SongDeletePolicy;

    /// Préfixe des liens de pagination (vide : liens relatifs)
    fn public_url(&self) -> String;

    /// Règles métier regroupées
    fn catalog_policy(&self) -> CatalogPolicy {
        CatalogPolicy {
            reject_duplicate_songs: self.reject_duplicate_songs(),
            song_delete_policy: self.song_delete_policy(),
        }
    }
}

impl CatalogConfigExt for pmoconfig::Config {
    fn catalog_db_path(&self) -> anyhow::Result<PathBuf> {
        let catalog_dir = self.get_managed_dir(&["catalog", "database", "directory"], "catalog")?;
        Ok(PathBuf::from(catalog_dir).join("catalog.db"))
    }

    fn reject_duplicate_songs(&self) -> bool {
        self.get_bool_or(&["catalog", "songs", "reject_duplicates"], true)
    }

    fn song_delete_policy(&self) -> SongDeletePolicy {
        let raw = self.get_string_or(&["catalog", "songs", "delete_policy"], "restrict");
        raw.parse().unwrap_or_else(|e| {
            warn!("{}, falling back to restrict", e);
            SongDeletePolicy::Restrict
        })
    }

    fn public_url(&self) -> String {
        self.get_string_or(&["catalog", "public_url"], "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_yaml::Value;

    #[test]
    fn test_catalog_settings_from_config() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let config = pmoconfig::Config::load_config(&dir.path().to_string_lossy())?;

        assert_eq!(config.catalog_policy(), CatalogPolicy::default());
        assert_eq!(config.public_url(), "");

        let db_path = config.catalog_db_path()?;
        assert_eq!(db_path.file_name().and_then(|n| n.to_str()), Some("catalog.db"));
        assert!(db_path.parent().is_some_and(|p| p.is_dir()));

        config.set_value(
            &["catalog", "songs", "delete_policy"],
            Value::String("cascade".into()),
        )?;
        config.set_value(&["catalog", "songs", "reject_duplicates"], Value::Bool(false))?;
        assert_eq!(config.song_delete_policy(), SongDeletePolicy::Cascade);
        assert!(!config.reject_duplicate_songs());

        config.set_value(
            &["catalog", "songs", "delete_policy"],
            Value::String("purge".into()),
        )?;
        assert_eq!(config.song_delete_policy(), SongDeletePolicy::Restrict);
        Ok(())
    }
}
