//! Service du catalogue
//!
//! Façade asynchrone : chaque opération ouvre une unité de travail sur le
//! [`CatalogStore`], l'exécute sur le pool bloquant de Tokio et délègue les
//! mutations de positions au module [`ordering`](crate::ordering).

use crate::error::{Error, Result};
use crate::listing::PageRequest;
use crate::model::{Membership, NewSong, Playlist, PlaylistDetail, PlaylistSong, Song};
use crate::ordering::{self, MembershipStore};
use crate::store::{CatalogStore, UnitOfWork};
use crate::validation;
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

/// Sort des appartenances lors de la suppression d'un morceau
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SongDeletePolicy {
    /// Refuse la suppression tant qu'une playlist référence le morceau
    #[default]
    Restrict,
    /// Retire le morceau de chaque playlist avant de le supprimer
    Cascade,
}

impl FromStr for SongDeletePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "restrict" => Ok(Self::Restrict),
            "cascade" => Ok(Self::Cascade),
            other => Err(format!("Unknown song delete policy: {}", other)),
        }
    }
}

impl fmt::Display for SongDeletePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Restrict => write!(f, "restrict"),
            Self::Cascade => write!(f, "cascade"),
        }
    }
}

/// Règles métier configurables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogPolicy {
    pub reject_duplicate_songs: bool,
    pub song_delete_policy: SongDeletePolicy,
}

impl Default for CatalogPolicy {
    fn default() -> Self {
        Self {
            reject_duplicate_songs: true,
            song_delete_policy: SongDeletePolicy::Restrict,
        }
    }
}

/// Service du catalogue (clonable, partagé entre les handlers)
#[derive(Clone)]
pub struct Catalog {
    store: CatalogStore,
    policy: CatalogPolicy,
}

impl Catalog {
    pub fn new(store: CatalogStore, policy: CatalogPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> CatalogPolicy {
        self.policy
    }

    pub fn store(&self) -> &CatalogStore {
        &self.store
    }

    async fn write<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut UnitOfWork<'_>, CatalogPolicy) -> Result<T> + Send + 'static,
    {
        let store = self.store.clone();
        let policy = self.policy;
        tokio::task::spawn_blocking(move || store.unit_of_work(|uow| f(uow, policy)))
            .await
            .map_err(|e| Error::Persistence(format!("Task join error: {}", e)))?
    }

    async fn read<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut UnitOfWork<'_>) -> Result<T> + Send + 'static,
    {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.read(f))
            .await
            .map_err(|e| Error::Persistence(format!("Task join error: {}", e)))?
    }

    // --- Morceaux ---

    /// Crée un morceau après validation des champs (texte non vide, année)
    pub async fn create_song(&self, song: NewSong) -> Result<Song> {
        let song = validation::validate_new_song(
            Some(song.name),
            Some(song.artist),
            Some(song.release_year),
            validation::current_year(),
        )?;

        let song = self
            .write(move |uow, policy| {
                if policy.reject_duplicate_songs
                    && uow.song_by_name_and_artist(&song.name, &song.artist)?.is_some()
                {
                    return Err(Error::already_exists(
                        "non_field_errors",
                        "The fields name, artist must make a unique set.",
                    ));
                }
                uow.insert_song(&song)
            })
            .await?;

        info!(song_id = song.id, "Song created: {} - {}", song.artist, song.name);
        Ok(song)
    }

    pub async fn get_song(&self, song_id: i64) -> Result<Song> {
        self.read(move |uow| uow.find_song(song_id)?.ok_or_else(|| song_not_found(song_id)))
            .await
    }

    /// Supprime un morceau selon la [`SongDeletePolicy`] configurée
    pub async fn delete_song(&self, song_id: i64) -> Result<()> {
        let affected = self
            .write(move |uow, policy| {
                if uow.find_song(song_id)?.is_none() {
                    return Err(song_not_found(song_id));
                }

                let playlists = uow.playlists_containing(song_id)?;
                if !playlists.is_empty() {
                    match policy.song_delete_policy {
                        SongDeletePolicy::Restrict => {
                            return Err(Error::Conflict(format!(
                                "Song {} is referenced by {} playlist(s)",
                                song_id,
                                playlists.len()
                            )));
                        }
                        SongDeletePolicy::Cascade => {
                            for &playlist_id in &playlists {
                                ordering::remove(uow, playlist_id, song_id)?;
                            }
                        }
                    }
                }

                uow.delete_song_row(song_id)?;
                Ok(playlists.len())
            })
            .await?;

        info!(song_id, playlists = affected, "Song deleted");
        Ok(())
    }

    pub async fn list_songs(&self, request: PageRequest) -> Result<(Vec<Song>, u64)> {
        self.read(move |uow| {
            let pattern = request.like_pattern();
            let count = uow.count_songs(pattern.as_deref())?;
            let songs = uow.list_songs(pattern.as_deref(), request.limit(), request.offset())?;
            Ok((songs, count))
        })
        .await
    }

    // --- Playlists ---

    /// Crée une playlist et y ajoute `song_ids` dans l'ordre fourni
    ///
    /// Un identifiant invalide annule toute la création, playlist comprise.
    pub async fn create_playlist(&self, name: String, song_ids: Vec<i64>) -> Result<PlaylistDetail> {
        let detail = self
            .write(move |uow, _| {
                let playlist = uow.insert_playlist(&name)?;
                ordering::append_all(uow, playlist.id, &song_ids)?;
                Ok(PlaylistDetail {
                    id: playlist.id,
                    name: playlist.name,
                    songs: song_ids,
                })
            })
            .await?;

        info!(
            playlist_id = detail.id,
            songs = detail.songs.len(),
            "Playlist created: {}",
            detail.name
        );
        Ok(detail)
    }

    pub async fn get_playlist(&self, playlist_id: i64) -> Result<Playlist> {
        self.read(move |uow| {
            uow.find_playlist(playlist_id)?
                .ok_or_else(|| playlist_not_found(playlist_id))
        })
        .await
    }

    pub async fn rename_playlist(&self, playlist_id: i64, name: String) -> Result<Playlist> {
        let playlist = self
            .write(move |uow, _| {
                if !uow.rename_playlist(playlist_id, &name)? {
                    return Err(playlist_not_found(playlist_id));
                }
                Ok(Playlist {
                    id: playlist_id,
                    name,
                })
            })
            .await?;

        info!(playlist_id, "Playlist renamed: {}", playlist.name);
        Ok(playlist)
    }

    /// Supprime une playlist et toutes ses appartenances
    pub async fn delete_playlist(&self, playlist_id: i64) -> Result<()> {
        self.write(move |uow, _| {
            if !uow.delete_playlist_row(playlist_id)? {
                return Err(playlist_not_found(playlist_id));
            }
            Ok(())
        })
        .await?;

        info!(playlist_id, "Playlist deleted");
        Ok(())
    }

    pub async fn list_playlists(&self, request: PageRequest) -> Result<(Vec<Playlist>, u64)> {
        self.read(move |uow| {
            let pattern = request.like_pattern();
            let count = uow.count_playlists(pattern.as_deref())?;
            let playlists =
                uow.list_playlists(pattern.as_deref(), request.limit(), request.offset())?;
            Ok((playlists, count))
        })
        .await
    }

    // --- Morceaux d'une playlist ---

    /// Morceaux d'une playlist, dans l'ordre des positions
    pub async fn list_playlist_songs(
        &self,
        playlist_id: i64,
        request: PageRequest,
    ) -> Result<(Vec<PlaylistSong>, u64)> {
        self.read(move |uow| {
            if !uow.playlist_exists(playlist_id)? {
                return Err(playlist_not_found(playlist_id));
            }
            let count = uow.membership_count(playlist_id)? as u64;
            let songs = uow.list_playlist_songs(playlist_id, request.limit(), request.offset())?;
            Ok((songs, count))
        })
        .await
    }

    /// Ajoute un morceau à une playlist (en fin si `position` est absent)
    pub async fn add_song_to_playlist(
        &self,
        playlist_id: i64,
        song_id: i64,
        position: Option<i64>,
    ) -> Result<Membership> {
        let membership = self
            .write(move |uow, _| {
                let position = ordering::insert(uow, playlist_id, song_id, position)?;
                Ok(Membership {
                    playlist_id,
                    song_id,
                    position,
                })
            })
            .await?;

        info!(
            playlist_id,
            song_id,
            position = membership.position,
            "Song added to playlist"
        );
        Ok(membership)
    }

    /// Déplace un morceau vers `position`
    pub async fn move_song(&self, playlist_id: i64, song_id: i64, position: i64) -> Result<()> {
        self.write(move |uow, _| ordering::move_song(uow, playlist_id, song_id, position))
            .await?;

        info!(playlist_id, song_id, position, "Song moved in playlist");
        Ok(())
    }

    /// Retire un morceau d'une playlist en refermant le trou
    pub async fn remove_song(&self, playlist_id: i64, song_id: i64) -> Result<()> {
        let old_position = self
            .write(move |uow, _| ordering::remove(uow, playlist_id, song_id))
            .await?;

        info!(playlist_id, song_id, old_position, "Song removed from playlist");
        Ok(())
    }

    /// Renumérote une playlist de 1 à N (réparation)
    pub async fn compact_playlist(&self, playlist_id: i64) -> Result<usize> {
        let fixed = self
            .write(move |uow, _| {
                if !uow.playlist_exists(playlist_id)? {
                    return Err(playlist_not_found(playlist_id));
                }
                ordering::compact(uow, playlist_id)
            })
            .await?;

        if fixed > 0 {
            warn!(playlist_id, fixed, "Playlist positions repaired");
        }
        Ok(fixed)
    }
}

fn song_not_found(song_id: i64) -> Error {
    Error::NotFound(format!("Song {} not found", song_id))
}

fn playlist_not_found(playlist_id: i64) -> Error {
    Error::NotFound(format!("Playlist {} not found", playlist_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(policy: CatalogPolicy) -> Catalog {
        Catalog::new(CatalogStore::open_in_memory().unwrap(), policy)
    }

    fn new_song(name: &str) -> NewSong {
        NewSong {
            name: name.to_string(),
            artist: "Band".to_string(),
            release_year: 1999,
        }
    }

    #[test]
    fn test_song_delete_policy_from_str() {
        assert_eq!("Cascade".parse::<SongDeletePolicy>(), Ok(SongDeletePolicy::Cascade));
        assert_eq!(" restrict".parse::<SongDeletePolicy>(), Ok(SongDeletePolicy::Restrict));
        assert!("purge".parse::<SongDeletePolicy>().is_err());
    }

    #[tokio::test]
    async fn test_duplicate_songs_follow_policy() -> Result<()> {
        let strict = catalog(CatalogPolicy::default());
        strict.create_song(new_song("Same")).await?;
        assert!(matches!(
            strict.create_song(new_song("Same")).await,
            Err(Error::AlreadyExists(_))
        ));

        let lenient = catalog(CatalogPolicy {
            reject_duplicate_songs: false,
            ..CatalogPolicy::default()
        });
        let first = lenient.create_song(new_song("Same")).await?;
        let second = lenient.create_song(new_song("Same")).await?;
        assert_ne!(first.id, second.id);
        Ok(())
    }

    #[tokio::test]
    async fn test_create_song_rejects_blank_text_fields() -> Result<()> {
        let catalog = catalog(CatalogPolicy::default());

        let err = catalog
            .create_song(NewSong {
                name: "   ".to_string(),
                artist: String::new(),
                release_year: 1999,
            })
            .await
            .unwrap_err();
        let Error::InvalidArgument(fields) = err else {
            panic!("expected InvalidArgument");
        };
        assert_eq!(fields.get("name"), Some(&[validation::BLANK.to_string()][..]));
        assert_eq!(fields.get("artist"), Some(&[validation::BLANK.to_string()][..]));

        let err = catalog
            .create_song(NewSong {
                release_year: 1850,
                ..new_song("Old")
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(ref f) if f.get("release_year").is_some()));

        let (songs, count) = catalog.list_songs(PageRequest::first()).await?;
        assert_eq!(count, 0);
        assert!(songs.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_restrict_policy_refuses_referenced_song() -> Result<()> {
        let catalog = catalog(CatalogPolicy::default());
        let song = catalog.create_song(new_song("Kept")).await?;
        catalog.create_playlist("P".into(), vec![song.id]).await?;

        assert!(matches!(catalog.delete_song(song.id).await, Err(Error::Conflict(_))));
        assert_eq!(catalog.get_song(song.id).await?.name, "Kept");
        Ok(())
    }

    #[tokio::test]
    async fn test_cascade_policy_keeps_playlists_dense() -> Result<()> {
        let catalog = catalog(CatalogPolicy {
            song_delete_policy: SongDeletePolicy::Cascade,
            ..CatalogPolicy::default()
        });
        let a = catalog.create_song(new_song("a")).await?;
        let b = catalog.create_song(new_song("b")).await?;
        let c = catalog.create_song(new_song("c")).await?;
        let p1 = catalog.create_playlist("P1".into(), vec![a.id, b.id, c.id]).await?;
        let p2 = catalog.create_playlist("P2".into(), vec![b.id, a.id]).await?;

        catalog.delete_song(b.id).await?;

        let (songs, count) = catalog.list_playlist_songs(p1.id, PageRequest::first()).await?;
        assert_eq!(count, 2);
        let order: Vec<(i64, i64)> = songs.iter().map(|s| (s.id, s.position)).collect();
        assert_eq!(order, vec![(a.id, 1), (c.id, 2)]);

        let (songs, _) = catalog.list_playlist_songs(p2.id, PageRequest::first()).await?;
        assert_eq!(songs.iter().map(|s| (s.id, s.position)).collect::<Vec<_>>(), vec![(a.id, 1)]);

        assert!(matches!(catalog.get_song(b.id).await, Err(Error::NotFound(_))));
        Ok(())
    }

    #[tokio::test]
    async fn test_compact_playlist_on_dense_playlist_is_noop() -> Result<()> {
        let catalog = catalog(CatalogPolicy::default());
        let a = catalog.create_song(new_song("a")).await?;
        let p = catalog.create_playlist("P".into(), vec![a.id]).await?;

        assert_eq!(catalog.compact_playlist(p.id).await?, 0);
        assert!(matches!(catalog.compact_playlist(999).await, Err(Error::NotFound(_))));
        Ok(())
    }
}
