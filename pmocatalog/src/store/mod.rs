//! Persistance SQLite du catalogue
//!
//! Une seule base contient les morceaux, les playlists et leurs
//! appartenances. Toute opération passe par une [`UnitOfWork`] ouverte en
//! `BEGIN IMMEDIATE` : les écrivains sont sérialisés et une erreur annule
//! l'ensemble de l'unité.
//!
//! Sur disque, la base est en mode WAL et les lectures passent par une
//! seconde connexion : une liste en cours ne bloque pas un déplacement.

mod schema;

use crate::error::{Error, Result};
use crate::model::{Membership, NewSong, Playlist, PlaylistSong, Song};
use crate::ordering::MembershipStore;
use rusqlite::{Connection, OptionalExtension, Row, Transaction, TransactionBehavior, params};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

/// Store du catalogue (connexion d'écriture, connexion de lecture sur disque)
#[derive(Clone)]
pub struct CatalogStore {
    conn: Arc<Mutex<Connection>>,
    reader: Option<Arc<Mutex<Connection>>>,
}

impl CatalogStore {
    /// Ouvre (ou crée) la base à l'emplacement donné
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::Persistence(format!("Failed to create directory: {}", e))
            })?;
        }

        let open = || {
            Connection::open(db_path).map_err(|e| {
                Error::Persistence(format!("Failed to open database {}: {}", db_path.display(), e))
            })
        };

        let conn = open()?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        let mut store = Self::from_connection(conn)?;

        let reader = open()?;
        reader.busy_timeout(Duration::from_secs(5))?;
        store.reader = Some(Arc::new(Mutex::new(reader)));

        debug!(journal_mode = %mode, "Catalog database opened at {}", db_path.display());
        Ok(store)
    }

    /// Base en mémoire (tests, essais)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Persistence(format!("Failed to open database: {}", e)))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        schema::create(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            reader: None,
        })
    }

    fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
        conn.lock()
            .map_err(|_| Error::Persistence("Database connection lock poisoned".into()))
    }

    /// Exécute `f` dans une transaction immédiate, validée si `f` réussit
    pub fn unit_of_work<T>(&self, f: impl FnOnce(&mut UnitOfWork<'_>) -> Result<T>) -> Result<T> {
        let mut conn = Self::lock(&self.conn)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut uow = UnitOfWork { tx };
        let value = f(&mut uow)?;
        uow.tx.commit()?;
        Ok(value)
    }

    /// Lecture cohérente (transaction différée, jamais validée)
    ///
    /// Utilise la connexion de lecture si elle existe (base sur disque).
    pub fn read<T>(&self, f: impl FnOnce(&mut UnitOfWork<'_>) -> Result<T>) -> Result<T> {
        let mut conn = Self::lock(self.reader.as_deref().unwrap_or(&*self.conn))?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;
        let mut uow = UnitOfWork { tx };
        f(&mut uow)
    }
}

/// Transaction en cours sur le catalogue
pub struct UnitOfWork<'conn> {
    tx: Transaction<'conn>,
}

impl UnitOfWork<'_> {
    // --- Morceaux ---

    pub fn insert_song(&mut self, song: &NewSong) -> Result<Song> {
        self.tx.execute(
            "INSERT INTO songs (name, artist, release_year) VALUES (?1, ?2, ?3)",
            params![song.name, song.artist, song.release_year],
        )?;
        Ok(Song {
            id: self.tx.last_insert_rowid(),
            name: song.name.clone(),
            artist: song.artist.clone(),
            release_year: song.release_year,
        })
    }

    pub fn find_song(&mut self, song_id: i64) -> Result<Option<Song>> {
        let song = self
            .tx
            .query_row(
                "SELECT id, name, artist, release_year FROM songs WHERE id = ?1",
                params![song_id],
                song_from_row,
            )
            .optional()?;
        Ok(song)
    }

    pub fn song_by_name_and_artist(&mut self, name: &str, artist: &str) -> Result<Option<i64>> {
        let id = self
            .tx
            .query_row(
                "SELECT id FROM songs WHERE name = ?1 AND artist = ?2 LIMIT 1",
                params![name, artist],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    pub fn delete_song_row(&mut self, song_id: i64) -> Result<bool> {
        let deleted = self
            .tx
            .execute("DELETE FROM songs WHERE id = ?1", params![song_id])?;
        Ok(deleted > 0)
    }

    /// Filtre optionnel sur le nom (motif `LIKE` déjà échappé)
    pub fn count_songs(&mut self, pattern: Option<&str>) -> Result<u64> {
        let count: i64 = self.tx.query_row(
            "SELECT COUNT(*) FROM songs WHERE ?1 IS NULL OR name LIKE ?1 ESCAPE '\\'",
            params![pattern],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    pub fn list_songs(&mut self, pattern: Option<&str>, limit: i64, offset: i64) -> Result<Vec<Song>> {
        let mut stmt = self.tx.prepare(
            "SELECT id, name, artist, release_year FROM songs
             WHERE ?1 IS NULL OR name LIKE ?1 ESCAPE '\\'
             ORDER BY id LIMIT ?2 OFFSET ?3",
        )?;
        let songs = stmt
            .query_map(params![pattern, limit, offset], song_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(songs)
    }

    /// Playlists contenant le morceau
    pub fn playlists_containing(&mut self, song_id: i64) -> Result<Vec<i64>> {
        let mut stmt = self.tx.prepare(
            "SELECT playlist_id FROM playlist_songs WHERE song_id = ?1 ORDER BY playlist_id",
        )?;
        let ids = stmt
            .query_map(params![song_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(ids)
    }

    // --- Playlists ---

    pub fn insert_playlist(&mut self, name: &str) -> Result<Playlist> {
        self.tx
            .execute("INSERT INTO playlists (name) VALUES (?1)", params![name])?;
        Ok(Playlist {
            id: self.tx.last_insert_rowid(),
            name: name.to_string(),
        })
    }

    pub fn find_playlist(&mut self, playlist_id: i64) -> Result<Option<Playlist>> {
        let playlist = self
            .tx
            .query_row(
                "SELECT id, name FROM playlists WHERE id = ?1",
                params![playlist_id],
                playlist_from_row,
            )
            .optional()?;
        Ok(playlist)
    }

    pub fn rename_playlist(&mut self, playlist_id: i64, name: &str) -> Result<bool> {
        let updated = self.tx.execute(
            "UPDATE playlists SET name = ?1 WHERE id = ?2",
            params![name, playlist_id],
        )?;
        Ok(updated > 0)
    }

    /// Supprime la playlist ; ses appartenances suivent (`ON DELETE CASCADE`)
    pub fn delete_playlist_row(&mut self, playlist_id: i64) -> Result<bool> {
        let deleted = self
            .tx
            .execute("DELETE FROM playlists WHERE id = ?1", params![playlist_id])?;
        Ok(deleted > 0)
    }

    pub fn count_playlists(&mut self, pattern: Option<&str>) -> Result<u64> {
        let count: i64 = self.tx.query_row(
            "SELECT COUNT(*) FROM playlists WHERE ?1 IS NULL OR name LIKE ?1 ESCAPE '\\'",
            params![pattern],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    pub fn list_playlists(
        &mut self,
        pattern: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Playlist>> {
        let mut stmt = self.tx.prepare(
            "SELECT id, name FROM playlists
             WHERE ?1 IS NULL OR name LIKE ?1 ESCAPE '\\'
             ORDER BY id LIMIT ?2 OFFSET ?3",
        )?;
        let playlists = stmt
            .query_map(params![pattern, limit, offset], playlist_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(playlists)
    }

    // --- Appartenances ---

    pub fn membership(&mut self, playlist_id: i64, song_id: i64) -> Result<Option<Membership>> {
        Ok(self
            .membership_position(playlist_id, song_id)?
            .map(|position| Membership {
                playlist_id,
                song_id,
                position,
            }))
    }

    pub fn list_playlist_songs(
        &mut self,
        playlist_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PlaylistSong>> {
        let mut stmt = self.tx.prepare(
            "SELECT s.id, s.name, s.artist, s.release_year, ps.position
             FROM playlist_songs ps JOIN songs s ON s.id = ps.song_id
             WHERE ps.playlist_id = ?1
             ORDER BY ps.position LIMIT ?2 OFFSET ?3",
        )?;
        let songs = stmt
            .query_map(params![playlist_id, limit, offset], |row| {
                Ok(PlaylistSong {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    artist: row.get(2)?,
                    release_year: row.get(3)?,
                    position: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(songs)
    }

    /// Appartenances de la playlist triées par position
    pub fn list_memberships(&mut self, playlist_id: i64) -> Result<Vec<Membership>> {
        let mut stmt = self.tx.prepare(
            "SELECT song_id, position FROM playlist_songs
             WHERE playlist_id = ?1 ORDER BY position, song_id",
        )?;
        let memberships = stmt
            .query_map(params![playlist_id], |row| {
                Ok(Membership {
                    playlist_id,
                    song_id: row.get(0)?,
                    position: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(memberships)
    }
}

impl MembershipStore for UnitOfWork<'_> {
    fn playlist_exists(&mut self, playlist_id: i64) -> Result<bool> {
        Ok(self.find_playlist(playlist_id)?.is_some())
    }

    fn song_exists(&mut self, song_id: i64) -> Result<bool> {
        let exists: bool = self.tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM songs WHERE id = ?1)",
            params![song_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn membership_position(&mut self, playlist_id: i64, song_id: i64) -> Result<Option<i64>> {
        let position = self
            .tx
            .query_row(
                "SELECT position FROM playlist_songs WHERE playlist_id = ?1 AND song_id = ?2",
                params![playlist_id, song_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(position)
    }

    fn membership_count(&mut self, playlist_id: i64) -> Result<i64> {
        let count = self.tx.query_row(
            "SELECT COUNT(*) FROM playlist_songs WHERE playlist_id = ?1",
            params![playlist_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn insert_membership(&mut self, playlist_id: i64, song_id: i64, position: i64) -> Result<()> {
        self.tx.execute(
            "INSERT INTO playlist_songs (playlist_id, song_id, position) VALUES (?1, ?2, ?3)",
            params![playlist_id, song_id, position],
        )?;
        Ok(())
    }

    fn delete_membership(&mut self, playlist_id: i64, song_id: i64) -> Result<()> {
        self.tx.execute(
            "DELETE FROM playlist_songs WHERE playlist_id = ?1 AND song_id = ?2",
            params![playlist_id, song_id],
        )?;
        Ok(())
    }

    fn shift_positions(
        &mut self,
        playlist_id: i64,
        from: i64,
        to: i64,
        delta: i64,
    ) -> Result<usize> {
        let shifted = self.tx.execute(
            "UPDATE playlist_songs SET position = position + ?1
             WHERE playlist_id = ?2 AND position >= ?3 AND position <= ?4",
            params![delta, playlist_id, from, to],
        )?;
        Ok(shifted)
    }

    fn set_position(&mut self, playlist_id: i64, song_id: i64, position: i64) -> Result<()> {
        self.tx.execute(
            "UPDATE playlist_songs SET position = ?1 WHERE playlist_id = ?2 AND song_id = ?3",
            params![position, playlist_id, song_id],
        )?;
        Ok(())
    }

    fn ordered_song_ids(&mut self, playlist_id: i64) -> Result<Vec<i64>> {
        Ok(self
            .list_memberships(playlist_id)?
            .into_iter()
            .map(|m| m.song_id)
            .collect())
    }
}

fn song_from_row(row: &Row<'_>) -> rusqlite::Result<Song> {
    Ok(Song {
        id: row.get(0)?,
        name: row.get(1)?,
        artist: row.get(2)?,
        release_year: row.get(3)?,
    })
}

fn playlist_from_row(row: &Row<'_>) -> rusqlite::Result<Playlist> {
    Ok(Playlist {
        id: row.get(0)?,
        name: row.get(1)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ordering;
    use std::sync::mpsc;
    use std::thread;

    fn song(name: &str) -> NewSong {
        NewSong {
            name: name.to_string(),
            artist: "Artist".to_string(),
            release_year: 2000,
        }
    }

    #[test]
    fn test_failed_unit_of_work_rolls_back() -> Result<()> {
        let store = CatalogStore::open_in_memory()?;

        let result: Result<()> = store.unit_of_work(|uow| {
            uow.insert_playlist("Doomed")?;
            Err(Error::invalid("songs", "boom"))
        });
        assert!(result.is_err());

        let count = store.read(|uow| uow.count_playlists(None))?;
        assert_eq!(count, 0);
        Ok(())
    }

    #[test]
    fn test_shift_positions_is_inclusive() -> Result<()> {
        let store = CatalogStore::open_in_memory()?;
        store.unit_of_work(|uow| {
            let playlist = uow.insert_playlist("P")?;
            for (i, name) in ["a", "b", "c", "d"].iter().enumerate() {
                let s = uow.insert_song(&song(name))?;
                uow.insert_membership(playlist.id, s.id, i as i64 + 1)?;
            }

            assert_eq!(uow.shift_positions(playlist.id, 2, 3, 1)?, 2);
            let positions: Vec<i64> = uow
                .list_memberships(playlist.id)?
                .into_iter()
                .map(|m| m.position)
                .collect();
            assert_eq!(positions, vec![1, 3, 4, 4]);
            Ok(())
        })
    }

    #[test]
    fn test_deleting_playlist_cascades_memberships() -> Result<()> {
        let store = CatalogStore::open_in_memory()?;
        let (playlist_id, song_id) = store.unit_of_work(|uow| {
            let playlist = uow.insert_playlist("P")?;
            let s = uow.insert_song(&song("a"))?;
            ordering::insert(uow, playlist.id, s.id, None)?;
            Ok((playlist.id, s.id))
        })?;

        store.unit_of_work(|uow| {
            assert!(uow.delete_playlist_row(playlist_id)?);
            Ok(())
        })?;

        let containing = store.read(|uow| uow.playlists_containing(song_id))?;
        assert!(containing.is_empty());
        Ok(())
    }

    #[test]
    fn test_like_filter_is_case_insensitive() -> Result<()> {
        let store = CatalogStore::open_in_memory()?;
        store.unit_of_work(|uow| {
            uow.insert_song(&song("Hello World"))?;
            uow.insert_song(&song("Goodbye"))?;
            uow.insert_song(&song("100% hello"))?;
            Ok(())
        })?;

        store.read(|uow| {
            assert_eq!(uow.count_songs(Some("%HELLO%"))?, 2);
            assert_eq!(uow.count_songs(Some("%0\\%%"))?, 1);
            assert_eq!(uow.count_songs(None)?, 3);
            Ok(())
        })
    }

    #[test]
    fn test_open_on_disk_persists() -> Result<()> {
        let dir = tempfile::tempdir().map_err(anyhow::Error::from)?;
        let path = dir.path().join("nested").join("catalog.db");

        {
            let store = CatalogStore::open(&path)?;
            store.unit_of_work(|uow| uow.insert_song(&song("kept")))?;
        }

        let store = CatalogStore::open(&path)?;
        let found = store.read(|uow| uow.find_song(1))?;
        assert_eq!(found.map(|s| s.name), Some("kept".to_string()));
        Ok(())
    }

    #[test]
    fn test_open_read_does_not_block_writer_on_disk() -> Result<()> {
        let dir = tempfile::tempdir().map_err(anyhow::Error::from)?;
        let store = CatalogStore::open(&dir.path().join("catalog.db"))?;
        let playlist_id = store.unit_of_work(|uow| Ok(uow.insert_playlist("A")?.id))?;

        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let reader = store.clone();
        let listing = thread::spawn(move || {
            reader.read(|uow| {
                let before = uow.count_playlists(None)?;
                entered_tx.send(()).ok();
                let released = release_rx.recv_timeout(Duration::from_secs(5)).is_ok();
                let after = uow.count_playlists(None)?;
                Ok((before, after, released))
            })
        });

        entered_rx
            .recv_timeout(Duration::from_secs(5))
            .map_err(anyhow::Error::from)?;
        // Écriture pendant que la lecture garde sa transaction ouverte
        store.unit_of_work(|uow| {
            let s = uow.insert_song(&song("b"))?;
            uow.insert_playlist("B")?;
            ordering::insert(uow, playlist_id, s.id, None)
        })?;
        release_tx.send(()).map_err(anyhow::Error::from)?;

        let (before, after, released) = listing.join().expect("reader thread panicked")?;
        assert!(released, "writer waited for the reader");
        assert_eq!((before, after), (1, 1));
        assert_eq!(store.read(|uow| uow.count_playlists(None))?, 2);
        Ok(())
    }
}
