//! Moteur d'ordonnancement des morceaux d'une playlist
//!
//! Les positions d'une playlist forment toujours l'intervalle dense
//! `{1..N}` (N = nombre de morceaux). Chaque opération décale les voisins
//! d'un cran puis place le morceau visé ; elle s'exécute dans une seule
//! unité de travail du store, toute erreur annule l'ensemble.

use crate::error::{Error, FieldErrors, Result};
use std::collections::HashSet;
use tracing::debug;

/// Primitives d'appartenance utilisées par le moteur
///
/// Implémenté par l'unité de travail SQLite ; les décalages portent sur
/// l'intervalle fermé `[from, to]`.
pub trait MembershipStore {
    fn playlist_exists(&mut self, playlist_id: i64) -> Result<bool>;
    fn song_exists(&mut self, song_id: i64) -> Result<bool>;
    fn membership_position(&mut self, playlist_id: i64, song_id: i64) -> Result<Option<i64>>;
    fn membership_count(&mut self, playlist_id: i64) -> Result<i64>;
    fn insert_membership(&mut self, playlist_id: i64, song_id: i64, position: i64) -> Result<()>;
    fn delete_membership(&mut self, playlist_id: i64, song_id: i64) -> Result<()>;
    fn shift_positions(&mut self, playlist_id: i64, from: i64, to: i64, delta: i64)
    -> Result<usize>;
    fn set_position(&mut self, playlist_id: i64, song_id: i64, position: i64) -> Result<()>;
    /// Identifiants des morceaux triés par position
    fn ordered_song_ids(&mut self, playlist_id: i64) -> Result<Vec<i64>>;
}

/// Ajoute un morceau à une playlist
///
/// Sans position, le morceau est ajouté en fin (N+1). Avec une position,
/// elle doit appartenir à `[1, N+1]` et les morceaux suivants sont décalés.
/// Retourne la position attribuée.
pub fn insert<S: MembershipStore + ?Sized>(
    store: &mut S,
    playlist_id: i64,
    song_id: i64,
    desired_position: Option<i64>,
) -> Result<i64> {
    if !store.playlist_exists(playlist_id)? {
        return Err(Error::NotFound(format!("Playlist {} not found", playlist_id)));
    }
    if !store.song_exists(song_id)? {
        return Err(Error::NotFound(format!("Song {} not found", song_id)));
    }
    if store.membership_position(playlist_id, song_id)?.is_some() {
        return Err(Error::already_exists(
            "song_id",
            format!("Song {} is already in playlist {}.", song_id, playlist_id),
        ));
    }

    let count = store.membership_count(playlist_id)?;
    let position = match desired_position {
        None => count + 1,
        Some(p) if (1..=count + 1).contains(&p) => p,
        Some(_) => {
            return Err(Error::invalid(
                "position",
                format!("Position must be between 1 and {}.", count + 1),
            ));
        }
    };

    if position <= count {
        store.shift_positions(playlist_id, position, count, 1)?;
    }
    store.insert_membership(playlist_id, song_id, position)?;

    debug!(playlist_id, song_id, position, "Song inserted");
    Ok(position)
}

/// Ajoute une suite de morceaux en fin de playlist, dans l'ordre fourni
///
/// Les erreurs sont rapportées sur le champ `songs` (création de playlist).
pub fn append_all<S: MembershipStore + ?Sized>(
    store: &mut S,
    playlist_id: i64,
    song_ids: &[i64],
) -> Result<()> {
    let mut errors = FieldErrors::new();
    let mut seen = HashSet::new();
    for &song_id in song_ids {
        if !seen.insert(song_id) {
            errors.add("songs", format!("Song {} appears more than once.", song_id));
        } else if !store.song_exists(song_id)? {
            errors.add(
                "songs",
                format!("Invalid pk \"{}\" - object does not exist.", song_id),
            );
        }
    }
    errors.into_result()?;

    for &song_id in song_ids {
        insert(store, playlist_id, song_id, None)?;
    }
    Ok(())
}

/// Déplace un morceau vers `new_position` (dans `[1, N]`)
///
/// Équivaut à retirer le morceau de la séquence puis à le réinsérer à
/// l'indice visé. Déplacer vers la position courante ne fait rien.
pub fn move_song<S: MembershipStore + ?Sized>(
    store: &mut S,
    playlist_id: i64,
    song_id: i64,
    new_position: i64,
) -> Result<()> {
    let old_position = store
        .membership_position(playlist_id, song_id)?
        .ok_or_else(|| not_a_member(playlist_id, song_id))?;

    let count = store.membership_count(playlist_id)?;
    if !(1..=count).contains(&new_position) {
        return Err(Error::invalid(
            "position",
            format!("Position must be between 1 and {}.", count),
        ));
    }

    if old_position == new_position {
        return Ok(());
    }

    if old_position < new_position {
        store.shift_positions(playlist_id, old_position + 1, new_position, -1)?;
    } else {
        store.shift_positions(playlist_id, new_position, old_position - 1, 1)?;
    }
    store.set_position(playlist_id, song_id, new_position)?;

    debug!(playlist_id, song_id, old_position, new_position, "Song moved");
    Ok(())
}

/// Retire un morceau et referme le trou laissé. Retourne son ancienne position.
pub fn remove<S: MembershipStore + ?Sized>(
    store: &mut S,
    playlist_id: i64,
    song_id: i64,
) -> Result<i64> {
    let old_position = store
        .membership_position(playlist_id, song_id)?
        .ok_or_else(|| not_a_member(playlist_id, song_id))?;
    let count = store.membership_count(playlist_id)?;

    store.delete_membership(playlist_id, song_id)?;
    if old_position < count {
        store.shift_positions(playlist_id, old_position + 1, count, -1)?;
    }

    debug!(playlist_id, song_id, old_position, "Song removed");
    Ok(old_position)
}

/// Renumérote les morceaux de 1 à N en conservant leur ordre relatif
///
/// Retourne le nombre de positions corrigées.
pub fn compact<S: MembershipStore + ?Sized>(store: &mut S, playlist_id: i64) -> Result<usize> {
    let mut fixed = 0;
    for (index, song_id) in store.ordered_song_ids(playlist_id)?.into_iter().enumerate() {
        let expected = index as i64 + 1;
        if store.membership_position(playlist_id, song_id)? != Some(expected) {
            store.set_position(playlist_id, song_id, expected)?;
            fixed += 1;
        }
    }
    if fixed > 0 {
        debug!(playlist_id, fixed, "Playlist compacted");
    }
    Ok(fixed)
}

fn not_a_member(playlist_id: i64, song_id: i64) -> Error {
    Error::NotFound(format!(
        "Song {} is not in playlist {}",
        song_id, playlist_id
    ))
}
