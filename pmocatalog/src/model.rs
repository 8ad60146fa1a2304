//! Entités du catalogue

use serde::Serialize;

/// Morceau du catalogue
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Song {
    pub id: i64,
    pub name: String,
    pub artist: String,
    pub release_year: i64,
}

/// Champs d'un morceau à créer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSong {
    pub name: String,
    pub artist: String,
    pub release_year: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Playlist {
    pub id: i64,
    pub name: String,
}

/// Playlist accompagnée de ses morceaux dans l'ordre des positions
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaylistDetail {
    pub id: i64,
    pub name: String,
    pub songs: Vec<i64>,
}

/// Appartenance d'un morceau à une playlist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Membership {
    pub playlist_id: i64,
    pub song_id: i64,
    pub position: i64,
}

/// Morceau vu depuis une playlist (avec sa position)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaylistSong {
    pub id: i64,
    pub name: String,
    pub artist: String,
    pub release_year: i64,
    pub position: i64,
}
