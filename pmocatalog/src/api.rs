//! API REST du catalogue (morceaux, playlists et ordre des morceaux).

use axum::{
    Json, Router,
    extract::{OriginalUri, Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, put},
};
use serde::Deserialize;
use std::sync::Arc;

use crate::catalog::Catalog;
use crate::error::{Error, FieldErrors};
use crate::listing::{ListQuery, Page, PageRequest, parse_page};
use crate::validation;

/// État partagé par les handlers
#[derive(Clone)]
pub struct ApiState {
    catalog: Catalog,
    public_url: Arc<str>,
}

impl ApiState {
    /// `public_url` préfixe les liens de pagination (vide : liens relatifs)
    pub fn new(catalog: Catalog, public_url: impl AsRef<str>) -> Self {
        Self {
            catalog,
            public_url: Arc::from(public_url.as_ref().trim_end_matches('/')),
        }
    }
}

/// Router combinant les endpoints `/songs` et `/playlists`.
pub fn catalog_api_router(state: ApiState) -> Router {
    Router::new()
        .route("/songs", get(list_songs).post(create_song))
        .route("/songs/{song_id}", get(get_song).delete(delete_song))
        .route("/playlists", get(list_playlists).post(create_playlist))
        .route(
            "/playlists/{playlist_id}",
            get(get_playlist)
                .put(rename_playlist)
                .delete(delete_playlist),
        )
        .route(
            "/playlists/{playlist_id}/songs",
            get(list_playlist_songs).post(add_playlist_song),
        )
        .route(
            "/playlists/{playlist_id}/songs/{song_id}",
            put(move_playlist_song).delete(remove_playlist_song),
        )
        .with_state(state)
}

/// Requête de création d'un morceau.
#[derive(Debug, Deserialize)]
pub struct CreateSongRequest {
    pub name: Option<String>,
    pub artist: Option<String>,
    pub release_year: Option<i64>,
}

/// Requête de création d'une playlist (morceaux dans l'ordre voulu).
#[derive(Debug, Deserialize)]
pub struct CreatePlaylistRequest {
    pub name: Option<String>,
    #[serde(default)]
    pub songs: Vec<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RenamePlaylistRequest {
    pub name: Option<String>,
}

/// Ajout d'un morceau, en fin de playlist si `position` est absent.
#[derive(Debug, Deserialize)]
pub struct AddPlaylistSongRequest {
    pub song_id: Option<i64>,
    pub position: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct MoveSongRequest {
    pub position: Option<i64>,
}

// --- Morceaux ---

pub async fn list_songs(
    State(state): State<ApiState>,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<ListQuery>,
) -> Response {
    let request = PageRequest::from(query);
    let base = link_base(&state, uri.path(), &request);
    match state.catalog.list_songs(request.clone()).await {
        Ok((songs, count)) => {
            (StatusCode::OK, Json(Page::new(songs, count, request.page, &base))).into_response()
        }
        Err(err) => map_error(err),
    }
}

pub async fn create_song(
    State(state): State<ApiState>,
    payload: Result<Json<CreateSongRequest>, JsonRejection>,
) -> Response {
    let req = match decode(payload) {
        Ok(req) => req,
        Err(err) => return map_error(err),
    };

    let song = match validation::validate_new_song(
        req.name,
        req.artist,
        req.release_year,
        validation::current_year(),
    ) {
        Ok(song) => song,
        Err(err) => return map_error(err),
    };

    match state.catalog.create_song(song).await {
        Ok(song) => (StatusCode::CREATED, Json(song)).into_response(),
        Err(err) => map_error(err),
    }
}

pub async fn get_song(State(state): State<ApiState>, Path(song_id): Path<String>) -> Response {
    let Some(song_id) = parse_id(&song_id) else {
        return not_found("Song", &song_id);
    };
    match state.catalog.get_song(song_id).await {
        Ok(song) => (StatusCode::OK, Json(song)).into_response(),
        Err(err) => map_error(err),
    }
}

pub async fn delete_song(State(state): State<ApiState>, Path(song_id): Path<String>) -> Response {
    let Some(song_id) = parse_id(&song_id) else {
        return not_found("Song", &song_id);
    };
    match state.catalog.delete_song(song_id).await {
        Ok(()) => (StatusCode::OK, "Song deleted").into_response(),
        Err(err) => map_error(err),
    }
}

// --- Playlists ---

pub async fn list_playlists(
    State(state): State<ApiState>,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<ListQuery>,
) -> Response {
    let request = PageRequest::from(query);
    let base = link_base(&state, uri.path(), &request);
    match state.catalog.list_playlists(request.clone()).await {
        Ok((playlists, count)) => (
            StatusCode::OK,
            Json(Page::new(playlists, count, request.page, &base)),
        )
            .into_response(),
        Err(err) => map_error(err),
    }
}

pub async fn create_playlist(
    State(state): State<ApiState>,
    payload: Result<Json<CreatePlaylistRequest>, JsonRejection>,
) -> Response {
    let req = match decode(payload) {
        Ok(req) => req,
        Err(err) => return map_error(err),
    };

    let mut errors = FieldErrors::new();
    let Some(name) = validation::required_text(&mut errors, "name", req.name) else {
        return map_error(Error::InvalidArgument(errors));
    };

    match state.catalog.create_playlist(name, req.songs).await {
        Ok(detail) => (StatusCode::CREATED, Json(detail)).into_response(),
        Err(err) => map_error(err),
    }
}

pub async fn get_playlist(
    State(state): State<ApiState>,
    Path(playlist_id): Path<String>,
) -> Response {
    let Some(playlist_id) = parse_id(&playlist_id) else {
        return not_found("Playlist", &playlist_id);
    };
    match state.catalog.get_playlist(playlist_id).await {
        Ok(playlist) => (StatusCode::OK, Json(playlist)).into_response(),
        Err(err) => map_error(err),
    }
}

pub async fn rename_playlist(
    State(state): State<ApiState>,
    Path(playlist_id): Path<String>,
    payload: Result<Json<RenamePlaylistRequest>, JsonRejection>,
) -> Response {
    let Some(playlist_id) = parse_id(&playlist_id) else {
        return not_found("Playlist", &playlist_id);
    };
    let req = match decode(payload) {
        Ok(req) => req,
        Err(err) => return map_error(err),
    };

    let mut errors = FieldErrors::new();
    let Some(name) = validation::required_text(&mut errors, "name", req.name) else {
        return map_error(Error::InvalidArgument(errors));
    };

    match state.catalog.rename_playlist(playlist_id, name).await {
        Ok(playlist) => (StatusCode::OK, Json(playlist)).into_response(),
        Err(err) => map_error(err),
    }
}

pub async fn delete_playlist(
    State(state): State<ApiState>,
    Path(playlist_id): Path<String>,
) -> Response {
    let Some(playlist_id) = parse_id(&playlist_id) else {
        return not_found("Playlist", &playlist_id);
    };
    match state.catalog.delete_playlist(playlist_id).await {
        Ok(()) => (StatusCode::OK, "Playlist deleted").into_response(),
        Err(err) => map_error(err),
    }
}

// --- Morceaux d'une playlist ---

pub async fn list_playlist_songs(
    State(state): State<ApiState>,
    OriginalUri(uri): OriginalUri,
    Path(playlist_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> Response {
    let Some(playlist_id) = parse_id(&playlist_id) else {
        return not_found("Playlist", &playlist_id);
    };
    // Pas de filtre sur les morceaux d'une playlist
    let request = PageRequest::new(parse_page(query.page.as_deref()), None);
    let base = link_base(&state, uri.path(), &request);

    match state
        .catalog
        .list_playlist_songs(playlist_id, request.clone())
        .await
    {
        Ok((songs, count)) => {
            (StatusCode::OK, Json(Page::new(songs, count, request.page, &base))).into_response()
        }
        Err(err) => map_error(err),
    }
}

pub async fn add_playlist_song(
    State(state): State<ApiState>,
    Path(playlist_id): Path<String>,
    payload: Result<Json<AddPlaylistSongRequest>, JsonRejection>,
) -> Response {
    let Some(playlist_id) = parse_id(&playlist_id) else {
        return not_found("Playlist", &playlist_id);
    };
    let req = match decode(payload) {
        Ok(req) => req,
        Err(err) => return map_error(err),
    };

    let mut errors = FieldErrors::new();
    let Some(song_id) = validation::required(&mut errors, "song_id", req.song_id) else {
        return map_error(Error::InvalidArgument(errors));
    };

    match state
        .catalog
        .add_song_to_playlist(playlist_id, song_id, req.position)
        .await
    {
        Ok(membership) => (StatusCode::CREATED, Json(membership)).into_response(),
        Err(err) => map_error(err),
    }
}

pub async fn move_playlist_song(
    State(state): State<ApiState>,
    Path((playlist_id, song_id)): Path<(String, String)>,
    payload: Result<Json<MoveSongRequest>, JsonRejection>,
) -> Response {
    let (Some(playlist_id), Some(song_id)) = (parse_id(&playlist_id), parse_id(&song_id)) else {
        return not_a_member(&playlist_id, &song_id);
    };
    let req = match decode(payload) {
        Ok(req) => req,
        Err(err) => return map_error(err),
    };

    let mut errors = FieldErrors::new();
    let Some(position) = validation::required(&mut errors, "position", req.position) else {
        return map_error(Error::InvalidArgument(errors));
    };

    match state.catalog.move_song(playlist_id, song_id, position).await {
        Ok(()) => (StatusCode::OK, "Song moved").into_response(),
        Err(err) => map_error(err),
    }
}

pub async fn remove_playlist_song(
    State(state): State<ApiState>,
    Path((playlist_id, song_id)): Path<(String, String)>,
) -> Response {
    let (Some(playlist_id), Some(song_id)) = (parse_id(&playlist_id), parse_id(&song_id)) else {
        return not_a_member(&playlist_id, &song_id);
    };
    match state.catalog.remove_song(playlist_id, song_id).await {
        Ok(()) => (StatusCode::OK, "Song removed from playlist").into_response(),
        Err(err) => map_error(err),
    }
}

/// Corps JSON décodé ; une erreur de type est rattachée au champ fautif
fn decode<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, Error> {
    payload.map(|Json(req)| req).map_err(|rejection| match &rejection {
        JsonRejection::JsonDataError(_) => match data_error_field(&rejection.body_text()) {
            Some((field, message)) => Error::invalid(field, message),
            None => Error::invalid("non_field_errors", rejection.body_text()),
        },
        _ => Error::invalid("non_field_errors", rejection.body_text()),
    })
}

/// Découpe `"...target type: songs[0]: invalid type ..."` en `("songs", "invalid type ...")`
fn data_error_field(text: &str) -> Option<(&str, &str)> {
    let (_, detail) = text.split_once("target type: ")?;
    let (path, message) = detail.split_once(": ")?;
    let field = path.split(['[', '.']).next()?;
    let is_field = !field.is_empty()
        && field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    is_field.then_some((field, message))
}

/// Base des liens de pagination : URL publique, chemin demandé et filtre
fn link_base(state: &ApiState, path: &str, request: &PageRequest) -> String {
    match &request.query {
        Some(q) => format!("{}{}?q={}", state.public_url, path, urlencoding::encode(q)),
        None => format!("{}{}", state.public_url, path),
    }
}

fn parse_id(raw: &str) -> Option<i64> {
    raw.parse::<i64>().ok()
}

fn not_found(kind: &str, raw_id: &str) -> Response {
    map_error(Error::NotFound(format!("{} {} not found", kind, raw_id)))
}

fn not_a_member(playlist_id: &str, song_id: &str) -> Response {
    map_error(Error::NotFound(format!(
        "Song {} is not in playlist {}",
        song_id, playlist_id
    )))
}

fn map_error(error: Error) -> Response {
    match error {
        Error::InvalidArgument(fields) | Error::AlreadyExists(fields) => {
            (StatusCode::BAD_REQUEST, Json(fields)).into_response()
        }
        Error::NotFound(message) => (StatusCode::NOT_FOUND, message).into_response(),
        Error::Conflict(message) => (StatusCode::CONFLICT, message).into_response(),
        err @ (Error::Persistence(_) | Error::Database(_) | Error::Other(_)) => {
            tracing::error!("Catalog request failed: {}", err);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_error_field() {
        assert_eq!(
            data_error_field(
                "Failed to deserialize the JSON body into the target type: songs[0]: invalid type: string \"x\", expected i64 at line 1 column 22"
            ),
            Some(("songs", "invalid type: string \"x\", expected i64 at line 1 column 22"))
        );
        assert_eq!(
            data_error_field(
                "Failed to deserialize the JSON body into the target type: invalid type: sequence, expected struct CreateSongRequest at line 1 column 0"
            ),
            None
        );
        assert_eq!(data_error_field("Expected request with `Content-Type: application/json`"), None);
    }

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("42"), Some(42));
        assert_eq!(parse_id("abc"), None);
        assert_eq!(parse_id(""), None);
    }

    #[test]
    fn test_map_error_statuses() {
        assert_eq!(
            map_error(Error::invalid("name", "bad")).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            map_error(Error::already_exists("song_id", "dup")).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            map_error(Error::NotFound("x".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            map_error(Error::Conflict("x".into())).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            map_error(Error::Persistence("x".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
