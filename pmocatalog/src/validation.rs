//! Validation des champs saisis

use crate::error::{FieldErrors, Result};
use crate::model::NewSong;
use chrono::{Datelike, Utc};

/// Première année de sortie acceptée
pub const MIN_RELEASE_YEAR: i64 = 1900;

pub const REQUIRED: &str = "This field is required.";
pub const BLANK: &str = "This field may not be blank.";
pub const INVALID_RELEASE_YEAR: &str = "Invalid release year";

/// Année calendaire courante (UTC)
pub fn current_year() -> i64 {
    i64::from(Utc::now().year())
}

/// Vérifie `MIN_RELEASE_YEAR <= year <= current_year`
pub fn validate_release_year(year: i64, current_year: i64) -> std::result::Result<(), &'static str> {
    if (MIN_RELEASE_YEAR..=current_year).contains(&year) {
        Ok(())
    } else {
        Err(INVALID_RELEASE_YEAR)
    }
}

/// Champ texte obligatoire et non vide ; l'erreur est enregistrée sur `field`
pub fn required_text(errors: &mut FieldErrors, field: &str, value: Option<String>) -> Option<String> {
    match value {
        None => {
            errors.add(field, REQUIRED);
            None
        }
        Some(v) if v.trim().is_empty() => {
            errors.add(field, BLANK);
            None
        }
        Some(v) => Some(v),
    }
}

pub fn required<T>(errors: &mut FieldErrors, field: &str, value: Option<T>) -> Option<T> {
    if value.is_none() {
        errors.add(field, REQUIRED);
    }
    value
}

/// Valide un morceau complet, toutes les erreurs sont remontées ensemble
pub fn validate_new_song(
    name: Option<String>,
    artist: Option<String>,
    release_year: Option<i64>,
    current_year: i64,
) -> Result<NewSong> {
    let mut errors = FieldErrors::new();
    let name = required_text(&mut errors, "name", name);
    let artist = required_text(&mut errors, "artist", artist);
    let release_year = required(&mut errors, "release_year", release_year);

    if let Some(year) = release_year {
        if let Err(message) = validate_release_year(year, current_year) {
            errors.add("release_year", message);
        }
    }

    match (name, artist, release_year) {
        (Some(name), Some(artist), Some(release_year)) if errors.is_empty() => Ok(NewSong {
            name,
            artist,
            release_year,
        }),
        _ => Err(crate::Error::InvalidArgument(errors)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_release_year_bounds() {
        let now = current_year();
        assert!(validate_release_year(1899, now).is_err());
        assert!(validate_release_year(1900, now).is_ok());
        assert!(validate_release_year(now, now).is_ok());
        assert!(validate_release_year(now + 1, now).is_err());
    }

    #[test]
    fn test_validate_new_song_collects_every_error() {
        let err = validate_new_song(None, Some("  ".into()), Some(1800), 2024).unwrap_err();
        let Error::InvalidArgument(fields) = err else {
            panic!("expected InvalidArgument");
        };
        assert_eq!(fields.get("name"), Some(&[REQUIRED.to_string()][..]));
        assert_eq!(fields.get("artist"), Some(&[BLANK.to_string()][..]));
        assert_eq!(
            fields.get("release_year"),
            Some(&[INVALID_RELEASE_YEAR.to_string()][..])
        );
    }

    #[test]
    fn test_validate_new_song_ok() {
        let song = validate_new_song(Some("Song".into()), Some("Band".into()), Some(1999), 2024)
            .unwrap();
        assert_eq!(song.release_year, 1999);
    }
}
