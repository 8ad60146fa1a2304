//! Pagination et filtrage des listes

use serde::{Deserialize, Serialize};

/// Nombre d'éléments par page
pub const PAGE_SIZE: u32 = 10;

/// Paramètres de requête bruts (`?page=&q=`)
///
/// Conservés en chaînes : une page invalide retombe sur la première.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<String>,
    pub q: Option<String>,
}

/// Page demandée et filtre éventuel, normalisés
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub query: Option<String>,
}

impl PageRequest {
    pub fn new(page: u32, query: Option<String>) -> Self {
        Self {
            page: page.max(1),
            query: query.filter(|q| !q.is_empty()),
        }
    }

    pub fn first() -> Self {
        Self::new(1, None)
    }

    pub fn limit(&self) -> i64 {
        PAGE_SIZE as i64
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * PAGE_SIZE as i64
    }

    /// Motif `LIKE` correspondant au filtre (`%`, `_` et `\` échappés)
    pub fn like_pattern(&self) -> Option<String> {
        self.query.as_deref().map(like_contains)
    }
}

impl From<ListQuery> for PageRequest {
    fn from(query: ListQuery) -> Self {
        Self::new(parse_page(query.page.as_deref()), query.q)
    }
}

/// Numéro de page 1-based ; absent, non numérique ou non positif → 1
pub fn parse_page(raw: Option<&str>) -> u32 {
    raw.and_then(|s| s.trim().parse::<u32>().ok())
        .filter(|p| *p >= 1)
        .unwrap_or(1)
}

/// Motif `LIKE ... ESCAPE '\'` recherchant `needle` comme sous-chaîne
pub fn like_contains(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Lien vers une page ; `base_path` peut déjà porter une query string
pub fn page_link(base_path: &str, page: u32) -> String {
    let separator = if base_path.contains('?') { '&' } else { '?' };
    format!("{}{}page={}", base_path, separator, page)
}

/// Dernière page non vide pour `count` éléments
fn last_page(count: u64) -> Option<u32> {
    (count > 0).then(|| u32::try_from(count.div_ceil(u64::from(PAGE_SIZE))).unwrap_or(u32::MAX))
}

/// Page de résultats
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// Construit la page et ses liens `next`/`previous` à partir de `base_path`
    ///
    /// Au-delà de la dernière page, `previous` pointe sur la dernière page
    /// non vide (absent si la liste est vide).
    pub fn new(results: Vec<T>, count: u64, page: u32, base_path: &str) -> Self {
        let has_next = u64::from(page) * u64::from(PAGE_SIZE) < count;
        let previous = match page.checked_sub(1).filter(|p| *p >= 1) {
            Some(prior) if u64::from(prior - 1) * u64::from(PAGE_SIZE) < count => Some(prior),
            Some(_) => last_page(count).filter(|last| *last < page),
            None => None,
        };
        Self {
            count,
            next: has_next.then(|| page_link(base_path, page + 1)),
            previous: previous.map(|p| page_link(base_path, p)),
            results,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            count: self.count,
            next: self.next,
            previous: self.previous,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_page() {
        assert_eq!(parse_page(None), 1);
        assert_eq!(parse_page(Some("3")), 3);
        assert_eq!(parse_page(Some("0")), 1);
        assert_eq!(parse_page(Some("-2")), 1);
        assert_eq!(parse_page(Some("abc")), 1);
    }

    #[test]
    fn test_page_link() {
        assert_eq!(page_link("/songs", 2), "/songs?page=2");
        assert_eq!(page_link("/songs?q=rock", 2), "/songs?q=rock&page=2");
    }

    #[test]
    fn test_like_contains_escapes_wildcards() {
        assert_eq!(like_contains("abc"), "%abc%");
        assert_eq!(like_contains("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_contains("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn test_page_links_for_25_items() {
        let first: Page<u32> = Page::new((1..=10).collect(), 25, 1, "/songs");
        assert_eq!(first.next.as_deref(), Some("/songs?page=2"));
        assert_eq!(first.previous, None);

        let last: Page<u32> = Page::new((21..=25).collect(), 25, 3, "/songs");
        assert_eq!(last.next, None);
        assert_eq!(last.previous.as_deref(), Some("/songs?page=2"));
        assert_eq!(last.results.len(), 5);
    }

    #[test]
    fn test_previous_beyond_last_page_points_to_last_page() {
        let beyond: Page<u32> = Page::new(Vec::new(), 25, 9, "/songs");
        assert_eq!(beyond.next, None);
        assert_eq!(beyond.previous.as_deref(), Some("/songs?page=3"));

        let just_after: Page<u32> = Page::new(Vec::new(), 25, 4, "/songs");
        assert_eq!(just_after.previous.as_deref(), Some("/songs?page=3"));

        let empty: Page<u32> = Page::new(Vec::new(), 0, 2, "/songs");
        assert_eq!(empty.previous, None);
        assert_eq!(empty.next, None);

        let exact: Page<u32> = Page::new(Vec::new(), 20, 3, "/songs");
        assert_eq!(exact.previous.as_deref(), Some("/songs?page=2"));
    }

    #[test]
    fn test_page_request_offsets() {
        let request = PageRequest::new(3, Some(String::new()));
        assert_eq!(request.offset(), 20);
        assert_eq!(request.query, None);
        assert_eq!(PageRequest::new(0, None).page, 1);
    }
}
