//! Cache keys for entity listings.
//!
//! A key is `{entity}:{scope}:{page}:{limit}:{sortBy}:{sortOrder}`, e.g.
//! `movies:list:1:10:default:asc`. Absent parameters take their defaults
//! before the key is built, so `/movies` and `/movies?page=1&limit=10` share
//! an entry. Free-form segments are percent-encoded: a `:` inside a genre or
//! sort field cannot make two different queries collide.

use std::fmt;

use url::form_urlencoded;

use crate::entity::EntityType;

pub const DEFAULT_PAGE: &str = "1";
pub const DEFAULT_LIMIT: &str = "10";
pub const DEFAULT_SORT: &str = "default";
pub const DEFAULT_ORDER: &str = "asc";

/// Query parameters that mark a free-text search, which is never cached.
const SEARCH_PARAMS: &[&str] = &["q", "name"];

/// Which slice of an entity collection a listing covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListScope {
    /// The whole collection, e.g. `/movies`.
    All,
    /// Movies of one director, `/movies/director/{id}`.
    Director(String),
    /// Movies of one genre, `/movies/genre/{genre}`.
    Genre(String),
}

impl ListScope {
    fn segment(&self) -> String {
        match self {
            ListScope::All => "list".to_string(),
            ListScope::Director(id) => format!("director:{}", encode(id)),
            ListScope::Genre(genre) => format!("genre:{}", encode(genre)),
        }
    }
}

/// Pagination and sort parameters of a listing request, defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListParams {
    pub page: String,
    pub limit: String,
    pub sort_by: String,
    pub sort_order: String,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE.to_string(),
            limit: DEFAULT_LIMIT.to_string(),
            sort_by: DEFAULT_SORT.to_string(),
            sort_order: DEFAULT_ORDER.to_string(),
        }
    }
}

impl ListParams {
    /// Reads `page`, `limit`, `sortBy` and `sortOrder` from a raw query
    /// string. Other parameters do not take part in the key.
    pub fn from_query(query: Option<&str>) -> Self {
        let mut params = Self::default();
        let Some(query) = query else {
            return params;
        };
        for (name, value) in form_urlencoded::parse(query.as_bytes()) {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match &*name {
                "page" => params.page = canonical_number(value),
                "limit" => params.limit = canonical_number(value),
                "sortBy" => params.sort_by = value.to_string(),
                "sortOrder" => params.sort_order = value.to_ascii_lowercase(),
                _ => {}
            }
        }
        params
    }
}

/// `"01"` and `"1"` name the same page. Anything unparsable is kept as is;
/// the handler rejects it and the error response is never cached.
fn canonical_number(value: &str) -> String {
    value
        .parse::<u64>()
        .map(|n| n.to_string())
        .unwrap_or_else(|_| value.to_string())
}

fn encode(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

/// A fully built cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn listing(entity: EntityType, scope: &ListScope, params: &ListParams) -> Self {
        Self(format!(
            "{}:{}:{}:{}:{}:{}",
            entity.as_str(),
            scope.segment(),
            encode(&params.page),
            encode(&params.limit),
            encode(&params.sort_by),
            encode(&params.sort_order),
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Glob matching every cached listing of an entity type.
pub fn invalidation_pattern(entity: EntityType) -> String {
    format!("{}:*", entity.as_str())
}

/// A GET request the response cache may serve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheableListing {
    pub entity: EntityType,
    pub scope: ListScope,
    pub params: ListParams,
}

impl CacheableListing {
    /// Classifies a request path (relative to the API prefix) and query.
    ///
    /// Returns `None` for anything that is not a collection listing: single
    /// resources, `imdb/{id}` lookups, `/search` routes and requests
    /// carrying a free-text search parameter.
    pub fn from_request(path: &str, query: Option<&str>) -> Option<Self> {
        if query.is_some_and(has_search_param) {
            return None;
        }

        let segments: Vec<&str> = path
            .trim_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();

        let (entity, scope) = match segments.as_slice() {
            [entity] => (entity.parse().ok()?, ListScope::All),
            ["movies", "director", id] => (EntityType::Movies, ListScope::Director(decode(id)?)),
            ["movies", "genre", genre] => (EntityType::Movies, ListScope::Genre(decode(genre)?)),
            _ => return None,
        };

        Some(Self {
            entity,
            scope,
            params: ListParams::from_query(query),
        })
    }

    pub fn key(&self) -> CacheKey {
        CacheKey::listing(self.entity, &self.scope, &self.params)
    }
}

/// The entity type a write request targets, from the first path segment.
pub fn entity_for_path(path: &str) -> Option<EntityType> {
    path.trim_start_matches('/')
        .split('/')
        .next()
        .and_then(|segment| segment.parse().ok())
}

fn has_search_param(query: &str) -> bool {
    form_urlencoded::parse(query.as_bytes()).any(|(name, _)| SEARCH_PARAMS.contains(&&*name))
}

fn decode(segment: &str) -> Option<String> {
    urlencoding::decode(segment).ok().map(|s| s.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_for(path: &str, query: Option<&str>) -> Option<String> {
        CacheableListing::from_request(path, query).map(|l| l.key().as_str().to_string())
    }

    #[test]
    fn defaults_fill_missing_parameters() {
        assert_eq!(
            key_for("/movies", None).unwrap(),
            "movies:list:1:10:default:asc"
        );
        assert_eq!(
            key_for("/movies", Some("page=1&limit=10")),
            key_for("/movies", None)
        );
        assert_eq!(
            key_for("/movies", Some("page=01&sortOrder=ASC&limit=")),
            key_for("/movies", None)
        );
    }

    #[test]
    fn every_parameter_changes_the_key() {
        let base = key_for("/movies", Some("page=1&limit=10&sortBy=title&sortOrder=asc"));
        for variant in [
            "page=2&limit=10&sortBy=title&sortOrder=asc",
            "page=1&limit=20&sortBy=title&sortOrder=asc",
            "page=1&limit=10&sortBy=rating&sortOrder=asc",
            "page=1&limit=10&sortBy=title&sortOrder=desc",
        ] {
            assert_ne!(key_for("/movies", Some(variant)), base, "{variant}");
        }
        assert_ne!(
            key_for("/directors", Some("page=1&limit=10&sortBy=title&sortOrder=asc")),
            base
        );
    }

    #[test]
    fn unrelated_parameters_are_ignored() {
        assert_eq!(
            key_for("/movies", Some("utm_source=mail")),
            key_for("/movies", None)
        );
    }

    #[test]
    fn scoped_listings_have_their_own_keys() {
        assert_eq!(
            key_for("/movies/director/abc123", None).unwrap(),
            "movies:director:abc123:1:10:default:asc"
        );
        assert_eq!(
            key_for("/movies/genre/Sci%20Fi", Some("page=2")).unwrap(),
            "movies:genre:Sci%20Fi:2:10:default:asc"
        );
    }

    #[test]
    fn colons_in_values_cannot_collide() {
        let a = key_for("/movies/genre/a", Some("sortBy=b:c"));
        let b = key_for("/movies/genre/a:b", Some("sortBy=c"));
        assert_ne!(a, b);
    }

    #[test]
    fn non_listings_are_not_cacheable() {
        assert!(key_for("/movies/abc123", None).is_none());
        assert!(key_for("/movies/imdb/tt0078748", None).is_none());
        assert!(key_for("/movies/search/rating", Some("min=5")).is_none());
        assert!(key_for("/directors/search", Some("name=kub")).is_none());
        assert!(key_for("/directors", Some("name=kub")).is_none());
        assert!(key_for("/movies", Some("q=alien")).is_none());
        assert!(key_for("/directors/director/x", None).is_none());
        assert!(key_for("/actors", None).is_none());
    }

    #[test]
    fn write_routes_map_to_entities() {
        assert_eq!(entity_for_path("/movies"), Some(EntityType::Movies));
        assert_eq!(entity_for_path("/directors/abc"), Some(EntityType::Directors));
        assert_eq!(entity_for_path("/healthz"), None);
    }

    #[test]
    fn invalidation_pattern_covers_entity_namespace() {
        assert_eq!(invalidation_pattern(EntityType::Movies), "movies:*");
        assert_eq!(invalidation_pattern(EntityType::Directors), "directors:*");
    }
}
