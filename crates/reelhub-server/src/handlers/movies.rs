//! `/movies` routes.

use axum::{
    Json, Router,
    extract::{OriginalUri, Path, Query, State, rejection::JsonRejection},
    routing::get,
};
use reelhub_storage::{Filter, Page};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{DateRange, require_director};
use crate::entity::EntityType;
use crate::error::ApiError;
use crate::models::{
    ApiResponse, ListQuery, Movie, MovieChanges, NewMovie, from_document, movie::SORTABLE_FIELDS,
    parse_body,
};
use crate::server::AppState;

const MOVIES: &str = EntityType::Movies.collection();

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/movies", get(list_movies).post(create_movie))
        .route(
            "/movies/{id}",
            get(get_movie).put(update_movie).delete(delete_movie),
        )
        .route("/movies/imdb/{imdb_id}", get(get_movie_by_imdb_id))
        .route("/movies/director/{director_id}", get(list_movies_by_director))
        .route("/movies/genre/{genre}", get(list_movies_by_genre))
        .route("/movies/search/rating", get(search_movies_by_rating))
        .route(
            "/movies/search/release-date",
            get(search_movies_by_release_date),
        )
}

type MoviePage = ApiResponse<Page<Movie>>;

async fn find_movies(
    state: &AppState,
    filter: Filter,
    query: &ListQuery,
) -> Result<Page<Movie>, ApiError> {
    let page = query.to_page_request(SORTABLE_FIELDS)?;
    let found = state.store.find(MOVIES, &filter, &page).await?;
    found.try_map(from_document)
}

async fn movie_by_id(state: &AppState, id: &str) -> Result<Value, ApiError> {
    state
        .store
        .get(MOVIES, id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Movie with ID {id} not found")))
}

/// 409 if another movie already uses `imdb_id`.
async fn ensure_imdb_id_free(
    state: &AppState,
    imdb_id: &str,
    except_id: Option<&str>,
) -> Result<(), ApiError> {
    let existing = state
        .store
        .find_one(MOVIES, &Filter::new().eq("imdbId", imdb_id))
        .await?;
    match existing {
        Some(doc) if doc["id"].as_str() != except_id => Err(ApiError::conflict(format!(
            "Movie with IMDb ID {imdb_id} already exists"
        ))),
        _ => Ok(()),
    }
}

pub async fn list_movies(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<ListQuery>,
) -> Result<MoviePage, ApiError> {
    let page = find_movies(&state, Filter::new(), &query).await?;
    Ok(ApiResponse::ok("Movies retrieved", uri.path(), page))
}

pub async fn create_movie(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<ApiResponse<Movie>, ApiError> {
    let movie = parse_body::<NewMovie>(payload)?.validated()?;
    require_director(&state, &movie.director_id).await?;
    ensure_imdb_id_free(&state, &movie.imdb_id, None).await?;

    let stored = state.store.insert(MOVIES, movie.into_document()?).await?;
    let movie: Movie = from_document(stored)?;
    tracing::info!(movie.id = %movie.id, imdb_id = %movie.imdb_id, "movie created");
    Ok(ApiResponse::created("Movie created", uri.path(), movie))
}

pub async fn get_movie(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Path(id): Path<String>,
) -> Result<ApiResponse<Movie>, ApiError> {
    let movie = from_document(movie_by_id(&state, &id).await?)?;
    Ok(ApiResponse::ok("Movie retrieved", uri.path(), movie))
}

pub async fn get_movie_by_imdb_id(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Path(imdb_id): Path<String>,
) -> Result<ApiResponse<Movie>, ApiError> {
    let doc = state
        .store
        .find_one(MOVIES, &Filter::new().eq("imdbId", imdb_id.as_str()))
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Movie with IMDb ID {imdb_id} not found")))?;
    Ok(ApiResponse::ok(
        "Movie retrieved",
        uri.path(),
        from_document(doc)?,
    ))
}

pub async fn update_movie(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<ApiResponse<Movie>, ApiError> {
    let changes = parse_body::<MovieChanges>(payload)?.validated()?;
    let current = movie_by_id(&state, &id).await?;

    if let Some(director_id) = &changes.director_id
        && current["directorId"].as_str() != Some(director_id.as_str())
    {
        require_director(&state, director_id).await?;
    }
    if let Some(imdb_id) = &changes.imdb_id {
        ensure_imdb_id_free(&state, imdb_id, Some(&id)).await?;
    }

    let updated = state
        .store
        .update(MOVIES, &id, changes.into_document()?)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Movie with ID {id} not found")))?;
    tracing::info!(movie.id = %id, "movie updated");
    Ok(ApiResponse::ok(
        "Movie updated",
        uri.path(),
        from_document(updated)?,
    ))
}

pub async fn delete_movie(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Path(id): Path<String>,
) -> Result<ApiResponse<Value>, ApiError> {
    if !state.store.delete(MOVIES, &id).await? {
        return Err(ApiError::not_found(format!("Movie with ID {id} not found")));
    }
    tracing::info!(movie.id = %id, "movie deleted");
    Ok(ApiResponse::ok("Movie deleted", uri.path(), json!({ "id": id })))
}

pub async fn list_movies_by_director(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Path(director_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<MoviePage, ApiError> {
    require_director(&state, &director_id).await?;
    let filter = Filter::new().eq("directorId", director_id.as_str());
    let page = find_movies(&state, filter, &query).await?;
    Ok(ApiResponse::ok("Movies retrieved", uri.path(), page))
}

pub async fn list_movies_by_genre(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Path(genre): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<MoviePage, ApiError> {
    let filter = Filter::new().eq("genre", genre.trim());
    let page = find_movies(&state, filter, &query).await?;
    Ok(ApiResponse::ok("Movies retrieved", uri.path(), page))
}

#[derive(Debug, Deserialize)]
pub struct RatingRange {
    pub min: Option<String>,
    pub max: Option<String>,
    #[serde(flatten)]
    pub list: ListQuery,
}

pub async fn search_movies_by_rating(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Query(range): Query<RatingRange>,
) -> Result<MoviePage, ApiError> {
    let min = parse_rating(range.min.as_deref(), "min", 0.0)?;
    let max = parse_rating(range.max.as_deref(), "max", 10.0)?;
    if min > max {
        return Err(ApiError::validation(
            "Minimum rating must be less than or equal to maximum rating",
        ));
    }

    let filter = Filter::new().range("rating", Some(json!(min)), Some(json!(max)));
    let page = find_movies(&state, filter, &range.list).await?;
    Ok(ApiResponse::ok("Movies retrieved", uri.path(), page))
}

fn parse_rating(raw: Option<&str>, name: &str, default: f64) -> Result<f64, ApiError> {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(default);
    };
    match raw.parse::<f64>() {
        Ok(value) if (0.0..=10.0).contains(&value) => Ok(value),
        _ => Err(ApiError::validation(format!(
            "{name} must be a number between 0 and 10"
        ))),
    }
}

pub async fn search_movies_by_release_date(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Query(range): Query<DateRange>,
) -> Result<MoviePage, ApiError> {
    let filter = range.filter("releaseDate")?;
    let page = find_movies(&state, filter, &range.list).await?;
    Ok(ApiResponse::ok("Movies retrieved", uri.path(), page))
}
