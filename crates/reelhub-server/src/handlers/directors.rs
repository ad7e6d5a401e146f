//! `/directors` routes.

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
    ApiResponse, Director, DirectorChanges, ListQuery, NewDirector, director::SORTABLE_FIELDS,
    from_document, parse_body,
};
use crate::server::AppState;

const DIRECTORS: &str = EntityType::Directors.collection();

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/directors", get(list_directors).post(create_director))
        .route("/directors/search", get(search_directors))
        .route(
            "/directors/search/date-range",
            get(search_directors_by_birth_date),
        )
        .route(
            "/directors/{id}",
            get(get_director)
                .put(update_director)
                .delete(delete_director),
        )
}

async fn find_directors(
    state: &AppState,
    filter: Filter,
    query: &ListQuery,
) -> Result<Page<Director>, ApiError> {
    let page = query.to_page_request(SORTABLE_FIELDS)?;
    let found = state.store.find(DIRECTORS, &filter, &page).await?;
    found.try_map(from_document)
}

pub async fn list_directors(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<ListQuery>,
) -> Result<ApiResponse<Page<Director>>, ApiError> {
    let page = find_directors(&state, Filter::new(), &query).await?;
    Ok(ApiResponse::ok("Directors retrieved", uri.path(), page))
}

#[derive(Debug, Deserialize)]
pub struct NameSearch {
    pub name: Option<String>,
    #[serde(flatten)]
    pub list: ListQuery,
}

pub async fn search_directors(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Query(search): Query<NameSearch>,
) -> Result<ApiResponse<Page<Director>>, ApiError> {
    let Some(name) = search
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
    else {
        return Err(ApiError::validation("Query parameter 'name' is required"));
    };
    let filter = Filter::new().any_contains(["firstName", "lastName"], name);
    let page = find_directors(&state, filter, &search.list).await?;
    Ok(ApiResponse::ok("Directors retrieved", uri.path(), page))
}

pub async fn search_directors_by_birth_date(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Query(range): Query<DateRange>,
) -> Result<ApiResponse<Page<Director>>, ApiError> {
    let filter = range.filter("birthDate")?;
    let page = find_directors(&state, filter, &range.list).await?;
    Ok(ApiResponse::ok("Directors retrieved", uri.path(), page))
}

pub async fn create_director(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<ApiResponse<Director>, ApiError> {
    let director = parse_body::<NewDirector>(payload)?.validated()?;
    let stored = state
        .store
        .insert(DIRECTORS, director.into_document()?)
        .await?;
    let director: Director = from_document(stored)?;
    tracing::info!(director.id = %director.id, "director created");
    Ok(ApiResponse::created("Director created", uri.path(), director))
}

pub async fn get_director(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Path(id): Path<String>,
) -> Result<ApiResponse<Director>, ApiError> {
    let director = from_document(require_director(&state, &id).await?)?;
    Ok(ApiResponse::ok("Director retrieved", uri.path(), director))
}

pub async fn update_director(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<ApiResponse<Director>, ApiError> {
    let changes = parse_body::<DirectorChanges>(payload)?.validated()?;
    let updated = state
        .store
        .update(DIRECTORS, &id, changes.into_document()?)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Director with ID {id} not found")))?;
    tracing::info!(director.id = %id, "director updated");
    Ok(ApiResponse::ok(
        "Director updated",
        uri.path(),
        from_document(updated)?,
    ))
}

pub async fn delete_director(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Path(id): Path<String>,
) -> Result<ApiResponse<Value>, ApiError> {
    require_director(&state, &id).await?;

    let movies = state
        .store
        .count(
            EntityType::Movies.collection(),
            &Filter::new().eq("directorId", id.as_str()),
        )
        .await?;
    if movies > 0 {
        return Err(ApiError::conflict(format!(
            "Director with ID {id} still has {movies} movie(s)"
        )));
    }

    if !state.store.delete(DIRECTORS, &id).await? {
        return Err(ApiError::not_found(format!(
            "Director with ID {id} not found"
        )));
    }
    tracing::info!(director.id = %id, "director deleted");
    Ok(ApiResponse::ok(
        "Director deleted",
        uri.path(),
        json!({ "id": id }),
    ))
}
