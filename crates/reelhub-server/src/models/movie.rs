use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Violations;
use crate::error::ApiError;

/// Fields `sortBy` may name on movie listings.
pub const SORTABLE_FIELDS: &[&str] = &[
    "title",
    "releaseDate",
    "genre",
    "rating",
    "imdbId",
    "createdAt",
    "updatedAt",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movie {
    pub id: String,
    pub title: String,
    pub description: String,
    pub release_date: String,
    pub genre: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    pub imdb_id: String,
    pub director_id: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Body of `POST /movies`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMovie {
    pub title: String,
    pub description: String,
    pub release_date: String,
    pub genre: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    pub imdb_id: String,
    pub director_id: String,
}

impl NewMovie {
    /// Trims text fields and checks every constraint.
    pub fn validated(mut self) -> Result<Self, ApiError> {
        for field in [
            &mut self.title,
            &mut self.description,
            &mut self.release_date,
            &mut self.genre,
            &mut self.imdb_id,
            &mut self.director_id,
        ] {
            *field = field.trim().to_string();
        }

        let mut v = Violations::default();
        v.text("title", &self.title, 200);
        v.text("description", &self.description, 2000);
        v.date("releaseDate", &self.release_date);
        v.text("genre", &self.genre, 50);
        if let Some(rating) = self.rating {
            v.range("rating", rating, 0.0, 10.0);
        }
        v.text("imdbId", &self.imdb_id, 50);
        v.text("directorId", &self.director_id, 64);
        v.finish()?;
        Ok(self)
    }

    pub fn into_document(self) -> Result<Value, ApiError> {
        to_document(&self)
    }
}

/// Body of `PUT /movies/{id}`: only the fields present change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imdb_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub director_id: Option<String>,
}

impl MovieChanges {
    pub fn validated(mut self) -> Result<Self, ApiError> {
        for field in [
            &mut self.title,
            &mut self.description,
            &mut self.release_date,
            &mut self.genre,
            &mut self.imdb_id,
            &mut self.director_id,
        ]
        .into_iter()
        .flatten()
        {
            *field = field.trim().to_string();
        }

        let mut v = Violations::default();
        if let Some(title) = &self.title {
            v.text("title", title, 200);
        }
        if let Some(description) = &self.description {
            v.text("description", description, 2000);
        }
        if let Some(date) = &self.release_date {
            v.date("releaseDate", date);
        }
        if let Some(genre) = &self.genre {
            v.text("genre", genre, 50);
        }
        if let Some(rating) = self.rating {
            v.range("rating", rating, 0.0, 10.0);
        }
        if let Some(imdb_id) = &self.imdb_id {
            v.text("imdbId", imdb_id, 50);
        }
        if let Some(director_id) = &self.director_id {
            v.text("directorId", director_id, 64);
        }
        v.finish()?;
        Ok(self)
    }

    pub fn into_document(self) -> Result<Value, ApiError> {
        to_document(&self)
    }
}

fn to_document<T: Serialize>(value: &T) -> Result<Value, ApiError> {
    serde_json::to_value(value).map_err(|e| {
        reelhub_storage::StorageError::internal(format!("failed to encode movie: {e}")).into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn new_movie() -> NewMovie {
        serde_json::from_value(json!({
            "title": "  Alien ",
            "description": "In space no one can hear you scream.",
            "releaseDate": "1979-05-25",
            "genre": "Horror",
            "rating": 8.5,
            "imdbId": "tt0078748",
            "directorId": "d1"
        }))
        .unwrap()
    }

    #[test]
    fn valid_movie_is_trimmed() {
        let movie = new_movie().validated().unwrap();
        assert_eq!(movie.title, "Alien");
        let doc = movie.into_document().unwrap();
        assert_eq!(doc["imdbId"], "tt0078748");
        assert_eq!(doc["rating"], 8.5);
    }

    #[test]
    fn invalid_fields_are_reported() {
        let mut movie = new_movie();
        movie.rating = Some(12.0);
        movie.release_date = "yesterday".into();
        movie.genre = "x".repeat(51);
        let body = movie.validated().unwrap_err().to_body();
        let fields: Vec<&str> = body["details"]
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["field"].as_str().unwrap())
            .collect();
        assert_eq!(fields, vec!["releaseDate", "genre", "rating"]);
    }

    #[test]
    fn changes_only_serialize_present_fields() {
        let changes: MovieChanges =
            serde_json::from_value(json!({"genre": " Sci-Fi ", "budget": 11})).unwrap();
        let doc = changes.validated().unwrap().into_document().unwrap();
        assert_eq!(doc, json!({"genre": "Sci-Fi"}));
    }
}
