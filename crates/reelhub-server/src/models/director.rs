use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Violations;
use crate::error::ApiError;

pub const SORTABLE_FIELDS: &[&str] = &[
    "firstName",
    "lastName",
    "birthDate",
    "createdAt",
    "updatedAt",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Director {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDirector {
    pub first_name: String,
    pub last_name: String,
    pub birth_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

impl NewDirector {
    pub fn validated(mut self) -> Result<Self, ApiError> {
        self.first_name = self.first_name.trim().to_string();
        self.last_name = self.last_name.trim().to_string();
        self.birth_date = self.birth_date.trim().to_string();
        self.bio = self.bio.map(|bio| bio.trim().to_string());

        let mut v = Violations::default();
        v.text("firstName", &self.first_name, 100);
        v.text("lastName", &self.last_name, 100);
        v.date("birthDate", &self.birth_date);
        if let Some(bio) = &self.bio {
            v.text("bio", bio, 1000);
        }
        v.finish()?;
        Ok(self)
    }

    pub fn into_document(self) -> Result<Value, ApiError> {
        to_document(&self)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectorChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

impl DirectorChanges {
    pub fn validated(mut self) -> Result<Self, ApiError> {
        for field in [
            &mut self.first_name,
            &mut self.last_name,
            &mut self.birth_date,
            &mut self.bio,
        ]
        .into_iter()
        .flatten()
        {
            *field = field.trim().to_string();
        }

        let mut v = Violations::default();
        if let Some(first_name) = &self.first_name {
            v.text("firstName", first_name, 100);
        }
        if let Some(last_name) = &self.last_name {
            v.text("lastName", last_name, 100);
        }
        if let Some(birth_date) = &self.birth_date {
            v.date("birthDate", birth_date);
        }
        if let Some(bio) = &self.bio {
            v.text("bio", bio, 1000);
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
        reelhub_storage::StorageError::internal(format!("failed to encode director: {e}")).into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn validates_birth_date_and_names() {
        let director: NewDirector = serde_json::from_value(json!({
            "firstName": "Ridley",
            "lastName": " ",
            "birthDate": "1937-11-30"
        }))
        .unwrap();
        let body = director.validated().unwrap_err().to_body();
        assert_eq!(body["details"][0]["field"], "lastName");

        let director: NewDirector = serde_json::from_value(json!({
            "firstName": "Ridley",
            "lastName": "Scott",
            "birthDate": "1937-11-30",
            "bio": "English filmmaker."
        }))
        .unwrap();
        let doc = director.validated().unwrap().into_document().unwrap();
        assert_eq!(doc["bio"], "English filmmaker.");
    }

    #[test]
    fn changes_are_partial() {
        let changes: DirectorChanges =
            serde_json::from_value(json!({"birthDate": "1937-13-01"})).unwrap();
        assert!(changes.validated().is_err());
    }
}
