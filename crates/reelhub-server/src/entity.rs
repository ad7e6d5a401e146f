//! Entity types served by the API.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A resource category with its own collection and cache namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Movies,
    Directors,
}

impl EntityType {
    pub const ALL: [EntityType; 2] = [EntityType::Movies, EntityType::Directors];

    pub const fn as_str(&self) -> &'static str {
        match self {
            EntityType::Movies => "movies",
            EntityType::Directors => "directors",
        }
    }

    /// Document store collection holding this entity.
    pub const fn collection(&self) -> &'static str {
        self.as_str()
    }

    /// Entity types whose cached listings must be dropped when this one changes.
    ///
    /// Movies embed director references, and the relation is declared in both
    /// directions.
    pub fn related(&self) -> &'static [EntityType] {
        match self {
            EntityType::Movies => &[EntityType::Directors],
            EntityType::Directors => &[EntityType::Movies],
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movies" => Ok(EntityType::Movies),
            "directors" => Ok(EntityType::Directors),
            other => Err(format!("unknown entity type '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relations_are_symmetric() {
        for entity in EntityType::ALL {
            for related in entity.related() {
                assert!(related.related().contains(&entity));
                assert_ne!(*related, entity);
            }
        }
    }

    #[test]
    fn parses_path_segments() {
        assert_eq!("movies".parse::<EntityType>().unwrap(), EntityType::Movies);
        assert_eq!(
            "directors".parse::<EntityType>().unwrap(),
            EntityType::Directors
        );
        assert!("Movies".parse::<EntityType>().is_err());
        assert_eq!(EntityType::Directors.to_string(), "directors");
    }
}
