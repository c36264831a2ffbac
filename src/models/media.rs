//! Media (catalog entry) model

use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::ToSchema;

/// Kind of lendable media. Drives loan duration and fine rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Book,
    Cd,
    Journal,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Book => "book",
            MediaType::Cd => "cd",
            MediaType::Journal => "journal",
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for MediaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "book" => Ok(MediaType::Book),
            "cd" => Ok(MediaType::Cd),
            "journal" => Ok(MediaType::Journal),
            _ => Err(format!("Invalid media type: {}", s)),
        }
    }
}

// Stored as TEXT
impl sqlx::Type<Postgres> for MediaType {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }
}

impl<'r> Decode<'r, Postgres> for MediaType {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for MediaType {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as Encode<Postgres>>::encode(self.as_str(), buf)
    }
}

/// Media record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Media {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub isbn: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    /// False while an active borrowing references this media
    pub available: bool,
}

/// New catalog entry. Always created available.
#[derive(Debug, Clone, Deserialize)]
pub struct NewMedia {
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub media_type: MediaType,
}

impl NewMedia {
    pub fn new(title: &str, author: &str, isbn: &str, media_type: MediaType) -> Self {
        Self {
            title: title.to_string(),
            author: author.to_string(),
            isbn: isbn.to_string(),
            media_type,
        }
    }
}
