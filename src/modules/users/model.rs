use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// A user as exposed through the API.
///
/// The directory is an external collaborator; this is the slice of it the
/// authentication pipeline needs.
#[derive(Serialize, Deserialize, FromRow, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub login: String,
    pub name: String,
    pub email: String,
}
