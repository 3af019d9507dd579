use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::repo::{Gender, User};

/// Request body for signup. Fields are optional at the serde level so that
/// an absent key gets the same "All fields are required" answer as an empty
/// one, instead of a deserializer rejection.
#[derive(Debug, Default, Deserialize)]
pub struct SignUpRequest {
    pub username: Option<String>,
    pub name: Option<String>,
    pub password: Option<String>,
    pub gender: Option<Gender>,
}

/// Request body for login.
#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
    pub name: String,
    pub gender: Gender,
    pub profile_picture: String,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            name: user.name,
            gender: user.gender,
            profile_picture: user.profile_picture,
        }
    }
}

/// Response returned after signup and login.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: PublicUser,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}
