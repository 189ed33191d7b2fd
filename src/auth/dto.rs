use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::auth::repo_types::{LoginAttempt, NewUser, ProfileUpdate, RegistrationRow, User};

/// Registration form payload. Every field is defaulted so a partial
/// submission deserializes and the handler can report the full list of
/// missing fields, as the form UI expects.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: String,
    pub gender: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zipcode: String,
    pub country: String,
    pub username: String,
    pub password: String,
    pub confirm_password: String,
    pub terms: bool,
    pub privacy: bool,
    pub newsletter: bool,
}

impl RegisterRequest {
    /// Names of required fields that are empty or unchecked, in form
    /// order, camelCased as the client sent them.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let checks = [
            ("firstName", !self.first_name.is_empty()),
            ("lastName", !self.last_name.is_empty()),
            ("dateOfBirth", !self.date_of_birth.is_empty()),
            ("gender", !self.gender.is_empty()),
            ("email", !self.email.is_empty()),
            ("phone", !self.phone.is_empty()),
            ("address", !self.address.is_empty()),
            ("city", !self.city.is_empty()),
            ("state", !self.state.is_empty()),
            ("zipcode", !self.zipcode.is_empty()),
            ("country", !self.country.is_empty()),
            ("username", !self.username.is_empty()),
            ("password", !self.password.is_empty()),
            ("confirmPassword", !self.confirm_password.is_empty()),
            ("terms", self.terms),
            ("privacy", self.privacy),
        ];
        checks
            .iter()
            .filter(|(_, present)| !present)
            .map(|(name, _)| *name)
            .collect()
    }

    pub fn into_new_user(self, password_hash: String) -> NewUser {
        NewUser {
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            username: self.username,
            password_hash,
            phone: self.phone,
            address: self.address,
            city: self.city,
            state: self.state,
            zipcode: self.zipcode,
            country: self.country,
            date_of_birth: self.date_of_birth,
            gender: self.gender,
            newsletter: self.newsletter,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub remember_me: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub reset_token: String,
    #[serde(default)]
    pub new_password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateProfileRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zipcode: String,
    pub country: String,
}

impl UpdateProfileRequest {
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let checks = [
            ("firstName", !self.first_name.is_empty()),
            ("lastName", !self.last_name.is_empty()),
            ("email", !self.email.is_empty()),
            ("phone", !self.phone.is_empty()),
            ("address", !self.address.is_empty()),
            ("city", !self.city.is_empty()),
            ("state", !self.state.is_empty()),
            ("zipcode", !self.zipcode.is_empty()),
            ("country", !self.country.is_empty()),
        ];
        checks
            .iter()
            .filter(|(_, present)| !present)
            .map(|(name, _)| *name)
            .collect()
    }

    pub fn into_update(self) -> ProfileUpdate {
        ProfileUpdate {
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            phone: self.phone,
            address: self.address,
            city: self.city,
            state: self.state,
            zipcode: self.zipcode,
            country: self.country,
        }
    }
}

/// Public part of the user returned to the client. Field names match the
/// login response the form UI consumes.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub username: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zipcode: String,
    pub country: String,
    pub date_of_birth: String,
    pub gender: String,
    pub newsletter: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub registration_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_login: Option<OffsetDateTime>,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            username: user.username,
            phone: user.phone,
            address: user.address,
            city: user.city,
            state: user.state,
            zipcode: user.zipcode,
            country: user.country,
            date_of_birth: user.date_of_birth,
            gender: user.gender,
            newsletter: user.newsletter,
            registration_date: user.registered_at,
            last_login: user.last_login_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub success: bool,
    pub message: String,
    pub user_id: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub success: bool,
    pub message: String,
    pub token: String,
    pub user: PublicUser,
}

/// Response for operations that only need an acknowledgement.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordResponse {
    pub success: bool,
    pub message: String,
    pub reset_token: String,
    pub user_id: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationsResponse {
    pub count: usize,
    pub registrations: Vec<RegistrationRow>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginHistoryResponse {
    pub count: usize,
    pub attempts: Vec<LoginAttempt>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_collects_all_gaps() {
        let payload: RegisterRequest = serde_json::from_str(
            r#"{"firstName": "Alice", "email": "a@x.com", "terms": true}"#,
        )
        .expect("partial payload deserializes");

        let missing = payload.missing_fields();
        assert!(missing.contains(&"lastName"));
        assert!(missing.contains(&"password"));
        assert!(missing.contains(&"privacy"));
        assert!(!missing.contains(&"firstName"));
        assert!(!missing.contains(&"email"));
        assert!(!missing.contains(&"terms"));
        // newsletter is optional
        assert!(!missing.contains(&"newsletter"));
    }

    #[test]
    fn complete_registration_has_no_missing_fields() {
        let payload: RegisterRequest = serde_json::from_str(
            r#"{
                "firstName": "Alice", "lastName": "Doe",
                "dateOfBirth": "1990-01-01", "gender": "female",
                "email": "a@x.com", "phone": "555-0100",
                "address": "1 Main St", "city": "Springfield",
                "state": "IL", "zipcode": "62701", "country": "US",
                "username": "alice01", "password": "Abcdef1!",
                "confirmPassword": "Abcdef1!", "terms": true, "privacy": true
            }"#,
        )
        .expect("payload deserializes");
        assert!(payload.missing_fields().is_empty());
    }

    #[test]
    fn login_request_accepts_camel_case_remember_me() {
        let payload: LoginRequest =
            serde_json::from_str(r#"{"username": "alice01", "password": "x", "rememberMe": true}"#)
                .unwrap();
        assert!(payload.remember_me);
    }

    #[test]
    fn public_user_serializes_camel_case() {
        let user = PublicUser {
            id: 1,
            first_name: "Alice".into(),
            last_name: "Doe".into(),
            email: "a@x.com".into(),
            username: "alice01".into(),
            phone: "555-0100".into(),
            address: "1 Main St".into(),
            city: "Springfield".into(),
            state: "IL".into(),
            zipcode: "62701".into(),
            country: "US".into(),
            date_of_birth: "1990-01-01".into(),
            gender: "female".into(),
            newsletter: true,
            registration_date: OffsetDateTime::UNIX_EPOCH,
            last_login: None,
        };
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["firstName"], "Alice");
        assert_eq!(json["registrationDate"], "1970-01-01T00:00:00Z");
        assert!(json["lastLogin"].is_null());
        assert!(json.get("password").is_none());
        assert!(json.get("passwordHash").is_none());
    }
}
