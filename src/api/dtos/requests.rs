use serde::Deserialize;
use serde_json::Value;

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct ResetPasswordRequest {
    pub password: String,
    #[serde(alias = "passwordConfirm")]
    pub password_confirm: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct UpdatePasswordRequest {
    #[serde(alias = "passwordCurrent")]
    pub password_current: String,
    pub password: String,
    #[serde(alias = "passwordConfirm")]
    pub password_confirm: String,
}

/// Self-service profile edit. Anything beyond name and email is dropped,
/// password fields are refused outright.
#[derive(Deserialize, Default)]
pub struct UpdateMeRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<Value>,
    #[serde(alias = "passwordConfirm")]
    pub password_confirm: Option<Value>,
}

impl UpdateMeRequest {
    pub fn touches_password(&self) -> bool {
        self.password.is_some() || self.password_confirm.is_some()
    }
}

#[derive(Deserialize)]
pub struct CreateReviewRequest {
    pub review: Option<String>,
    pub rating: Option<i32>,
    #[serde(alias = "tour")]
    pub tour_id: Option<String>,
}

/// Form posted from the account page.
#[derive(Deserialize)]
pub struct UserDataForm {
    pub name: String,
    pub email: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct AlertQuery {
    pub alert: Option<String>,
}
