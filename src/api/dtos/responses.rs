use serde::Serialize;

#[derive(Serialize)]
pub struct Data<T> {
    pub data: T,
}

/// `{"status":"success", "results"?, "data":{"data":...}}`
#[derive(Serialize)]
pub struct Envelope<T> {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<usize>,
    pub data: Data<T>,
}

impl<T> Envelope<T> {
    pub fn one(data: T) -> Self {
        Self { status: "success", results: None, data: Data { data } }
    }
}

impl<T> Envelope<Vec<T>> {
    pub fn many(data: Vec<T>) -> Self {
        Self { status: "success", results: Some(data.len()), data: Data { data } }
    }
}

#[derive(Serialize)]
pub struct UserData<T> {
    pub user: T,
}

#[derive(Serialize)]
pub struct TokenResponse<T> {
    pub status: &'static str,
    pub token: String,
    pub data: UserData<T>,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub status: &'static str,
    pub message: String,
}

impl MessageResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self { status: "success", message: message.into() }
    }
}

#[derive(Serialize)]
pub struct SessionResponse<T> {
    pub status: &'static str,
    pub session: T,
}
