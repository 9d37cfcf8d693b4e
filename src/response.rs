//! Standard response envelope.

use axum::{http::StatusCode, Json};
use serde::Serialize;

pub const SUCCESS_MESSAGE: &str = "success";

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub code: u16,
    pub message: String,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            code: StatusCode::OK.as_u16(),
            message: SUCCESS_MESSAGE.to_string(),
            data,
        }
    }
}

pub fn success<T: Serialize>(data: T) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::OK, Json(ApiResponse::ok(data)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_shape() {
        let body = serde_json::to_value(ApiResponse::ok(json!([1, 2]))).unwrap();
        assert_eq!(body, json!({"code": 200, "message": "success", "data": [1, 2]}));
    }
}
