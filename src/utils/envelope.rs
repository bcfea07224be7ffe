//! The uniform JSON response shape: `{"status": ..., "res"?: ..., "error"?: ...}`.
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
/// Exactly one of `res` and `error` is populated.
pub struct Envelope<T> {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub res: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> Envelope<T> {
    /// A successful response carrying `res`.
    pub fn ok(res: T) -> Json<Self> {
        Json(Self {
            status: "OK".to_owned(),
            res: Some(res),
            error: None,
        })
    }
}

impl Envelope<()> {
    /// A failed response. `status` is the numeric code as a string.
    pub fn error(status: u16, message: String) -> Json<Self> {
        Json(Self {
            status: status.to_string(),
            res: None,
            error: Some(message),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn only_one_of_res_and_error_is_serialised() {
        let Json(ok) = Envelope::ok(json!({"served": 1}));
        assert_eq!(
            serde_json::to_value(ok).unwrap(),
            json!({"status": "OK", "res": {"served": 1}})
        );
        let Json(err) = Envelope::error(404, "Not found".to_owned());
        assert_eq!(
            serde_json::to_value(err).unwrap(),
            json!({"status": "404", "error": "Not found"})
        );
    }
}
