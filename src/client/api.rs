//! Prometheus HTTP API response envelope.
//!
//! Every `/api/v1/query*` endpoint answers with
//! `{"status": "success" | "error", "data": ..., "errorType": ..., "error": ..., "warnings": [...]}`.

use super::{ClientError, QueryData};
use log::warn;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    pub status: Status,
    #[serde(default)]
    pub data: Option<QueryData>,
    #[serde(default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl ApiResponse {
    pub fn into_result(self) -> Result<QueryData, ClientError> {
        for warning in &self.warnings {
            warn!("backend warning: {}", warning);
        }
        match (self.status, self.data) {
            (Status::Success, Some(data)) => Ok(data),
            (Status::Success, None) => Err(ClientError::Transport(
                "successful response without data".to_string(),
            )),
            (Status::Error, _) => Err(ClientError::Backend {
                error_type: self.error_type.unwrap_or_else(|| "unknown".to_string()),
                message: self.error.unwrap_or_default(),
            }),
        }
    }
}

/// Decodes a raw response body into the query result it carries.
pub fn decode(body: &[u8]) -> Result<QueryData, ClientError> {
    let response: ApiResponse = serde_json::from_slice(body)?;
    response.into_result()
}

#[cfg(test)]
pub mod tests {
    use super::decode;
    use crate::client::{ClientError, QueryData};

    #[test]
    fn test_decode_success() {
        let data = decode(
            br#"{
                "status": "success",
                "data": {
                    "resultType": "matrix",
                    "result": [{"metric": {}, "values": [[1641889530, "NaN"]]}]
                }
            }"#,
        )
        .unwrap();
        assert!(matches!(data, QueryData::Matrix(ref s) if s.len() == 1));
    }

    #[test]
    fn test_decode_success_with_warnings() {
        let data = decode(
            br#"{
                "status": "success",
                "warnings": ["partial response"],
                "data": {"resultType": "vector", "result": []}
            }"#,
        )
        .unwrap();
        assert_eq!(data, QueryData::Vector(vec![]));
    }

    #[test]
    fn test_decode_backend_error() {
        let err = decode(
            br#"{
                "status": "error",
                "errorType": "bad_data",
                "error": "parse error at char 4: unexpected end of input"
            }"#,
        )
        .unwrap_err();
        match err {
            ClientError::Backend {
                error_type,
                message,
            } => {
                assert_eq!(error_type, "bad_data");
                assert_eq!(message, "parse error at char 4: unexpected end of input");
            }
            other => panic!("expected backend error, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_missing_data() {
        let err = decode(br#"{"status": "success"}"#).unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));
    }

    #[test]
    fn test_decode_garbage() {
        let err = decode(b"<html>502 Bad Gateway</html>").unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));
    }
}
