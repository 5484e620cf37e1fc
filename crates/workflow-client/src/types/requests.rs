/*
[INPUT]:  API schema definitions and serde requirements
[OUTPUT]: Typed Rust request structs with serialization support
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When API schema changes or new types added
*/

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartProcessRequest {
    pub process_definition_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompleteTaskRequest {
    pub variables: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_request_wire_name() {
        let body = serde_json::to_value(RefreshTokenRequest {
            refresh_token: "r-1".to_string(),
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"refreshToken": "r-1"}));
    }

    #[test]
    fn test_start_process_omits_empty_fields() {
        let body = serde_json::to_value(StartProcessRequest {
            process_definition_key: "invoice".to_string(),
            business_key: None,
            variables: None,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"processDefinitionKey": "invoice"}));
    }
}
