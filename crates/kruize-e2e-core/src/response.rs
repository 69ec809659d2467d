//! Response envelopes and the assertions scenarios make on them.
//!
//! Write operations answer with
//! `{"status", "message", "httpcode"?, "data": [{"errors": [...]}, ...]}`;
//! read operations answer with the resource JSON itself.

use serde::Deserialize;
use serde_json::Value;

use crate::client::ApiResponse;
use crate::error::{HarnessError, Result};
use crate::messages::{ERROR_STATUS, SUCCESS_STATUS};

/// One per-record error inside `data[].errors`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecordError {
    pub message: String,
    #[serde(default)]
    pub httpcode: Option<u16>,
}

/// One entry of `data` in a bulk response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecordOutcome {
    #[serde(default)]
    pub experiment_name: Option<String>,
    #[serde(default)]
    pub interval_start_time: Option<String>,
    #[serde(default)]
    pub interval_end_time: Option<String>,
    #[serde(default)]
    pub errors: Vec<RecordError>,
}

/// Envelope of a write operation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Envelope {
    pub status: String,
    pub message: String,
    #[serde(default)]
    pub httpcode: Option<u16>,
    #[serde(default)]
    pub data: Vec<RecordOutcome>,
}

impl Envelope {
    pub fn parse(response: &ApiResponse, operation: &str) -> Result<Self> {
        serde_json::from_value(response.body.clone()).map_err(|e| {
            HarnessError::check(format!(
                "{operation}: response is not a status envelope ({e}): {}",
                response.body
            ))
        })
    }

    /// Every per-record error, in order.
    pub fn record_errors(&self) -> impl Iterator<Item = &RecordError> {
        self.data.iter().flat_map(|record| record.errors.iter())
    }

    pub fn find_error(&self, needle: &str) -> Option<&RecordError> {
        self.record_errors().find(|e| e.message.contains(needle))
    }

    /// At least one record error contains `needle`.
    pub fn expect_error_containing(&self, operation: &str, needle: &str) -> Result<&RecordError> {
        self.find_error(needle).ok_or_else(|| HarnessError::UnexpectedField {
            operation: operation.to_string(),
            field: "data[].errors[].message".into(),
            expected: format!("an error containing '{needle}'"),
            actual: self.error_summary(),
        })
    }

    /// Every record error equals `message` and carries `httpcode`; there is at least one.
    pub fn expect_all_errors(&self, operation: &str, message: &str, httpcode: u16) -> Result<()> {
        let mut seen = 0usize;
        for error in self.record_errors() {
            seen += 1;
            if error.message != message {
                return Err(field_error(
                    operation,
                    "data[].errors[].message",
                    message,
                    &error.message,
                ));
            }
            if error.httpcode != Some(httpcode) {
                return Err(field_error(
                    operation,
                    "data[].errors[].httpcode",
                    &httpcode.to_string(),
                    &format!("{:?}", error.httpcode),
                ));
            }
        }
        if seen == 0 {
            return Err(HarnessError::check(format!("{operation}: no record errors in response")));
        }
        Ok(())
    }

    /// The first error of the first record reads exactly `message`.
    pub fn expect_first_error(&self, operation: &str, message: &str) -> Result<()> {
        match self.record_errors().next() {
            Some(error) if error.message == message => Ok(()),
            Some(error) => Err(field_error(
                operation,
                "data[0].errors[0].message",
                message,
                &error.message,
            )),
            None => Err(HarnessError::check(format!("{operation}: no record errors in response"))),
        }
    }

    fn error_summary(&self) -> String {
        let messages: Vec<&str> = self.record_errors().map(|e| e.message.as_str()).collect();
        format!("{messages:?}")
    }
}

fn field_error(operation: &str, field: &str, expected: &str, actual: &str) -> HarnessError {
    HarnessError::UnexpectedField {
        operation: operation.to_string(),
        field: field.to_string(),
        expected: expected.to_string(),
        actual: actual.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Assertions
// ---------------------------------------------------------------------------

pub fn expect_status(response: &ApiResponse, operation: &str, expected: u16) -> Result<()> {
    if response.status == expected {
        Ok(())
    } else {
        Err(HarnessError::UnexpectedStatus {
            operation: operation.to_string(),
            expected,
            actual: response.status,
            body: response.body.to_string(),
        })
    }
}

/// Status code, `SUCCESS` status and the exact message.
pub fn expect_success(
    response: &ApiResponse,
    operation: &str,
    status_code: u16,
    message: &str,
) -> Result<Envelope> {
    expect_status(response, operation, status_code)?;
    let envelope = Envelope::parse(response, operation)?;
    if envelope.status != SUCCESS_STATUS {
        return Err(field_error(operation, "status", SUCCESS_STATUS, &envelope.status));
    }
    if envelope.message != message {
        return Err(field_error(operation, "message", message, &envelope.message));
    }
    Ok(envelope)
}

/// Status code, `ERROR` status and a message containing `message_part`.
pub fn expect_error(
    response: &ApiResponse,
    operation: &str,
    status_code: u16,
    message_part: &str,
) -> Result<Envelope> {
    expect_status(response, operation, status_code)?;
    let envelope = Envelope::parse(response, operation)?;
    if envelope.status != ERROR_STATUS {
        return Err(field_error(operation, "status", ERROR_STATUS, &envelope.status));
    }
    if !envelope.message.contains(message_part) {
        return Err(field_error(
            operation,
            "message",
            &format!("...{message_part}..."),
            &envelope.message,
        ));
    }
    Ok(envelope)
}

/// Read operation: status code and a JSON array body.
pub fn expect_array<'a>(
    response: &'a ApiResponse,
    operation: &str,
    status_code: u16,
) -> Result<&'a [Value]> {
    expect_status(response, operation, status_code)?;
    response
        .body
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| field_error(operation, "body", "a JSON array", &response.body.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn bulk_failure() -> ApiResponse {
        ApiResponse::new(
            400,
            json!({
                "status": "ERROR",
                "message": failed_records(3, 2),
                "httpcode": 400,
                "data": [
                    {
                        "experiment_name": "a",
                        "errors": [{"message": DUPLICATE_RECORDS_MSG, "httpcode": 409}]
                    },
                    {
                        "experiment_name": "b",
                        "errors": [{"message": KUBERNETES_OBJECT_TYPE_MISMATCH, "httpcode": 400}]
                    }
                ]
            }),
        )
    }

    #[test]
    fn test_expect_success_checks_message() {
        let response = ApiResponse::new(
            201,
            json!({"status": "SUCCESS", "message": CREATE_EXP_SUCCESS_MSG}),
        );
        assert!(expect_success(&response, "create", 201, CREATE_EXP_SUCCESS_MSG).is_ok());

        let err = expect_success(&response, "create", 201, DELETE_EXP_SUCCESS_MSG).unwrap_err();
        assert!(
            matches!(err, HarnessError::UnexpectedField { ref field, .. } if field == "message")
        );
        assert!(err.is_assertion());
    }

    #[test]
    fn test_wrong_status_code() {
        let err = expect_error(&bulk_failure(), "update", 201, "").unwrap_err();
        match err {
            HarnessError::UnexpectedStatus {
                expected, actual, ..
            } => assert_eq!((expected, actual), (201, 400)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_error_scanning() {
        let envelope = expect_error(&bulk_failure(), "update", 400, "2 failed to save").unwrap();
        assert_eq!(envelope.record_errors().count(), 2);
        assert_eq!(
            envelope.expect_error_containing("update", "MisMatched").unwrap().httpcode,
            Some(400)
        );
        assert!(envelope.expect_error_containing("update", "zero").is_err());
        assert!(envelope.expect_all_errors("update", DUPLICATE_RECORDS_MSG, 409).is_err());
        assert!(envelope.expect_first_error("update", DUPLICATE_RECORDS_MSG).is_ok());
        assert!(envelope.expect_first_error("update", KUBERNETES_OBJECT_TYPE_MISMATCH).is_err());
    }

    #[test]
    fn test_expect_all_errors_requires_some() {
        let envelope = Envelope {
            status: ERROR_STATUS.into(),
            message: String::new(),
            httpcode: None,
            data: vec![],
        };
        assert!(envelope.expect_all_errors("update", DUPLICATE_RECORDS_MSG, 409).is_err());
    }

    #[test]
    fn test_expect_array() {
        let response = ApiResponse::new(200, json!([{"a": 1}]));
        assert_eq!(expect_array(&response, "list", 200).unwrap().len(), 1);
        assert!(expect_array(&ApiResponse::new(200, json!({})), "list", 200).is_err());
    }
}
