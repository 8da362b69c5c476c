//! Machine-readable messages for robot mode.
//!
//! Each message serializes to one JSON object of the shape
//! `{"command": ..., "data": {...}}`.
use flashr_core::{FlashError, FlashResult, ProgressEvent};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", content = "data", rename_all = "lowercase")]
pub enum RobotMessage {
    Progress {
        #[serde(rename = "type")]
        kind: &'static str,
        percentage: u8,
        eta: u64,
        speed: u64,
    },
    #[serde(rename_all = "camelCase")]
    Done {
        passed_validation: bool,
        source_checksum: String,
    },
    Error {
        message: String,
        description: Option<String>,
        code: Option<String>,
    },
}

impl RobotMessage {
    pub fn progress(event: &ProgressEvent) -> Self {
        RobotMessage::Progress {
            kind: event.phase.as_str(),
            percentage: event.percentage(),
            eta: event.eta,
            speed: event.speed.floor().max(0.0) as u64,
        }
    }

    pub fn done(result: &FlashResult) -> Self {
        RobotMessage::Done {
            passed_validation: result.passed_validation,
            source_checksum: result.source_checksum.clone(),
        }
    }

    pub fn error(error: &FlashError) -> Self {
        RobotMessage::Error {
            message: error.message.clone(),
            description: error.description.clone(),
            code: error.code.clone(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, RobotMessage::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flashr_core::Phase;

    fn line(message: &RobotMessage) -> String {
        serde_json::to_string(message).unwrap()
    }

    #[test]
    fn progress_line() {
        let event = ProgressEvent {
            phase: Phase::Write,
            fraction: 0.4567,
            eta: 30,
            speed: 12.9,
        };
        assert_eq!(
            line(&RobotMessage::progress(&event)),
            r#"{"command":"progress","data":{"type":"write","percentage":45,"eta":30,"speed":12}}"#
        );
    }

    #[test]
    fn check_phase_tag() {
        let event = ProgressEvent {
            phase: Phase::Check,
            fraction: 1.0,
            eta: 0,
            speed: 0.4,
        };
        assert_eq!(
            line(&RobotMessage::progress(&event)),
            r#"{"command":"progress","data":{"type":"check","percentage":100,"eta":0,"speed":0}}"#
        );
    }

    #[test]
    fn done_line() {
        let result = FlashResult {
            passed_validation: false,
            source_checksum: "abc123".to_string(),
        };
        assert_eq!(
            line(&RobotMessage::done(&result)),
            r#"{"command":"done","data":{"passedValidation":false,"sourceChecksum":"abc123"}}"#
        );
    }

    #[test]
    fn error_line_uses_null_for_missing_fields() {
        assert_eq!(
            line(&RobotMessage::error(&FlashError::new("Aborted"))),
            r#"{"command":"error","data":{"message":"Aborted","description":null,"code":null}}"#
        );

        let error = FlashError::new("Failed to open /dev/sdz for writing")
            .with_description("Permission denied (os error 13)")
            .with_code("EACCES");
        assert_eq!(
            line(&RobotMessage::error(&error)),
            r#"{"command":"error","data":{"message":"Failed to open /dev/sdz for writing","description":"Permission denied (os error 13)","code":"EACCES"}}"#
        );
    }
}
