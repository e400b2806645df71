//! Request attachments: enumerated types and content-types validated
//! against fixed allow-lists (§3 `Attachment`). A violation is a 422
//! `InvalidAttachment`, never a silent drop.

use crate::error::GatewayError;
use serde::{Deserialize, Serialize};

const ALLOWED_ATTACHMENT_TYPES: &[&str] = &["log", "configuration", "stack_trace", "test_output"];

const ALLOWED_CONTENT_TYPES: &[&str] = &[
    "text/plain",
    "application/json",
    "application/yaml",
    "application/xml",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub attachment_type: String,
    pub content_type: String,
    pub content: String,
}

impl Attachment {
    pub fn validate(&self) -> Result<(), GatewayError> {
        if !ALLOWED_ATTACHMENT_TYPES.contains(&self.attachment_type.as_str()) {
            return Err(GatewayError::InvalidAttachment(format!(
                "unsupported attachment_type \"{}\" — expected one of {ALLOWED_ATTACHMENT_TYPES:?}",
                self.attachment_type
            )));
        }
        if !ALLOWED_CONTENT_TYPES.contains(&self.content_type.as_str()) {
            return Err(GatewayError::InvalidAttachment(format!(
                "unsupported content_type \"{}\" — expected one of {ALLOWED_CONTENT_TYPES:?}",
                self.content_type
            )));
        }
        Ok(())
    }
}

pub fn validate_all(attachments: &[Attachment]) -> Result<(), GatewayError> {
    for attachment in attachments {
        attachment.validate()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Attachment {
        Attachment {
            attachment_type: "log".into(),
            content_type: "text/plain".into(),
            content: "boom".into(),
        }
    }

    #[test]
    fn valid_attachment_passes() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn unknown_attachment_type_rejected() {
        let mut a = valid();
        a.attachment_type = "screenshot".into();
        assert!(matches!(a.validate(), Err(GatewayError::InvalidAttachment(_))));
    }

    #[test]
    fn unknown_content_type_rejected() {
        let mut a = valid();
        a.content_type = "image/png".into();
        assert!(matches!(a.validate(), Err(GatewayError::InvalidAttachment(_))));
    }

    #[test]
    fn validate_all_stops_at_first_violation() {
        let attachments = vec![valid(), Attachment {
            attachment_type: "bogus".into(),
            ..valid()
        }];
        assert!(validate_all(&attachments).is_err());
    }
}
