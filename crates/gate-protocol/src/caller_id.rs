//! Calling line identification (`+CLIP:`) notifications
//!
//! After `AT+CLIP=1` the modem follows every `RING` with a line such as:
//!
//! ```text
//! +CLIP: "43000000",128,"",0
//! ```
//!
//! The first field is the calling number, the second the type of address
//! (129 national, 145 international, 128 unknown). Remaining fields are vendor
//! specific and kept only as part of the raw line.

use crate::error::ParseError;

/// Prefix token that marks a caller-ID notification
pub const CLIP_PREFIX: &str = "+CLIP:";

/// Returns true if the trimmed line is a caller-ID notification
pub fn is_caller_id_notification(line: &str) -> bool {
    line.trim().starts_with(CLIP_PREFIX)
}

/// Parsed `+CLIP:` notification
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CallerIdNotification {
    /// Whole trimmed line, used for authorization
    line: String,
    /// Calling number from the first field, if present
    number: Option<String>,
    /// Type of address from the second field, if present
    address_type: Option<u16>,
}

impl CallerIdNotification {
    /// Parse a `+CLIP:` line, rejecting malformed fields
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let line = line.trim();
        let rest = line
            .strip_prefix(CLIP_PREFIX)
            .ok_or_else(|| ParseError::MissingPrefix {
                expected: CLIP_PREFIX,
                line: line.to_string(),
            })?
            .trim_start();

        let (number, tail) = if let Some(quoted) = rest.strip_prefix('"') {
            let end = quoted
                .find('"')
                .ok_or_else(|| ParseError::UnterminatedQuote(line.to_string()))?;
            (&quoted[..end], &quoted[end + 1..])
        } else {
            match rest.find(',') {
                Some(pos) => (rest[..pos].trim(), &rest[pos..]),
                None => (rest.trim(), ""),
            }
        };

        let address_type = match tail.trim_start().strip_prefix(',') {
            Some(fields) => {
                let field = fields.split(',').next().unwrap_or("").trim();
                if field.is_empty() {
                    None
                } else {
                    Some(
                        field
                            .parse::<u16>()
                            .map_err(|_| ParseError::InvalidNumber(field.to_string()))?,
                    )
                }
            }
            None => None,
        };

        Ok(Self {
            line: line.to_string(),
            number: (!number.is_empty()).then(|| number.to_string()),
            address_type,
        })
    }

    /// Build a notification from any line carrying the prefix
    ///
    /// Field extraction failures are logged and leave `number` empty; the raw
    /// line is always kept so authorization still sees the caller's digits.
    pub fn from_line(line: &str) -> Self {
        match Self::parse(line) {
            Ok(clip) => clip,
            Err(e) => {
                tracing::warn!("Failed to parse caller ID fields: {}", e);
                Self {
                    line: line.trim().to_string(),
                    number: None,
                    address_type: None,
                }
            }
        }
    }

    /// The whole trimmed notification line
    pub fn line(&self) -> &str {
        &self.line
    }

    /// The calling number, if the modem reported one
    pub fn number(&self) -> Option<&str> {
        self.number.as_deref()
    }

    /// The type-of-address field
    pub fn address_type(&self) -> Option<u16> {
        self.address_type
    }

    /// True if the number was reported in international format (type 145)
    pub fn is_international(&self) -> bool {
        self.address_type == Some(145)
    }
}
