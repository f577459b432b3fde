use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::SessionError;

/// Decodes a text frame into encoded image bytes.
///
/// Accepts a data URL (`data:image/jpeg;base64,<payload>`, payload taken
/// after the first comma) or bare base64.
pub fn decode_frame(text: &str) -> Result<Vec<u8>, SessionError> {
    let payload = match text.split_once(',') {
        Some((_, payload)) => payload,
        None => text,
    };
    let payload = payload.trim();
    if payload.is_empty() {
        return Err(SessionError::FrameDecode("empty payload".into()));
    }
    STANDARD
        .decode(payload)
        .map_err(|e| SessionError::FrameDecode(e.to_string()))
}
