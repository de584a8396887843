use std::fmt;
use base64::Engine;
use base64::engine::general_purpose;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub trait Cursor: Serialize + DeserializeOwned {}
impl<T> Cursor for T where T: Serialize + DeserializeOwned {}

/// One page of a clustering-ordered scan. `next_cursor` is present exactly
/// when the page is full; its absence signals end-of-data.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub next_cursor: Option<String>,
    pub content: Vec<T>,
}

pub fn decode_cursor<T: Cursor>(base64_cursor: Option<&str>) -> Result<Option<T>, CursorError> {
    match base64_cursor {
        Some(encoded_cursor) => {
            let decoded_bytes = general_purpose::URL_SAFE_NO_PAD.decode(encoded_cursor.as_bytes())?;
            let cursor: T = serde_json::from_slice(&decoded_bytes)?;
            Ok(Some(cursor))
        }
        None => Ok(None),
    }
}

pub fn encode_cursor<T: Cursor>(cursor: &T) -> Result<String, CursorError> {
    let json_bytes = serde_json::to_vec(cursor)?;
    Ok(general_purpose::URL_SAFE_NO_PAD.encode(&json_bytes))
}

#[derive(Debug)]
pub enum CursorError {
    Base64Decode(base64::DecodeError),
    Json(serde_json::Error),
}

impl fmt::Display for CursorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CursorError::Base64Decode(_) => write!(f, "Cursor is not valid base64"),
            CursorError::Json(_) => write!(f, "Cursor payload could not be read as JSON"),
        }
    }
}

impl std::error::Error for CursorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CursorError::Base64Decode(e) => Some(e),
            CursorError::Json(e) => Some(e),
        }
    }
}

impl From<base64::DecodeError> for CursorError {
    fn from(err: base64::DecodeError) -> Self {
        CursorError::Base64Decode(err)
    }
}

impl From<serde_json::Error> for CursorError {
    fn from(err: serde_json::Error) -> Self {
        CursorError::Json(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Probe {
        position: i64,
        label: String,
    }

    #[test]
    fn missing_cursor_decodes_to_none() {
        let decoded: Option<Probe> = decode_cursor(None).unwrap();
        assert!(decoded.is_none());
    }

    #[test]
    fn encoded_cursor_round_trips() {
        let probe = Probe { position: 42, label: "page".to_string() };
        let encoded = encode_cursor(&probe).unwrap();
        let decoded: Option<Probe> = decode_cursor(Some(&encoded)).unwrap();
        assert_eq!(decoded, Some(probe));
    }

    #[test]
    fn garbage_cursor_is_rejected() {
        let result: Result<Option<Probe>, CursorError> = decode_cursor(Some("???definitely not a cursor???"));
        assert!(matches!(result, Err(CursorError::Base64Decode(_))));
    }
}
