use crate::llm::{ImageData, Part, Turn};
use crate::storage::{Message, Role};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;

const DEFAULT_MEDIA_TYPE: &str = "image/jpeg";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImageError {
    #[error("image data is empty")]
    Empty,

    #[error("malformed data URI")]
    MalformedUri,

    #[error("unsupported media type '{0}'")]
    UnsupportedMediaType(String),

    #[error("image data is not valid base64")]
    InvalidBase64,
}

/// Parse an uploaded image given either as a `data:<type>;base64,<payload>`
/// URI or as bare base64. Bare payloads are sniffed for PNG, GIF and WebP
/// signatures and otherwise treated as JPEG.
pub fn parse_image(raw: &str) -> Result<ImageData, ImageError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ImageError::Empty);
    }

    let (media_type, payload) = match raw.strip_prefix("data:") {
        Some(rest) => {
            let (header, payload) = rest.split_once(',').ok_or(ImageError::MalformedUri)?;
            let media_type = header
                .strip_suffix(";base64")
                .ok_or(ImageError::MalformedUri)?;
            if !media_type.starts_with("image/") {
                return Err(ImageError::UnsupportedMediaType(media_type.to_string()));
            }
            (Some(media_type.to_string()), payload)
        }
        None => (None, raw),
    };

    let bytes = STANDARD
        .decode(payload)
        .map_err(|_| ImageError::InvalidBase64)?;
    if bytes.is_empty() {
        return Err(ImageError::Empty);
    }

    let media_type = media_type.unwrap_or_else(|| sniff_media_type(&bytes).to_string());

    Ok(ImageData {
        media_type,
        data: payload.to_string(),
    })
}

fn sniff_media_type(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        "image/png"
    } else if bytes.starts_with(b"GIF8") {
        "image/gif"
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "image/webp"
    } else {
        DEFAULT_MEDIA_TYPE
    }
}

/// The user input being sent with this request, not yet persisted.
#[derive(Debug, Clone, Default)]
pub struct PendingInput {
    pub text: String,
    pub image: Option<ImageData>,
}

/// Build the provider turn sequence from stored history and the pending input.
///
/// Messages with neither text nor a readable image are skipped. Consecutive
/// same-role messages are merged so roles alternate, and the result always
/// ends on a user turn.
pub fn format_history(history: &[Message], pending: &PendingInput) -> Vec<Turn> {
    let mut turns: Vec<Turn> = Vec::new();

    for message in history {
        let image = message
            .image_data
            .as_deref()
            .and_then(|raw| match parse_image(raw) {
                Ok(image) => Some(image),
                Err(err) => {
                    tracing::warn!("Dropping unreadable image on message {}: {}", message.id, err);
                    None
                }
            });

        // Nothing to send for this message
        if image.is_none() && message.content.is_empty() {
            tracing::debug!("Skipping empty message {}", message.id);
            continue;
        }

        match turns.last_mut() {
            Some(last) if last.role == message.role => {
                if let Some(image) = image {
                    last.parts.push(Part::Image(image));
                }
                append_text(last, &message.content);
            }
            _ => {
                let mut turn = Turn::new(message.role, Vec::new());
                if let Some(image) = image {
                    turn.parts.push(Part::Image(image));
                }
                append_text(&mut turn, &message.content);
                turns.push(turn);
            }
        }
    }

    let ends_on_user = matches!(turns.last(), Some(turn) if turn.role == Role::User);
    if !ends_on_user {
        turns.push(Turn::new(Role::User, Vec::new()));
    }
    if let Some(last) = turns.last_mut() {
        match &pending.image {
            Some(image) => {
                last.parts.push(Part::Image(image.clone()));
                if !pending.text.is_empty() {
                    last.parts.push(Part::Text(pending.text.clone()));
                }
            }
            None => append_text(last, &pending.text),
        }
    }

    turns
}

/// Join text onto the turn's trailing text part, or start a new one.
fn append_text(turn: &mut Turn, text: &str) {
    if text.is_empty() {
        return;
    }
    match turn.parts.last_mut() {
        Some(Part::Text(existing)) => {
            existing.push_str("\n\n");
            existing.push_str(text);
        }
        _ => turn.parts.push(Part::Text(text.to_string())),
    }
}
