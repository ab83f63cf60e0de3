//! Attachment decoding
//!
//! Attachments arrive as `data:<mime>;base64,<payload>` URLs. Anything else
//! (remote URLs, binary payloads) is skipped with a warning; the generator
//! works from the brief alone in that case.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Serialize;
use tracing::{debug, warn};

use pagesmith_utils::error::GeneratorError;
use pagesmith_utils::types::Attachment;

/// What an attachment contains, guessed from its name and media type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Csv,
    Markdown,
    Json,
    Other,
}

impl AttachmentKind {
    fn detect(name: &str, mime: Option<&str>) -> Self {
        let name = name.to_lowercase();
        let mime = mime.unwrap_or_default().to_lowercase();
        if name.ends_with(".csv") || mime == "text/csv" {
            Self::Csv
        } else if name.ends_with(".md") || name.ends_with(".markdown") || mime == "text/markdown" {
            Self::Markdown
        } else if name.ends_with(".json") || mime == "application/json" {
            Self::Json
        } else {
            Self::Other
        }
    }
}

/// A decoded text attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedAttachment {
    pub name: String,
    pub mime: Option<String>,
    pub kind: AttachmentKind,
    pub content: String,
}

/// Decode one `data:` URL attachment.
///
/// # Errors
///
/// Returns `GeneratorError::Attachment` when the URL is not a base64 data
/// URL or the payload is not valid UTF-8.
pub fn decode(attachment: &Attachment) -> Result<DecodedAttachment, GeneratorError> {
    let fail = |reason: &str| GeneratorError::Attachment {
        name: attachment.name.clone(),
        reason: reason.to_string(),
    };

    let rest = attachment
        .url
        .trim()
        .strip_prefix("data:")
        .ok_or_else(|| fail("not a data: URL"))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| fail("missing ',' separator"))?;

    let mut params = header.split(';');
    let mime = params
        .next()
        .filter(|m| !m.is_empty())
        .map(str::to_string);
    if !params.any(|p| p.eq_ignore_ascii_case("base64")) {
        return Err(fail("only base64 data URLs are supported"));
    }

    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = BASE64
        .decode(compact.as_bytes())
        .map_err(|e| fail(&format!("invalid base64: {e}")))?;
    let content = String::from_utf8(bytes).map_err(|_| fail("payload is not UTF-8 text"))?;

    Ok(DecodedAttachment {
        kind: AttachmentKind::detect(&attachment.name, mime.as_deref()),
        name: attachment.name.clone(),
        mime,
        content,
    })
}

/// Decode every attachment that can be decoded, in order.
pub fn decode_all(attachments: &[Attachment]) -> Vec<DecodedAttachment> {
    attachments
        .iter()
        .filter_map(|attachment| match decode(attachment) {
            Ok(decoded) => {
                debug!(
                    name = %decoded.name,
                    bytes = decoded.content.len(),
                    "Decoded attachment"
                );
                Some(decoded)
            }
            Err(e) => {
                warn!(error = %e, "Skipping attachment");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data_url(mime: &str, text: &str) -> String {
        format!("data:{mime};base64,{}", BASE64.encode(text))
    }

    #[test]
    fn decodes_base64_csv() {
        let att = Attachment::new("data.csv", data_url("text/csv", "product,sales\nA,1.5\n"));
        let decoded = decode(&att).unwrap();
        assert_eq!(decoded.kind, AttachmentKind::Csv);
        assert_eq!(decoded.mime.as_deref(), Some("text/csv"));
        assert_eq!(decoded.content, "product,sales\nA,1.5\n");
    }

    #[test]
    fn kind_falls_back_to_media_type() {
        let att = Attachment::new("input", data_url("text/markdown", "# hi"));
        assert_eq!(decode(&att).unwrap().kind, AttachmentKind::Markdown);
        let att = Attachment::new("rates.JSON", data_url("", "{}"));
        assert_eq!(decode(&att).unwrap().kind, AttachmentKind::Json);
    }

    #[test]
    fn rejects_non_data_urls() {
        let att = Attachment::new("img.png", "https://example.com/img.png");
        assert!(matches!(
            decode(&att),
            Err(GeneratorError::Attachment { .. })
        ));
    }

    #[test]
    fn rejects_plain_text_data_urls() {
        let att = Attachment::new("a.txt", "data:text/plain,hello");
        let err = decode(&att).unwrap_err();
        assert!(err.to_string().contains("base64"), "got {err}");
    }

    #[test]
    fn rejects_binary_payloads() {
        let att = Attachment::new("a.bin", format!("data:application/octet-stream;base64,{}", BASE64.encode([0xff, 0xfe, 0x00])));
        assert!(decode(&att).is_err());
    }

    #[test]
    fn decode_all_skips_failures_and_keeps_order() {
        let atts = vec![
            Attachment::new("a.md", data_url("text/markdown", "# A")),
            Attachment::new("bad", "https://example.com"),
            Attachment::new("b.csv", data_url("text/csv", "x\n1")),
        ];
        let decoded = decode_all(&atts);
        let names: Vec<&str> = decoded.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["a.md", "b.csv"]);
    }
}
