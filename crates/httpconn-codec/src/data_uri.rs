//! `data:` URI parsing (§4.1.5): `data:[<media-type>][;<key>=<value>]*[;base64|;ascii],<data>`.
//! Built on the `data-url` crate (used elsewhere in the corpus for the
//! same MIME-aware parsing); inputs without a `data:` prefix are treated
//! as raw base64, matching the multipart upload path (§4.1.2) where a
//! `Bytes` scalar may arrive as either form.

use base64::Engine;

use crate::error::{CodecError, CodecResult};

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDataUri {
    pub media_type: String,
    pub parameters: Vec<(String, String)>,
    pub data: Vec<u8>,
}

pub fn parse_data_uri(input: &str) -> CodecResult<ParsedDataUri> {
    if !input.starts_with("data:") {
        let data = base64::engine::general_purpose::STANDARD
            .decode(input.trim())
            .map_err(|e| CodecError::DataUri(format!("invalid base64: {e}")))?;
        return Ok(ParsedDataUri {
            media_type: "application/octet-stream".to_string(),
            parameters: vec![],
            data,
        });
    }

    let url = data_url::DataUrl::process(input).map_err(|e| CodecError::DataUri(format!("{e:?}")))?;

    let mime = url.mime_type();
    let media_type = format!("{}/{}", mime.type_, mime.subtype);
    let parameters = mime.parameters.clone();

    let (decoded, _fragment) = url
        .decode_to_vec()
        .map_err(|e| CodecError::DataUri(format!("{e:?}")))?;

    Ok(ParsedDataUri {
        media_type,
        parameters,
        data: decoded,
    })
}
