//! Request/response body compression (§4.2): `gzip` and `deflate` are
//! applied to outgoing request bodies when the operation declares a
//! `Content-Encoding`, and undone on incoming response bodies before the
//! content-type codec sees them.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::{DeflateDecoder, GzDecoder};
use flate2::write::{DeflateEncoder, GzEncoder};

use crate::error::{CodecError, CodecResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentEncoding {
    Gzip,
    Deflate,
    Identity,
}

impl ContentEncoding {
    pub fn parse(name: &str) -> ContentEncoding {
        match name.trim().to_ascii_lowercase().as_str() {
            "gzip" | "x-gzip" => ContentEncoding::Gzip,
            "deflate" => ContentEncoding::Deflate,
            _ => ContentEncoding::Identity,
        }
    }

    pub fn header_value(&self) -> Option<&'static str> {
        match self {
            ContentEncoding::Gzip => Some("gzip"),
            ContentEncoding::Deflate => Some("deflate"),
            ContentEncoding::Identity => None,
        }
    }
}

pub fn compress(encoding: ContentEncoding, body: &[u8]) -> CodecResult<Vec<u8>> {
    match encoding {
        ContentEncoding::Identity => Ok(body.to_vec()),
        ContentEncoding::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder
                .write_all(body)
                .map_err(|e| CodecError::DecodeFailed(format!("gzip compression failed: {e}")))?;
            encoder
                .finish()
                .map_err(|e| CodecError::DecodeFailed(format!("gzip compression failed: {e}")))
        }
        ContentEncoding::Deflate => {
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
            encoder
                .write_all(body)
                .map_err(|e| CodecError::DecodeFailed(format!("deflate compression failed: {e}")))?;
            encoder
                .finish()
                .map_err(|e| CodecError::DecodeFailed(format!("deflate compression failed: {e}")))
        }
    }
}

pub fn decompress(encoding: ContentEncoding, body: &[u8]) -> CodecResult<Vec<u8>> {
    match encoding {
        ContentEncoding::Identity => Ok(body.to_vec()),
        ContentEncoding::Gzip => {
            let mut out = Vec::new();
            GzDecoder::new(body)
                .read_to_end(&mut out)
                .map_err(|e| CodecError::DecodeFailed(format!("gzip decompression failed: {e}")))?;
            Ok(out)
        }
        ContentEncoding::Deflate => {
            let mut out = Vec::new();
            DeflateDecoder::new(body)
                .read_to_end(&mut out)
                .map_err(|e| CodecError::DecodeFailed(format!("deflate decompression failed: {e}")))?;
            Ok(out)
        }
    }
}
