//! Content codecs for the HTTP connector (§4.1): OpenAPI parameter
//! serialization, schema-aware JSON/XML body encoding, multipart and
//! urlencoded bodies, `data:` URI parsing, and gzip/deflate compression.

pub mod body;
pub mod compression;
pub mod data_uri;
pub mod error;
pub mod json_codec;
pub mod multipart;
pub mod param_encoder;
pub mod scalar_codec;
pub mod urlencoded;
pub mod xml_codec;

pub use body::{EncodedBody, decode_body, decode_body_arbitrary, encode_body};
pub use compression::{ContentEncoding, compress, decompress};
pub use data_uri::{ParsedDataUri, parse_data_uri};
pub use error::{CodecError, CodecResult, FieldPath};
pub use json_codec::{decode_json, encode_json};
pub use multipart::{MultipartPart, encode_multipart, write_multipart_body};
pub use param_encoder::{ParamPair, build_header_value, build_param_query_key, encode_query_values, encode_value};
pub use scalar_codec::{coerce_scalar, stringify_scalar};
pub use urlencoded::encode_urlencoded;
pub use xml_codec::{decode_xml, decode_xml_arbitrary, encode_xml};
