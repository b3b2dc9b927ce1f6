use std::fmt;

/// A field path into an argument tree, e.g. `a.b[0].c`, reported alongside
/// argument-shaped codec errors so the caller can point at the offending
/// value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldPath(pub Vec<String>);

impl FieldPath {
    pub fn root() -> Self {
        FieldPath(Vec::new())
    }

    pub fn field(&self, name: &str) -> Self {
        let mut segs = self.0.clone();
        segs.push(name.to_string());
        FieldPath(segs)
    }

    pub fn index(&self, i: usize) -> Self {
        let mut segs = self.0.clone();
        match segs.last_mut() {
            Some(last) => last.push_str(&format!("[{i}]")),
            None => segs.push(format!("[{i}]")),
        }
        FieldPath(segs)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "$");
        }
        let mut first = true;
        for seg in &self.0 {
            if seg.starts_with('[') {
                write!(f, "{seg}")?;
            } else {
                if !first {
                    write!(f, ".")?;
                }
                write!(f, "{seg}")?;
            }
            first = false;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CodecError {
    /// Argument type mismatch, missing required field, enum value out of
    /// set, invalid UUID/date, etc. Reported with a field path (§7).
    InvalidArgument { path: FieldPath, message: String },
    UnsupportedContentType(String),
    DecodeFailed(String),
    DataUri(String),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::InvalidArgument { path, message } => {
                write!(f, "invalid argument at {path}: {message}")
            }
            CodecError::UnsupportedContentType(ct) => write!(f, "unsupported content type: {ct}"),
            CodecError::DecodeFailed(msg) => write!(f, "decode failed: {msg}"),
            CodecError::DataUri(msg) => write!(f, "invalid data: URI: {msg}"),
        }
    }
}

impl std::error::Error for CodecError {}

impl CodecError {
    pub fn invalid(path: FieldPath, message: impl Into<String>) -> Self {
        CodecError::InvalidArgument {
            path,
            message: message.into(),
        }
    }
}

pub type CodecResult<T> = Result<T, CodecError>;
