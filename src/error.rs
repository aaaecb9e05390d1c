pub type SignSenseResult<T> = Result<T, SignSenseError>;

#[derive(thiserror::Error, Debug)]
pub enum SignSenseError {
    #[error("input validation error: {0}")]
    InputValidation(String),

    #[error("upstream service error (status {status}): {message}")]
    UpstreamService { status: u16, message: String },

    #[error("parse error: {message}")]
    Parse { message: String, raw: String },

    #[error("asset load error for {asset}: {message}")]
    AssetLoad { asset: String, message: String },

    #[error("render error: {0}")]
    Render(String),

    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("document contains no extractable text")]
    EmptyDocument,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SignSenseError {
    pub fn input_validation(msg: impl Into<String>) -> Self {
        Self::InputValidation(msg.into())
    }

    pub fn upstream(status: u16, msg: impl Into<String>) -> Self {
        Self::UpstreamService {
            status,
            message: msg.into(),
        }
    }

    pub fn parse(msg: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
            raw: raw.into(),
        }
    }

    pub fn asset_load(asset: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::AssetLoad {
            asset: asset.into(),
            message: msg.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    pub fn unsupported_file_type(name: impl Into<String>) -> Self {
        Self::UnsupportedFileType(name.into())
    }

    /// Raw upstream text attached to a parse failure, for diagnostics.
    pub fn raw_text(&self) -> Option<&str> {
        match self {
            Self::Parse { raw, .. } => Some(raw),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            SignSenseError::input_validation("x")
                .to_string()
                .contains("input validation error:")
        );
        assert!(
            SignSenseError::upstream(502, "bad gateway")
                .to_string()
                .contains("status 502")
        );
        assert!(SignSenseError::render("x").to_string().contains("render error:"));
        assert!(
            SignSenseError::asset_load("icon:risk", "missing")
                .to_string()
                .contains("icon:risk")
        );
    }

    #[test]
    fn parse_error_keeps_raw_text() {
        let err = SignSenseError::parse("no json object", "Sure! here you go");
        assert_eq!(err.raw_text(), Some("Sure! here you go"));
        assert_eq!(SignSenseError::EmptyDocument.raw_text(), None);
    }

    #[test]
    fn io_errors_convert() {
        let err: SignSenseError = std::io::Error::other("boom").into();
        assert!(err.to_string().contains("boom"));
    }
}
