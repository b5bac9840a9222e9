use thiserror::Error;

/// Failures the gateway pipeline can produce.
///
/// `Crypto` is opaque: bad key, corrupted ciphertext, bad padding
/// and a foreign app id all collapse into the same variant.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Signature mismatch")]
    SignatureMismatch,

    #[error("Decryption failed")]
    Crypto,

    #[error("Malformed XML: {0}")]
    MalformedXml(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    /// HTTP status the callback endpoint answers with for this failure.
    pub fn http_status(&self) -> u16 {
        match self {
            GatewayError::SignatureMismatch | GatewayError::Crypto => 403,
            GatewayError::MalformedXml(_) => 400,
            GatewayError::Config(_) | GatewayError::Io(_) => 500,
        }
    }
}

pub type Result<T, E = GatewayError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        assert_eq!(
            GatewayError::SignatureMismatch.to_string(),
            "Signature mismatch"
        );
        assert_eq!(GatewayError::Crypto.to_string(), "Decryption failed");

        let e = GatewayError::MalformedXml("unexpected eof".into());
        assert_eq!(e.to_string(), "Malformed XML: unexpected eof");

        let e = GatewayError::Config("missing token".into());
        assert_eq!(e.to_string(), "Config error: missing token");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "not found");
        let e: GatewayError = io_err.into();
        assert!(e.to_string().contains("not found"));
        assert_eq!(e.http_status(), 500);
    }

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(GatewayError::SignatureMismatch.http_status(), 403);
        assert_eq!(GatewayError::Crypto.http_status(), 403);
        assert_eq!(GatewayError::MalformedXml(String::new()).http_status(), 400);
        assert_eq!(GatewayError::Config(String::new()).http_status(), 500);
    }
}
