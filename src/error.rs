//! Error types for certificate renewal.
//!
//! This module defines every failure a renewal cycle can hit, from the
//! non-fatal expiration probe to console automation, the external issuance
//! tool, and missing artifacts before installation.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type alias using [`RenewError`].
pub type Result<T> = std::result::Result<T, RenewError>;

/// Errors that can occur during a renewal cycle.
#[derive(Debug, Error)]
pub enum RenewError {
    /// Connection, handshake, or parse failure while probing the device.
    ///
    /// Never fatal: the probe turns it into an unknown expiration.
    #[error("Probe failed: {0}")]
    Probe(String),

    /// A console interaction step did not resolve or respond.
    #[error("Console step '{step}' failed: {message}")]
    Automation {
        /// Label of the step that failed.
        step: String,
        /// Underlying driver message.
        message: String,
    },

    /// The console did not deliver a download in time.
    #[error("Console step '{step}' timed out after {}s waiting for download", timeout.as_secs())]
    DownloadTimeout {
        /// Label of the step that triggered the download.
        step: String,
        /// Timeout that elapsed.
        timeout: Duration,
    },

    /// The external issuance tool could not be run or exited nonzero.
    #[error("{tool} failed (exit status {}): {stderr}", status.map(|s| s.to_string()).unwrap_or_else(|| "none".to_string()))]
    ExternalTool {
        /// Tool name.
        tool: String,
        /// Exit code, if the process ran to completion.
        status: Option<i32>,
        /// Captured diagnostic output.
        stderr: String,
    },

    /// Required artifact files are absent.
    #[error("Precondition failed, missing artifact(s): {}", display_paths(missing))]
    Precondition {
        /// Paths that were expected but not found.
        missing: Vec<PathBuf>,
    },

    /// Invalid or incomplete configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The invalid-certificate marker could not be read or written.
    #[error("Marker error: {0}")]
    Marker(String),

    /// TLS configuration error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Failed to parse an X.509 certificate.
    #[error("Certificate parsing error: {0}")]
    CertificateParsing(String),

    /// Invalid PEM data.
    #[error("Invalid PEM data: {0}")]
    InvalidPem(String),

    /// URL parsing error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl RenewError {
    /// Create a probe error with the given message.
    pub fn probe(msg: impl Into<String>) -> Self {
        Self::Probe(msg.into())
    }

    /// Create an automation error for the named step.
    pub fn automation(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Automation {
            step: step.into(),
            message: message.into(),
        }
    }

    /// Create a download timeout error for the named step.
    pub fn download_timeout(step: impl Into<String>, timeout: Duration) -> Self {
        Self::DownloadTimeout {
            step: step.into(),
            timeout,
        }
    }

    /// Create an external tool error.
    pub fn external_tool(
        tool: impl Into<String>,
        status: Option<i32>,
        stderr: impl Into<String>,
    ) -> Self {
        Self::ExternalTool {
            tool: tool.into(),
            status,
            stderr: stderr.into(),
        }
    }

    /// Create a precondition error listing the missing files.
    pub fn precondition(missing: Vec<PathBuf>) -> Self {
        Self::Precondition { missing }
    }

    /// Create a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a marker error with the given message.
    pub fn marker(msg: impl Into<String>) -> Self {
        Self::Marker(msg.into())
    }

    /// Create a TLS error with the given message.
    pub fn tls(msg: impl Into<String>) -> Self {
        Self::Tls(msg.into())
    }

    /// Create a certificate parsing error with the given message.
    pub fn certificate_parsing(msg: impl Into<String>) -> Self {
        Self::CertificateParsing(msg.into())
    }

    /// Create an invalid PEM error.
    pub fn invalid_pem(msg: impl Into<String>) -> Self {
        Self::InvalidPem(msg.into())
    }

    /// Returns true if this error must abort the current stage.
    ///
    /// Only probe failures are informational.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Probe(_))
    }

    /// Returns the console step label for automation failures.
    pub fn step(&self) -> Option<&str> {
        match self {
            Self::Automation { step, .. } | Self::DownloadTimeout { step, .. } => Some(step),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RenewError::automation("sign-in", "element not found");
        assert_eq!(
            err.to_string(),
            "Console step 'sign-in' failed: element not found"
        );

        let err = RenewError::download_timeout("save-csr", Duration::from_secs(30));
        assert_eq!(
            err.to_string(),
            "Console step 'save-csr' timed out after 30s waiting for download"
        );

        let err = RenewError::external_tool("certbot", Some(1), "rate limited");
        assert_eq!(
            err.to_string(),
            "certbot failed (exit status 1): rate limited"
        );

        let err = RenewError::external_tool("certbot", None, "not found");
        assert_eq!(err.to_string(), "certbot failed (exit status none): not found");
    }

    #[test]
    fn test_precondition_lists_files() {
        let err = RenewError::precondition(vec![
            PathBuf::from("issued_0000_cert.pem"),
            PathBuf::from("issued_0001_chain.pem"),
        ]);
        assert_eq!(
            err.to_string(),
            "Precondition failed, missing artifact(s): issued_0000_cert.pem, issued_0001_chain.pem"
        );
    }

    #[test]
    fn test_is_fatal() {
        assert!(!RenewError::probe("connection refused").is_fatal());
        assert!(RenewError::automation("x", "y").is_fatal());
        assert!(RenewError::precondition(Vec::new()).is_fatal());
    }

    #[test]
    fn test_step() {
        assert_eq!(RenewError::automation("open-security-menu", "x").step(), Some("open-security-menu"));
        assert_eq!(RenewError::config("x").step(), None);
    }
}
