use thiserror::Error;

/// Failures reported when the camera capture pipeline cannot be acquired.
///
/// Every variant carries a message the operator can act on; the rest of the
/// session keeps working while the camera is unavailable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CameraError {
    #[error("camera permission was denied; allow camera access in the browser settings")]
    PermissionDenied,

    #[error("no camera device was found")]
    DeviceNotFound,

    #[error("the camera could not be started: {0}")]
    Unavailable(String),
}

impl CameraError {
    /// Classify a failure name reported by a browser media stack
    /// (`NotAllowedError`, `NotFoundError`, ...).
    pub fn from_browser_error(raw: &str) -> Self {
        if raw.contains("NotAllowedError") || raw.contains("Permission") {
            CameraError::PermissionDenied
        } else if raw.contains("NotFoundError") {
            CameraError::DeviceNotFound
        } else {
            CameraError::Unavailable(raw.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("no asset data is loaded; upload a master file or connect to the cloud sheet first")]
    EmptyStore,

    #[error("enter at least one management number")]
    NoIdentifiers,

    #[error("none of the management numbers were found: {}", .0.join(", "))]
    NoMatches(Vec<String>),

    #[error("invalid service URL: {0}")]
    InvalidServiceUrl(String),

    #[error("no remote service is configured")]
    NoRemote,

    #[error("unsupported file: {0}")]
    UnsupportedFile(String),

    #[error("both center and zone must be provided")]
    MissingLocation,

    #[error("there are no audited rows to send")]
    NothingToSync,

    #[error("an audit sync is already in progress")]
    SyncInProgress,

    #[error("no scanned code is under review")]
    NotReviewing,

    #[error("the scanned code did not match any record")]
    NoMatchToConfirm,

    #[error(transparent)]
    Camera(#[from] CameraError),

    #[cfg(feature = "web")]
    #[error("network request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("remote service rejected the request ({status}): {body}")]
    Remote { status: u16, body: String },

    #[error("remote sheet is missing {} synced row(s): {}", missing.len(), missing.join(", "))]
    ReadbackMismatch { missing: Vec<String> },

    #[error("failed to read spreadsheet: {0}")]
    Import(String),

    #[cfg(feature = "web")]
    #[error("failed to write spreadsheet: {0}")]
    Export(#[from] rust_xlsxwriter::XlsxError),

    #[cfg(feature = "web")]
    #[error("failed to encode QR code: {0}")]
    Qr(#[from] qrcode::types::QrError),

    #[cfg(feature = "web")]
    #[error("failed to encode image: {0}")]
    Image(#[from] image::ImageError),

    #[cfg(feature = "web")]
    #[error("failed to render template: {0}")]
    Template(#[from] handlebars::RenderError),

    #[error("session state is unavailable")]
    Poisoned,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid snapshot: {0}")]
    Snapshot(#[from] bincode::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl AppError {
    /// Input errors are caught before any lookup or sync and never mutate state.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            AppError::EmptyStore
                | AppError::NoIdentifiers
                | AppError::NoMatches(_)
                | AppError::InvalidServiceUrl(_)
                | AppError::NoRemote
                | AppError::UnsupportedFile(_)
                | AppError::MissingLocation
                | AppError::NothingToSync
                | AppError::NotReviewing
                | AppError::NoMatchToConfirm
        )
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn browser_errors_are_classified() {
        assert_eq!(
            CameraError::from_browser_error("NotAllowedError: Permission denied"),
            CameraError::PermissionDenied
        );
        assert_eq!(
            CameraError::from_browser_error("NotFoundError: Requested device not found"),
            CameraError::DeviceNotFound
        );
        assert!(matches!(
            CameraError::from_browser_error("OverconstrainedError"),
            CameraError::Unavailable(_)
        ));
    }

    #[test]
    fn readback_mismatch_lists_rows() {
        let err = AppError::ReadbackMismatch {
            missing: vec!["A1".into(), "B2".into()],
        };
        assert_eq!(err.to_string(), "remote sheet is missing 2 synced row(s): A1, B2");
    }
}
