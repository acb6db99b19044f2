//! Error types for the report export pipeline

use std::borrow::Cow;
use thiserror::Error;

/// Result type alias for export operations
pub type Result<T> = std::result::Result<T, Error>;

/// Failures reported by a [`crate::capture::CaptureBackend`].
///
/// Backends classify their own failures so callers never need to inspect
/// message text to tell an image problem from a canvas problem.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaptureError {
    /// An embedded image could not be decoded or drawn
    #[error("image could not be drawn: {0}")]
    ImageLoad(String),

    /// A cross-origin image would taint the capture surface
    #[error("cross-origin image would taint the capture surface: {0}")]
    Tainted(String),

    /// The capture did not finish in time
    #[error("capture timed out after {0}ms")]
    Timeout(u64),

    /// The requested surface exceeds the backend's canvas limit
    #[error("capture surface {width}x{height} exceeds the canvas limit")]
    CanvasTooLarge { width: u32, height: u32 },

    /// Any other rendering failure
    #[error("rendering failed: {0}")]
    Render(String),
}

/// Errors that can abort an export run
#[derive(Error, Debug)]
pub enum Error {
    /// The report contained no page-marker nodes
    #[error("no report pages were found")]
    NoPagesFound,

    /// A page was hidden at capture time
    #[error("page {index} is hidden and cannot be captured")]
    PageHidden { index: usize },

    /// Both the primary and the degraded capture of the first page failed
    #[error("first page could not be captured (primary: {primary}; fallback: {fallback})")]
    CriticalFirstPage {
        primary: CaptureError,
        #[source]
        fallback: CaptureError,
    },

    /// Capture of a page after the first failed
    #[error("page {index} could not be captured")]
    CaptureFailed {
        index: usize,
        #[source]
        source: CaptureError,
    },

    /// A frame could not be encoded or embedded
    #[error("Encoding failed: {0}")]
    Encode(String),

    /// The output document could not be assembled or serialized
    #[error("Document assembly failed: {0}")]
    Document(String),

    /// The report input could not be parsed
    #[error("Invalid report: {0}")]
    InvalidReport(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// I/O error when writing the document
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        Error::Document(err.to_string())
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::Encode(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidReport(err.to_string())
    }
}

/// Broad failure category used to pick a user-facing message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Image,
    Page,
    NoPages,
    Timeout,
    Capture,
    Generic,
}

impl CaptureError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            CaptureError::ImageLoad(_) | CaptureError::Tainted(_) => ErrorCategory::Image,
            CaptureError::Timeout(_) => ErrorCategory::Timeout,
            CaptureError::CanvasTooLarge { .. } | CaptureError::Render(_) => ErrorCategory::Capture,
        }
    }
}

impl Error {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::NoPagesFound => ErrorCategory::NoPages,
            Error::PageHidden { .. } | Error::CriticalFirstPage { .. } => ErrorCategory::Page,
            Error::CaptureFailed { source, .. } => source.category(),
            Error::Encode(_) => ErrorCategory::Capture,
            _ => ErrorCategory::Generic,
        }
    }
}

fn category_message(category: ErrorCategory) -> &'static str {
    match category {
        ErrorCategory::NoPages => {
            "No report content was found to export. Reload the report and try again."
        }
        ErrorCategory::Page => {
            "The first page of the report could not be generated. Check the header photos and try again."
        }
        ErrorCategory::Image => {
            "Some photos could not be processed. Check your connection and try again."
        }
        ErrorCategory::Timeout => {
            "Generating the document took too long. Try again with fewer photos."
        }
        ErrorCategory::Capture => {
            "The report could not be rendered. Try again or reduce the number of photos."
        }
        ErrorCategory::Generic => "Could not generate the document. Please try again.",
    }
}

/// Map a fatal error to the single message shown to the user.
///
/// Page-specific failures name the page, counted from 1.
pub fn user_message(err: &Error) -> Cow<'static, str> {
    match err {
        Error::PageHidden { index } => Cow::Owned(format!(
            "Page {} of the report is hidden and could not be generated. Make sure the whole report is visible and try again.",
            index + 1
        )),
        Error::CaptureFailed { index, source } => Cow::Owned(format!(
            "Page {} of the report could not be generated. {}",
            index + 1,
            category_message(source.category())
        )),
        _ => Cow::Borrowed(category_message(err.category())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_pages_message_mentions_content() {
        let msg = user_message(&Error::NoPagesFound);
        assert!(msg.contains("No report content"));
    }

    #[test]
    fn capture_failures_are_classified_by_variant() {
        let img = Error::CaptureFailed {
            index: 2,
            source: CaptureError::Tainted("https://cdn/x.jpg".into()),
        };
        assert_eq!(img.category(), ErrorCategory::Image);

        let slow = Error::CaptureFailed {
            index: 2,
            source: CaptureError::Timeout(20000),
        };
        assert_eq!(slow.category(), ErrorCategory::Timeout);

        let canvas = Error::CaptureFailed {
            index: 1,
            source: CaptureError::CanvasTooLarge { width: 1, height: 1 },
        };
        assert_eq!(canvas.category(), ErrorCategory::Capture);
    }

    #[test]
    fn critical_first_page_has_its_own_message() {
        let err = Error::CriticalFirstPage {
            primary: CaptureError::Render("a".into()),
            fallback: CaptureError::Render("b".into()),
        };
        assert!(user_message(&err).contains("first page"));
        assert_ne!(user_message(&err), user_message(&Error::PageHidden { index: 3 }));
    }

    #[test]
    fn page_failures_name_the_page() {
        let hidden = user_message(&Error::PageHidden { index: 1 });
        assert!(hidden.starts_with("Page 2 of the report is hidden"), "{}", hidden);

        let failed = user_message(&Error::CaptureFailed {
            index: 4,
            source: CaptureError::Timeout(20000),
        });
        assert!(failed.starts_with("Page 5 of the report"), "{}", failed);
        assert!(failed.contains("took too long"));
    }

    #[test]
    fn unrecognized_errors_fall_back_to_generic_message() {
        let io = Error::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk"));
        assert_eq!(user_message(&io), "Could not generate the document. Please try again.");
        let cfg = Error::ConfigError("batch_size".into());
        assert_eq!(user_message(&cfg), user_message(&io));
    }
}
