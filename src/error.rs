// Pipeline error taxonomy
//
// Every failure that can occur while serving an image request is captured as
// one of these variants on the request context, exactly once, and mapped to
// an HTTP status in the response writer and nowhere else.

use std::fmt;

/// Errors raised while fetching or transforming an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// The directive requested a source backend that is not registered
    InvalidSource { source: String },

    /// The directive requested a source backend on the configured block list
    Forbidden { source: String },

    /// The backend reports the resource does not exist
    NotFound,

    /// A remote fetch or API call failed for a reason other than a missing resource
    UpstreamFailure { message: String },

    /// Fetched content is not one of the recognized input image formats
    UnsupportedFormat { format: String },

    /// A decode, resize, filter or encode operation failed
    CodecFailure { message: String },

    /// A remote fetch unexpectedly returned non-image content
    InvalidContentType { content_type: String },
}

impl PipelineError {
    /// HTTP status code this error maps to.
    pub fn status_code(&self) -> u16 {
        match self {
            PipelineError::InvalidSource { .. } => 400,
            PipelineError::Forbidden { .. } => 403,
            PipelineError::NotFound => 404,
            PipelineError::UpstreamFailure { .. } => 502,
            PipelineError::UnsupportedFormat { .. } => 415,
            PipelineError::CodecFailure { .. } => 500,
            PipelineError::InvalidContentType { .. } => 502,
        }
    }

    /// Short kind tag used in logs and metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::InvalidSource { .. } => "invalid_source",
            PipelineError::Forbidden { .. } => "forbidden",
            PipelineError::NotFound => "not_found",
            PipelineError::UpstreamFailure { .. } => "upstream_failure",
            PipelineError::UnsupportedFormat { .. } => "unsupported_format",
            PipelineError::CodecFailure { .. } => "codec_failure",
            PipelineError::InvalidContentType { .. } => "invalid_content_type",
        }
    }

    pub fn codec(message: impl Into<String>) -> Self {
        PipelineError::CodecFailure {
            message: message.into(),
        }
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        PipelineError::UpstreamFailure {
            message: message.into(),
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::InvalidSource { source } => {
                write!(f, "{} is not a valid source", source)
            }
            PipelineError::Forbidden { source } => {
                write!(f, "{} is an excluded source", source)
            }
            PipelineError::NotFound => write!(f, "image not found"),
            PipelineError::UpstreamFailure { message } => {
                write!(f, "Upstream fetch failed: {}", message)
            }
            PipelineError::UnsupportedFormat { format } => {
                write!(f, "The listed format ({}) is not valid", format)
            }
            PipelineError::CodecFailure { message } => {
                write!(f, "Image processing failed: {}", message)
            }
            PipelineError::InvalidContentType { content_type } => {
                write!(f, "Invalid content type: {}", content_type)
            }
        }
    }
}

impl std::error::Error for PipelineError {}
