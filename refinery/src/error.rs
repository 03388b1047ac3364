use thiserror::Error;

/// Why a single input line produced no output record.
///
/// These are local outcomes: the driver counts them and moves on. Whole-run
/// failures (missing input file, unwritable output) are `anyhow` errors.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("line could not be interpreted as a mapping by any repair strategy")]
    Unparseable,
    #[error("record has neither `image` nor `input_data.image_context`")]
    MissingImage,
    #[error("record failed structural validation: {0}")]
    InvalidShape(String),
}

impl RecordError {
    /// Short label used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            RecordError::Unparseable => "parse_failure",
            RecordError::MissingImage => "missing_image",
            RecordError::InvalidShape(_) => "invalid_shape",
        }
    }
}

impl From<anyhow::Error> for RecordError {
    fn from(err: anyhow::Error) -> Self {
        RecordError::InvalidShape(format!("{err:#}"))
    }
}
