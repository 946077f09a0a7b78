use thiserror::Error;

#[derive(Error, Debug)]
pub enum SketchError {
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Bucket index {index} out of range, sketch has {m} buckets")]
    BucketOutOfRange { index: u32, m: u32 },
    #[error("Trace I/O error `{0}`")]
    Io(#[from] std::io::Error),
    #[error("Trace parse error at line {line}: {reason}")]
    Parse { line: usize, reason: String },
}

pub type Result<T> = std::result::Result<T, SketchError>;
