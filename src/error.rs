use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Bank is not initialized")]
    UninitializedBank,

    #[error("Scan has {actual} ranges, bank expects {expected}")]
    ScanWidthMismatch { expected: usize, actual: usize },

    #[error("Point cloud has no field named {0:?}")]
    MissingField(String),

    #[error("Cannot decode field {field:?} with datatype {datatype}")]
    UnsupportedFieldWidth { field: String, datatype: u8 },

    #[error("Point at byte offset {offset} with length {len} exceeds message data")]
    TruncatedPoint { offset: usize, len: usize },

    #[error("No points inside the height band")]
    NoPointsInBand,

    #[error("Transform {source_frame} -> {target} unavailable at {stamp}")]
    TransformUnavailable {
        target: String,
        source_frame: String,
        stamp: f64,
    },
}
