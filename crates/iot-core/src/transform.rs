use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("serialization failed: {0}")]
    Serialize(String),
}

/// Models the publisher's `T -> bytes` step as a function object.
/// Implementations should avoid closing over mutable state — a transform
/// is expected to be a pure, repeatable mapping from one sample to one
/// wire payload.
pub trait Transform<T>: Send + Sync {
    fn transform(&self, payload: &T) -> Result<Vec<u8>, TransformError>;
}

impl<T, F> Transform<T> for F
where
    F: Fn(&T) -> Result<Vec<u8>, TransformError> + Send + Sync,
{
    fn transform(&self, payload: &T) -> Result<Vec<u8>, TransformError> {
        self(payload)
    }
}
