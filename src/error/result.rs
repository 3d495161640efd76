//! Result type alias for DataBrain operations.

use super::databrain_error::DataBrainError;

/// Type alias for Results using DataBrainError.
pub type DataBrainResult<T> = Result<T, DataBrainError>;

/// Extension trait for converting domain errors into [`DataBrainError`].
pub trait ResultExt<T> {
    /// Convert the error side into a [`DataBrainError`].
    fn into_databrain(self) -> DataBrainResult<T>;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<DataBrainError>,
{
    fn into_databrain(self) -> DataBrainResult<T> {
        self.map_err(Into::into)
    }
}
