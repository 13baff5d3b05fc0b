//! Crate-internal prelude.

/// Result alias for epoch-scope operations.
pub(crate) type EngineResult<T> = std::result::Result<T, crate::errors::EngineError>;
