//! Error types shared by all LAIK crates.

use thiserror::Error;

/// Errors that can be returned to application code.
///
/// Contract violations (bad rank, slice outside space, missing reducer, ...)
/// are *not* represented here: per the engine's error-handling design they
/// are programming errors and always panic at the call site instead.
#[derive(Debug, Error)]
pub enum Error {
	#[error("unknown backend '{0}' requested via LAIK_BACKEND")]
	UnknownBackend(String),

	#[error("malformed LAIK_LOG value '{0}': expected [n|s]level[:from[-to]]")]
	MalformedLogSpec(String),

	#[error("transport error: {0}")]
	Transport(String),

	#[error("{0}")]
	Message(String),
}

impl Error {
	pub fn message(msg: impl Into<String>) -> Self {
		Error::Message(msg.into())
	}
}

pub type Result<T> = std::result::Result<T, Error>;
