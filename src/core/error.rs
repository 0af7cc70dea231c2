//! Crate-level error type, wrapping `laik_util::Error` the way every
//! downstream LAIK crate does.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
	#[error(transparent)]
	Util(#[from] laik_util::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
