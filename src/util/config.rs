//! Parsing of the environment variables recognized by the LAIK core.

use std::env;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Selects the transport a LAIK instance hands its `ActionSeq`s to.
///
/// The core never constructs a backend itself -- this only names which one
/// the surrounding application/backend-selection glue should pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
	Mpi,
	Tcp,
	Single,
}

impl FromStr for BackendKind {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self> {
		match s {
			"mpi" => Ok(BackendKind::Mpi),
			"tcp" => Ok(BackendKind::Tcp),
			"single" => Ok(BackendKind::Single),
			other => Err(Error::UnknownBackend(other.to_string())),
		}
	}
}

/// Line-prefix style for log output, selected by the leading `n`/`s` flag of
/// `LAIK_LOG`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogPrefix {
	/// `n` -- no prefix at all.
	None,
	/// `s` -- short prefix (`T<rank>`).
	Short,
	/// default -- long prefix with counters and wall-clock time.
	Long,
}

/// Parsed form of `LAIK_LOG=[n|s]level[:from[-to]]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSpec {
	pub prefix: LogPrefix,
	pub level: u8,
	pub rank_range: Option<(i32, i32)>,
}

impl LogSpec {
	pub fn parse(raw: &str) -> Result<Self> {
		let mut s = raw;
		let prefix = if let Some(rest) = s.strip_prefix('n') {
			s = rest;
			LogPrefix::None
		} else if let Some(rest) = s.strip_prefix('s') {
			s = rest;
			LogPrefix::Short
		} else {
			LogPrefix::Long
		};

		let (level_str, range_str) = match s.split_once(':') {
			Some((l, r)) => (l, Some(r)),
			None => (s, None),
		};

		let level: u8 = level_str
			.parse()
			.map_err(|_| Error::MalformedLogSpec(raw.to_string()))?;

		let rank_range = match range_str {
			None => None,
			Some(r) => match r.split_once('-') {
				Some((from, to)) => {
					let from: i32 = from
						.parse()
						.map_err(|_| Error::MalformedLogSpec(raw.to_string()))?;
					let to: i32 = to
						.parse()
						.map_err(|_| Error::MalformedLogSpec(raw.to_string()))?;
					Some((from, to))
				}
				None => {
					let from: i32 = r
						.parse()
						.map_err(|_| Error::MalformedLogSpec(raw.to_string()))?;
					Some((from, from))
				}
			},
		};

		Ok(LogSpec {
			prefix,
			level,
			rank_range,
		})
	}

	/// Is a message at `level`, emitted by the process with rank `myid`,
	/// shown under this spec?
	pub fn shown(&self, level: u8, myid: i32) -> bool {
		if level < self.level {
			return false;
		}
		if let Some((from, to)) = self.rank_range {
			if myid < from || myid > to {
				return false;
			}
		}
		true
	}
}

/// Environment-derived configuration read once at instance construction,
/// replacing the C core's scattered `getenv()` calls with a single typed
/// struct built at startup.
#[derive(Debug, Clone)]
pub struct EnvConfig {
	pub backend: Option<BackendKind>,
	pub log_spec: Option<LogSpec>,
	pub log_file: Option<String>,
	pub debug_rank: Option<i32>,
}

impl EnvConfig {
	pub fn from_env() -> Result<Self> {
		let backend = match env::var("LAIK_BACKEND") {
			Ok(v) => Some(v.parse()?),
			Err(_) => None,
		};
		let log_spec = match env::var("LAIK_LOG") {
			Ok(v) => Some(LogSpec::parse(&v)?),
			Err(_) => None,
		};
		let log_file = env::var("LAIK_LOG_FILE").ok();
		let debug_rank = env::var("LAIK_DEBUG_RANK")
			.ok()
			.and_then(|v| v.parse().ok());

		Ok(EnvConfig {
			backend,
			log_spec,
			log_file,
			debug_rank,
		})
	}
}
