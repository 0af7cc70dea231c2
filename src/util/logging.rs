//! Thin wrapper around `tracing` used to install the process-wide subscriber
//! exactly once, honoring the `LogSpec` parsed from `LAIK_LOG`.

use std::sync::Once;

use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::config::{LogPrefix, LogSpec};

static INIT: Once = Once::new();

fn level_to_tracing(level: u8) -> Level {
	// LAIK levels count up in verbosity (0 = most verbose); tracing's Level
	// is the other way around, so invert onto a small fixed ladder.
	match level {
		0 => Level::TRACE,
		1 => Level::DEBUG,
		2 => Level::INFO,
		3 => Level::WARN,
		_ => Level::ERROR,
	}
}

/// Install a global `tracing` subscriber once per process. Safe to call
/// from every `Instance::init`; only the first call takes effect.
pub fn init(spec: Option<&LogSpec>) {
	INIT.call_once(|| {
		let level = spec.map(|s| s.level).unwrap_or(2);
		let with_target = !matches!(spec.map(|s| s.prefix), Some(LogPrefix::None));

		let filter = EnvFilter::builder()
			.with_default_directive(level_to_tracing(level).into())
			.from_env_lossy();

		let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(with_target);

		// best-effort: a previous subscriber (e.g. installed by a host
		// application) always wins.
		let _ = builder.try_init();
	});
}
