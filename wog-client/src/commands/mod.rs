//! One module per `wog` subcommand.

pub mod catalogue;
pub mod cleanup;
pub mod decrypt;
pub mod download;
pub mod info;
pub mod keys;
pub mod migrate;
pub mod run;

use std::process::ExitCode;

use anyhow::{Result, bail};

use crate::pipeline::Coordinator;

/// Exit status for a run stopped by Ctrl-C.
pub const EXIT_CANCELLED: u8 = 130;

/// Weapon set a command operates on: explicit flag values win, then the
/// cached catalogue.
pub(crate) fn resolve_weapons(
    coordinator: &Coordinator,
    explicit: Option<Vec<String>>,
) -> Result<Vec<String>> {
    match explicit {
        Some(weapons) if !weapons.is_empty() => Ok(weapons),
        _ => {
            let cached = coordinator.cached_weapons();
            if cached.is_empty() {
                bail!("no cached catalogue; run `wog catalogue` first or pass --weapons");
            }
            Ok(cached)
        }
    }
}

/// Exit status once per-item failures are tallied under strict mode.
pub(crate) fn strict_exit(strict: bool, had_failures: bool) -> ExitCode {
    if strict && had_failures {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
