//! Process exit codes: `0` ok, `1` generic failure, `2` config
//! invalid, `3` external dependency unavailable.

use meridian_core::ErrorKind;
use meridian_tenant::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Ok = 0,
    Generic = 1,
    ConfigInvalid = 2,
    DependencyUnavailable = 3,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Maps a command failure onto the exit-code contract. A bare `anyhow`
/// error (programmer error, I/O failure) falls through to `Generic`.
pub fn from_error_kind(kind: ErrorKind) -> ExitCode {
    match kind {
        ErrorKind::ConfigInvalid => ExitCode::ConfigInvalid,
        ErrorKind::BackendUnavailable | ErrorKind::BreakerOpen => ExitCode::DependencyUnavailable,
        _ => ExitCode::Generic,
    }
}

pub fn from_config_error(_err: &ConfigError) -> ExitCode {
    ExitCode::ConfigInvalid
}
