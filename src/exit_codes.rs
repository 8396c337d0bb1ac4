//! Maps fatal startup errors to process exit codes, following the usual
//! BSD convention (64 = usage error, 1 = generic software error).

use std::process::ExitCode;

use crate::config::ConfigError;
use crate::provider::ProviderError;

pub const EXIT_USAGE: u8 = 64;
pub const EXIT_IO: u8 = 2;
pub const EXIT_SOFTWARE: u8 = 1;

pub fn exit_code_for_config_error(error: &ConfigError) -> ExitCode {
    use ConfigError::*;

    match error {
        DataDirUnavailable | Io(_) => ExitCode::from(EXIT_IO),
        MissingRootKey | InvalidRootKeyHex => ExitCode::from(EXIT_USAGE),
        Parse(_) | InvalidAddr(_) => ExitCode::from(EXIT_SOFTWARE),
    }
}

pub fn exit_code_for_provider_error(error: &ProviderError) -> ExitCode {
    use ProviderError::*;

    match error {
        WeakKey(_) | InvalidInput(_) => ExitCode::from(EXIT_USAGE),
        Storage(_) => ExitCode::from(EXIT_IO),
        UnknownDek(_) | Malformed | AuthFailure | Closed | Internal(_) => {
            ExitCode::from(EXIT_SOFTWARE)
        }
    }
}
