use std::str::FromStr;

use error_stack::{Report, ResultExt};
use kernel::KernelError;

pub mod database;
pub mod error;

pub(crate) fn env(key: &str) -> Result<String, Report<KernelError>> {
    dotenvy::var(key)
        .change_context_lazy(|| KernelError::Internal)
        .attach_printable_lazy(|| format!("Env {} not specified", key))
}

pub(crate) fn env_or<T: FromStr>(key: &str, default: T) -> Result<T, Report<KernelError>> {
    match dotenvy::var(key) {
        Ok(value) => value.parse::<T>().map_err(|_| {
            Report::new(KernelError::Internal)
                .attach_printable(format!("Env {} has an invalid value `{}`", key, value))
        }),
        Err(_) => Ok(default),
    }
}
