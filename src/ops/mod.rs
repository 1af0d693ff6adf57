//! Mutation operations on the EXAConf document.
//!
//! Every operation works on a loaded [`ExaConf`] and only stages its changes;
//! [`update_exaconf`] wraps the load/modify/commit cycle used by the CLI.

use std::path::Path;

use exa_api_types::ALL_SELECTOR;
use exa_config::{CommitStatus, ConfigError, ExaConf, LoadOptions};

pub mod backup;
pub mod bucketfs;
pub mod node;
pub mod remote_volume;
pub mod storage;
pub mod user;
pub mod volume;

/// Load an initialized EXAConf for reading.
pub fn read_exaconf<P: AsRef<Path>>(path: P) -> Result<ExaConf, ConfigError> {
    ExaConf::load(
        path,
        LoadOptions {
            read_only: true,
            initialized: true,
        },
    )
}

/// Load an initialized EXAConf, apply `func` and commit the result.
///
/// Nothing is written if `func` fails.
pub fn update_exaconf<P, F, T>(path: P, func: F) -> Result<(T, CommitStatus), ConfigError>
where
    P: AsRef<Path>,
    F: FnOnce(&mut ExaConf) -> Result<T, ConfigError>,
{
    let mut conf = ExaConf::load(
        path,
        LoadOptions {
            read_only: false,
            initialized: true,
        },
    )?;
    let res = func(&mut conf)?;
    let status = conf.commit()?;
    Ok((res, status))
}

/// Resolve a selector (an entity key or `_all`) against the keys of a collection.
pub(crate) fn select_keys<K: PartialEq + Clone>(
    keys: Vec<K>,
    selector: &str,
    key: Option<K>,
    what: &str,
) -> Result<Vec<K>, ConfigError> {
    if selector == ALL_SELECTOR {
        return Ok(keys);
    }
    match key {
        Some(key) if keys.contains(&key) => Ok(vec![key]),
        _ => Err(ConfigError::NotFound(format!("{} '{}'", what, selector))),
    }
}

/// Fail with `InUse` if `users` is not empty, unless `force` is set.
pub(crate) fn check_unused(entity: &str, users: &[String], force: bool) -> Result<(), ConfigError> {
    if !users.is_empty() && !force {
        return Err(ConfigError::in_use(entity, users));
    }
    Ok(())
}
