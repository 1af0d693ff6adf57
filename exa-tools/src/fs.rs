//! File replacement that leaves identical content untouched.

use std::path::Path;

use anyhow::Error;

use proxmox_sys::fs::file_get_optional_contents;

pub use proxmox_sys::fs::CreateOptions;

/// What [`replace_file`] did with the target file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The target already had the same content, it was left untouched.
    Unchanged,
    /// The target was atomically replaced.
    Replaced,
}

/// Atomically replace `path` with `data`, unless it already holds exactly
/// the same bytes.
pub fn replace_file<P: AsRef<Path>>(
    path: P,
    data: &[u8],
    options: CreateOptions,
) -> Result<WriteOutcome, Error> {
    let path = path.as_ref();

    if let Some(old_content) = file_get_optional_contents(path)? {
        if old_content == data {
            return Ok(WriteOutcome::Unchanged);
        }
    }

    proxmox_sys::fs::replace_file(path, data, options, true)?;

    Ok(WriteOutcome::Replaced)
}
