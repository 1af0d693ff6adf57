use anyhow::{bail, format_err, Error};
use serde_json::Value;

use proxmox_sys::linux::tty;

use exa_api_types::Owner;
use exa_buildcfg::EXACONF_DEFAULT_PATH;
use exa_tools::json::optional_string_param;
use exa_tools::units::{bytes_from_quantity, parse_list, seconds_from_duration};

mod backup;
pub use backup::*;
mod bucketfs;
pub use bucketfs::*;
mod node;
pub use node::*;
mod storage;
pub use storage::*;
mod user;
pub use user::*;
mod volume;
pub use volume::*;

/// Options whose values must not show up in the log.
const SECRET_OPTIONS: [&str; 3] = ["--passwd", "--read-passwd", "--write-passwd"];

/// The EXAConf path argument, falling back to the default location.
pub fn exaconf_path(param: &Value) -> Result<&str, Error> {
    Ok(optional_string_param(param, "exaconf")?.unwrap_or(EXACONF_DEFAULT_PATH))
}

pub fn list_param(param: &Value, name: &str) -> Result<Option<Vec<String>>, Error> {
    Ok(optional_string_param(param, name)?.map(parse_list))
}

pub fn owner_param(param: &Value, name: &str) -> Result<Option<Owner>, Error> {
    match optional_string_param(param, name)? {
        Some(text) => Ok(Some(text.parse()?)),
        None => Ok(None),
    }
}

pub fn size_param(param: &Value, name: &str) -> Result<Option<u64>, Error> {
    match optional_string_param(param, name)? {
        Some(text) => Ok(Some(bytes_from_quantity(text)?)),
        None => Ok(None),
    }
}

pub fn duration_param(param: &Value, name: &str) -> Result<Option<u64>, Error> {
    match optional_string_param(param, name)? {
        Some(text) => Ok(Some(seconds_from_duration(text)?)),
        None => Ok(None),
    }
}

/// Integer parameter converted to a narrower type.
pub fn narrow_param<T: TryFrom<i64>>(param: &Value, name: &str) -> Result<Option<T>, Error> {
    match exa_tools::json::optional_integer_param(param, name)? {
        Some(n) => T::try_from(n)
            .map(Some)
            .map_err(|_| format_err!("parameter '{}' is out of range", name)),
        None => Ok(None),
    }
}

/// Read a password from the terminal.
pub fn prompt_password(verify: bool) -> Result<String, Error> {
    if !tty::stdin_isatty() {
        bail!("no password given and stdin is not a terminal");
    }
    let password = if verify {
        tty::read_and_verify_password("Password: ")?
    } else {
        tty::read_password("Password: ")?
    };
    Ok(String::from_utf8(password)?)
}

/// Remove secret options and their values from a command line.
pub fn strip_secrets(args: &[String]) -> Vec<String> {
    let mut res = Vec::new();
    let mut skip_value = false;

    for arg in args {
        if skip_value {
            skip_value = false;
            continue;
        }
        if SECRET_OPTIONS.contains(&arg.as_str()) {
            skip_value = true;
            continue;
        }
        if SECRET_OPTIONS
            .iter()
            .any(|opt| arg.starts_with(&format!("{}=", opt)))
        {
            continue;
        }
        res.push(arg.clone());
    }

    res
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_strip_secrets() {
        let args: Vec<String> = [
            "add-user",
            "/tmp/EXAConf",
            "--name",
            "alice",
            "--passwd",
            "secret",
            "--write-passwd=other",
            "--id",
            "1000",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        assert_eq!(
            strip_secrets(&args),
            vec!["add-user", "/tmp/EXAConf", "--name", "alice", "--id", "1000"]
        );
    }

    #[test]
    fn test_param_helpers() -> Result<(), Error> {
        let param = json!({
            "owner": "1000:1001",
            "size": "1 GiB",
            "expire": "1d 2h",
            "nodes": "11, 12,",
            "level": 300,
        });

        assert_eq!(exaconf_path(&param)?, EXACONF_DEFAULT_PATH);
        assert_eq!(owner_param(&param, "owner")?, Some(Owner::new(1000, 1001)));
        assert_eq!(size_param(&param, "size")?, Some(1 << 30));
        assert_eq!(duration_param(&param, "expire")?, Some(93600));
        assert_eq!(list_param(&param, "nodes")?, Some(vec!["11".into(), "12".into()]));
        assert_eq!(narrow_param::<u32>(&param, "level")?, Some(300));
        assert!(narrow_param::<u8>(&param, "level").is_err());
        assert_eq!(narrow_param::<u32>(&param, "missing")?, None);
        Ok(())
    }
}
