use anyhow::{bail, Error};
use serde_json::Value;

pub fn required_string_param<'a>(param: &'a Value, name: &str) -> Result<&'a str, Error> {
    match param[name].as_str() {
        Some(s) => Ok(s),
        None => bail!("missing parameter '{}'", name),
    }
}

pub fn required_integer_param(param: &Value, name: &str) -> Result<i64, Error> {
    match param[name].as_i64() {
        Some(s) => Ok(s),
        None => bail!("missing parameter '{}'", name),
    }
}

pub fn optional_string_param<'a>(param: &'a Value, name: &str) -> Result<Option<&'a str>, Error> {
    match &param[name] {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        _ => bail!("parameter '{}' is not a string", name),
    }
}

pub fn optional_integer_param(param: &Value, name: &str) -> Result<Option<i64>, Error> {
    match &param[name] {
        Value::Null => Ok(None),
        value => match value.as_i64() {
            Some(n) => Ok(Some(n)),
            None => bail!("parameter '{}' is not an integer", name),
        },
    }
}

pub fn optional_u64_param(param: &Value, name: &str) -> Result<Option<u64>, Error> {
    match optional_integer_param(param, name)? {
        Some(n) if n < 0 => bail!("parameter '{}' must not be negative", name),
        Some(n) => Ok(Some(n as u64)),
        None => Ok(None),
    }
}

/// Boolean flag, `false` if not given.
pub fn bool_param(param: &Value, name: &str) -> Result<bool, Error> {
    match &param[name] {
        Value::Null => Ok(false),
        Value::Bool(b) => Ok(*b),
        _ => bail!("parameter '{}' is not a boolean", name),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_param_helpers() -> Result<(), Error> {
        let param = json!({
            "name": "vol1",
            "size": 4096,
            "delta": -1,
            "force": true,
        });

        assert_eq!(required_string_param(&param, "name")?, "vol1");
        assert!(required_string_param(&param, "size").is_err());
        assert_eq!(required_integer_param(&param, "size")?, 4096);
        assert!(required_integer_param(&param, "owner").is_err());

        assert_eq!(optional_string_param(&param, "name")?, Some("vol1"));
        assert_eq!(optional_string_param(&param, "owner")?, None);
        assert!(optional_string_param(&param, "size").is_err());

        assert_eq!(optional_u64_param(&param, "size")?, Some(4096));
        assert_eq!(optional_u64_param(&param, "owner")?, None);
        assert!(optional_u64_param(&param, "delta").is_err());

        assert!(bool_param(&param, "force")?);
        assert!(!bool_param(&param, "all")?);
        assert!(bool_param(&param, "name").is_err());

        Ok(())
    }
}
