use anyhow::{format_err, Error};
use serde_json::Value;

use proxmox_router::cli::*;
use proxmox_schema::api;

use exa_api_types::{
    User, ENTITY_NAME_SCHEMA, EXACONF_PATH_SCHEMA, LIST_SCHEMA, PASSWORD_SCHEMA,
    SINGLE_LINE_TEXT_FORMAT,
};
use exa_tools::json::{bool_param, optional_string_param, required_string_param};

use exaconf::ops::{
    self,
    user::{NewUser, UserUpdate},
};

use super::{exaconf_path, list_param, narrow_param, prompt_password};

fn read_auth_keys_file(path: &str) -> Result<Vec<String>, Error> {
    let data = proxmox_sys::fs::file_read_string(path)?;
    Ok(data
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect())
}

/// Human readable description of a user, as printed by `list-users`.
fn format_user(user: &User) -> String {
    let mut text = format!("= {} ({}) =\n", user.name, user.id);
    text.push_str(&format!("  group : {}\n", user.group));
    text.push_str(&format!(
        "  login : {}\n",
        if user.login_enabled { "enabled" } else { "disabled" }
    ));
    if let Some(passwd) = &user.passwd {
        text.push_str(&format!("  passwd : {}\n", passwd));
    }
    if !user.additional_groups.is_empty() {
        text.push_str(&format!("  groups : {}\n", user.additional_groups.join(", ")));
    }
    if !user.authorized_keys.is_empty() {
        text.push_str(&format!(
            "  auth-keys : {}\n",
            user.authorized_keys.join("\n              ")
        ));
    }
    text
}

#[api(
    input: {
        properties: {
            passwd: {
                schema: PASSWORD_SCHEMA,
                optional: true,
            },
        },
    },
)]
/// Print the shadow hash of a password. Prompts for the password if not given.
fn encode_shadow(param: Value) -> Result<Value, Error> {
    let passwd = match optional_string_param(&param, "passwd")? {
        Some(passwd) => passwd.to_string(),
        None => prompt_password(true)?,
    };

    println!("{}", ops::user::encode_shadow(&passwd)?);

    Ok(Value::Null)
}

#[api(
    input: {
        properties: {
            exaconf: {
                schema: EXACONF_PATH_SCHEMA,
                optional: true,
            },
        },
    },
)]
/// List all groups.
fn list_groups(param: Value) -> Result<Value, Error> {
    let conf = ops::read_exaconf(exaconf_path(&param)?)?;

    for group in ops::user::list_groups(&conf)? {
        println!("{} : {}", group.name, group.id);
    }

    Ok(Value::Null)
}

#[api(
    input: {
        properties: {
            exaconf: {
                schema: EXACONF_PATH_SCHEMA,
                optional: true,
            },
            name: {
                schema: ENTITY_NAME_SCHEMA,
            },
            id: {
                description: "Numeric ID.",
                type: Integer,
                minimum: 0,
            },
        },
    },
)]
/// Add a group.
fn add_group(param: Value) -> Result<Value, Error> {
    let name = required_string_param(&param, "name")?;
    let id = narrow_param(&param, "id")?.ok_or_else(|| format_err!("missing parameter 'id'"))?;

    ops::update_exaconf(exaconf_path(&param)?, |conf| {
        ops::user::add_group(conf, name, id)
    })?;

    Ok(Value::Null)
}

#[api(
    input: {
        properties: {
            exaconf: {
                schema: EXACONF_PATH_SCHEMA,
                optional: true,
            },
            name: {
                schema: ENTITY_NAME_SCHEMA,
            },
        },
    },
)]
/// Remove a group. Groups that still have members are kept.
fn remove_group(param: Value) -> Result<Value, Error> {
    let name = required_string_param(&param, "name")?;

    ops::update_exaconf(exaconf_path(&param)?, |conf| {
        ops::user::remove_group(conf, name)
    })?;

    Ok(Value::Null)
}

#[api(
    input: {
        properties: {
            exaconf: {
                schema: EXACONF_PATH_SCHEMA,
                optional: true,
            },
        },
    },
)]
/// List all users.
fn list_users(param: Value) -> Result<Value, Error> {
    let conf = ops::read_exaconf(exaconf_path(&param)?)?;

    for user in ops::user::list_users(&conf)? {
        print!("{}", format_user(&user));
    }

    Ok(Value::Null)
}

#[api(
    input: {
        properties: {
            exaconf: {
                schema: EXACONF_PATH_SCHEMA,
                optional: true,
            },
            name: {
                schema: ENTITY_NAME_SCHEMA,
            },
            id: {
                description: "Numeric ID.",
                type: Integer,
                minimum: 0,
            },
            group: {
                schema: ENTITY_NAME_SCHEMA,
            },
            "login-enabled": {
                description: "Allow the user to log in.",
                type: bool,
                optional: true,
                default: false,
            },
            passwd: {
                schema: PASSWORD_SCHEMA,
                optional: true,
            },
            "prompt-passwd": {
                description: "Prompt for the password if none is given.",
                type: bool,
                optional: true,
                default: false,
            },
            "encode-passwd": {
                description: "Hash the password, even if it already looks like a hash.",
                type: bool,
                optional: true,
                default: false,
            },
            groups: {
                schema: LIST_SCHEMA,
                optional: true,
            },
            "auth-keys": {
                schema: LIST_SCHEMA,
                optional: true,
            },
            "auth-keys-file": {
                description: "File with one authorized key per line.",
                type: String,
                format: &SINGLE_LINE_TEXT_FORMAT,
                optional: true,
            },
        },
    },
)]
/// Add a user.
fn add_user(param: Value) -> Result<Value, Error> {
    let mut passwd = optional_string_param(&param, "passwd")?.map(String::from);
    let mut encode_passwd = bool_param(&param, "encode-passwd")?;

    // prompted passwords are always hashed
    if passwd.is_none() && bool_param(&param, "prompt-passwd")? {
        passwd = Some(prompt_password(true)?);
        encode_passwd = true;
    }

    let authorized_keys = match list_param(&param, "auth-keys")? {
        Some(keys) => keys,
        None => match optional_string_param(&param, "auth-keys-file")? {
            Some(path) => read_auth_keys_file(path)?,
            None => Vec::new(),
        },
    };

    let user = NewUser {
        name: required_string_param(&param, "name")?.to_string(),
        id: narrow_param(&param, "id")?.ok_or_else(|| format_err!("missing parameter 'id'"))?,
        group: required_string_param(&param, "group")?.to_string(),
        login_enabled: bool_param(&param, "login-enabled")?,
        passwd,
        encode_passwd,
        additional_groups: list_param(&param, "groups")?.unwrap_or_default(),
        authorized_keys,
    };

    ops::update_exaconf(exaconf_path(&param)?, |conf| ops::user::add_user(conf, user))?;

    Ok(Value::Null)
}

#[api(
    input: {
        properties: {
            exaconf: {
                schema: EXACONF_PATH_SCHEMA,
                optional: true,
            },
            name: {
                description: "User name or '_all'.",
                type: String,
            },
            group: {
                schema: ENTITY_NAME_SCHEMA,
                optional: true,
            },
            "login-enabled": {
                description: "Allow the user to log in.",
                type: bool,
                optional: true,
            },
            groups: {
                schema: LIST_SCHEMA,
                optional: true,
            },
            "auth-keys": {
                schema: LIST_SCHEMA,
                optional: true,
            },
            "extend-groups": {
                description: "Add the given groups instead of replacing the current ones.",
                type: bool,
                optional: true,
                default: false,
            },
            "extend-keys": {
                description: "Add the given keys instead of replacing the current ones.",
                type: bool,
                optional: true,
                default: false,
            },
        },
    },
)]
/// Modify one or all users. ID and password are not changed.
fn modify_user(param: Value) -> Result<Value, Error> {
    let selector = required_string_param(&param, "name")?;
    let update = UserUpdate {
        group: optional_string_param(&param, "group")?.map(String::from),
        login_enabled: param["login-enabled"].as_bool(),
        additional_groups: list_param(&param, "groups")?,
        authorized_keys: list_param(&param, "auth-keys")?,
        extend_groups: bool_param(&param, "extend-groups")?,
        extend_keys: bool_param(&param, "extend-keys")?,
    };

    ops::update_exaconf(exaconf_path(&param)?, |conf| {
        ops::user::modify_user(conf, selector, &update)
    })?;

    Ok(Value::Null)
}

#[api(
    input: {
        properties: {
            exaconf: {
                schema: EXACONF_PATH_SCHEMA,
                optional: true,
            },
            name: {
                schema: ENTITY_NAME_SCHEMA,
            },
            passwd: {
                schema: PASSWORD_SCHEMA,
                optional: true,
            },
            "encode-passwd": {
                description: "Hash the password, even if it already looks like a hash.",
                type: bool,
                optional: true,
                default: false,
            },
        },
    },
)]
/// Change the password of a user. Prompts for the password if not given.
fn passwd_user(param: Value) -> Result<Value, Error> {
    let name = required_string_param(&param, "name")?;

    let (passwd, encode_passwd) = match optional_string_param(&param, "passwd")? {
        Some(passwd) => (passwd.to_string(), bool_param(&param, "encode-passwd")?),
        None => (prompt_password(true)?, true),
    };

    ops::update_exaconf(exaconf_path(&param)?, |conf| {
        ops::user::passwd_user(conf, name, &passwd, encode_passwd)
    })?;

    Ok(Value::Null)
}

#[api(
    input: {
        properties: {
            exaconf: {
                schema: EXACONF_PATH_SCHEMA,
                optional: true,
            },
            name: {
                schema: ENTITY_NAME_SCHEMA,
            },
        },
    },
)]
/// Remove a user.
fn remove_user(param: Value) -> Result<Value, Error> {
    let name = required_string_param(&param, "name")?;

    ops::update_exaconf(exaconf_path(&param)?, |conf| ops::user::remove_user(conf, name))?;

    Ok(Value::Null)
}

pub fn user_commands(cmd_def: CliCommandMap) -> CliCommandMap {
    cmd_def
        .insert("encode-shadow", CliCommand::new(&API_METHOD_ENCODE_SHADOW))
        .insert(
            "list-groups",
            CliCommand::new(&API_METHOD_LIST_GROUPS).arg_param(&["exaconf"]),
        )
        .insert(
            "add-group",
            CliCommand::new(&API_METHOD_ADD_GROUP).arg_param(&["exaconf"]),
        )
        .insert(
            "remove-group",
            CliCommand::new(&API_METHOD_REMOVE_GROUP).arg_param(&["exaconf"]),
        )
        .insert(
            "list-users",
            CliCommand::new(&API_METHOD_LIST_USERS).arg_param(&["exaconf"]),
        )
        .insert(
            "add-user",
            CliCommand::new(&API_METHOD_ADD_USER).arg_param(&["exaconf"]),
        )
        .insert(
            "modify-user",
            CliCommand::new(&API_METHOD_MODIFY_USER).arg_param(&["exaconf"]),
        )
        .insert(
            "passwd-user",
            CliCommand::new(&API_METHOD_PASSWD_USER).arg_param(&["exaconf"]),
        )
        .insert(
            "remove-user",
            CliCommand::new(&API_METHOD_REMOVE_USER).arg_param(&["exaconf"]),
        )
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_format_user() {
        let user = User {
            name: "alice".into(),
            id: 1000,
            group: "exausers".into(),
            login_enabled: true,
            passwd: None,
            additional_groups: vec!["exadbadm".into(), "wheel".into()],
            authorized_keys: vec!["ssh-ed25519 AAAA1 a@x".into(), "ssh-rsa AAAA2 b@y".into()],
        };

        assert_eq!(
            format_user(&user),
            "= alice (1000) =\n\
             \x20 group : exausers\n\
             \x20 login : enabled\n\
             \x20 groups : exadbadm, wheel\n\
             \x20 auth-keys : ssh-ed25519 AAAA1 a@x\n\
             \x20             ssh-rsa AAAA2 b@y\n"
        );
    }
}
