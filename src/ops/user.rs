use exa_api_types::{Group, User};
use exa_config::{integrity_err, ConfigError, ExaConf};
use exa_tools::crypt::{hash_login_password, is_hashed_login_password};

use super::{check_unused, select_keys};

pub fn list_groups(conf: &ExaConf) -> Result<Vec<Group>, ConfigError> {
    conf.groups()
}

pub fn add_group(conf: &mut ExaConf, name: &str, id: u32) -> Result<(), ConfigError> {
    if conf.group(name).is_ok() {
        return Err(integrity_err!("group '{}' already exists", name));
    }
    conf.upsert_group(&Group {
        name: name.to_string(),
        id,
    })
}

/// Remove a group unless it is the primary or an additional group of a user.
pub fn remove_group(conf: &mut ExaConf, name: &str) -> Result<Group, ConfigError> {
    conf.group(name)?;
    let users = conf.group_references(name)?;
    check_unused(&format!("group '{}'", name), &users, false)?;
    conf.remove_group(name)
}

/// Encode a login password as `/etc/shadow` compatible hash.
pub fn encode_shadow(passwd: &str) -> Result<String, ConfigError> {
    Ok(hash_login_password(passwd)?)
}

/// Hash a login password, unless it already is a hash and `force_hash` is not set.
pub fn shadow_password(passwd: &str, force_hash: bool) -> Result<String, ConfigError> {
    if !force_hash && is_hashed_login_password(passwd) {
        return Ok(passwd.to_string());
    }
    encode_shadow(passwd)
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub id: u32,
    pub group: String,
    pub login_enabled: bool,
    pub passwd: Option<String>,
    /// Hash the password even if it looks like a hash.
    pub encode_passwd: bool,
    pub additional_groups: Vec<String>,
    pub authorized_keys: Vec<String>,
}

#[derive(Debug, Default, Clone)]
pub struct UserUpdate {
    pub group: Option<String>,
    pub login_enabled: Option<bool>,
    pub additional_groups: Option<Vec<String>>,
    pub authorized_keys: Option<Vec<String>>,
    /// Add to the existing additional groups instead of replacing them.
    pub extend_groups: bool,
    /// Add to the existing authorized keys instead of replacing them.
    pub extend_keys: bool,
}

pub fn list_users(conf: &ExaConf) -> Result<Vec<User>, ConfigError> {
    conf.users()
}

pub fn add_user(conf: &mut ExaConf, param: NewUser) -> Result<(), ConfigError> {
    if conf.user(&param.name).is_ok() {
        return Err(integrity_err!("user '{}' already exists", param.name));
    }

    let passwd = match param.passwd {
        Some(passwd) => Some(shadow_password(&passwd, param.encode_passwd)?),
        None => None,
    };

    let user = User {
        name: param.name,
        id: param.id,
        group: param.group,
        login_enabled: param.login_enabled,
        passwd,
        additional_groups: param.additional_groups,
        authorized_keys: param.authorized_keys,
    };

    conf.upsert_user(&user)
}

fn merge_list(current: &mut Vec<String>, items: &[String], extend: bool) {
    if !extend {
        *current = items.to_vec();
        return;
    }
    for item in items {
        if !current.contains(item) {
            current.push(item.clone());
        }
    }
}

/// Modify one user, or all users with `_all`. ID and password are not changed.
pub fn modify_user(conf: &mut ExaConf, selector: &str, update: &UserUpdate) -> Result<(), ConfigError> {
    let names: Vec<String> = conf.users()?.into_iter().map(|u| u.name).collect();

    for name in select_keys(names, selector, Some(selector.to_string()), "user")? {
        let mut user = conf.user(&name)?;

        if let Some(group) = &update.group {
            user.group = group.clone();
        }
        if let Some(enabled) = update.login_enabled {
            user.login_enabled = enabled;
        }
        if let Some(groups) = &update.additional_groups {
            merge_list(&mut user.additional_groups, groups, update.extend_groups);
        }
        if let Some(keys) = &update.authorized_keys {
            merge_list(&mut user.authorized_keys, keys, update.extend_keys);
        }

        conf.upsert_user(&user)?;
    }
    Ok(())
}

/// Set the password of a user.
pub fn passwd_user(
    conf: &mut ExaConf,
    name: &str,
    passwd: &str,
    encode_passwd: bool,
) -> Result<(), ConfigError> {
    let mut user = conf.user(name)?;
    user.passwd = Some(shadow_password(passwd, encode_passwd)?);
    conf.upsert_user(&user)
}

pub fn remove_user(conf: &mut ExaConf, name: &str) -> Result<User, ConfigError> {
    conf.remove_user(name)
}
