use std::collections::HashSet;

use exa_api_types::{Owner, RemoteVolume, RemoteVolumeType};
use exa_buildcfg::FIRST_REMOTE_VOLUME_ID;
use exa_config::{integrity_err, ConfigError, ExaConf};
use exa_tools::crypt::{encode_reversible, generate_opaque_name};

use super::check_unused;

#[derive(Debug, Clone)]
pub struct NewRemoteVolume {
    /// Generated if not given.
    pub name: Option<String>,
    /// Lowest unused ID if not given.
    pub id: Option<u64>,
    pub vol_type: RemoteVolumeType,
    pub url: String,
    pub owner: Owner,
    pub username: Option<String>,
    /// Plain or already encoded, stored encoded.
    pub password: Option<String>,
    pub options: Option<String>,
    pub labels: Vec<String>,
}

fn next_remote_volume_id(conf: &ExaConf) -> Result<u64, ConfigError> {
    let used: HashSet<u64> = conf.remote_volumes()?.iter().map(|v| v.id).collect();
    let mut id = FIRST_REMOTE_VOLUME_ID;
    while used.contains(&id) {
        id += 1;
    }
    Ok(id)
}

/// Add a remote volume, returning its name.
pub fn add_remote_volume(conf: &mut ExaConf, param: NewRemoteVolume) -> Result<String, ConfigError> {
    let name = match param.name {
        Some(name) => {
            if conf.remote_volume(&name).is_ok() {
                return Err(integrity_err!("remote volume '{}' already exists", name));
            }
            name
        }
        None => generate_opaque_name()?,
    };

    let id = match param.id {
        Some(id) => id,
        None => next_remote_volume_id(conf)?,
    };

    let volume = RemoteVolume {
        name: name.clone(),
        id,
        vol_type: param.vol_type,
        url: param.url,
        owner: param.owner,
        username: param.username,
        password: param.password.as_deref().map(encode_reversible),
        options: param.options,
        labels: param.labels,
    };

    conf.upsert_remote_volume(&volume)?;
    Ok(name)
}

/// Remove a remote volume. Without `force`, volumes used by backup schedules are kept.
pub fn remove_remote_volume(
    conf: &mut ExaConf,
    name: &str,
    force: bool,
) -> Result<RemoteVolume, ConfigError> {
    conf.remote_volume(name)?;
    let users = conf.remote_volume_references(name)?;
    check_unused(&format!("remote volume '{}'", name), &users, force)?;
    conf.remove_remote_volume(name)
}

#[cfg(test)]
mod test {
    use exa_tools::crypt::decode_reversible;

    use super::*;
    use crate::ops::test_util::base_config;

    fn s3_volume(name: Option<&str>, id: Option<u64>) -> NewRemoteVolume {
        NewRemoteVolume {
            name: name.map(String::from),
            id,
            vol_type: RemoteVolumeType::S3,
            url: "https://bucket.s3.example.com".into(),
            owner: Owner::new(500, 500),
            username: Some("backup".into()),
            password: Some("s3cr3t!".into()),
            options: None,
            labels: Vec::new(),
        }
    }

    #[test]
    fn test_add_remote_volume() -> Result<(), ConfigError> {
        let mut conf = base_config();

        let first = add_remote_volume(&mut conf, s3_volume(None, None))?;
        let second = add_remote_volume(&mut conf, s3_volume(None, None))?;
        assert_ne!(first, second);

        let volume = conf.remote_volume(&first)?;
        assert_eq!(volume.id, FIRST_REMOTE_VOLUME_ID);
        assert_ne!(volume.password.as_deref(), Some("s3cr3t!"));
        assert_eq!(decode_reversible(volume.password.as_deref().unwrap()), "s3cr3t!");
        assert_eq!(conf.remote_volume(&second)?.id, FIRST_REMOTE_VOLUME_ID + 1);

        assert!(matches!(
            add_remote_volume(&mut conf, s3_volume(Some("r1"), Some(FIRST_REMOTE_VOLUME_ID))),
            Err(ConfigError::Integrity(_))
        ));
        assert!(matches!(
            add_remote_volume(&mut conf, s3_volume(Some("r1"), Some(42))),
            Err(ConfigError::Integrity(_))
        ));
        assert!(matches!(
            add_remote_volume(&mut conf, s3_volume(Some("DataVolume1"), None)),
            Err(ConfigError::Integrity(_))
        ));
        assert!(matches!(
            add_remote_volume(&mut conf, s3_volume(Some(&first), None)),
            Err(ConfigError::Integrity(_))
        ));
        Ok(())
    }

    #[test]
    fn test_remove_remote_volume() -> Result<(), ConfigError> {
        let mut conf = base_config();
        let name = add_remote_volume(&mut conf, s3_volume(Some("r0001"), None))?;

        remove_remote_volume(&mut conf, &name, false)?;
        assert!(matches!(
            remove_remote_volume(&mut conf, &name, false),
            Err(ConfigError::NotFound(_))
        ));
        Ok(())
    }
}
