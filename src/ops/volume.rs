use exa_api_types::{Owner, Volume, VolumeType};
use exa_buildcfg::{DEFAULT_VOLUME_BLOCK_SIZE, DEFAULT_VOLUME_PERM, DEFAULT_VOLUME_STRIPE_SIZE};
use exa_config::{integrity_err, ConfigError, ExaConf};

use super::{check_unused, select_keys};

#[derive(Debug, Clone)]
/// Parameters of [`add_volume`]. Unset options fall back to the defaults.
pub struct NewVolume {
    pub name: String,
    pub vol_type: VolumeType,
    /// Size in bytes.
    pub size: u64,
    pub disk: String,
    pub redundancy: u32,
    pub nodes: Vec<u64>,
    pub owner: Owner,
    /// Defaults to the number of nodes.
    pub num_master_nodes: Option<u32>,
    pub perm: Option<String>,
    pub labels: Vec<String>,
    pub block_size: Option<u64>,
    pub stripe_size: Option<u64>,
}

#[derive(Debug, Default, Clone)]
pub struct VolumeUpdate {
    pub owner: Option<Owner>,
    pub size: Option<u64>,
    pub disk: Option<String>,
    /// Replacing the nodes resets the master node count, unless given too.
    pub nodes: Option<Vec<u64>>,
    pub num_master_nodes: Option<u32>,
    pub redundancy: Option<u32>,
    pub labels: Option<Vec<String>>,
}

pub fn add_volume(conf: &mut ExaConf, param: NewVolume) -> Result<(), ConfigError> {
    if conf.volume(&param.name).is_ok() {
        return Err(integrity_err!("volume '{}' already exists", param.name));
    }

    let num_master_nodes = param
        .num_master_nodes
        .unwrap_or(param.nodes.len() as u32);

    let volume = Volume {
        name: param.name,
        vol_type: param.vol_type,
        size: param.size,
        disk: param.disk,
        redundancy: param.redundancy,
        nodes: param.nodes,
        owner: param.owner,
        num_master_nodes,
        perm: param.perm.unwrap_or_else(|| DEFAULT_VOLUME_PERM.to_string()),
        labels: param.labels,
        block_size: param.block_size.unwrap_or(DEFAULT_VOLUME_BLOCK_SIZE),
        stripe_size: param.stripe_size.unwrap_or(DEFAULT_VOLUME_STRIPE_SIZE),
    };

    conf.upsert_volume(&volume)
}

/// Modify one volume, or all volumes with `_all`.
pub fn modify_volume(
    conf: &mut ExaConf,
    selector: &str,
    update: &VolumeUpdate,
) -> Result<(), ConfigError> {
    let names: Vec<String> = conf.volumes()?.into_iter().map(|v| v.name).collect();

    for name in select_keys(names, selector, Some(selector.to_string()), "volume")? {
        let mut volume = conf.volume(&name)?;

        if let Some(owner) = update.owner {
            volume.owner = owner;
        }
        if let Some(size) = update.size {
            volume.size = size;
        }
        if let Some(disk) = &update.disk {
            volume.disk = disk.clone();
        }
        if let Some(nodes) = &update.nodes {
            volume.nodes = nodes.clone();
            volume.num_master_nodes = nodes.len() as u32;
        }
        if let Some(count) = update.num_master_nodes {
            volume.num_master_nodes = count;
        }
        if let Some(redundancy) = update.redundancy {
            volume.redundancy = redundancy;
        }
        if let Some(labels) = &update.labels {
            volume.labels = labels.clone();
        }

        conf.upsert_volume(&volume)?;
    }
    Ok(())
}

/// Remove a volume. Without `force`, volumes used by databases or backup schedules are kept.
pub fn remove_volume(conf: &mut ExaConf, name: &str, force: bool) -> Result<Volume, ConfigError> {
    conf.volume(name)?;
    let users = conf.volume_references(name)?;
    check_unused(&format!("volume '{}'", name), &users, force)?;
    conf.remove_volume(name)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ops::node::add_node_device;
    use crate::ops::test_util::base_config;

    fn archive_volume(nodes: Vec<u64>) -> NewVolume {
        NewVolume {
            name: "ArchiveVolume1".into(),
            vol_type: VolumeType::Archive,
            size: 2 << 30,
            disk: "disk1".into(),
            redundancy: 1,
            nodes,
            owner: Owner::new(500, 500),
            num_master_nodes: None,
            perm: None,
            labels: Vec::new(),
            block_size: None,
            stripe_size: None,
        }
    }

    #[test]
    fn test_master_node_count() -> Result<(), ConfigError> {
        let mut conf = base_config();
        crate::ops::node::add_node(&mut conf, Some(13), "10.10.10.x/24", None)?;
        add_node_device(&mut conf, 13, "disk1", "dev.1", None)?;

        add_volume(&mut conf, archive_volume(vec![11, 12, 13]))?;
        let volume = conf.volume("ArchiveVolume1")?;
        assert_eq!(volume.num_master_nodes, 3);
        assert_eq!(volume.perm, DEFAULT_VOLUME_PERM);
        assert_eq!(volume.block_size, DEFAULT_VOLUME_BLOCK_SIZE);
        assert_eq!(volume.stripe_size, DEFAULT_VOLUME_STRIPE_SIZE);

        let update = VolumeUpdate {
            nodes: Some(vec![11, 12]),
            ..Default::default()
        };
        modify_volume(&mut conf, "ArchiveVolume1", &update)?;
        assert_eq!(conf.volume("ArchiveVolume1")?.num_master_nodes, 2);

        let update = VolumeUpdate {
            nodes: Some(vec![11, 12, 13]),
            num_master_nodes: Some(1),
            ..Default::default()
        };
        modify_volume(&mut conf, "ArchiveVolume1", &update)?;
        assert_eq!(conf.volume("ArchiveVolume1")?.num_master_nodes, 1);

        let text = String::try_from(&conf)?;
        assert!(text.contains("[EXAVolume : ArchiveVolume1]\n    Type = archive\n    Size = 2 GiB\n"));
        Ok(())
    }

    #[test]
    fn test_add_volume_checks() -> Result<(), ConfigError> {
        let mut conf = base_config();

        let mut param = archive_volume(vec![11, 12]);
        param.name = "DataVolume1".into();
        assert!(matches!(add_volume(&mut conf, param), Err(ConfigError::Integrity(_))));

        assert!(matches!(
            add_volume(&mut conf, archive_volume(vec![11, 14])),
            Err(ConfigError::Integrity(_))
        ));

        let mut param = archive_volume(vec![11, 12]);
        param.redundancy = 3;
        assert!(matches!(add_volume(&mut conf, param), Err(ConfigError::Integrity(_))));

        let mut param = archive_volume(vec![11, 12]);
        param.disk = "disk2".into();
        assert!(matches!(add_volume(&mut conf, param), Err(ConfigError::Integrity(_))));

        assert!(conf.volume("ArchiveVolume1").is_err());
        Ok(())
    }

    #[test]
    fn test_modify_all_volumes() -> Result<(), ConfigError> {
        let mut conf = base_config();
        add_volume(&mut conf, archive_volume(vec![12]))?;

        let update = VolumeUpdate {
            owner: Some(Owner::new(1000, 1000)),
            labels: Some(vec!["backup".into()]),
            ..Default::default()
        };
        modify_volume(&mut conf, "_all", &update)?;
        for volume in conf.volumes()? {
            assert_eq!(volume.owner, Owner::new(1000, 1000));
            assert_eq!(volume.labels, vec!["backup"]);
        }

        assert!(matches!(
            modify_volume(&mut conf, "Missing", &update),
            Err(ConfigError::NotFound(_))
        ));
        Ok(())
    }

    #[test]
    fn test_remove_volume() -> Result<(), ConfigError> {
        let mut conf = base_config();
        add_volume(&mut conf, archive_volume(vec![11]))?;

        assert!(matches!(
            remove_volume(&mut conf, "DataVolume1", false),
            Err(ConfigError::InUse { .. })
        ));
        remove_volume(&mut conf, "ArchiveVolume1", false)?;
        remove_volume(&mut conf, "DataVolume1", true)?;
        assert!(conf.volumes()?.is_empty());
        assert_eq!(conf.database("DB1")?.data_volume.as_deref(), Some("DataVolume1"));
        Ok(())
    }
}
