//! Conversion between entity records and their sections.
//!
//! Writers update sections in place: keys the records do not know about,
//! comments and the formatting of unchanged values are kept.

use std::fmt::Display;
use std::str::FromStr;

use exa_api_types::{
    BackupSchedule, Bucket, BucketFs, Database, Disk, Group, NetAddress, Node, Owner,
    RemoteVolume, StorageConfig, User, Volume,
};
use exa_buildcfg::{
    DEFAULT_BUCKETFS_SYNC_PERIOD, DEFAULT_DISK_COMPONENT, DEFAULT_VOLUME_BLOCK_SIZE,
    DEFAULT_VOLUME_PERM, DEFAULT_VOLUME_STRIPE_SIZE,
};
use exa_tools::units::{
    bytes_from_quantity, duration_from_seconds, quantity_from_bytes, seconds_from_duration,
};

use crate::section::{format_bool, join_list, parse_bool, quote, split_list, unquote, Section};
use crate::{config_parse_err, ConfigError};

pub const NODE_KIND: &str = "Node";
pub const DISK_KIND: &str = "Disk";
pub const VOLUME_KIND: &str = "EXAVolume";
pub const REMOTE_VOLUME_KIND: &str = "RemoteVolume";
pub const BUCKETFS_KIND: &str = "BucketFS";
pub const BUCKET_KIND: &str = "Bucket";
pub const DATABASE_KIND: &str = "DB";
pub const BACKUP_KIND: &str = "Backup";

pub const GLOBAL_SECTION: &str = "Global";
pub const GROUPS_SECTION: &str = "Groups";
pub const USERS_SECTION: &str = "Users";
pub const STORAGE_SECTION: &str = "EXAStorage";

fn section_key(section: &Section) -> Result<&str, ConfigError> {
    match section.kind_and_key() {
        Some((_, key)) if !key.is_empty() => Ok(key),
        _ => Err(config_parse_err!(
            "section [{}] has no name",
            section.name()
        )),
    }
}

fn optional(section: &Section, key: &str) -> Option<String> {
    section
        .get(key)
        .map(unquote)
        .filter(|value| !value.is_empty())
        .map(String::from)
}

fn required(section: &Section, key: &str) -> Result<String, ConfigError> {
    optional(section, key)
        .ok_or_else(|| config_parse_err!("missing '{}' in section [{}]", key, section.name()))
}

fn parse_value<T>(section: &Section, key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    value.parse().map_err(|err| {
        config_parse_err!(
            "invalid '{}' in section [{}] - {}",
            key,
            section.name(),
            err
        )
    })
}

fn parse_optional<T>(section: &Section, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match optional(section, key) {
        Some(value) => Ok(Some(parse_value(section, key, &value)?)),
        None => Ok(None),
    }
}

fn parse_required<T>(section: &Section, key: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    let value = required(section, key)?;
    parse_value(section, key, &value)
}

fn list(section: &Section, key: &str) -> Vec<String> {
    section.get(key).map(split_list).unwrap_or_default()
}

fn parse_list<T>(section: &Section, key: &str) -> Result<Vec<T>, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    list(section, key)
        .iter()
        .map(|item| parse_value(section, key, item))
        .collect()
}

fn bool_value(section: &Section, key: &str, default: bool) -> Result<bool, ConfigError> {
    match section.get(key) {
        None => Ok(default),
        Some(raw) => parse_bool(raw).ok_or_else(|| {
            config_parse_err!(
                "invalid boolean '{}' for '{}' in section [{}]",
                raw,
                key,
                section.name()
            )
        }),
    }
}

fn size_value(section: &Section, key: &str) -> Result<u64, ConfigError> {
    let value = required(section, key)?;
    bytes_from_quantity(&value).map_err(|err| {
        config_parse_err!("invalid '{}' in section [{}] - {}", key, section.name(), err)
    })
}

fn set_str(section: &mut Section, key: &str, value: &str) {
    if section.get(key).map(unquote) != Some(value) {
        section.set(key, &quote(value));
    }
}

fn set_opt_str(section: &mut Section, key: &str, value: Option<&str>) {
    match value {
        Some(value) => set_str(section, key, value),
        None => {
            section.remove(key);
        }
    }
}

/// Set a value unless the stored text already parses to the same value.
fn set_parsed<T>(section: &mut Section, key: &str, value: &T)
where
    T: FromStr + PartialEq + Display,
{
    let current = section.get(key).and_then(|raw| unquote(raw).parse::<T>().ok());
    if current.as_ref() != Some(value) {
        section.set(key, &quote(&value.to_string()));
    }
}

fn set_list<S: AsRef<str>>(section: &mut Section, key: &str, items: &[S]) {
    if items.is_empty() {
        section.remove(key);
        return;
    }

    let unchanged = section
        .get(key)
        .map(|raw| {
            let current = split_list(raw);
            current.len() == items.len()
                && current.iter().zip(items).all(|(a, b)| a == b.as_ref())
        })
        .unwrap_or(false);

    if !unchanged {
        section.set(key, &join_list(items));
    }
}

fn set_bool(section: &mut Section, key: &str, value: bool) {
    if section.get(key).and_then(parse_bool) != Some(value) {
        section.set(key, format_bool(value));
    }
}

/// Sizes are stored as binary quantity if that is exact, as plain bytes otherwise.
fn format_size(bytes: u64) -> String {
    let quantity = quantity_from_bytes(bytes);
    match bytes_from_quantity(&quantity) {
        Ok(value) if value == bytes => quantity,
        _ => bytes.to_string(),
    }
}

fn set_size(section: &mut Section, key: &str, bytes: u64) {
    let current = section
        .get(key)
        .and_then(|raw| bytes_from_quantity(unquote(raw)).ok());
    if current != Some(bytes) {
        section.set(key, &format_size(bytes));
    }
}

fn set_duration(section: &mut Section, key: &str, seconds: u64) {
    let current = section
        .get(key)
        .and_then(|raw| seconds_from_duration(unquote(raw)).ok());
    if current != Some(seconds) {
        section.set(key, &duration_from_seconds(seconds));
    }
}

/// Update the subsections of `kind` to match `records`, dropping the others.
fn sync_subsections<'a, T, F>(
    parent: &mut Section,
    kind: &str,
    records: &'a [T],
    name: fn(&'a T) -> &'a str,
    mut update: F,
) where
    F: FnMut(&mut Section, &'a T),
{
    let stale: Vec<String> = parent
        .sections_of_kind(kind)
        .filter_map(|s| s.kind_and_key())
        .filter(|(_, key)| !records.iter().any(|r| name(r) == *key))
        .map(|(_, key)| key.to_string())
        .collect();
    for key in stale {
        parent.remove_section(&format!("{} : {}", kind, key));
    }

    for record in records {
        let section = parent.section_or_insert(&format!("{} : {}", kind, name(record)));
        update(section, record);
    }
}

fn net_address(
    section: &Section,
    net_key: &str,
    ip_key: &str,
) -> Result<Option<NetAddress>, ConfigError> {
    let net = optional(section, net_key);
    let ip = optional(section, ip_key);

    let address = match (net, ip) {
        (Some(_), Some(_)) => {
            return Err(config_parse_err!(
                "both '{}' and '{}' set in section [{}]",
                net_key,
                ip_key,
                section.name()
            ))
        }
        (Some(net), None) => Some(NetAddress::net(&net)),
        (None, Some(ip)) => Some(NetAddress::ip(&ip)),
        (None, None) => None,
    };

    address
        .transpose()
        .map_err(|err| config_parse_err!("section [{}] - {}", section.name(), err))
}

fn set_net_address(
    section: &mut Section,
    net_key: &str,
    ip_key: &str,
    address: &Option<NetAddress>,
) {
    match address {
        Some(NetAddress::Net(net)) => {
            section.remove(ip_key);
            set_str(section, net_key, net);
        }
        Some(NetAddress::Ip(ip)) => {
            section.remove(net_key);
            set_str(section, ip_key, ip);
        }
        None => {
            section.remove(net_key);
            section.remove(ip_key);
        }
    }
}

pub fn read_disk(section: &Section) -> Result<Disk, ConfigError> {
    let mut mapping = Vec::new();
    for item in list(section, "Mapping") {
        match item.split_once(':') {
            Some((device, path)) => mapping.push((device.trim().to_string(), path.trim().to_string())),
            None => {
                return Err(config_parse_err!(
                    "invalid mapping '{}' in section [{}]",
                    item,
                    section.name()
                ))
            }
        }
    }

    Ok(Disk {
        name: section_key(section)?.to_string(),
        component: optional(section, "Component")
            .unwrap_or_else(|| DEFAULT_DISK_COMPONENT.to_string()),
        devices: list(section, "Devices"),
        drives: list(section, "Drives"),
        mapping,
    })
}

pub fn write_disk(section: &mut Section, disk: &Disk) {
    set_str(section, "Component", &disk.component);
    set_list(section, "Devices", &disk.devices);
    set_list(section, "Drives", &disk.drives);
    let mapping: Vec<String> = disk
        .mapping
        .iter()
        .map(|(device, path)| format!("{}:{}", device, path))
        .collect();
    set_list(section, "Mapping", &mapping);
}

pub fn read_node(section: &Section) -> Result<Node, ConfigError> {
    let id: u64 = parse_value(section, "id", section_key(section)?)?;

    let disks = section
        .sections_of_kind(DISK_KIND)
        .map(read_disk)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Node {
        id,
        name: optional(section, "Name").unwrap_or_else(|| format!("n{}", id)),
        uuid: optional(section, "UUID").unwrap_or_default(),
        private: net_address(section, "PrivateNet", "PrivateIP")?,
        public: net_address(section, "PublicNet", "PublicIP")?,
        disks,
    })
}

pub fn write_node(section: &mut Section, node: &Node) {
    set_str(section, "Name", &node.name);
    set_opt_str(
        section,
        "UUID",
        Some(node.uuid.as_str()).filter(|uuid| !uuid.is_empty()),
    );
    set_net_address(section, "PrivateNet", "PrivateIP", &node.private);
    set_net_address(section, "PublicNet", "PublicIP", &node.public);
    sync_subsections(section, DISK_KIND, &node.disks, |d| d.name.as_str(), write_disk);
}

pub fn read_volume(section: &Section) -> Result<Volume, ConfigError> {
    let nodes: Vec<u64> = parse_list(section, "Nodes")?;
    let num_master_nodes = match parse_optional(section, "NumMasterNodes")? {
        Some(count) => count,
        None => nodes.len() as u32,
    };

    Ok(Volume {
        name: section_key(section)?.to_string(),
        vol_type: parse_required(section, "Type")?,
        size: size_value(section, "Size")?,
        disk: required(section, "Disk")?,
        redundancy: parse_optional(section, "Redundancy")?.unwrap_or(1),
        nodes,
        owner: parse_required(section, "Owner")?,
        num_master_nodes,
        perm: optional(section, "Permissions").unwrap_or_else(|| DEFAULT_VOLUME_PERM.to_string()),
        labels: list(section, "Labels"),
        block_size: parse_optional(section, "BlockSize")?.unwrap_or(DEFAULT_VOLUME_BLOCK_SIZE),
        stripe_size: parse_optional(section, "StripeSize")?.unwrap_or(DEFAULT_VOLUME_STRIPE_SIZE),
    })
}

pub fn write_volume(section: &mut Section, volume: &Volume) {
    set_parsed(section, "Type", &volume.vol_type);
    set_size(section, "Size", volume.size);
    set_str(section, "Disk", &volume.disk);
    set_parsed(section, "Redundancy", &volume.redundancy);
    let nodes: Vec<String> = volume.nodes.iter().map(|id| id.to_string()).collect();
    set_list(section, "Nodes", &nodes);
    set_parsed(section, "Owner", &volume.owner);
    set_parsed(section, "NumMasterNodes", &volume.num_master_nodes);
    set_str(section, "Permissions", &volume.perm);
    set_list(section, "Labels", &volume.labels);
    set_parsed(section, "BlockSize", &volume.block_size);
    set_parsed(section, "StripeSize", &volume.stripe_size);
}

pub fn read_remote_volume(section: &Section) -> Result<RemoteVolume, ConfigError> {
    Ok(RemoteVolume {
        name: section_key(section)?.to_string(),
        id: parse_required(section, "ID")?,
        vol_type: parse_required(section, "Type")?,
        url: required(section, "URL")?,
        owner: parse_required(section, "Owner")?,
        username: optional(section, "Username"),
        password: optional(section, "Passwd"),
        options: optional(section, "Options"),
        labels: list(section, "Labels"),
    })
}

pub fn write_remote_volume(section: &mut Section, volume: &RemoteVolume) {
    set_parsed(section, "ID", &volume.id);
    set_parsed(section, "Type", &volume.vol_type);
    set_str(section, "URL", &volume.url);
    set_parsed(section, "Owner", &volume.owner);
    set_opt_str(section, "Username", volume.username.as_deref());
    set_opt_str(section, "Passwd", volume.password.as_deref());
    set_opt_str(section, "Options", volume.options.as_deref());
    set_list(section, "Labels", &volume.labels);
}

pub fn read_group(section: &Section) -> Result<Group, ConfigError> {
    Ok(Group {
        name: section.name().to_string(),
        id: parse_required(section, "ID")?,
    })
}

pub fn write_group(section: &mut Section, group: &Group) {
    set_parsed(section, "ID", &group.id);
}

pub fn read_user(section: &Section) -> Result<User, ConfigError> {
    Ok(User {
        name: section.name().to_string(),
        id: parse_required(section, "ID")?,
        group: required(section, "Group")?,
        login_enabled: bool_value(section, "LoginEnabled", false)?,
        passwd: optional(section, "Passwd"),
        additional_groups: list(section, "AdditionalGroups"),
        authorized_keys: list(section, "AuthorizedKeys"),
    })
}

pub fn write_user(section: &mut Section, user: &User) {
    set_parsed(section, "ID", &user.id);
    set_str(section, "Group", &user.group);
    set_bool(section, "LoginEnabled", user.login_enabled);
    set_opt_str(section, "Passwd", user.passwd.as_deref());
    set_list(section, "AdditionalGroups", &user.additional_groups);
    set_list(section, "AuthorizedKeys", &user.authorized_keys);
}

pub fn read_bucket(section: &Section) -> Result<Bucket, ConfigError> {
    Ok(Bucket {
        name: section_key(section)?.to_string(),
        public: bool_value(section, "Public", false)?,
        read_passwd: optional(section, "ReadPasswd").unwrap_or_default(),
        write_passwd: optional(section, "WritePasswd").unwrap_or_default(),
        additional_files: list(section, "AdditionalFiles"),
    })
}

pub fn write_bucket(section: &mut Section, bucket: &Bucket) {
    set_bool(section, "Public", bucket.public);
    set_str(section, "ReadPasswd", &bucket.read_passwd);
    set_str(section, "WritePasswd", &bucket.write_passwd);
    set_list(section, "AdditionalFiles", &bucket.additional_files);
}

pub fn read_bucketfs(section: &Section) -> Result<BucketFs, ConfigError> {
    let buckets = section
        .sections_of_kind(BUCKET_KIND)
        .map(read_bucket)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(BucketFs {
        name: section_key(section)?.to_string(),
        owner: parse_required::<Owner>(section, "Owner")?,
        http_port: parse_optional(section, "HttpPort")?.unwrap_or(0),
        https_port: parse_optional(section, "HttpsPort")?.unwrap_or(0),
        sync_key: optional(section, "SyncKey").unwrap_or_default(),
        sync_period: parse_optional(section, "SyncPeriod")?
            .unwrap_or(DEFAULT_BUCKETFS_SYNC_PERIOD),
        path: optional(section, "Path"),
        buckets,
    })
}

pub fn write_bucketfs(section: &mut Section, bucketfs: &BucketFs) {
    set_parsed(section, "Owner", &bucketfs.owner);
    set_parsed(section, "HttpPort", &bucketfs.http_port);
    set_parsed(section, "HttpsPort", &bucketfs.https_port);
    set_str(section, "SyncKey", &bucketfs.sync_key);
    set_parsed(section, "SyncPeriod", &bucketfs.sync_period);
    set_opt_str(section, "Path", bucketfs.path.as_deref());
    sync_subsections(
        section,
        BUCKET_KIND,
        &bucketfs.buckets,
        |b| b.name.as_str(),
        write_bucket,
    );
}

pub fn read_backup(section: &Section) -> Result<BackupSchedule, ConfigError> {
    let cron = |key: &str| optional(section, key).unwrap_or_else(|| "*".to_string());

    let expire = match optional(section, "Expire") {
        Some(text) => seconds_from_duration(&text)?,
        None => 0,
    };

    Ok(BackupSchedule {
        name: section_key(section)?.to_string(),
        volume: required(section, "Volume")?,
        level: parse_optional(section, "Level")?.unwrap_or(0),
        minute: cron("Minute"),
        hour: cron("Hour"),
        day: cron("Day"),
        month: cron("Month"),
        weekday: cron("Weekday"),
        expire,
        enabled: bool_value(section, "Enabled", true)?,
    })
}

pub fn write_backup(section: &mut Section, backup: &BackupSchedule) {
    set_str(section, "Volume", &backup.volume);
    set_parsed(section, "Level", &backup.level);
    set_str(section, "Minute", &backup.minute);
    set_str(section, "Hour", &backup.hour);
    set_str(section, "Day", &backup.day);
    set_str(section, "Month", &backup.month);
    set_str(section, "Weekday", &backup.weekday);
    set_duration(section, "Expire", backup.expire);
    set_bool(section, "Enabled", backup.enabled);
}

pub fn read_database(section: &Section) -> Result<Database, ConfigError> {
    let backups = section
        .sections_of_kind(BACKUP_KIND)
        .map(read_backup)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Database {
        name: section_key(section)?.to_string(),
        data_volume: optional(section, "DataVolume"),
        nodes: parse_list(section, "Nodes")?,
        backups,
    })
}

pub fn read_storage_config(section: &Section) -> Result<StorageConfig, ConfigError> {
    Ok(StorageConfig {
        bg_rec_enabled: match section.get("BgRecEnabled") {
            Some(_) => Some(bool_value(section, "BgRecEnabled", false)?),
            None => None,
        },
        bg_rec_limit: parse_optional(section, "BgRecLimit")?,
        space_warn_threshold: parse_optional(section, "SpaceWarnThreshold")?,
    })
}

pub fn write_storage_config(section: &mut Section, config: &StorageConfig) {
    match config.bg_rec_enabled {
        Some(enabled) => set_bool(section, "BgRecEnabled", enabled),
        None => {
            section.remove("BgRecEnabled");
        }
    }
    match config.bg_rec_limit {
        Some(limit) => set_parsed(section, "BgRecLimit", &limit),
        None => {
            section.remove("BgRecLimit");
        }
    }
    match config.space_warn_threshold {
        Some(threshold) => set_parsed(section, "SpaceWarnThreshold", &threshold),
        None => {
            section.remove("SpaceWarnThreshold");
        }
    }
}

#[cfg(test)]
mod test {
    use exa_api_types::VolumeType;

    use super::*;
    use crate::parser::ExaConfParser;

    fn parse(input: &str) -> Section {
        ExaConfParser::new(input.as_bytes()).parse().unwrap()
    }

    #[test]
    fn test_node_mapping() -> Result<(), ConfigError> {
        let root = parse(
            "[Node : 11]\n    PrivateNet = 10.10.10.11/24\n    PublicIP = 192.168.1.11\n    DockerVolume = n11\n    [[Disk : disk1]]\n        Devices = dev.1,\n        Mapping = dev.1:/data/storage\n",
        );
        let section = root.section("Node : 11").unwrap();
        let mut node = read_node(section)?;

        assert_eq!(node.id, 11);
        assert_eq!(node.name, "n11");
        assert_eq!(node.private, Some(NetAddress::Net("10.10.10.11/24".into())));
        assert_eq!(node.public, Some(NetAddress::Ip("192.168.1.11".into())));
        assert_eq!(node.disks[0].component, DEFAULT_DISK_COMPONENT);
        assert_eq!(node.disks[0].devices, vec!["dev.1"]);
        assert_eq!(
            node.disks[0].mapping,
            vec![("dev.1".to_string(), "/data/storage".to_string())]
        );

        node.private = Some(NetAddress::Ip("10.10.10.99".into()));
        node.disks.clear();

        let mut section = section.clone();
        write_node(&mut section, &node);
        assert_eq!(section.get("PrivateNet"), None);
        assert_eq!(section.get("PrivateIP"), Some("10.10.10.99"));
        assert_eq!(section.get("DockerVolume"), Some("n11"));
        assert_eq!(section.sections().count(), 0);
        Ok(())
    }

    #[test]
    fn test_node_with_net_and_ip_fails() {
        let root = parse("[Node : 11]\n    PrivateNet = 10.10.10.11/24\n    PrivateIP = 10.10.10.11\n");
        assert!(read_node(root.section("Node : 11").unwrap()).is_err());
    }

    #[test]
    fn test_volume_mapping() -> Result<(), ConfigError> {
        let root = parse(
            "[EXAVolume : DataVolume1]\n    Type = data\n    Nodes = 11, 12\n    Disk = disk1\n    Size = 100 GiB\n    Redundancy = 2\n    Owner = 500 : 500\n",
        );
        let section = root.section("EXAVolume : DataVolume1").unwrap();
        let mut volume = read_volume(section)?;

        assert_eq!(volume.vol_type, VolumeType::Data);
        assert_eq!(volume.size, 100 * 1024 * 1024 * 1024);
        assert_eq!(volume.nodes, vec![11, 12]);
        assert_eq!(volume.num_master_nodes, 2);
        assert_eq!(volume.owner, Owner::new(500, 500));
        assert_eq!(volume.perm, DEFAULT_VOLUME_PERM);

        // rewriting unchanged values keeps the section as it is, apart from new defaults
        let mut copy = section.clone();
        write_volume(&mut copy, &volume);
        assert_eq!(copy.get("Size"), Some("100 GiB"));
        assert_eq!(copy.get("Owner"), Some("500 : 500"));
        assert_eq!(copy.get("NumMasterNodes"), Some("2"));

        volume.size += 1;
        write_volume(&mut copy, &volume);
        assert_eq!(copy.get("Size"), Some("107374182401"));
        Ok(())
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(1024), "1 KiB");
        assert_eq!(format_size(1536), "1.5 KiB");
        assert_eq!(format_size(1000), "1000 B");
        assert_eq!(format_size(1025), "1.001 KiB");
        assert_eq!(format_size(107374182401), "107374182401");
    }

    #[test]
    fn test_backup_mapping() -> Result<(), ConfigError> {
        let root = parse(
            "[DB : DB1]\n    DataVolume = DataVolume1\n    [[Backup : full]]\n        Volume = RemoteVolume1\n        Level = 0\n        Expire = 1w 1d\n        Hour = 2\n",
        );
        let db = read_database(root.section("DB : DB1").unwrap())?;
        let backup = db.backup("full").unwrap();

        assert_eq!(db.data_volume.as_deref(), Some("DataVolume1"));
        assert_eq!(backup.expire, 8 * 86400);
        assert_eq!(backup.hour, "2");
        assert_eq!(backup.minute, "*");
        assert!(backup.enabled);
        Ok(())
    }

    #[test]
    fn test_user_mapping() -> Result<(), ConfigError> {
        let root = parse(
            "[Users]\n    [[exadefusr]]\n        ID = 500\n        Group = exausers\n        LoginEnabled = True\n        AuthorizedKeys = \"ssh-rsa AAAA user@host\",\n",
        );
        let section = root.section("Users").and_then(|s| s.section("exadefusr")).unwrap();
        let user = read_user(section)?;

        assert_eq!(user.id, 500);
        assert!(user.login_enabled);
        assert_eq!(user.authorized_keys, vec!["ssh-rsa AAAA user@host"]);

        let mut copy = section.clone();
        write_user(&mut copy, &user);
        assert_eq!(&copy, section);
        Ok(())
    }
}
