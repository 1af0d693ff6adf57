use exa_api_types::{Bucket, BucketFs, Owner};
use exa_buildcfg::DEFAULT_BUCKETFS_SYNC_PERIOD;
use exa_config::{integrity_err, not_found, ConfigError, ExaConf};
use exa_tools::crypt::{encode_reversible, generate_encoded_password};

use super::{check_unused, select_keys};

#[derive(Debug, Clone)]
pub struct NewBucketFs {
    pub name: String,
    pub owner: Owner,
    pub http_port: u16,
    pub https_port: u16,
    /// Generated if not given.
    pub sync_key: Option<String>,
    /// Milliseconds.
    pub sync_period: Option<u64>,
    pub path: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct BucketFsUpdate {
    pub owner: Option<Owner>,
    pub http_port: Option<u16>,
    pub https_port: Option<u16>,
    pub sync_period: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct NewBucket {
    pub name: String,
    pub public: bool,
    /// Generated if not given.
    pub read_passwd: Option<String>,
    /// Generated if not given.
    pub write_passwd: Option<String>,
    pub additional_files: Vec<String>,
}

#[derive(Debug, Default, Clone)]
pub struct BucketUpdate {
    pub public: Option<bool>,
    pub read_passwd: Option<String>,
    pub write_passwd: Option<String>,
    pub additional_files: Option<Vec<String>>,
}

/// Encode a given secret, or generate a new one.
fn secret(value: Option<&str>) -> Result<String, ConfigError> {
    match value {
        Some(value) => Ok(encode_reversible(value)),
        None => Ok(generate_encoded_password()?),
    }
}

pub fn add_bucketfs(conf: &mut ExaConf, param: NewBucketFs) -> Result<(), ConfigError> {
    if conf.lookup_bucketfs(&param.name).is_ok() {
        return Err(integrity_err!("BucketFS '{}' already exists", param.name));
    }

    let bucketfs = BucketFs {
        sync_key: secret(param.sync_key.as_deref())?,
        name: param.name,
        owner: param.owner,
        http_port: param.http_port,
        https_port: param.https_port,
        sync_period: param.sync_period.unwrap_or(DEFAULT_BUCKETFS_SYNC_PERIOD),
        path: param.path,
        buckets: Vec::new(),
    };

    conf.upsert_bucketfs(&bucketfs)
}

/// Modify one BucketFS, or all of them with `_all`.
pub fn modify_bucketfs(
    conf: &mut ExaConf,
    selector: &str,
    update: &BucketFsUpdate,
) -> Result<(), ConfigError> {
    let names: Vec<String> = conf.bucketfs()?.into_iter().map(|b| b.name).collect();

    for name in select_keys(names, selector, Some(selector.to_string()), "BucketFS")? {
        let mut bucketfs = conf.lookup_bucketfs(&name)?;

        if let Some(owner) = update.owner {
            bucketfs.owner = owner;
        }
        if let Some(port) = update.http_port {
            bucketfs.http_port = port;
        }
        if let Some(port) = update.https_port {
            bucketfs.https_port = port;
        }
        if let Some(period) = update.sync_period {
            bucketfs.sync_period = period;
        }

        conf.upsert_bucketfs(&bucketfs)?;
    }
    Ok(())
}

/// Remove a BucketFS. Without `force`, a BucketFS still holding buckets is kept.
pub fn remove_bucketfs(conf: &mut ExaConf, name: &str, force: bool) -> Result<BucketFs, ConfigError> {
    let bucketfs = conf.lookup_bucketfs(name)?;
    let users: Vec<String> = bucketfs
        .buckets
        .iter()
        .map(|b| format!("bucket '{}'", b.name))
        .collect();
    check_unused(&format!("BucketFS '{}'", name), &users, force)?;
    conf.remove_bucketfs(name)
}

pub fn add_bucket(conf: &mut ExaConf, bucketfs: &str, param: NewBucket) -> Result<(), ConfigError> {
    if conf.lookup_bucketfs(bucketfs)?.bucket(&param.name).is_some() {
        return Err(integrity_err!(
            "bucket '{}' already exists in BucketFS '{}'",
            param.name,
            bucketfs
        ));
    }

    let bucket = Bucket {
        read_passwd: secret(param.read_passwd.as_deref())?,
        write_passwd: secret(param.write_passwd.as_deref())?,
        name: param.name,
        public: param.public,
        additional_files: param.additional_files,
    };

    conf.upsert_bucket(bucketfs, &bucket)
}

/// Modify one bucket of a BucketFS, or all of its buckets with `_all`.
pub fn modify_bucket(
    conf: &mut ExaConf,
    bucketfs: &str,
    selector: &str,
    update: &BucketUpdate,
) -> Result<(), ConfigError> {
    let bfs = conf.lookup_bucketfs(bucketfs)?;
    let names: Vec<String> = bfs.buckets.iter().map(|b| b.name.clone()).collect();

    for name in select_keys(names, selector, Some(selector.to_string()), "bucket")? {
        let mut bucket = bfs
            .bucket(&name)
            .cloned()
            .ok_or_else(|| not_found!("bucket '{}' in BucketFS '{}'", name, bucketfs))?;

        if let Some(public) = update.public {
            bucket.public = public;
        }
        if let Some(passwd) = &update.read_passwd {
            bucket.read_passwd = encode_reversible(passwd);
        }
        if let Some(passwd) = &update.write_passwd {
            bucket.write_passwd = encode_reversible(passwd);
        }
        if let Some(files) = &update.additional_files {
            bucket.additional_files = files.clone();
        }

        conf.upsert_bucket(bucketfs, &bucket)?;
    }
    Ok(())
}

pub fn remove_bucket(conf: &mut ExaConf, bucketfs: &str, name: &str) -> Result<Bucket, ConfigError> {
    conf.remove_bucket(bucketfs, name)
}

#[cfg(test)]
mod test {
    use exa_tools::crypt::{classify_reversible, decode_reversible, Encoding};

    use super::*;
    use crate::ops::test_util::base_config;

    fn new_bucketfs(name: &str, http_port: u16, https_port: u16) -> NewBucketFs {
        NewBucketFs {
            name: name.into(),
            owner: Owner::new(500, 500),
            http_port,
            https_port,
            sync_key: None,
            sync_period: None,
            path: None,
        }
    }

    fn new_bucket(name: &str) -> NewBucket {
        NewBucket {
            name: name.into(),
            public: false,
            read_passwd: None,
            write_passwd: Some("writer".into()),
            additional_files: Vec::new(),
        }
    }

    #[test]
    fn test_add_bucketfs() -> Result<(), ConfigError> {
        let mut conf = base_config();

        add_bucketfs(&mut conf, new_bucketfs("bfs1", 6584, 6585))?;
        let bfs = conf.lookup_bucketfs("bfs1")?;
        assert_eq!(bfs.sync_period, DEFAULT_BUCKETFS_SYNC_PERIOD);
        assert!(matches!(classify_reversible(&bfs.sync_key), Encoding::Encoded(_)));

        assert!(matches!(
            add_bucketfs(&mut conf, new_bucketfs("bfs1", 7000, 0)),
            Err(ConfigError::Integrity(_))
        ));
        assert!(matches!(
            add_bucketfs(&mut conf, new_bucketfs("bfs2", 6583, 0)),
            Err(ConfigError::Integrity(_))
        ));
        assert!(matches!(
            add_bucketfs(&mut conf, new_bucketfs("bfs2", 7000, 7000)),
            Err(ConfigError::Integrity(_))
        ));
        // disabled ports may be shared
        add_bucketfs(&mut conf, new_bucketfs("bfs2", 7000, 0))?;
        Ok(())
    }

    #[test]
    fn test_modify_bucketfs() -> Result<(), ConfigError> {
        let mut conf = base_config();
        add_bucketfs(&mut conf, new_bucketfs("bfs1", 6584, 0))?;

        let update = BucketFsUpdate {
            http_port: Some(6584),
            ..Default::default()
        };
        assert!(matches!(
            modify_bucketfs(&mut conf, "bfsdefault", &update),
            Err(ConfigError::Integrity(_))
        ));

        let update = BucketFsUpdate {
            sync_period: Some(60000),
            owner: Some(Owner::new(1000, 1000)),
            ..Default::default()
        };
        modify_bucketfs(&mut conf, "_all", &update)?;
        for bfs in conf.bucketfs()? {
            assert_eq!(bfs.sync_period, 60000);
            assert_eq!(bfs.owner, Owner::new(1000, 1000));
        }
        Ok(())
    }

    #[test]
    fn test_buckets() -> Result<(), ConfigError> {
        let mut conf = base_config();

        add_bucket(&mut conf, "bfsdefault", new_bucket("udfs"))?;
        let bucket = conf.lookup_bucketfs("bfsdefault")?.bucket("udfs").cloned().unwrap();
        assert_eq!(decode_reversible(&bucket.write_passwd), "writer");
        assert!(!bucket.read_passwd.is_empty());

        assert!(matches!(
            add_bucket(&mut conf, "bfsdefault", new_bucket("udfs")),
            Err(ConfigError::Integrity(_))
        ));
        assert!(matches!(
            add_bucket(&mut conf, "missing", new_bucket("udfs")),
            Err(ConfigError::NotFound(_))
        ));

        let update = BucketUpdate {
            public: Some(true),
            additional_files: Some(vec!["a.tar.gz".into(), "b.zip".into()]),
            ..Default::default()
        };
        modify_bucket(&mut conf, "bfsdefault", "_all", &update)?;
        for bucket in conf.lookup_bucketfs("bfsdefault")?.buckets {
            assert!(bucket.public);
            assert_eq!(bucket.additional_files, vec!["a.tar.gz", "b.zip"]);
        }
        assert!(matches!(
            modify_bucket(&mut conf, "bfsdefault", "missing", &update),
            Err(ConfigError::NotFound(_))
        ));

        assert!(matches!(
            remove_bucketfs(&mut conf, "bfsdefault", false),
            Err(ConfigError::InUse { .. })
        ));
        remove_bucket(&mut conf, "bfsdefault", "udfs")?;
        remove_bucket(&mut conf, "bfsdefault", "default")?;
        remove_bucketfs(&mut conf, "bfsdefault", false)?;
        assert!(conf.bucketfs()?.is_empty());
        Ok(())
    }
}
