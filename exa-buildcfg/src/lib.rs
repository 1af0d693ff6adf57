//! Exports configuration data from the build system

pub const EXACONF_PKG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION_MAJOR"),
    ".",
    env!("CARGO_PKG_VERSION_MINOR"),
);
pub const EXACONF_PKG_RELEASE: &str = env!("CARGO_PKG_VERSION_PATCH");

#[macro_export]
macro_rules! EXA_ETC_DIR_M {
    () => {
        "/exa/etc"
    };
}

/// Prepend the EXAConf directory to a file name
///
/// #### Example:
/// ```
/// use exa_buildcfg::etcdir;
/// let path = etcdir!("/EXAConf");
/// ```
#[macro_export]
macro_rules! etcdir {
    ($subdir:expr) => {
        concat!($crate::EXA_ETC_DIR_M!(), $subdir)
    };
}

/// The configured configuration directory
pub const EXA_ETC_DIR: &str = EXA_ETC_DIR_M!();

/// Default location of the cluster configuration file.
pub const EXACONF_DEFAULT_PATH: &str = etcdir!("/EXAConf");

/// First ID handed out to cluster nodes.
pub const FIRST_NODE_ID: u64 = 11;

/// First ID handed out to remote volumes.
pub const FIRST_REMOTE_VOLUME_ID: u64 = 10000;

/// Storage component a new disk is assigned to.
pub const DEFAULT_DISK_COMPONENT: &str = "exastorage";

/// Default volume block size in bytes.
pub const DEFAULT_VOLUME_BLOCK_SIZE: u64 = 4096;

/// Default volume stripe size in bytes.
pub const DEFAULT_VOLUME_STRIPE_SIZE: u64 = 262144;

/// Default volume permissions (owner only).
pub const DEFAULT_VOLUME_PERM: &str = "rwx------";

/// Default BucketFS synchronization period (in milliseconds).
pub const DEFAULT_BUCKETFS_SYNC_PERIOD: u64 = 30000;
