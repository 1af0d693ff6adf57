use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use proxmox_schema::api;

use exa_tools::{units, ParseError};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
/// Numeric owner of a volume or BucketFS.
pub struct Owner {
    pub uid: u32,
    pub gid: u32,
}

impl Owner {
    pub fn new(uid: u32, gid: u32) -> Self {
        Self { uid, gid }
    }
}

impl FromStr for Owner {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (uid, gid) = units::parse_owner(s)?;
        Ok(Self { uid, gid })
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} : {}", self.uid, self.gid)
    }
}

#[api()]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Storage volume type
pub enum VolumeType {
    /// Database data volume
    Data,
    /// Backup archive volume
    Archive,
    /// Volume backed by remote storage
    Remote,
}
serde_plain::derive_display_from_serialize!(VolumeType);
serde_plain::derive_fromstr_from_deserialize!(VolumeType);

#[derive(Debug, Clone, PartialEq, Eq)]
/// Storage volume.
pub struct Volume {
    pub name: String,
    pub vol_type: VolumeType,
    /// Size in bytes.
    pub size: u64,
    pub disk: String,
    pub redundancy: u32,
    pub nodes: Vec<u64>,
    pub owner: Owner,
    pub num_master_nodes: u32,
    pub perm: String,
    pub labels: Vec<String>,
    pub block_size: u64,
    pub stripe_size: u64,
}

#[api()]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Remote volume type
pub enum RemoteVolumeType {
    /// SMB/CIFS share
    Smb,
    /// FTP server
    Ftp,
    /// S3 bucket
    S3,
}
serde_plain::derive_display_from_serialize!(RemoteVolumeType);
serde_plain::derive_fromstr_from_deserialize!(RemoteVolumeType);

#[derive(Debug, Clone, PartialEq, Eq)]
/// Volume on a remote storage service, used as backup target.
pub struct RemoteVolume {
    pub name: String,
    pub id: u64,
    pub vol_type: RemoteVolumeType,
    pub url: String,
    pub owner: Owner,
    pub username: Option<String>,
    // Note: The stored password is base64 encoded
    pub password: Option<String>,
    pub options: Option<String>,
    pub labels: Vec<String>,
}
