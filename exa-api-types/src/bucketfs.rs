use crate::Owner;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Bucket of a BucketFS.
pub struct Bucket {
    pub name: String,
    pub public: bool,
    // Note: The stored passwords are base64 encoded
    pub read_passwd: String,
    pub write_passwd: String,
    pub additional_files: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// BucketFS namespace with its buckets.
pub struct BucketFs {
    pub name: String,
    pub owner: Owner,
    pub http_port: u16,
    pub https_port: u16,
    pub sync_key: String,
    pub sync_period: u64,
    pub path: Option<String>,
    pub buckets: Vec<Bucket>,
}

impl BucketFs {
    pub fn bucket(&self, name: &str) -> Option<&Bucket> {
        self.buckets.iter().find(|b| b.name == name)
    }

    /// Non-zero ports, which must be unique across all BucketFS.
    pub fn ports(&self) -> impl Iterator<Item = u16> {
        [self.http_port, self.https_port]
            .into_iter()
            .filter(|port| *port != 0)
    }
}
