use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::Error;
use nix::errno::Errno;
use nix::unistd::AccessFlags;

use exa_api_types::{
    BackupSchedule, Bucket, BucketFs, Database, Group, Node, RemoteVolume, StorageConfig, User,
    Volume, EXA_SAFE_ID_REGEX, VOLUME_PERM_REGEX,
};
use exa_buildcfg::FIRST_REMOTE_VOLUME_ID;
use exa_tools::fs::{replace_file, CreateOptions, WriteOutcome};
use proxmox_sys::fs::file_read_optional_string;

use crate::mapping::*;
use crate::parser::ExaConfParser;
use crate::section::{verify_section_name, Section};
use crate::{config_parse_err, integrity_err, not_found, ConfigError};

/// Value of `[Global] Checksum` in a document that has not been initialized.
pub const CHECKSUM_NONE: &str = "NONE";
/// Value of `[Global] Checksum` written by `ExaConf::create`.
pub const CHECKSUM_COMMIT: &str = "COMMIT";

#[derive(Debug, Default, Clone, Copy)]
pub struct LoadOptions {
    /// Only require read access.
    pub read_only: bool,
    /// Fail with `NotInitialized` unless the document has been initialized.
    pub initialized: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitStatus {
    /// Nothing was modified, the file was not touched.
    Clean,
    /// The file already had the new content.
    Unchanged,
    /// The file was replaced, carrying the new revision.
    Written(u64),
}

/// The EXAConf document.
///
/// All modifications are staged in memory; [`commit`](Self::commit) is the only
/// place the file is written.
pub struct ExaConf {
    path: PathBuf,
    root: Section,
    dirty: bool,
    options: CreateOptions,
}

impl TryFrom<&ExaConf> for String {
    type Error = Error;

    fn try_from(config: &ExaConf) -> Result<Self, Self::Error> {
        let mut output = Vec::new();
        config.root.write_items(&mut output, 0)?;
        let res = String::from_utf8(output)?;
        Ok(res)
    }
}

/// Insert or update a subsection, returning true if anything changed.
///
/// Nothing is modified if the result could not be written and read back.
fn upsert_section<F>(parent: &mut Section, name: &str, update: F) -> Result<bool, ConfigError>
where
    F: FnOnce(&mut Section),
{
    let mut section = match parent.section(name) {
        Some(section) => section.clone(),
        None => Section::new(name),
    };
    update(&mut section);

    verify_section_name(name)
        .and_then(|_| section.verify_writable())
        .map_err(|err| integrity_err!("{}", err))?;

    match parent.section_mut(name) {
        Some(current) if *current == section => Ok(false),
        Some(current) => {
            *current = section;
            Ok(true)
        }
        None => {
            parent.insert_section(section);
            Ok(true)
        }
    }
}

/// Entity names end up in section headers and list values.
fn check_entity_name(what: &str, name: &str) -> Result<(), ConfigError> {
    if !EXA_SAFE_ID_REGEX.is_match(name) {
        return Err(integrity_err!("invalid {} name '{}'", what, name.escape_debug()));
    }
    Ok(())
}

fn find_duplicate<'a, I: IntoIterator<Item = &'a str>>(items: I) -> Option<&'a str> {
    let mut seen = HashSet::new();
    items.into_iter().find(|item| !seen.insert(*item))
}

impl ExaConf {
    /// Load the document, checking access rights (and initialization if requested).
    pub fn load<P: AsRef<Path>>(path: P, options: LoadOptions) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        let (mode, what) = if options.read_only {
            (AccessFlags::R_OK, "read")
        } else {
            (AccessFlags::R_OK | AccessFlags::W_OK, "read and write")
        };
        match nix::unistd::access(path, mode) {
            Ok(()) => (),
            Err(Errno::ENOENT) => return Err(not_found!("EXAConf {:?}", path)),
            Err(err) => {
                return Err(ConfigError::Permission(format!(
                    "no {} access to EXAConf {:?} - {}",
                    what, path, err
                )))
            }
        }

        let data = match file_read_optional_string(path)? {
            Some(data) => data,
            None => return Err(not_found!("EXAConf {:?}", path)),
        };

        let conf = Self::parse(path, &data)?;
        if options.initialized && !conf.is_initialized() {
            return Err(ConfigError::NotInitialized(path.to_owned()));
        }

        Ok(conf)
    }

    /// Parse document content; `path` is where it will be committed to.
    pub fn parse<P: AsRef<Path>>(path: P, data: &str) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let root = ExaConfParser::new(data.as_bytes())
            .parse()
            .map_err(|err| config_parse_err!("unable to parse {:?} - {}", path, err))?;

        Ok(Self {
            path: path.to_owned(),
            root,
            dirty: false,
            options: CreateOptions::new(),
        })
    }

    /// Create a new, initialized document. Nothing is written before `commit`.
    pub fn create<P: AsRef<Path>>(path: P, cluster_name: &str) -> Self {
        let mut root = Section::new("");

        let mut global = Section::new(GLOBAL_SECTION);
        global.set("Revision", "0");
        global.set("ClusterName", cluster_name);
        global.set("Checksum", CHECKSUM_COMMIT);
        root.insert_section(global);
        root.insert_section(Section::new(GROUPS_SECTION));
        root.insert_section(Section::new(USERS_SECTION));

        Self {
            path: path.as_ref().to_owned(),
            root,
            dirty: true,
            options: CreateOptions::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn set_create_options(&mut self, options: CreateOptions) {
        self.options = options;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn global(&self) -> Option<&Section> {
        self.root.section(GLOBAL_SECTION)
    }

    pub fn revision(&self) -> Result<u64, ConfigError> {
        match self.global().and_then(|g| g.get("Revision")) {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| config_parse_err!("invalid revision '{}'", value)),
            None => Ok(0),
        }
    }

    pub fn cluster_name(&self) -> Option<&str> {
        self.global().and_then(|g| g.get("ClusterName"))
    }

    pub fn is_initialized(&self) -> bool {
        matches!(
            self.global().and_then(|g| g.get("Checksum")),
            Some(checksum) if !checksum.is_empty() && checksum != CHECKSUM_NONE
        )
    }

    /// Write the document if it has been modified.
    ///
    /// The revision is incremented first and restored if writing fails.
    pub fn commit(&mut self) -> Result<CommitStatus, ConfigError> {
        if !self.dirty {
            return Ok(CommitStatus::Clean);
        }

        let revision = self.revision()? + 1;
        let had_global = self.global().is_some();
        let global = self.root.section_or_insert(GLOBAL_SECTION);
        let old_revision = global.get("Revision").map(String::from);
        global.set("Revision", &revision.to_string());

        match self.write() {
            Ok(outcome) => {
                self.dirty = false;
                match outcome {
                    WriteOutcome::Unchanged => Ok(CommitStatus::Unchanged),
                    WriteOutcome::Replaced => Ok(CommitStatus::Written(revision)),
                }
            }
            Err(err) => {
                if had_global {
                    let global = self.root.section_or_insert(GLOBAL_SECTION);
                    global.set_opt("Revision", old_revision.as_deref());
                } else {
                    self.root.remove_section(GLOBAL_SECTION);
                }
                Err(err)
            }
        }
    }

    fn write(&self) -> Result<WriteOutcome, ConfigError> {
        let data = String::try_from(self)?;
        let outcome = replace_file(&self.path, data.as_bytes(), self.options.clone())?;
        Ok(outcome)
    }

    fn mark(&mut self, changed: bool) {
        self.dirty |= changed;
    }

    // nodes

    pub fn nodes(&self) -> Result<Vec<Node>, ConfigError> {
        self.root.sections_of_kind(NODE_KIND).map(read_node).collect()
    }

    pub fn node(&self, id: u64) -> Result<Node, ConfigError> {
        match self.root.section(&format!("{} : {}", NODE_KIND, id)) {
            Some(section) => read_node(section),
            None => Err(not_found!("node '{}'", id)),
        }
    }

    pub fn upsert_node(&mut self, node: &Node) -> Result<(), ConfigError> {
        if node.name.is_empty() {
            return Err(integrity_err!("node {} has no name", node.id));
        }

        for other in self.nodes()?.iter().filter(|n| n.id != node.id) {
            if other.name == node.name {
                return Err(integrity_err!(
                    "node name '{}' is already used by node {}",
                    node.name,
                    other.id
                ));
            }
            if !node.uuid.is_empty() && other.uuid == node.uuid {
                return Err(integrity_err!(
                    "node UUID '{}' is already used by node {}",
                    node.uuid,
                    other.id
                ));
            }
        }

        if let Some(name) = find_duplicate(node.disks.iter().map(|d| d.name.as_str())) {
            return Err(integrity_err!("duplicate disk '{}' on node {}", name, node.id));
        }
        for disk in node.disks.iter() {
            check_entity_name("disk", &disk.name)?;
        }
        for disk in node.disks.iter() {
            if let Some(device) = find_duplicate(disk.devices.iter().map(String::as_str)) {
                return Err(integrity_err!(
                    "duplicate device '{}' in disk '{}' of node {}",
                    device,
                    disk.name,
                    node.id
                ));
            }
            if let Some((device, _)) = disk.mapping.iter().find(|(d, _)| !disk.has_device(d)) {
                return Err(integrity_err!(
                    "mapping for unknown device '{}' in disk '{}' of node {}",
                    device,
                    disk.name,
                    node.id
                ));
            }
        }

        let name = format!("{} : {}", NODE_KIND, node.id);
        let changed = upsert_section(&mut self.root, &name, |s| write_node(s, node))?;
        self.mark(changed);
        Ok(())
    }

    pub fn remove_node(&mut self, id: u64) -> Result<Node, ConfigError> {
        let node = self.node(id)?;
        self.root.remove_section(&format!("{} : {}", NODE_KIND, id));
        self.mark(true);
        Ok(node)
    }

    /// Volumes and databases using the node.
    pub fn node_references(&self, id: u64) -> Result<Vec<String>, ConfigError> {
        let mut list = Vec::new();
        for volume in self.volumes()? {
            if volume.nodes.contains(&id) {
                list.push(format!("volume '{}'", volume.name));
            }
        }
        for db in self.databases()? {
            if db.nodes.contains(&id) {
                list.push(format!("database '{}'", db.name));
            }
        }
        Ok(list)
    }

    /// Volumes using the disk on that node.
    pub fn disk_references(&self, node_id: u64, disk: &str) -> Result<Vec<String>, ConfigError> {
        Ok(self
            .volumes()?
            .into_iter()
            .filter(|v| v.disk == disk && v.nodes.contains(&node_id))
            .map(|v| format!("volume '{}'", v.name))
            .collect())
    }

    // volumes

    pub fn volumes(&self) -> Result<Vec<Volume>, ConfigError> {
        self.root
            .sections_of_kind(VOLUME_KIND)
            .map(read_volume)
            .collect()
    }

    pub fn volume(&self, name: &str) -> Result<Volume, ConfigError> {
        match self.root.section(&format!("{} : {}", VOLUME_KIND, name)) {
            Some(section) => read_volume(section),
            None => Err(not_found!("volume '{}'", name)),
        }
    }

    fn has_volume(&self, name: &str) -> bool {
        self.root
            .section(&format!("{} : {}", VOLUME_KIND, name))
            .is_some()
    }

    fn has_remote_volume(&self, name: &str) -> bool {
        self.root
            .section(&format!("{} : {}", REMOTE_VOLUME_KIND, name))
            .is_some()
    }

    pub fn upsert_volume(&mut self, volume: &Volume) -> Result<(), ConfigError> {
        check_entity_name("volume", &volume.name)?;
        if self.has_remote_volume(&volume.name) {
            return Err(integrity_err!(
                "volume name '{}' is already used by a remote volume",
                volume.name
            ));
        }

        if volume.nodes.is_empty() {
            return Err(integrity_err!("volume '{}' has no nodes", volume.name));
        }
        let node_ids: Vec<String> = volume.nodes.iter().map(|id| id.to_string()).collect();
        if let Some(id) = find_duplicate(node_ids.iter().map(String::as_str)) {
            return Err(integrity_err!(
                "node {} is listed twice in volume '{}'",
                id,
                volume.name
            ));
        }

        for id in volume.nodes.iter() {
            let node = match self.node(*id) {
                Ok(node) => node,
                Err(ConfigError::NotFound(_)) => {
                    return Err(integrity_err!(
                        "node {} of volume '{}' does not exist",
                        id,
                        volume.name
                    ))
                }
                Err(err) => return Err(err),
            };
            if node.disk(&volume.disk).is_none() {
                return Err(integrity_err!(
                    "node {} has no disk '{}' for volume '{}'",
                    id,
                    volume.disk,
                    volume.name
                ));
            }
        }

        let count = volume.nodes.len() as u32;
        if volume.redundancy < 1 || volume.redundancy > count {
            return Err(integrity_err!(
                "redundancy of volume '{}' must be between 1 and the number of nodes ({})",
                volume.name,
                count
            ));
        }
        if volume.num_master_nodes < 1 || volume.num_master_nodes > count {
            return Err(integrity_err!(
                "master node count of volume '{}' must be between 1 and the number of nodes ({})",
                volume.name,
                count
            ));
        }
        if volume.size == 0 || volume.block_size == 0 || volume.stripe_size == 0 {
            return Err(integrity_err!(
                "size, block size and stripe size of volume '{}' must not be zero",
                volume.name
            ));
        }
        if !VOLUME_PERM_REGEX.is_match(&volume.perm) {
            return Err(config_parse_err!(
                "invalid permissions '{}' for volume '{}'",
                volume.perm,
                volume.name
            ));
        }

        let name = format!("{} : {}", VOLUME_KIND, volume.name);
        let changed = upsert_section(&mut self.root, &name, |s| write_volume(s, volume))?;
        self.mark(changed);
        Ok(())
    }

    pub fn remove_volume(&mut self, name: &str) -> Result<Volume, ConfigError> {
        let volume = self.volume(name)?;
        self.root
            .remove_section(&format!("{} : {}", VOLUME_KIND, name));
        self.mark(true);
        Ok(volume)
    }

    /// Databases storing their data on the volume, and backup schedules writing to it.
    pub fn volume_references(&self, name: &str) -> Result<Vec<String>, ConfigError> {
        let mut list = Vec::new();
        for db in self.databases()? {
            if db.data_volume.as_deref() == Some(name) {
                list.push(format!("database '{}'", db.name));
            }
            list.extend(backup_references(&db, name));
        }
        Ok(list)
    }

    // remote volumes

    pub fn remote_volumes(&self) -> Result<Vec<RemoteVolume>, ConfigError> {
        self.root
            .sections_of_kind(REMOTE_VOLUME_KIND)
            .map(read_remote_volume)
            .collect()
    }

    pub fn remote_volume(&self, name: &str) -> Result<RemoteVolume, ConfigError> {
        match self
            .root
            .section(&format!("{} : {}", REMOTE_VOLUME_KIND, name))
        {
            Some(section) => read_remote_volume(section),
            None => Err(not_found!("remote volume '{}'", name)),
        }
    }

    pub fn upsert_remote_volume(&mut self, volume: &RemoteVolume) -> Result<(), ConfigError> {
        check_entity_name("remote volume", &volume.name)?;
        if self.has_volume(&volume.name) {
            return Err(integrity_err!(
                "remote volume name '{}' is already used by a volume",
                volume.name
            ));
        }
        if volume.id < FIRST_REMOTE_VOLUME_ID {
            return Err(integrity_err!(
                "remote volume ID {} is below {}",
                volume.id,
                FIRST_REMOTE_VOLUME_ID
            ));
        }
        if let Some(other) = self
            .remote_volumes()?
            .into_iter()
            .find(|v| v.name != volume.name && v.id == volume.id)
        {
            return Err(integrity_err!(
                "remote volume ID {} is already used by '{}'",
                volume.id,
                other.name
            ));
        }

        let name = format!("{} : {}", REMOTE_VOLUME_KIND, volume.name);
        let changed = upsert_section(&mut self.root, &name, |s| write_remote_volume(s, volume))?;
        self.mark(changed);
        Ok(())
    }

    pub fn remove_remote_volume(&mut self, name: &str) -> Result<RemoteVolume, ConfigError> {
        let volume = self.remote_volume(name)?;
        self.root
            .remove_section(&format!("{} : {}", REMOTE_VOLUME_KIND, name));
        self.mark(true);
        Ok(volume)
    }

    /// Backup schedules writing to the remote volume.
    pub fn remote_volume_references(&self, name: &str) -> Result<Vec<String>, ConfigError> {
        Ok(self
            .databases()?
            .iter()
            .flat_map(|db| backup_references(db, name))
            .collect())
    }

    // groups and users

    pub fn groups(&self) -> Result<Vec<Group>, ConfigError> {
        match self.root.section(GROUPS_SECTION) {
            Some(groups) => groups.sections().map(read_group).collect(),
            None => Ok(Vec::new()),
        }
    }

    pub fn group(&self, name: &str) -> Result<Group, ConfigError> {
        match self.root.section(GROUPS_SECTION).and_then(|s| s.section(name)) {
            Some(section) => read_group(section),
            None => Err(not_found!("group '{}'", name)),
        }
    }

    pub fn upsert_group(&mut self, group: &Group) -> Result<(), ConfigError> {
        check_entity_name("group", &group.name)?;
        if let Some(other) = self
            .groups()?
            .into_iter()
            .find(|g| g.name != group.name && g.id == group.id)
        {
            return Err(integrity_err!(
                "group ID {} is already used by group '{}'",
                group.id,
                other.name
            ));
        }

        let groups = self.root.section_or_insert(GROUPS_SECTION);
        let changed = upsert_section(groups, &group.name, |s| write_group(s, group))?;
        self.mark(changed);
        Ok(())
    }

    pub fn remove_group(&mut self, name: &str) -> Result<Group, ConfigError> {
        let group = self.group(name)?;
        if let Some(groups) = self.root.section_mut(GROUPS_SECTION) {
            groups.remove_section(name);
        }
        self.mark(true);
        Ok(group)
    }

    /// Users having the group as primary or additional group.
    pub fn group_references(&self, name: &str) -> Result<Vec<String>, ConfigError> {
        Ok(self
            .users()?
            .into_iter()
            .filter(|u| u.is_member_of(name))
            .map(|u| format!("user '{}'", u.name))
            .collect())
    }

    pub fn users(&self) -> Result<Vec<User>, ConfigError> {
        match self.root.section(USERS_SECTION) {
            Some(users) => users.sections().map(read_user).collect(),
            None => Ok(Vec::new()),
        }
    }

    pub fn user(&self, name: &str) -> Result<User, ConfigError> {
        match self.root.section(USERS_SECTION).and_then(|s| s.section(name)) {
            Some(section) => read_user(section),
            None => Err(not_found!("user '{}'", name)),
        }
    }

    pub fn upsert_user(&mut self, user: &User) -> Result<(), ConfigError> {
        check_entity_name("user", &user.name)?;
        if let Some(other) = self
            .users()?
            .into_iter()
            .find(|u| u.name != user.name && u.id == user.id)
        {
            return Err(integrity_err!(
                "user ID {} is already used by user '{}'",
                user.id,
                other.name
            ));
        }

        let groups = self.groups()?;
        let group_exists = |name: &str| groups.iter().any(|g| g.name == name);

        if !group_exists(&user.group) {
            return Err(integrity_err!(
                "group '{}' of user '{}' does not exist",
                user.group,
                user.name
            ));
        }
        if let Some(group) = user.additional_groups.iter().find(|g| !group_exists(g.as_str())) {
            return Err(integrity_err!(
                "additional group '{}' of user '{}' does not exist",
                group,
                user.name
            ));
        }

        let users = self.root.section_or_insert(USERS_SECTION);
        let changed = upsert_section(users, &user.name, |s| write_user(s, user))?;
        self.mark(changed);
        Ok(())
    }

    pub fn remove_user(&mut self, name: &str) -> Result<User, ConfigError> {
        let user = self.user(name)?;
        if let Some(users) = self.root.section_mut(USERS_SECTION) {
            users.remove_section(name);
        }
        self.mark(true);
        Ok(user)
    }

    // BucketFS

    pub fn bucketfs(&self) -> Result<Vec<BucketFs>, ConfigError> {
        self.root
            .sections_of_kind(BUCKETFS_KIND)
            .map(read_bucketfs)
            .collect()
    }

    pub fn lookup_bucketfs(&self, name: &str) -> Result<BucketFs, ConfigError> {
        match self.root.section(&format!("{} : {}", BUCKETFS_KIND, name)) {
            Some(section) => read_bucketfs(section),
            None => Err(not_found!("BucketFS '{}'", name)),
        }
    }

    pub fn upsert_bucketfs(&mut self, bucketfs: &BucketFs) -> Result<(), ConfigError> {
        check_entity_name("BucketFS", &bucketfs.name)?;
        for bucket in bucketfs.buckets.iter() {
            check_entity_name("bucket", &bucket.name)?;
        }
        if bucketfs.http_port != 0 && bucketfs.http_port == bucketfs.https_port {
            return Err(integrity_err!(
                "BucketFS '{}' uses port {} for HTTP and HTTPS",
                bucketfs.name,
                bucketfs.http_port
            ));
        }

        for other in self.bucketfs()?.iter().filter(|b| b.name != bucketfs.name) {
            if let Some(port) = bucketfs.ports().find(|p| other.ports().any(|o| o == *p)) {
                return Err(integrity_err!(
                    "port {} is already used by BucketFS '{}'",
                    port,
                    other.name
                ));
            }
        }

        if let Some(name) = find_duplicate(bucketfs.buckets.iter().map(|b| b.name.as_str())) {
            return Err(integrity_err!(
                "duplicate bucket '{}' in BucketFS '{}'",
                name,
                bucketfs.name
            ));
        }

        let name = format!("{} : {}", BUCKETFS_KIND, bucketfs.name);
        let changed = upsert_section(&mut self.root, &name, |s| write_bucketfs(s, bucketfs))?;
        self.mark(changed);
        Ok(())
    }

    pub fn remove_bucketfs(&mut self, name: &str) -> Result<BucketFs, ConfigError> {
        let bucketfs = self.lookup_bucketfs(name)?;
        self.root
            .remove_section(&format!("{} : {}", BUCKETFS_KIND, name));
        self.mark(true);
        Ok(bucketfs)
    }

    pub fn upsert_bucket(&mut self, bucketfs: &str, bucket: &Bucket) -> Result<(), ConfigError> {
        check_entity_name("bucket", &bucket.name)?;
        let section = self
            .root
            .section_mut(&format!("{} : {}", BUCKETFS_KIND, bucketfs))
            .ok_or_else(|| not_found!("BucketFS '{}'", bucketfs))?;

        let name = format!("{} : {}", BUCKET_KIND, bucket.name);
        let changed = upsert_section(section, &name, |s| write_bucket(s, bucket))?;
        self.mark(changed);
        Ok(())
    }

    pub fn remove_bucket(&mut self, bucketfs: &str, name: &str) -> Result<Bucket, ConfigError> {
        let bucket = self
            .lookup_bucketfs(bucketfs)?
            .buckets
            .into_iter()
            .find(|b| b.name == name)
            .ok_or_else(|| not_found!("bucket '{}' in BucketFS '{}'", name, bucketfs))?;

        if let Some(section) = self
            .root
            .section_mut(&format!("{} : {}", BUCKETFS_KIND, bucketfs))
        {
            section.remove_section(&format!("{} : {}", BUCKET_KIND, name));
        }
        self.mark(true);
        Ok(bucket)
    }

    // databases and backup schedules

    pub fn databases(&self) -> Result<Vec<Database>, ConfigError> {
        self.root
            .sections_of_kind(DATABASE_KIND)
            .map(read_database)
            .collect()
    }

    pub fn database(&self, name: &str) -> Result<Database, ConfigError> {
        match self.root.section(&format!("{} : {}", DATABASE_KIND, name)) {
            Some(section) => read_database(section),
            None => Err(not_found!("database '{}'", name)),
        }
    }

    pub fn upsert_backup(&mut self, db: &str, backup: &BackupSchedule) -> Result<(), ConfigError> {
        check_entity_name("backup schedule", &backup.name)?;
        self.database(db)?;

        if !self.has_volume(&backup.volume) && !self.has_remote_volume(&backup.volume) {
            return Err(integrity_err!(
                "volume '{}' of backup schedule '{}' does not exist",
                backup.volume,
                backup.name
            ));
        }
        backup
            .verify_cron_fields()
            .map_err(|err| config_parse_err!("backup schedule '{}' - {}", backup.name, err))?;

        let section = self
            .root
            .section_mut(&format!("{} : {}", DATABASE_KIND, db))
            .ok_or_else(|| not_found!("database '{}'", db))?;

        let name = format!("{} : {}", BACKUP_KIND, backup.name);
        let changed = upsert_section(section, &name, |s| write_backup(s, backup))?;
        self.mark(changed);
        Ok(())
    }

    pub fn remove_backup(&mut self, db: &str, name: &str) -> Result<BackupSchedule, ConfigError> {
        let backup = self
            .database(db)?
            .backups
            .into_iter()
            .find(|b| b.name == name)
            .ok_or_else(|| not_found!("backup schedule '{}' of database '{}'", name, db))?;

        if let Some(section) = self
            .root
            .section_mut(&format!("{} : {}", DATABASE_KIND, db))
        {
            section.remove_section(&format!("{} : {}", BACKUP_KIND, name));
        }
        self.mark(true);
        Ok(backup)
    }

    // storage service

    pub fn storage_config(&self) -> Result<StorageConfig, ConfigError> {
        match self.root.section(STORAGE_SECTION) {
            Some(section) => read_storage_config(section),
            None => Ok(StorageConfig::default()),
        }
    }

    pub fn set_storage_config(&mut self, config: &StorageConfig) -> Result<(), ConfigError> {
        if self.root.section(STORAGE_SECTION).is_none() && *config == StorageConfig::default() {
            return Ok(());
        }
        let changed = upsert_section(&mut self.root, STORAGE_SECTION, |s| {
            write_storage_config(s, config)
        })?;
        self.mark(changed);
        Ok(())
    }
}

fn backup_references(db: &Database, volume: &str) -> Vec<String> {
    db.backups
        .iter()
        .filter(|b| b.volume == volume)
        .map(|b| format!("backup schedule '{}' of database '{}'", b.name, db.name))
        .collect()
}
