#[derive(Debug, Clone, PartialEq, Eq)]
/// Operating system group.
pub struct Group {
    pub name: String,
    pub id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Operating system user.
pub struct User {
    pub name: String,
    pub id: u32,
    /// Name of the primary group.
    pub group: String,
    pub login_enabled: bool,
    /// Password hash (or cleartext if it was stored without hashing).
    pub passwd: Option<String>,
    pub additional_groups: Vec<String>,
    pub authorized_keys: Vec<String>,
}

impl User {
    /// True if `group` is the primary or one of the additional groups.
    pub fn is_member_of(&self, group: &str) -> bool {
        self.group == group || self.additional_groups.iter().any(|g| g == group)
    }
}
