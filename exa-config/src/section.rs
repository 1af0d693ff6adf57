use std::io::Write;

use anyhow::{bail, Error};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionItem {
    Entry { key: String, value: String },
    /// Whole comment line, including its indentation.
    Comment(String),
    Blank,
    Section(Section),
}

/// Named section of the EXAConf file, holding entries, comments and subsections in file order.
///
/// Values are stored verbatim (quotes included), so unknown keys survive a
/// load/commit cycle untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    name: String,
    items: Vec<SectionItem>,
}

/// Normalize `Kind:key` style names to `Kind : key`.
pub fn normalize_name(name: &str) -> String {
    match name.split_once(':') {
        Some((kind, key)) => format!("{} : {}", kind.trim(), key.trim()),
        None => name.trim().to_string(),
    }
}

impl Section {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            items: Vec::new(),
        }
    }

    pub fn with_kind(kind: &str, key: &str) -> Self {
        Self::new(&format!("{} : {}", kind, key))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Split a `Kind : key` name.
    pub fn kind_and_key(&self) -> Option<(&str, &str)> {
        self.name
            .split_once(':')
            .map(|(kind, key)| (kind.trim(), key.trim()))
    }

    pub fn is_kind(&self, kind: &str) -> bool {
        matches!(self.kind_and_key(), Some((k, _)) if k == kind)
    }

    fn name_matches(&self, name: &str) -> bool {
        normalize_name(&self.name) == normalize_name(name)
    }

    pub(crate) fn push_item(&mut self, item: SectionItem) {
        self.items.push(item);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.items.iter().find_map(|item| match item {
            SectionItem::Entry { key: k, value } if k == key => Some(value.as_str()),
            _ => None,
        })
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Set a raw value. New keys are placed behind the last entry, in front of
    /// any subsection, because entries following a subsection header belong to it.
    pub fn set(&mut self, key: &str, value: &str) {
        for item in self.items.iter_mut() {
            if let SectionItem::Entry { key: k, value: v } = item {
                if k == key {
                    if v != value {
                        *v = value.to_string();
                    }
                    return;
                }
            }
        }

        let pos = self
            .items
            .iter()
            .rposition(|item| matches!(item, SectionItem::Entry { .. }))
            .map(|pos| pos + 1)
            .or_else(|| {
                self.items
                    .iter()
                    .position(|item| matches!(item, SectionItem::Section(_)))
            })
            .unwrap_or(self.items.len());

        self.items.insert(
            pos,
            SectionItem::Entry {
                key: key.to_string(),
                value: value.to_string(),
            },
        );
    }

    pub fn remove(&mut self, key: &str) -> bool {
        let len = self.items.len();
        self.items
            .retain(|item| !matches!(item, SectionItem::Entry { key: k, .. } if k == key));
        len != self.items.len()
    }

    /// Set or remove a raw value.
    pub fn set_opt(&mut self, key: &str, value: Option<&str>) {
        match value {
            Some(value) => self.set(key, value),
            None => {
                self.remove(key);
            }
        }
    }

    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.items.iter().filter_map(|item| match item {
            SectionItem::Section(section) => Some(section),
            _ => None,
        })
    }

    pub fn sections_mut(&mut self) -> impl Iterator<Item = &mut Section> {
        self.items.iter_mut().filter_map(|item| match item {
            SectionItem::Section(section) => Some(section),
            _ => None,
        })
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections().find(|s| s.name_matches(name))
    }

    pub fn section_mut(&mut self, name: &str) -> Option<&mut Section> {
        self.sections_mut().find(|s| s.name_matches(name))
    }

    pub fn sections_of_kind<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a Section> {
        self.sections().filter(move |s| s.is_kind(kind))
    }

    /// Get a subsection, appending an empty one if missing.
    pub fn section_or_insert(&mut self, name: &str) -> &mut Section {
        match self
            .items
            .iter()
            .position(|item| matches!(item, SectionItem::Section(s) if s.name_matches(name)))
        {
            Some(pos) => match &mut self.items[pos] {
                SectionItem::Section(section) => section,
                _ => unreachable!(),
            },
            None => self.insert_section(Section::new(name)),
        }
    }

    /// Insert a subsection behind the last sibling of the same kind, or append it.
    pub fn insert_section(&mut self, section: Section) -> &mut Section {
        let kind = section.kind_and_key().map(|(kind, _)| kind.to_string());

        let pos = kind
            .and_then(|kind| {
                self.items
                    .iter()
                    .rposition(|item| matches!(item, SectionItem::Section(s) if s.is_kind(&kind)))
                    .map(|pos| pos + 1)
            })
            .unwrap_or(self.items.len());

        self.items.insert(pos, SectionItem::Section(section));
        match &mut self.items[pos] {
            SectionItem::Section(section) => section,
            _ => unreachable!(),
        }
    }

    /// Replace a subsection in place, or insert it.
    pub fn replace_section(&mut self, section: Section) {
        for item in self.items.iter_mut() {
            if let SectionItem::Section(s) = item {
                if s.name_matches(&section.name) {
                    *s = section;
                    return;
                }
            }
        }
        self.insert_section(section);
    }

    pub fn remove_section(&mut self, name: &str) -> Option<Section> {
        let pos = self
            .items
            .iter()
            .position(|item| matches!(item, SectionItem::Section(s) if s.name_matches(name)))?;
        match self.items.remove(pos) {
            SectionItem::Section(section) => Some(section),
            _ => None,
        }
    }

    /// Fail if an entry or subsection would be read back as something else.
    pub fn verify_writable(&self) -> Result<(), Error> {
        for item in self.items.iter() {
            match item {
                SectionItem::Entry { key, value } => {
                    if key.is_empty()
                        || key.trim() != key
                        || key.contains(['=', '[', ']', '#'])
                        || key.contains(is_control_char)
                    {
                        bail!("invalid key '{}' in section [{}]", key.escape_debug(), self.name);
                    }
                    if value.contains(is_control_char) {
                        bail!(
                            "value of '{}' in section [{}] contains control characters",
                            key,
                            self.name
                        );
                    }
                }
                SectionItem::Section(section) => {
                    verify_section_name(&section.name)?;
                    section.verify_writable()?;
                }
                SectionItem::Comment(_) | SectionItem::Blank => (),
            }
        }
        Ok(())
    }

    /// Write the section body; `depth` is the nesting depth of this section (0 for the root).
    pub fn write_items(&self, w: &mut dyn Write, depth: usize) -> Result<(), Error> {
        let indent = "    ".repeat(depth);
        for item in self.items.iter() {
            match item {
                SectionItem::Entry { key, value } if value.is_empty() => {
                    writeln!(w, "{}{} =", indent, key)?;
                }
                SectionItem::Entry { key, value } => {
                    writeln!(w, "{}{} = {}", indent, key, value)?;
                }
                SectionItem::Comment(line) => writeln!(w, "{}", line)?,
                SectionItem::Blank => writeln!(w)?,
                SectionItem::Section(section) => {
                    let open = "[".repeat(depth + 1);
                    let close = "]".repeat(depth + 1);
                    writeln!(w, "{}{}{}{}", indent, open, section.name, close)?;
                    section.write_items(w, depth + 1)?;
                }
            }
        }
        Ok(())
    }
}

// a tab does not end the line
fn is_control_char(c: char) -> bool {
    c.is_control() && c != '\t'
}

pub fn verify_section_name(name: &str) -> Result<(), Error> {
    if name.trim().is_empty() || name.contains(['[', ']']) || name.contains(is_control_char) {
        bail!("invalid section name '{}'", name.escape_debug());
    }
    Ok(())
}

/// Strip one level of matching quotes.
pub fn unquote(raw: &str) -> &str {
    let raw = raw.trim();
    for quote in ['"', '\''] {
        if raw.len() >= 2 && raw.starts_with(quote) && raw.ends_with(quote) {
            return &raw[1..raw.len() - 1];
        }
    }
    raw
}

/// Quote a single value if it would otherwise be read back differently.
pub fn quote(value: &str) -> String {
    let needs_quotes = value.is_empty()
        || value.contains([',', '#'])
        || value.starts_with(['"', '\''])
        || value.trim() != value;

    if !needs_quotes {
        value.to_string()
    } else if value.contains('"') {
        format!("'{}'", value)
    } else {
        format!("\"{}\"", value)
    }
}

/// Split a raw list value at commas outside of quotes. Empty items are dropped.
pub fn split_list(raw: &str) -> Vec<String> {
    let mut list = Vec::new();
    let mut current = String::new();
    let mut quote_char: Option<char> = None;

    let mut push = |current: &mut String| {
        let item = unquote(current).to_string();
        if !item.is_empty() {
            list.push(item);
        }
        current.clear();
    };

    for c in raw.chars() {
        match quote_char {
            Some(q) if c == q => {
                quote_char = None;
                current.push(c);
            }
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote_char = Some(c);
                current.push(c);
            }
            None if c == ',' => push(&mut current),
            None => current.push(c),
        }
    }
    push(&mut current);

    list
}

/// Join list items; a single item gets a trailing comma so it is read back as a list.
pub fn join_list<S: AsRef<str>>(items: &[S]) -> String {
    match items {
        [] => String::new(),
        [item] => format!("{},", quote(item.as_ref())),
        items => items
            .iter()
            .map(|item| quote(item.as_ref()))
            .collect::<Vec<_>>()
            .join(", "),
    }
}

pub fn format_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

pub fn parse_bool(raw: &str) -> Option<bool> {
    match unquote(raw).to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_list_values() {
        assert_eq!(split_list("dev.1, dev.2"), vec!["dev.1", "dev.2"]);
        assert_eq!(split_list("dev.1,"), vec!["dev.1"]);
        assert_eq!(split_list(","), Vec::<String>::new());
        assert_eq!(
            split_list("\"ssh-rsa AAA a,b\", ssh-ed25519 BBB"),
            vec!["ssh-rsa AAA a,b", "ssh-ed25519 BBB"]
        );

        assert_eq!(join_list(&["11"]), "11,");
        assert_eq!(join_list(&["11", "12", "13"]), "11, 12, 13");
        assert_eq!(join_list(&["a,b", "c"]), "\"a,b\", c");
        assert_eq!(join_list::<&str>(&[]), "");
    }

    #[test]
    fn test_quote() {
        assert_eq!(quote("plain"), "plain");
        assert_eq!(quote(""), "\"\"");
        assert_eq!(quote("a#b"), "\"a#b\"");
        assert_eq!(quote("say \"hi\", ok"), "'say \"hi\", ok'");
        assert_eq!(unquote(&quote("a, b")), "a, b");
    }

    #[test]
    fn test_bool_values() {
        assert_eq!(parse_bool("True"), Some(true));
        assert_eq!(parse_bool("no"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
        assert_eq!(format_bool(false), "False");
    }

    #[test]
    fn test_verify_writable() {
        let mut node = Section::with_kind("Node", "11");
        node.set("Name", "n11");
        node.insert_section(Section::with_kind("Disk", "disk1"));
        let mut root = Section::new("");
        root.insert_section(node.clone());
        assert!(root.verify_writable().is_ok());

        let mut bad = node.clone();
        bad.set("Name", "n11\n[Users]");
        let mut root = Section::new("");
        root.insert_section(bad);
        assert!(root.verify_writable().is_err());

        let mut bad = node.clone();
        bad.insert_section(Section::with_kind("Disk", "d]]\n[Global"));
        let mut root = Section::new("");
        root.insert_section(bad);
        assert!(root.verify_writable().is_err());

        let mut bad = node;
        bad.set("Key = x", "1");
        let mut root = Section::new("");
        root.insert_section(bad);
        assert!(root.verify_writable().is_err());
    }

    #[test]
    fn test_set_keeps_entries_before_subsections() -> Result<(), Error> {
        let mut node = Section::with_kind("Node", "11");
        node.set("PrivateNet", "10.10.10.11/24");
        node.insert_section(Section::with_kind("Disk", "disk1"));
        node.set("Name", "n11");

        let mut output = Vec::new();
        let mut root = Section::new("");
        root.insert_section(node);
        root.write_items(&mut output, 0)?;

        assert_eq!(
            String::from_utf8(output)?,
            "[Node : 11]\n    PrivateNet = 10.10.10.11/24\n    Name = n11\n    [[Disk : disk1]]\n"
        );
        Ok(())
    }

    #[test]
    fn test_insert_section_groups_kinds() {
        let mut root = Section::new("");
        root.insert_section(Section::new("Global"));
        root.insert_section(Section::with_kind("Node", "11"));
        root.insert_section(Section::new("Groups"));
        root.insert_section(Section::with_kind("Node", "12"));

        let names: Vec<&str> = root.sections().map(|s| s.name()).collect();
        assert_eq!(names, vec!["Global", "Node : 11", "Node : 12", "Groups"]);

        assert!(root.section("Node:12").is_some());
        assert!(root.remove_section("Node : 11").is_some());
        assert!(root.section("Node : 11").is_none());
    }
}
