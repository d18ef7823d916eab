//! Symbol mapping tables.
//!
//! Keys always use the *old* owner and, for methods, the *old* descriptor,
//! matching how references appear in unmapped class files.
//!
//! The on-disk format is SRG:
//!
//! ```text
//! PK: ./ net/example              (ignored)
//! CL: a net/example/Foo
//! FD: a/b net/example/Foo/count
//! MD: a/c (La;)V net/example/Foo/run (Lnet/example/Foo;)V
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use thiserror::Error;

use super::descriptor::remap_descriptor;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MappingError {
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
}

/// Immutable-after-build old-name → new-name table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingTable {
    classes: BTreeMap<String, String>,
    // owner -> name -> new name
    fields: BTreeMap<String, BTreeMap<String, String>>,
    // owner -> name -> descriptor -> new name
    methods: BTreeMap<String, BTreeMap<String, BTreeMap<String, String>>>,
}

impl MappingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty() && self.fields.is_empty() && self.methods.is_empty()
    }

    pub fn has_classes(&self) -> bool {
        !self.classes.is_empty()
    }

    /// Number of class, field and method mappings.
    pub fn len(&self) -> usize {
        let fields: usize = self.fields.values().map(BTreeMap::len).sum();
        let methods: usize = self
            .methods
            .values()
            .flat_map(BTreeMap::values)
            .map(BTreeMap::len)
            .sum();
        self.classes.len() + fields + methods
    }

    pub fn insert_class(&mut self, old: impl Into<String>, new: impl Into<String>) {
        self.classes.insert(old.into(), new.into());
    }

    pub fn insert_field(
        &mut self,
        owner: impl Into<String>,
        name: impl Into<String>,
        new_name: impl Into<String>,
    ) {
        self.fields
            .entry(owner.into())
            .or_default()
            .insert(name.into(), new_name.into());
    }

    pub fn insert_method(
        &mut self,
        owner: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
        new_name: impl Into<String>,
    ) {
        self.methods
            .entry(owner.into())
            .or_default()
            .entry(name.into())
            .or_default()
            .insert(descriptor.into(), new_name.into());
    }

    /// Mapped internal name, or `name` itself.
    pub fn map_class<'a>(&'a self, name: &'a str) -> &'a str {
        self.classes.get(name).map_or(name, String::as_str)
    }

    pub fn map_field<'a>(&'a self, owner: &str, name: &'a str) -> &'a str {
        self.fields
            .get(owner)
            .and_then(|names| names.get(name))
            .map_or(name, String::as_str)
    }

    pub fn map_method<'a>(&'a self, owner: &str, name: &'a str, descriptor: &str) -> &'a str {
        if name == "<init>" || name == "<clinit>" {
            return name;
        }
        self.methods
            .get(owner)
            .and_then(|names| names.get(name))
            .and_then(|descs| descs.get(descriptor))
            .map_or(name, String::as_str)
    }

    /// Inverse table: maps the renamed symbols back to the originals.
    pub fn reversed(&self) -> Self {
        let mut out = Self::new();
        for (old, new) in &self.classes {
            out.insert_class(new.clone(), old.clone());
        }
        for (owner, names) in &self.fields {
            let new_owner = self.map_class(owner);
            for (name, new_name) in names {
                out.insert_field(new_owner, new_name.clone(), name.clone());
            }
        }
        for (owner, names) in &self.methods {
            let new_owner = self.map_class(owner);
            for (name, descs) in names {
                for (desc, new_name) in descs {
                    let new_desc = remap_descriptor(desc, self)
                        .map(|d| d.into_owned())
                        .unwrap_or_else(|_| desc.clone());
                    out.insert_method(new_owner, new_name.clone(), new_desc, name.clone());
                }
            }
        }
        out
    }

    pub fn from_file(path: &Path) -> Result<Self, crate::error::PackError> {
        let text = std::fs::read_to_string(path).map_err(|e| crate::error::PackError::Mapping {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::parse_srg(&text).map_err(|e| crate::error::PackError::Mapping {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn parse_srg(text: &str) -> Result<Self, MappingError> {
        let mut table = Self::new();
        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let err = |message: &str| MappingError::Parse {
                line: line_no,
                message: message.to_string(),
            };

            let (kind, rest) = line.split_once(':').ok_or_else(|| err("missing record type"))?;
            let parts: Vec<&str> = rest.split_whitespace().collect();
            match (kind, parts.as_slice()) {
                ("PK", _) => {}
                ("CL", [old, new]) => table.insert_class(*old, *new),
                ("FD", [old, new]) => {
                    let (owner, name) = split_member(old).ok_or_else(|| err("bad field name"))?;
                    let (_, new_name) = split_member(new).ok_or_else(|| err("bad field name"))?;
                    table.insert_field(owner, name, new_name);
                }
                ("MD", [old, old_desc, new, _new_desc]) => {
                    let (owner, name) = split_member(old).ok_or_else(|| err("bad method name"))?;
                    let (_, new_name) = split_member(new).ok_or_else(|| err("bad method name"))?;
                    if !old_desc.starts_with('(') {
                        return Err(err("method descriptor must start with '('"));
                    }
                    remap_descriptor(old_desc, &Self::new())
                        .map_err(|_| err("invalid method descriptor"))?;
                    table.insert_method(owner, name, *old_desc, new_name);
                }
                ("CL" | "FD" | "MD", _) => return Err(err("wrong number of fields")),
                _ => return Err(err("unknown record type")),
            }
        }
        Ok(table)
    }
}

/// `owner/path/member` -> (`owner/path`, `member`)
fn split_member(qualified: &str) -> Option<(&str, &str)> {
    let (owner, name) = qualified.rsplit_once('/')?;
    if owner.is_empty() || name.is_empty() {
        return None;
    }
    Some((owner, name))
}
