//! Symbol rewriting over a parsed class file.
//!
//! Utf8 entries are never edited in place since one entry may back both a
//! symbol and an unrelated string literal. A renamed symbol reuses an
//! existing equal entry, or gets a new one appended to the pool. `Class`
//! entries are identity-bearing and are rewritten in place.

use std::collections::HashMap;

use super::class_file::{ClassFile, ClassFormatError, Constant, ConstantPool, MemberKind, Site};
use super::descriptor::{remap_class_reference, remap_descriptor, remap_signature};
use super::mapping::MappingTable;
use super::mutf8;

/// Rewrite every symbolic reference in `bytes` through `table`.
///
/// The class is always parsed, so malformed input is rejected even when
/// nothing would change. Unchanged classes come back byte-identical.
pub fn rewrite(bytes: &[u8], table: &MappingTable) -> Result<Vec<u8>, ClassFormatError> {
    let ClassFile {
        header,
        pool: original,
        mut body,
        this_class,
        sites,
    } = ClassFile::parse(bytes)?;
    if table.is_empty() {
        return Ok(bytes.to_vec());
    }

    let this_name = original.class_name(this_class)?.into_owned();
    let mut editor = PoolEditor::new(&original);
    remap_pool(&original, &mut editor, table)?;

    let mut patched = false;
    for site in sites {
        let (offset, old, new) = match site {
            Site::MemberName {
                offset,
                kind,
                name,
                descriptor,
            } => {
                let old_name = original.utf8(name)?;
                let new_name = match kind {
                    MemberKind::Field => table.map_field(&this_name, &old_name),
                    MemberKind::Method => {
                        let desc = original.utf8(descriptor)?;
                        table.map_method(&this_name, &old_name, &desc)
                    }
                };
                let new = editor.utf8(name, new_name)?;
                (offset, name, new)
            }
            Site::Descriptor { offset, index } => {
                let desc = original.utf8(index)?;
                let new = editor.utf8(index, &remap_descriptor(&desc, table)?)?;
                (offset, index, new)
            }
            Site::Signature { offset, index } => {
                let sig = original.utf8(index)?;
                let new = editor.utf8(index, &remap_signature(&sig, table)?)?;
                (offset, index, new)
            }
            Site::EnclosingMethod { offset, class, nat } => {
                let owner = original.class_name(class)?;
                let new = editor.member_nat(nat, table, |name, desc| {
                    table.map_method(&owner, name, desc).to_string()
                })?;
                (offset, nat, new)
            }
        };
        if old != new {
            body[offset..offset + 2].copy_from_slice(&new.to_be_bytes());
            patched = true;
        }
    }

    let pool = editor.finish();
    if !patched && pool == original {
        return Ok(bytes.to_vec());
    }
    Ok(ClassFile {
        header,
        pool,
        body,
        this_class,
        sites: Vec::new(),
    }
    .to_bytes())
}

/// Remap pool-internal references: class names, member refs, method types
/// and call-site descriptors.
fn remap_pool(
    original: &ConstantPool,
    editor: &mut PoolEditor<'_>,
    table: &MappingTable,
) -> Result<(), ClassFormatError> {
    for (index, constant) in original.entries().iter().enumerate() {
        let index = index as u16;
        match *constant {
            Constant::Class { name } => {
                let old = original.utf8(name)?;
                let new = editor.utf8(name, &remap_class_reference(&old, table)?)?;
                if new != name {
                    editor.pool.set(index, Constant::Class { name: new });
                }
            }
            Constant::FieldRef { class, nat } => {
                let owner = original.class_name(class)?;
                let new = editor.member_nat(nat, table, |name, _| {
                    table.map_field(&owner, name).to_string()
                })?;
                if new != nat {
                    editor.pool.set(index, Constant::FieldRef { class, nat: new });
                }
            }
            Constant::MethodRef { class, nat } | Constant::InterfaceMethodRef { class, nat } => {
                let owner = original.class_name(class)?;
                let new = editor.member_nat(nat, table, |name, desc| {
                    table.map_method(&owner, name, desc).to_string()
                })?;
                if new != nat {
                    let updated = match constant {
                        Constant::MethodRef { .. } => Constant::MethodRef { class, nat: new },
                        _ => Constant::InterfaceMethodRef { class, nat: new },
                    };
                    editor.pool.set(index, updated);
                }
            }
            Constant::MethodType { descriptor } => {
                let desc = original.utf8(descriptor)?;
                let new = editor.utf8(descriptor, &remap_descriptor(&desc, table)?)?;
                if new != descriptor {
                    editor.pool.set(index, Constant::MethodType { descriptor: new });
                }
            }
            // Call-site names are bootstrap-defined; only the type changes.
            Constant::Dynamic { bootstrap, nat } | Constant::InvokeDynamic { bootstrap, nat } => {
                let new = editor.member_nat(nat, table, |name, _| name.to_string())?;
                if new != nat {
                    let updated = match constant {
                        Constant::Dynamic { .. } => Constant::Dynamic { bootstrap, nat: new },
                        _ => Constant::InvokeDynamic { bootstrap, nat: new },
                    };
                    editor.pool.set(index, updated);
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Copy-on-write view of the pool with lookup tables for deduplication.
struct PoolEditor<'a> {
    original: &'a ConstantPool,
    pool: ConstantPool,
    utf8s: HashMap<Vec<u8>, u16>,
    nats: HashMap<(u16, u16), u16>,
}

impl<'a> PoolEditor<'a> {
    fn new(original: &'a ConstantPool) -> Self {
        let mut utf8s = HashMap::new();
        let mut nats = HashMap::new();
        for (index, constant) in original.entries().iter().enumerate() {
            let index = index as u16;
            match constant {
                Constant::Utf8(bytes) => {
                    utf8s.entry(bytes.clone()).or_insert(index);
                }
                Constant::NameAndType { name, descriptor } => {
                    nats.entry((*name, *descriptor)).or_insert(index);
                }
                _ => {}
            }
        }
        Self {
            original,
            pool: original.clone(),
            utf8s,
            nats,
        }
    }

    /// Index of a Utf8 holding `value`; `old` when its text is unchanged.
    fn utf8(&mut self, old: u16, value: &str) -> Result<u16, ClassFormatError> {
        if self.original.utf8(old)? == value {
            return Ok(old);
        }
        let encoded = mutf8::encode(value);
        if encoded.len() > usize::from(u16::MAX) {
            return Err(ClassFormatError::Utf8TooLong { len: encoded.len() });
        }
        if let Some(index) = self.utf8s.get(&encoded) {
            return Ok(*index);
        }
        let index = self.pool.push(Constant::Utf8(encoded.clone()))?;
        self.utf8s.insert(encoded, index);
        Ok(index)
    }

    /// Remap a member `NameAndType`: the name through `rename`, the
    /// descriptor through the class table.
    fn member_nat(
        &mut self,
        old: u16,
        table: &MappingTable,
        rename: impl FnOnce(&str, &str) -> String,
    ) -> Result<u16, ClassFormatError> {
        let original = self.original;
        let (name_index, desc_index) = original.name_and_type(old)?;
        let name = original.utf8(name_index)?;
        let desc = original.utf8(desc_index)?;
        let new_name = rename(&name, &desc);
        let new_desc = remap_descriptor(&desc, table)?;

        let name = self.utf8(name_index, &new_name)?;
        let desc = self.utf8(desc_index, &new_desc)?;
        if (name, desc) == (name_index, desc_index) {
            return Ok(old);
        }
        self.nat_index(name, desc)
    }

    fn nat_index(&mut self, name: u16, descriptor: u16) -> Result<u16, ClassFormatError> {
        if let Some(index) = self.nats.get(&(name, descriptor)) {
            return Ok(*index);
        }
        let index = self.pool.push(Constant::NameAndType { name, descriptor })?;
        self.nats.insert((name, descriptor), index);
        Ok(index)
    }

    fn finish(self) -> ConstantPool {
        self.pool
    }
}
