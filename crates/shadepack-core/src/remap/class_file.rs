//! Structural class-file reader (JVMS chapter 4).
//!
//! Only the constant pool is decoded into values. Everything after the pool
//! is kept as raw bytes; parsing it records the offsets of every `u2`
//! pool index that names a symbol, so a rewrite can patch indices in place
//! without touching bytecode or changing any attribute length.

use std::borrow::Cow;

use thiserror::Error;

use super::mutf8;

const MAGIC: u32 = 0xCAFE_BABE;

/// Largest valid `constant_pool_count`.
pub(crate) const MAX_POOL_COUNT: usize = u16::MAX as usize;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClassFormatError {
    #[error("truncated class file at offset {offset}")]
    Truncated { offset: usize },
    #[error("bad magic 0x{0:08X}")]
    BadMagic(u32),
    #[error("unknown constant pool tag {tag} at index {index}")]
    UnknownConstantTag { index: usize, tag: u8 },
    #[error("constant pool index {index} is not a valid {expected}")]
    BadConstantIndex { index: u16, expected: &'static str },
    #[error("constant pool entry {index} is not valid modified UTF-8")]
    InvalidUtf8 { index: u16 },
    #[error("malformed descriptor '{0}'")]
    InvalidDescriptor(String),
    #[error("malformed signature '{0}'")]
    InvalidSignature(String),
    #[error("attribute '{name}' overruns its declared length")]
    AttributeOverrun { name: String },
    #[error("unknown annotation element tag '{}'", char::from(*.0))]
    BadElementTag(u8),
    #[error("unknown type annotation target 0x{0:02X}")]
    BadTargetType(u8),
    #[error("constant pool would exceed 65535 entries")]
    PoolOverflow,
    #[error("remapped symbol of {len} bytes exceeds the 65535-byte Utf8 limit")]
    Utf8TooLong { len: usize },
    #[error("{count} trailing bytes after class structure")]
    TrailingBytes { count: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Constant {
    /// Index 0 and the second slot of `Long`/`Double`.
    Unusable,
    Utf8(Vec<u8>),
    Integer(u32),
    Float(u32),
    Long(u64),
    Double(u64),
    Class { name: u16 },
    String { value: u16 },
    FieldRef { class: u16, nat: u16 },
    MethodRef { class: u16, nat: u16 },
    InterfaceMethodRef { class: u16, nat: u16 },
    NameAndType { name: u16, descriptor: u16 },
    MethodHandle { kind: u8, reference: u16 },
    MethodType { descriptor: u16 },
    Dynamic { bootstrap: u16, nat: u16 },
    InvokeDynamic { bootstrap: u16, nat: u16 },
    Module { name: u16 },
    Package { name: u16 },
}

impl Constant {
    fn write(&self, out: &mut Vec<u8>) {
        match self {
            Self::Unusable => {}
            Self::Utf8(bytes) => {
                out.push(1);
                out.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
                out.extend_from_slice(bytes);
            }
            Self::Integer(v) => push_u8_u32(out, 3, *v),
            Self::Float(v) => push_u8_u32(out, 4, *v),
            Self::Long(v) => {
                out.push(5);
                out.extend_from_slice(&v.to_be_bytes());
            }
            Self::Double(v) => {
                out.push(6);
                out.extend_from_slice(&v.to_be_bytes());
            }
            Self::Class { name } => push_u8_u16(out, 7, *name),
            Self::String { value } => push_u8_u16(out, 8, *value),
            Self::FieldRef { class, nat } => push_u8_u16_u16(out, 9, *class, *nat),
            Self::MethodRef { class, nat } => push_u8_u16_u16(out, 10, *class, *nat),
            Self::InterfaceMethodRef { class, nat } => push_u8_u16_u16(out, 11, *class, *nat),
            Self::NameAndType { name, descriptor } => {
                push_u8_u16_u16(out, 12, *name, *descriptor);
            }
            Self::MethodHandle { kind, reference } => {
                out.push(15);
                out.push(*kind);
                out.extend_from_slice(&reference.to_be_bytes());
            }
            Self::MethodType { descriptor } => push_u8_u16(out, 16, *descriptor),
            Self::Dynamic { bootstrap, nat } => push_u8_u16_u16(out, 17, *bootstrap, *nat),
            Self::InvokeDynamic { bootstrap, nat } => push_u8_u16_u16(out, 18, *bootstrap, *nat),
            Self::Module { name } => push_u8_u16(out, 19, *name),
            Self::Package { name } => push_u8_u16(out, 20, *name),
        }
    }
}

fn push_u8_u16(out: &mut Vec<u8>, tag: u8, a: u16) {
    out.push(tag);
    out.extend_from_slice(&a.to_be_bytes());
}

fn push_u8_u16_u16(out: &mut Vec<u8>, tag: u8, a: u16, b: u16) {
    push_u8_u16(out, tag, a);
    out.extend_from_slice(&b.to_be_bytes());
}

fn push_u8_u32(out: &mut Vec<u8>, tag: u8, v: u32) {
    out.push(tag);
    out.extend_from_slice(&v.to_be_bytes());
}

/// Decoded constant pool. Index 0 is always `Unusable`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ConstantPool {
    entries: Vec<Constant>,
}

impl ConstantPool {
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn get(&self, index: u16) -> Option<&Constant> {
        self.entries.get(usize::from(index))
    }

    pub(crate) fn entries(&self) -> &[Constant] {
        &self.entries
    }

    pub(crate) fn set(&mut self, index: u16, constant: Constant) {
        self.entries[usize::from(index)] = constant;
    }

    /// Append, returning the new index.
    pub(crate) fn push(&mut self, constant: Constant) -> Result<u16, ClassFormatError> {
        if self.entries.len() >= MAX_POOL_COUNT {
            return Err(ClassFormatError::PoolOverflow);
        }
        let index = self.entries.len() as u16;
        self.entries.push(constant);
        Ok(index)
    }

    pub(crate) fn utf8(&self, index: u16) -> Result<Cow<'_, str>, ClassFormatError> {
        match self.get(index) {
            Some(Constant::Utf8(bytes)) => match std::str::from_utf8(bytes) {
                // Outside NUL and supplementary characters the encodings agree.
                Ok(s) if !bytes.contains(&0xC0) && !bytes.contains(&0) && !s.chars().any(|c| c > '\u{FFFF}') => {
                    Ok(Cow::Borrowed(s))
                }
                _ => mutf8::decode(bytes)
                    .map(Cow::Owned)
                    .ok_or(ClassFormatError::InvalidUtf8 { index }),
            },
            _ => Err(ClassFormatError::BadConstantIndex {
                index,
                expected: "Utf8",
            }),
        }
    }

    pub(crate) fn class_name(&self, index: u16) -> Result<Cow<'_, str>, ClassFormatError> {
        match self.get(index) {
            Some(Constant::Class { name }) => self.utf8(*name),
            _ => Err(ClassFormatError::BadConstantIndex {
                index,
                expected: "Class",
            }),
        }
    }

    pub(crate) fn name_and_type(&self, index: u16) -> Result<(u16, u16), ClassFormatError> {
        match self.get(index) {
            Some(Constant::NameAndType { name, descriptor }) => Ok((*name, *descriptor)),
            _ => Err(ClassFormatError::BadConstantIndex {
                index,
                expected: "NameAndType",
            }),
        }
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(self.entries.len() as u16).to_be_bytes());
        for constant in &self.entries[1..] {
            constant.write(out);
        }
    }

    fn expect(&self, index: u16, expected: &'static str, ok: bool) -> Result<(), ClassFormatError> {
        if ok {
            Ok(())
        } else {
            Err(ClassFormatError::BadConstantIndex { index, expected })
        }
    }

    fn expect_utf8(&self, index: u16) -> Result<(), ClassFormatError> {
        self.expect(index, "Utf8", matches!(self.get(index), Some(Constant::Utf8(_))))
    }

    fn expect_class(&self, index: u16) -> Result<(), ClassFormatError> {
        self.expect(
            index,
            "Class",
            matches!(self.get(index), Some(Constant::Class { .. })),
        )
    }

    fn expect_nat(&self, index: u16) -> Result<(), ClassFormatError> {
        self.expect(
            index,
            "NameAndType",
            matches!(self.get(index), Some(Constant::NameAndType { .. })),
        )
    }

    /// Check that every cross-reference inside the pool has the right type.
    fn validate(&self) -> Result<(), ClassFormatError> {
        for constant in &self.entries {
            match constant {
                Constant::Class { name }
                | Constant::Module { name }
                | Constant::Package { name } => self.expect_utf8(*name)?,
                Constant::String { value } => self.expect_utf8(*value)?,
                Constant::FieldRef { class, nat }
                | Constant::MethodRef { class, nat }
                | Constant::InterfaceMethodRef { class, nat } => {
                    self.expect_class(*class)?;
                    self.expect_nat(*nat)?;
                }
                Constant::NameAndType { name, descriptor } => {
                    self.expect_utf8(*name)?;
                    self.expect_utf8(*descriptor)?;
                }
                Constant::MethodType { descriptor } => self.expect_utf8(*descriptor)?,
                Constant::Dynamic { nat, .. } | Constant::InvokeDynamic { nat, .. } => {
                    self.expect_nat(*nat)?;
                }
                Constant::MethodHandle { reference, .. } => self.expect(
                    *reference,
                    "member reference",
                    matches!(
                        self.get(*reference),
                        Some(
                            Constant::FieldRef { .. }
                                | Constant::MethodRef { .. }
                                | Constant::InterfaceMethodRef { .. }
                        )
                    ),
                )?,
                Constant::Unusable
                | Constant::Utf8(_)
                | Constant::Integer(_)
                | Constant::Float(_)
                | Constant::Long(_)
                | Constant::Double(_) => {}
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MemberKind {
    Field,
    Method,
}

/// A `u2` pool index inside the class body that names a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Site {
    /// `name_index` of a field or method declared by this class.
    MemberName {
        offset: usize,
        kind: MemberKind,
        name: u16,
        descriptor: u16,
    },
    /// Utf8 holding a field or method descriptor.
    Descriptor { offset: usize, index: u16 },
    /// Utf8 holding a generic signature.
    Signature { offset: usize, index: u16 },
    /// `method_index` of an `EnclosingMethod` attribute.
    EnclosingMethod {
        offset: usize,
        class: u16,
        nat: u16,
    },
}

/// Parsed class file: decoded pool plus the raw body after it.
#[derive(Debug, Clone)]
pub(crate) struct ClassFile {
    pub(crate) header: [u8; 8],
    pub(crate) pool: ConstantPool,
    pub(crate) body: Vec<u8>,
    pub(crate) this_class: u16,
    pub(crate) sites: Vec<Site>,
}

impl ClassFile {
    pub(crate) fn parse(bytes: &[u8]) -> Result<Self, ClassFormatError> {
        let mut reader = Reader::new(bytes, 0, bytes.len());
        let magic = reader.u32()?;
        if magic != MAGIC {
            return Err(ClassFormatError::BadMagic(magic));
        }
        reader.skip(4)?; // minor_version, major_version
        let mut header = [0u8; 8];
        header.copy_from_slice(&bytes[..8]);

        let pool = read_pool(&mut reader)?;
        pool.validate()?;

        let body = bytes[reader.pos..].to_vec();
        let mut walker = BodyWalker {
            pool: &pool,
            sites: Vec::new(),
        };
        let this_class = walker.walk(&body)?;
        let sites = walker.sites;

        Ok(Self {
            header,
            pool,
            body,
            this_class,
            sites,
        })
    }

    pub(crate) fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.body.len() + self.pool.len() * 8 + 8);
        out.extend_from_slice(&self.header);
        self.pool.write(&mut out);
        out.extend_from_slice(&self.body);
        out
    }
}

fn read_pool(reader: &mut Reader<'_>) -> Result<ConstantPool, ClassFormatError> {
    let count = usize::from(reader.u16()?);
    let mut entries = Vec::with_capacity(count.max(1));
    entries.push(Constant::Unusable);

    while entries.len() < count {
        let index = entries.len();
        let tag = reader.u8()?;
        let constant = match tag {
            1 => {
                let len = usize::from(reader.u16()?);
                Constant::Utf8(reader.bytes(len)?.to_vec())
            }
            3 => Constant::Integer(reader.u32()?),
            4 => Constant::Float(reader.u32()?),
            5 => Constant::Long(reader.u64()?),
            6 => Constant::Double(reader.u64()?),
            7 => Constant::Class { name: reader.u16()? },
            8 => Constant::String {
                value: reader.u16()?,
            },
            9 => Constant::FieldRef {
                class: reader.u16()?,
                nat: reader.u16()?,
            },
            10 => Constant::MethodRef {
                class: reader.u16()?,
                nat: reader.u16()?,
            },
            11 => Constant::InterfaceMethodRef {
                class: reader.u16()?,
                nat: reader.u16()?,
            },
            12 => Constant::NameAndType {
                name: reader.u16()?,
                descriptor: reader.u16()?,
            },
            15 => Constant::MethodHandle {
                kind: reader.u8()?,
                reference: reader.u16()?,
            },
            16 => Constant::MethodType {
                descriptor: reader.u16()?,
            },
            17 => Constant::Dynamic {
                bootstrap: reader.u16()?,
                nat: reader.u16()?,
            },
            18 => Constant::InvokeDynamic {
                bootstrap: reader.u16()?,
                nat: reader.u16()?,
            },
            19 => Constant::Module { name: reader.u16()? },
            20 => Constant::Package { name: reader.u16()? },
            _ => return Err(ClassFormatError::UnknownConstantTag { index, tag }),
        };
        let wide = matches!(constant, Constant::Long(_) | Constant::Double(_));
        entries.push(constant);
        if wide {
            // A trailing wide constant may not claim a slot past the count.
            if entries.len() >= count {
                return Err(ClassFormatError::Truncated { offset: reader.pos });
            }
            entries.push(Constant::Unusable);
        }
    }
    Ok(ConstantPool { entries })
}

/// Bounded big-endian reader over `bytes[pos..end]`. Offsets are absolute.
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
    end: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8], pos: usize, end: usize) -> Self {
        Self { bytes, pos, end }
    }

    fn bytes(&mut self, len: usize) -> Result<&'a [u8], ClassFormatError> {
        let stop = self
            .pos
            .checked_add(len)
            .filter(|stop| *stop <= self.end)
            .ok_or(ClassFormatError::Truncated { offset: self.pos })?;
        let slice = &self.bytes[self.pos..stop];
        self.pos = stop;
        Ok(slice)
    }

    fn skip(&mut self, len: usize) -> Result<(), ClassFormatError> {
        self.bytes(len).map(|_| ())
    }

    fn u8(&mut self) -> Result<u8, ClassFormatError> {
        Ok(self.bytes(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, ClassFormatError> {
        let b = self.bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, ClassFormatError> {
        let b = self.bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> Result<u64, ClassFormatError> {
        let hi = u64::from(self.u32()?);
        let lo = u64::from(self.u32()?);
        Ok((hi << 32) | lo)
    }

    /// Read a `u2` and return it with its offset.
    fn index(&mut self) -> Result<(usize, u16), ClassFormatError> {
        let offset = self.pos;
        Ok((offset, self.u16()?))
    }
}

/// Walks the class body, validating structure and recording symbol sites.
struct BodyWalker<'p> {
    pool: &'p ConstantPool,
    sites: Vec<Site>,
}

impl BodyWalker<'_> {
    fn walk(&mut self, body: &[u8]) -> Result<u16, ClassFormatError> {
        let mut r = Reader::new(body, 0, body.len());
        r.skip(2)?; // access_flags
        let this_class = r.u16()?;
        self.pool.expect_class(this_class)?;
        let super_class = r.u16()?;
        if super_class != 0 {
            self.pool.expect_class(super_class)?;
        }
        let interfaces = r.u16()?;
        for _ in 0..interfaces {
            let index = r.u16()?;
            self.pool.expect_class(index)?;
        }

        for kind in [MemberKind::Field, MemberKind::Method] {
            let count = r.u16()?;
            for _ in 0..count {
                self.member(&mut r, kind)?;
            }
        }
        self.attributes(&mut r)?;

        if r.pos != body.len() {
            return Err(ClassFormatError::TrailingBytes {
                count: body.len() - r.pos,
            });
        }
        Ok(this_class)
    }

    fn member(&mut self, r: &mut Reader<'_>, kind: MemberKind) -> Result<(), ClassFormatError> {
        r.skip(2)?; // access_flags
        let (name_offset, name) = r.index()?;
        let (desc_offset, descriptor) = r.index()?;
        self.pool.expect_utf8(name)?;
        self.pool.expect_utf8(descriptor)?;
        self.sites.push(Site::MemberName {
            offset: name_offset,
            kind,
            name,
            descriptor,
        });
        self.sites.push(Site::Descriptor {
            offset: desc_offset,
            index: descriptor,
        });
        self.attributes(r)
    }

    fn attributes(&mut self, r: &mut Reader<'_>) -> Result<(), ClassFormatError> {
        let count = r.u16()?;
        for _ in 0..count {
            let name_index = r.u16()?;
            let name = self.pool.utf8(name_index)?.into_owned();
            let len = r.u32()? as usize;
            let start = r.pos;
            r.skip(len)?;

            let mut body = Reader::new(r.bytes, start, start + len);
            self.attribute(&name, &mut body)?;
            if body.pos != body.end {
                return Err(ClassFormatError::AttributeOverrun { name });
            }
        }
        Ok(())
    }

    fn attribute(&mut self, name: &str, r: &mut Reader<'_>) -> Result<(), ClassFormatError> {
        let overrun = |_| ClassFormatError::AttributeOverrun {
            name: name.to_string(),
        };
        match name {
            "Signature" => {
                let (offset, index) = r.index().map_err(overrun)?;
                self.pool.expect_utf8(index)?;
                self.sites.push(Site::Signature { offset, index });
            }
            "Code" => {
                r.skip(4).map_err(overrun)?; // max_stack, max_locals
                let code_len = r.u32().map_err(overrun)? as usize;
                r.skip(code_len).map_err(overrun)?;
                let handlers = usize::from(r.u16().map_err(overrun)?);
                r.skip(handlers * 8).map_err(overrun)?;
                self.attributes(r)?;
            }
            "LocalVariableTable" | "LocalVariableTypeTable" => {
                let count = r.u16().map_err(overrun)?;
                for _ in 0..count {
                    r.skip(6).map_err(overrun)?; // start_pc, length, name_index
                    let (offset, index) = r.index().map_err(overrun)?;
                    self.pool.expect_utf8(index)?;
                    self.sites.push(if name == "LocalVariableTable" {
                        Site::Descriptor { offset, index }
                    } else {
                        Site::Signature { offset, index }
                    });
                    r.skip(2).map_err(overrun)?; // index
                }
            }
            "RuntimeVisibleAnnotations" | "RuntimeInvisibleAnnotations" => {
                let count = r.u16().map_err(overrun)?;
                for _ in 0..count {
                    self.annotation(r).map_err(|e| attach(e, name))?;
                }
            }
            "RuntimeVisibleParameterAnnotations" | "RuntimeInvisibleParameterAnnotations" => {
                let params = r.u8().map_err(overrun)?;
                for _ in 0..params {
                    let count = r.u16().map_err(overrun)?;
                    for _ in 0..count {
                        self.annotation(r).map_err(|e| attach(e, name))?;
                    }
                }
            }
            "RuntimeVisibleTypeAnnotations" | "RuntimeInvisibleTypeAnnotations" => {
                let count = r.u16().map_err(overrun)?;
                for _ in 0..count {
                    self.type_annotation(r).map_err(|e| attach(e, name))?;
                }
            }
            "AnnotationDefault" => self.element_value(r).map_err(|e| attach(e, name))?,
            "Record" => {
                let count = r.u16().map_err(overrun)?;
                for _ in 0..count {
                    // Components mirror the record's private fields.
                    self.member(r, MemberKind::Field).map_err(|e| attach(e, name))?;
                }
            }
            "EnclosingMethod" => {
                let class = r.u16().map_err(overrun)?;
                self.pool.expect_class(class)?;
                let (offset, nat) = r.index().map_err(overrun)?;
                if nat != 0 {
                    self.pool.expect_nat(nat)?;
                    self.sites.push(Site::EnclosingMethod { offset, class, nat });
                }
            }
            _ => r.pos = r.end,
        }
        Ok(())
    }

    fn annotation(&mut self, r: &mut Reader<'_>) -> Result<(), ClassFormatError> {
        let (offset, index) = r.index()?;
        self.pool.expect_utf8(index)?;
        self.sites.push(Site::Descriptor { offset, index });
        let pairs = r.u16()?;
        for _ in 0..pairs {
            r.skip(2)?; // element_name_index
            self.element_value(r)?;
        }
        Ok(())
    }

    /// `type_annotation` (JVMS 4.7.20): target and path, then a plain annotation.
    fn type_annotation(&mut self, r: &mut Reader<'_>) -> Result<(), ClassFormatError> {
        let target_type = r.u8()?;
        match target_type {
            0x13..=0x15 => {}
            0x00 | 0x01 | 0x16 => r.skip(1)?,
            0x10 | 0x11 | 0x12 | 0x17 | 0x42..=0x46 => r.skip(2)?,
            0x47..=0x4B => r.skip(3)?,
            0x40 | 0x41 => {
                let entries = usize::from(r.u16()?);
                r.skip(entries * 6)?;
            }
            other => return Err(ClassFormatError::BadTargetType(other)),
        }
        let path_length = usize::from(r.u8()?);
        r.skip(path_length * 2)?;
        self.annotation(r)
    }

    fn element_value(&mut self, r: &mut Reader<'_>) -> Result<(), ClassFormatError> {
        let tag = r.u8()?;
        match tag {
            b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b's' => r.skip(2)?,
            b'e' => {
                let (offset, index) = r.index()?;
                self.pool.expect_utf8(index)?;
                self.sites.push(Site::Descriptor { offset, index });
                r.skip(2)?; // const_name_index
            }
            b'c' => {
                let (offset, index) = r.index()?;
                self.pool.expect_utf8(index)?;
                self.sites.push(Site::Descriptor { offset, index });
            }
            b'@' => self.annotation(r)?,
            b'[' => {
                let count = r.u16()?;
                for _ in 0..count {
                    self.element_value(r)?;
                }
            }
            other => return Err(ClassFormatError::BadElementTag(other)),
        }
        Ok(())
    }
}

/// Truncation inside an attribute is reported as an overrun of that attribute.
fn attach(err: ClassFormatError, name: &str) -> ClassFormatError {
    match err {
        ClassFormatError::Truncated { .. } => ClassFormatError::AttributeOverrun {
            name: name.to_string(),
        },
        other => other,
    }
}
