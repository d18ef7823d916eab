//! Rewriting of field/method descriptors and generic signatures.

use std::borrow::Cow;

use super::class_file::ClassFormatError;
use super::mapping::MappingTable;

/// Remap every `L<name>;` in a field or method descriptor.
pub(crate) fn remap_descriptor<'a>(
    desc: &'a str,
    table: &MappingTable,
) -> Result<Cow<'a, str>, ClassFormatError> {
    let invalid = || ClassFormatError::InvalidDescriptor(desc.to_string());
    if desc.is_empty() {
        return Err(invalid());
    }

    let bytes = desc.as_bytes();
    let mut out = String::with_capacity(desc.len());
    let mut changed = false;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'L' => {
                let end = desc[i + 1..].find(';').ok_or_else(invalid)? + i + 1;
                let name = &desc[i + 1..end];
                if name.is_empty() {
                    return Err(invalid());
                }
                let mapped = table.map_class(name);
                changed |= mapped != name;
                out.push('L');
                out.push_str(mapped);
                out.push(';');
                i = end + 1;
            }
            b @ (b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b'V' | b'[' | b'('
            | b')') => {
                out.push(b as char);
                i += 1;
            }
            _ => return Err(invalid()),
        }
    }

    Ok(if changed { Cow::Owned(out) } else { Cow::Borrowed(desc) })
}

/// Remap a class name as found in `CONSTANT_Class`: internal name or array descriptor.
pub(crate) fn remap_class_reference<'a>(
    name: &'a str,
    table: &'a MappingTable,
) -> Result<Cow<'a, str>, ClassFormatError> {
    if name.starts_with('[') {
        remap_descriptor(name, table)
    } else {
        Ok(Cow::Borrowed(table.map_class(name)))
    }
}

/// Remap a class, method or field generic signature (JVMS 4.7.9.1).
pub(crate) fn remap_signature<'a>(
    sig: &'a str,
    table: &MappingTable,
) -> Result<Cow<'a, str>, ClassFormatError> {
    if !table.has_classes() {
        return Ok(Cow::Borrowed(sig));
    }
    let mut parser = SignatureRemapper {
        src: sig,
        pos: 0,
        out: String::with_capacity(sig.len()),
        table,
    };
    parser.signature()?;
    if parser.out == sig {
        Ok(Cow::Borrowed(sig))
    } else {
        Ok(Cow::Owned(parser.out))
    }
}

struct SignatureRemapper<'a> {
    src: &'a str,
    pos: usize,
    out: String,
    table: &'a MappingTable,
}

impl SignatureRemapper<'_> {
    fn error(&self) -> ClassFormatError {
        ClassFormatError::InvalidSignature(self.src.to_string())
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn copy(&mut self, expected: u8) -> Result<(), ClassFormatError> {
        if self.peek() != Some(expected) {
            return Err(self.error());
        }
        self.out.push(expected as char);
        self.pos += 1;
        Ok(())
    }

    /// Identifier up to (not including) any of `stops`.
    fn identifier(&mut self, stops: &[u8]) -> Result<&str, ClassFormatError> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if stops.contains(&b) {
                break;
            }
            self.pos += 1;
        }
        if self.pos == start || self.at_end() {
            return Err(self.error());
        }
        Ok(&self.src[start..self.pos])
    }

    fn signature(&mut self) -> Result<(), ClassFormatError> {
        if self.peek() == Some(b'<') {
            self.type_parameters()?;
        }

        if self.peek() == Some(b'(') {
            self.copy(b'(')?;
            while self.peek() != Some(b')') {
                if self.at_end() {
                    return Err(self.error());
                }
                self.type_signature()?;
            }
            self.copy(b')')?;
            if self.peek() == Some(b'V') {
                self.copy(b'V')?;
            } else {
                self.type_signature()?;
            }
            while self.peek() == Some(b'^') {
                self.copy(b'^')?;
                self.reference_type()?;
            }
        } else {
            if self.at_end() {
                return Err(self.error());
            }
            while !self.at_end() {
                self.reference_type()?;
            }
        }

        if !self.at_end() {
            return Err(self.error());
        }
        Ok(())
    }

    fn type_parameters(&mut self) -> Result<(), ClassFormatError> {
        self.copy(b'<')?;
        while self.peek() != Some(b'>') {
            let name = self.identifier(b":>")?.to_string();
            self.out.push_str(&name);
            self.copy(b':')?;
            if matches!(self.peek(), Some(b'L' | b'[' | b'T')) {
                self.reference_type()?;
            }
            while self.peek() == Some(b':') {
                self.copy(b':')?;
                self.reference_type()?;
            }
        }
        self.copy(b'>')
    }

    fn type_signature(&mut self) -> Result<(), ClassFormatError> {
        match self.peek() {
            Some(b @ (b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z')) => self.copy(b),
            _ => self.reference_type(),
        }
    }

    fn reference_type(&mut self) -> Result<(), ClassFormatError> {
        match self.peek() {
            Some(b'L') => self.class_type(),
            Some(b'T') => {
                self.copy(b'T')?;
                let name = self.identifier(b";")?.to_string();
                self.out.push_str(&name);
                self.copy(b';')
            }
            Some(b'[') => {
                self.copy(b'[')?;
                self.type_signature()
            }
            _ => Err(self.error()),
        }
    }

    fn class_type(&mut self) -> Result<(), ClassFormatError> {
        self.copy(b'L')?;
        let mut old_full = self.identifier(b"<.;")?.to_string();
        let mut new_full = self.table.map_class(&old_full).to_string();
        self.out.push_str(&new_full);
        if self.peek() == Some(b'<') {
            self.type_arguments()?;
        }

        while self.peek() == Some(b'.') {
            self.copy(b'.')?;
            let inner = self.identifier(b"<.;")?.to_string();
            old_full = format!("{}${}", old_full, inner);
            let mapped = self.table.map_class(&old_full);
            let prefix = format!("{}$", new_full);
            let (segment, next_full) = match mapped.strip_prefix(prefix.as_str()) {
                Some(suffix) if mapped != old_full => (suffix.to_string(), mapped.to_string()),
                _ => (inner.clone(), format!("{}{}", prefix, inner)),
            };
            self.out.push_str(&segment);
            new_full = next_full;
            if self.peek() == Some(b'<') {
                self.type_arguments()?;
            }
        }
        self.copy(b';')
    }

    fn type_arguments(&mut self) -> Result<(), ClassFormatError> {
        self.copy(b'<')?;
        while self.peek() != Some(b'>') {
            match self.peek() {
                Some(b'*') => self.copy(b'*')?,
                Some(b @ (b'+' | b'-')) => {
                    self.copy(b)?;
                    self.reference_type()?;
                }
                Some(_) => self.reference_type()?,
                None => return Err(self.error()),
            }
        }
        self.copy(b'>')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> MappingTable {
        let mut t = MappingTable::new();
        t.insert_class("com/example/Foo", "shaded/Foo");
        t.insert_class("com/example/Outer", "shaded/Outer");
        t.insert_class("com/example/Outer$Inner", "shaded/Outer$Nested");
        t
    }

    #[test]
    fn test_descriptor_remap() {
        let t = table();
        assert_eq!(
            remap_descriptor("(Lcom/example/Foo;I[Lcom/example/Foo;)V", &t).unwrap(),
            "(Lshaded/Foo;I[Lshaded/Foo;)V"
        );
        assert!(matches!(
            remap_descriptor("(ILjava/lang/String;)J", &t).unwrap(),
            Cow::Borrowed(_)
        ));
    }

    #[test]
    fn test_descriptor_rejects_garbage() {
        let t = table();
        assert!(remap_descriptor("", &t).is_err());
        assert!(remap_descriptor("Lcom/example/Foo", &t).is_err());
        assert!(remap_descriptor("(Q)V", &t).is_err());
        assert!(remap_descriptor("L;", &t).is_err());
    }

    #[test]
    fn test_class_reference_handles_arrays() {
        let t = table();
        assert_eq!(remap_class_reference("com/example/Foo", &t).unwrap(), "shaded/Foo");
        assert_eq!(
            remap_class_reference("[[Lcom/example/Foo;", &t).unwrap(),
            "[[Lshaded/Foo;"
        );
        assert_eq!(remap_class_reference("java/lang/Object", &t).unwrap(), "java/lang/Object");
    }

    #[test]
    fn test_generic_signatures() {
        let t = table();
        assert_eq!(
            remap_signature("Ljava/util/List<Lcom/example/Foo;>;", &t).unwrap(),
            "Ljava/util/List<Lshaded/Foo;>;"
        );
        assert_eq!(
            remap_signature(
                "<LT:Lcom/example/Foo;U::Ljava/lang/Comparable<-TLT;>;>(TLT;[TU;)Ljava/util/Map<*+Lcom/example/Foo;>;^Ljava/io/IOException;",
                &t
            )
            .unwrap(),
            "<LT:Lshaded/Foo;U::Ljava/lang/Comparable<-TLT;>;>(TLT;[TU;)Ljava/util/Map<*+Lshaded/Foo;>;^Ljava/io/IOException;"
        );
    }

    #[test]
    fn test_inner_class_suffix() {
        let t = table();
        assert_eq!(
            remap_signature("Lcom/example/Outer<TT;>.Inner<Lcom/example/Foo;>;", &t).unwrap(),
            "Lshaded/Outer<TT;>.Nested<Lshaded/Foo;>;"
        );
        assert_eq!(
            remap_signature("Lcom/example/Outer.Other;", &t).unwrap(),
            "Lshaded/Outer.Other;"
        );
    }

    #[test]
    fn test_class_signature_with_interfaces() {
        let t = table();
        assert_eq!(
            remap_signature("Ljava/lang/Object;Ljava/lang/Iterable<Lcom/example/Foo;>;", &t)
                .unwrap(),
            "Ljava/lang/Object;Ljava/lang/Iterable<Lshaded/Foo;>;"
        );
    }

    #[test]
    fn test_malformed_signature() {
        let t = table();
        assert!(remap_signature("Ljava/util/List<", &t).is_err());
        assert!(remap_signature("(I", &t).is_err());
        assert!(remap_signature("", &t).is_err());
    }
}
