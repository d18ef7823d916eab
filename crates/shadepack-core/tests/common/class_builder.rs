//! Minimal but well-formed class-file assembler (ASCII symbols only).
//!
//! Shared by the library's unit tests and the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;

pub struct ClassBuilder {
    pool: Vec<u8>,
    count: u16,
    utf8s: HashMap<String, u16>,
    this_class: u16,
    super_class: u16,
    fields: Vec<Vec<u8>>,
    methods: Vec<Vec<u8>>,
    attributes: Vec<Vec<u8>>,
    record: Option<(u16, Vec<Vec<u8>>)>,
}

impl ClassBuilder {
    pub fn new(name: &str) -> Self {
        let mut b = Self {
            pool: Vec::new(),
            count: 1,
            utf8s: HashMap::new(),
            this_class: 0,
            super_class: 0,
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
            record: None,
        };
        b.this_class = b.class(name);
        b.super_class = b.class("java/lang/Object");
        b
    }

    fn push(&mut self, bytes: &[u8]) -> u16 {
        let index = self.count;
        self.count += 1;
        self.pool.extend_from_slice(bytes);
        index
    }

    fn tagged(&mut self, tag: u8, parts: &[u16]) -> u16 {
        let mut bytes = vec![tag];
        for part in parts {
            bytes.extend_from_slice(&part.to_be_bytes());
        }
        self.push(&bytes)
    }

    pub fn utf8(&mut self, text: &str) -> u16 {
        if let Some(index) = self.utf8s.get(text) {
            return *index;
        }
        let mut bytes = vec![1];
        bytes.extend_from_slice(&(text.len() as u16).to_be_bytes());
        bytes.extend_from_slice(text.as_bytes());
        let index = self.push(&bytes);
        self.utf8s.insert(text.to_string(), index);
        index
    }

    pub fn class(&mut self, name: &str) -> u16 {
        let name = self.utf8(name);
        self.tagged(7, &[name])
    }

    pub fn string(&mut self, value: &str) -> u16 {
        let value = self.utf8(value);
        self.tagged(8, &[value])
    }

    /// `Long` constant; takes two pool slots.
    pub fn long(&mut self, value: u64) -> u16 {
        let mut bytes = vec![5];
        bytes.extend_from_slice(&value.to_be_bytes());
        let index = self.push(&bytes);
        self.count += 1;
        index
    }

    pub fn nat(&mut self, name: &str, desc: &str) -> u16 {
        let name = self.utf8(name);
        let desc = self.utf8(desc);
        self.tagged(12, &[name, desc])
    }

    pub fn field_ref(&mut self, owner: &str, name: &str, desc: &str) -> u16 {
        let class = self.class(owner);
        let nat = self.nat(name, desc);
        self.tagged(9, &[class, nat])
    }

    pub fn method_ref(&mut self, owner: &str, name: &str, desc: &str) -> u16 {
        let class = self.class(owner);
        let nat = self.nat(name, desc);
        self.tagged(10, &[class, nat])
    }

    fn attribute(&mut self, name: &str, body: &[u8]) -> Vec<u8> {
        let name = self.utf8(name);
        let mut out = name.to_be_bytes().to_vec();
        out.extend_from_slice(&(body.len() as u32).to_be_bytes());
        out.extend_from_slice(body);
        out
    }

    fn signature_attribute(&mut self, signature: &str) -> Vec<u8> {
        let index = self.utf8(signature);
        self.attribute("Signature", &index.to_be_bytes())
    }

    /// name, descriptor, attributes: the shape shared by members and record components.
    fn named(&mut self, name: &str, desc: &str, attributes: Vec<Vec<u8>>) -> Vec<u8> {
        let name = self.utf8(name);
        let desc = self.utf8(desc);
        let mut out = name.to_be_bytes().to_vec();
        out.extend_from_slice(&desc.to_be_bytes());
        out.extend_from_slice(&(attributes.len() as u16).to_be_bytes());
        for attribute in attributes {
            out.extend_from_slice(&attribute);
        }
        out
    }

    fn member(&mut self, name: &str, desc: &str, attributes: Vec<Vec<u8>>) -> Vec<u8> {
        let mut out = vec![0x00, 0x01];
        out.extend(self.named(name, desc, attributes));
        out
    }

    pub fn field(&mut self, name: &str, desc: &str) -> &mut Self {
        let member = self.member(name, desc, Vec::new());
        self.fields.push(member);
        self
    }

    /// Field carrying a generic `Signature` attribute.
    pub fn signed_field(&mut self, name: &str, desc: &str, signature: &str) -> &mut Self {
        let attribute = self.signature_attribute(signature);
        let member = self.member(name, desc, vec![attribute]);
        self.fields.push(member);
        self
    }

    /// Method whose `Code` attribute holds `code` verbatim.
    pub fn method(&mut self, name: &str, desc: &str, code: &[u8]) -> &mut Self {
        let mut body = vec![0x00, 0x04, 0x00, 0x04];
        body.extend_from_slice(&(code.len() as u32).to_be_bytes());
        body.extend_from_slice(code);
        body.extend_from_slice(&[0, 0, 0, 0]);
        let attribute = self.attribute("Code", &body);
        let member = self.member(name, desc, vec![attribute]);
        self.methods.push(member);
        self
    }

    /// Method calling `owner.target(desc)` statically, then returning.
    pub fn calling(&mut self, name: &str, owner: &str, target: &str, desc: &str) -> &mut Self {
        let [hi, lo] = self.method_ref(owner, target, desc).to_be_bytes();
        self.method(name, "()V", &[0xB8, hi, lo, 0xB1])
    }

    pub fn class_signature(&mut self, signature: &str) -> &mut Self {
        let attribute = self.signature_attribute(signature);
        self.attributes.push(attribute);
        self
    }

    /// Class-level `RuntimeVisibleAnnotations` with one marker annotation.
    pub fn annotation(&mut self, type_desc: &str) -> &mut Self {
        let index = self.utf8(type_desc);
        let mut body = vec![0x00, 0x01];
        body.extend_from_slice(&index.to_be_bytes());
        body.extend_from_slice(&[0x00, 0x00]);
        let attribute = self.attribute("RuntimeVisibleAnnotations", &body);
        self.attributes.push(attribute);
        self
    }

    /// Class-level `RuntimeVisibleTypeAnnotations` on the superclass
    /// (`supertype_target` 0xFFFF) with a one-step type path.
    pub fn type_annotation(&mut self, type_desc: &str) -> &mut Self {
        let index = self.utf8(type_desc);
        let mut body = vec![0x00, 0x01];
        body.extend_from_slice(&[0x10, 0xFF, 0xFF]);
        body.extend_from_slice(&[0x01, 0x03, 0x00]);
        body.extend_from_slice(&index.to_be_bytes());
        body.extend_from_slice(&[0x00, 0x00]);
        let attribute = self.attribute("RuntimeVisibleTypeAnnotations", &body);
        self.attributes.push(attribute);
        self
    }

    /// Adds a component to the class's `Record` attribute.
    pub fn record_component(&mut self, name: &str, desc: &str, signature: Option<&str>) -> &mut Self {
        let record_name = self.utf8("Record");
        let attributes = match signature {
            Some(signature) => vec![self.signature_attribute(signature)],
            None => Vec::new(),
        };
        let component = self.named(name, desc, attributes);
        self.record
            .get_or_insert_with(|| (record_name, Vec::new()))
            .1
            .push(component);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = vec![0xCA, 0xFE, 0xBA, 0xBE, 0x00, 0x00, 0x00, 0x34];
        out.extend_from_slice(&self.count.to_be_bytes());
        out.extend_from_slice(&self.pool);
        out.extend_from_slice(&[0x00, 0x21]);
        out.extend_from_slice(&self.this_class.to_be_bytes());
        out.extend_from_slice(&self.super_class.to_be_bytes());
        out.extend_from_slice(&[0x00, 0x00]);
        for group in [&self.fields, &self.methods] {
            out.extend_from_slice(&(group.len() as u16).to_be_bytes());
            for item in group.iter() {
                out.extend_from_slice(item);
            }
        }

        let record = self.record.as_ref().map(|(name, components)| {
            let body: Vec<u8> = components.concat();
            let mut attribute = name.to_be_bytes().to_vec();
            attribute.extend_from_slice(&((body.len() + 2) as u32).to_be_bytes());
            attribute.extend_from_slice(&(components.len() as u16).to_be_bytes());
            attribute.extend_from_slice(&body);
            attribute
        });
        let attributes: Vec<&Vec<u8>> = self.attributes.iter().chain(record.as_ref()).collect();
        out.extend_from_slice(&(attributes.len() as u16).to_be_bytes());
        for attribute in attributes {
            out.extend_from_slice(attribute);
        }
        out
    }
}
