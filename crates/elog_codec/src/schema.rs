//! Per-logbook attribute schema.

use crate::entry::Attribute;
use crate::error::{CodecError, CodecResult};

/// Header names the record format reserves for itself.
pub const RESERVED_HEADERS: &[&str] = &[
    "Date",
    "Reply to",
    "In reply to",
    "Attachment",
    "Encoding",
    "Locked by",
];

/// The ordered attribute names a logbook defines.
///
/// The schema is supplied by the logbook configuration and only governs the
/// order attributes are written in. It never changes storage mechanics. An
/// empty schema is permissive: any attribute names are accepted, in the
/// order given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeSchema {
    names: Vec<String>,
}

impl AttributeSchema {
    /// Creates a schema from ordered attribute names.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidAttribute`] if a name cannot appear in a
    /// header line or collides with a reserved header.
    pub fn new<I, S>(names: I) -> CodecResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for name in names {
            let name = name.into();
            check_name(&name)?;
            if out.iter().any(|n| n.eq_ignore_ascii_case(&name)) {
                return Err(CodecError::invalid_attribute(name, "defined twice"));
            }
            out.push(name);
        }
        Ok(Self { names: out })
    }

    /// A schema that accepts any attribute names.
    #[must_use]
    pub fn permissive() -> Self {
        Self::default()
    }

    /// Returns true if this schema accepts any attribute names.
    #[must_use]
    pub fn is_permissive(&self) -> bool {
        self.names.is_empty()
    }

    /// The ordered attribute names.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n.eq_ignore_ascii_case(name))
    }

    /// Checks that `attributes` are representable and in schema order.
    ///
    /// # Errors
    ///
    /// Returns the first problem found: an invalid name or value, a name not
    /// in the schema, a duplicate, or an out-of-order attribute.
    pub fn validate(&self, attributes: &[Attribute]) -> CodecResult<()> {
        let mut last: Option<usize> = None;
        for (i, attr) in attributes.iter().enumerate() {
            check_name(&attr.name)?;
            check_value(attr)?;

            if attributes[..i]
                .iter()
                .any(|a| a.name.eq_ignore_ascii_case(&attr.name))
            {
                return Err(CodecError::invalid_attribute(&attr.name, "given twice"));
            }

            if self.is_permissive() {
                continue;
            }

            let pos = self.position(&attr.name).ok_or_else(|| CodecError::UnknownAttribute {
                name: attr.name.clone(),
            })?;
            if last.is_some_and(|l| pos < l) {
                return Err(CodecError::AttributeOrder {
                    name: attr.name.clone(),
                });
            }
            last = Some(pos);
        }
        Ok(())
    }

    /// Reorders `attributes` into schema order, then validates them.
    ///
    /// A permissive schema keeps the given order.
    ///
    /// # Errors
    ///
    /// Same as [`AttributeSchema::validate`], except ordering never fails.
    pub fn arrange(&self, mut attributes: Vec<Attribute>) -> CodecResult<Vec<Attribute>> {
        if !self.is_permissive() {
            for attr in &attributes {
                if self.position(&attr.name).is_none() {
                    return Err(CodecError::UnknownAttribute {
                        name: attr.name.clone(),
                    });
                }
            }
            attributes.sort_by_key(|a| self.position(&a.name));
        }
        self.validate(&attributes)?;
        Ok(attributes)
    }
}

fn check_name(name: &str) -> CodecResult<()> {
    if name.trim().is_empty() {
        return Err(CodecError::invalid_attribute(name, "empty name"));
    }
    if name.contains(['\n', '\r', ':']) {
        return Err(CodecError::invalid_attribute(
            name,
            "name contains a newline or colon",
        ));
    }
    if name.starts_with(crate::MARKER) || name.starts_with('=') {
        return Err(CodecError::invalid_attribute(name, "name looks like a marker"));
    }
    if RESERVED_HEADERS.iter().any(|r| r.eq_ignore_ascii_case(name)) {
        return Err(CodecError::invalid_attribute(name, "reserved header name"));
    }
    Ok(())
}

fn check_value(attr: &Attribute) -> CodecResult<()> {
    if attr.value.contains(['\n', '\r']) {
        return Err(CodecError::invalid_attribute(
            &attr.name,
            "value contains a newline",
        ));
    }
    Ok(())
}
