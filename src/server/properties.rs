//! Window properties
//!
//! Each window carries a map from property-name atom to a typed byte blob.
//! Change notifications are the caller's job; this module only enforces the
//! write and read rules.

use crate::protocol::*;
use std::collections::BTreeMap;

/// ChangeProperty modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyMode {
    Replace = 0,
    Prepend = 1,
    Append = 2,
}

impl PropertyMode {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(PropertyMode::Replace),
            1 => Some(PropertyMode::Prepend),
            2 => Some(PropertyMode::Append),
            _ => None,
        }
    }
}

/// Property value stored on a window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    /// The type of the property (an atom)
    pub type_atom: Atom,
    /// The format (8, 16, or 32 bits per element)
    pub format: u8,
    /// The raw data, in the byte order of the client that wrote it
    pub data: Vec<u8>,
}

/// Outcome of a GetProperty lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyRead {
    /// The window has no such property
    Missing,
    /// The property exists with a different type; nothing is returned
    TypeMismatch {
        type_atom: Atom,
        format: u8,
        bytes_after: u32,
    },
    Value {
        type_atom: Atom,
        format: u8,
        bytes_after: u32,
        data: Vec<u8>,
        /// The property was removed because it was read to the end
        deleted: bool,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyMap {
    entries: BTreeMap<Atom, Property>,
}

impl PropertyMap {
    pub fn new() -> Self {
        PropertyMap {
            entries: BTreeMap::new(),
        }
    }

    pub fn get(&self, name: Atom) -> Option<&Property> {
        self.entries.get(&name)
    }

    pub fn contains(&self, name: Atom) -> bool {
        self.entries.contains_key(&name)
    }

    /// Store `data` under `name`.
    ///
    /// Prepend and Append need the existing value to have the same type and
    /// format; otherwise the property is left untouched and Match is
    /// returned. Against a missing property they behave like Replace.
    pub fn change(
        &mut self,
        name: Atom,
        type_atom: Atom,
        format: u8,
        mode: PropertyMode,
        data: &[u8],
    ) -> X11Result<()> {
        if !matches!(format, 8 | 16 | 32) {
            return Err(X11Error::bad_value(format as u32));
        }
        match (mode, self.entries.get_mut(&name)) {
            (PropertyMode::Replace, _) | (_, None) => {
                self.entries.insert(
                    name,
                    Property {
                        type_atom,
                        format,
                        data: data.to_vec(),
                    },
                );
            }
            (mode, Some(existing)) => {
                if existing.type_atom != type_atom || existing.format != format {
                    return Err(X11Error::bad_match());
                }
                if mode == PropertyMode::Append {
                    existing.data.extend_from_slice(data);
                } else {
                    let mut joined = data.to_vec();
                    joined.extend_from_slice(&existing.data);
                    existing.data = joined;
                }
            }
        }
        Ok(())
    }

    /// GetProperty: `long_offset` and `long_length` are in 4-byte units.
    /// `type_filter` of `Atom::NONE` matches any type.
    pub fn read(
        &mut self,
        name: Atom,
        type_filter: Atom,
        long_offset: u32,
        long_length: u32,
        delete: bool,
    ) -> X11Result<PropertyRead> {
        let prop = match self.entries.get(&name) {
            Some(p) => p,
            None => return Ok(PropertyRead::Missing),
        };
        let total = prop.data.len() as u64;
        if type_filter != Atom::NONE && type_filter != prop.type_atom {
            return Ok(PropertyRead::TypeMismatch {
                type_atom: prop.type_atom,
                format: prop.format,
                bytes_after: total as u32,
            });
        }

        let start = long_offset as u64 * 4;
        if start > total {
            return Err(X11Error::bad_value(long_offset));
        }
        let len = (total - start).min(long_length as u64 * 4);
        // Only whole units are returned
        let unit = (prop.format / 8).max(1) as u64;
        let len = len - len % unit;
        let end = start + len;
        let bytes_after = (total - end) as u32;

        let read = PropertyRead::Value {
            type_atom: prop.type_atom,
            format: prop.format,
            bytes_after,
            data: prop.data[start as usize..end as usize].to_vec(),
            deleted: delete && bytes_after == 0,
        };
        if delete && bytes_after == 0 {
            self.entries.remove(&name);
        }
        Ok(read)
    }

    pub fn delete(&mut self, name: Atom) -> bool {
        self.entries.remove(&name).is_some()
    }

    /// Property names in ascending atom order
    pub fn names(&self) -> Vec<Atom> {
        self.entries.keys().copied().collect()
    }

    /// RotateProperties: the value of `names[i]` moves to
    /// `names[(i + delta) mod n]`. Every name must be a distinct existing
    /// property, else nothing changes and Match is returned.
    pub fn rotate(&mut self, names: &[Atom], delta: i16) -> X11Result<()> {
        for (i, name) in names.iter().enumerate() {
            if !self.entries.contains_key(name) || names[..i].contains(name) {
                return Err(X11Error::bad_match());
            }
        }
        let n = names.len() as i64;
        if n == 0 {
            return Ok(());
        }
        let shift = (delta as i64).rem_euclid(n) as usize;
        if shift == 0 {
            return Ok(());
        }
        let values: Vec<Property> = names
            .iter()
            .filter_map(|name| self.entries.remove(name))
            .collect();
        for (i, value) in values.into_iter().enumerate() {
            let target = names[(i + shift) % names.len()];
            self.entries.insert(target, value);
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
