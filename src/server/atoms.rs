//! Atom table
//!
//! Bidirectional map between atom names and ids. Names are byte strings
//! (ISO Latin-1 on the wire) and compared exactly.

use crate::protocol::Atom;
use std::collections::HashMap;

/// Names of the predefined atoms, in id order starting at 1
pub const PREDEFINED_ATOMS: [&str; 68] = [
    "PRIMARY",
    "SECONDARY",
    "ARC",
    "ATOM",
    "BITMAP",
    "CARDINAL",
    "COLORMAP",
    "CURSOR",
    "CUT_BUFFER0",
    "CUT_BUFFER1",
    "CUT_BUFFER2",
    "CUT_BUFFER3",
    "CUT_BUFFER4",
    "CUT_BUFFER5",
    "CUT_BUFFER6",
    "CUT_BUFFER7",
    "DRAWABLE",
    "FONT",
    "INTEGER",
    "PIXMAP",
    "POINT",
    "RECTANGLE",
    "RESOURCE_MANAGER",
    "RGB_COLOR_MAP",
    "RGB_BEST_MAP",
    "RGB_BLUE_MAP",
    "RGB_DEFAULT_MAP",
    "RGB_GRAY_MAP",
    "RGB_GREEN_MAP",
    "RGB_RED_MAP",
    "STRING",
    "VISUALID",
    "WINDOW",
    "WM_COMMAND",
    "WM_HINTS",
    "WM_CLIENT_MACHINE",
    "WM_ICON_NAME",
    "WM_ICON_SIZE",
    "WM_NAME",
    "WM_NORMAL_HINTS",
    "WM_SIZE_HINTS",
    "WM_ZOOM_HINTS",
    "MIN_SPACE",
    "NORM_SPACE",
    "MAX_SPACE",
    "END_SPACE",
    "SUPERSCRIPT_X",
    "SUPERSCRIPT_Y",
    "SUBSCRIPT_X",
    "SUBSCRIPT_Y",
    "UNDERLINE_POSITION",
    "UNDERLINE_THICKNESS",
    "STRIKEOUT_ASCENT",
    "STRIKEOUT_DESCENT",
    "ITALIC_ANGLE",
    "X_HEIGHT",
    "QUAD_WIDTH",
    "WEIGHT",
    "POINT_SIZE",
    "RESOLUTION",
    "COPYRIGHT",
    "NOTICE",
    "FONT_NAME",
    "FAMILY_NAME",
    "FULL_NAME",
    "CAP_HEIGHT",
    "WM_CLASS",
    "WM_TRANSIENT_FOR",
];

#[derive(Debug, Clone)]
pub struct AtomTable {
    /// Name of atom `i + 1`
    names: Vec<Vec<u8>>,
    ids: HashMap<Vec<u8>, Atom>,
}

impl Default for AtomTable {
    fn default() -> Self {
        Self::new()
    }
}

impl AtomTable {
    /// A table holding exactly the predefined atoms
    pub fn new() -> Self {
        let mut table = AtomTable {
            names: Vec::with_capacity(PREDEFINED_ATOMS.len()),
            ids: HashMap::new(),
        };
        table.reset();
        table
    }

    /// Drop every interned atom and reinstall the predefined set
    pub fn reset(&mut self) {
        self.names.clear();
        self.ids.clear();
        for name in PREDEFINED_ATOMS {
            self.push(name.as_bytes());
        }
    }

    fn push(&mut self, name: &[u8]) -> Atom {
        self.names.push(name.to_vec());
        let atom = Atom::new(self.names.len() as u32);
        self.ids.insert(name.to_vec(), atom);
        atom
    }

    /// Look up `name`, creating it unless `only_if_exists` is set
    pub fn intern(&mut self, name: &[u8], only_if_exists: bool) -> Option<Atom> {
        if let Some(atom) = self.ids.get(name) {
            return Some(*atom);
        }
        if only_if_exists {
            return None;
        }
        let atom = self.push(name);
        log::debug!("Interned {} as {}", String::from_utf8_lossy(name), atom.get());
        Some(atom)
    }

    pub fn name(&self, atom: Atom) -> Option<&[u8]> {
        let index = (atom.get() as usize).checked_sub(1)?;
        self.names.get(index).map(|n| n.as_slice())
    }

    pub fn exists(&self, atom: Atom) -> bool {
        atom.get() >= 1 && (atom.get() as usize) <= self.names.len()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predefined_atoms() {
        let table = AtomTable::new();
        assert_eq!(table.len(), 68);
        assert_eq!(table.name(Atom::WM_NAME), Some(&b"WM_NAME"[..]));
        assert_eq!(table.name(Atom::WM_TRANSIENT_FOR), Some(&b"WM_TRANSIENT_FOR"[..]));
        assert_eq!(table.name(Atom::NONE), None);
        assert!(!table.exists(Atom::new(69)));
    }

    #[test]
    fn test_intern_is_idempotent() {
        let mut table = AtomTable::new();
        assert_eq!(table.intern(b"WM_NAME", false), Some(Atom::WM_NAME));
        assert_eq!(table.intern(b"_NET_WM_NAME", true), None);

        let a = table.intern(b"_NET_WM_NAME", false).unwrap();
        assert_eq!(a, Atom::new(69));
        assert_eq!(table.intern(b"_NET_WM_NAME", false), Some(a));
        assert_eq!(table.intern(b"_NET_WM_NAME", true), Some(a));
        assert_eq!(table.name(a), Some(&b"_NET_WM_NAME"[..]));
    }

    #[test]
    fn test_reset_drops_interned_atoms() {
        let mut table = AtomTable::new();
        let a = table.intern(b"CLIPBOARD", false).unwrap();
        table.reset();
        assert!(!table.exists(a));
        assert_eq!(table.intern(b"CLIPBOARD", true), None);
        assert_eq!(table.len(), 68);
    }
}
