//! X11 protocol requests
//!
//! Opcode table for the core protocol. Each opcode carries the length rule
//! the dispatcher enforces before a handler looks at the body.

/// How the declared length of a request is checked, in bytes including the
/// 4-byte header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthRule {
    Exact(usize),
    AtLeast(usize),
}

impl LengthRule {
    pub fn accepts(&self, total_len: usize) -> bool {
        match *self {
            LengthRule::Exact(n) => total_len == n,
            LengthRule::AtLeast(n) => total_len >= n,
        }
    }
}

macro_rules! length_rule {
    (exact $n:expr) => {
        LengthRule::Exact($n)
    };
    (at_least $n:expr) => {
        LengthRule::AtLeast($n)
    };
}

macro_rules! define_opcodes {
    ($($name:ident = $code:literal, $kind:ident $len:literal;)*) => {
        /// X11 request opcodes
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum RequestOpcode {
            $($name = $code,)*
        }

        impl RequestOpcode {
            pub fn from_u8(opcode: u8) -> Option<Self> {
                match opcode {
                    $($code => Some(RequestOpcode::$name),)*
                    _ => None,
                }
            }

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(RequestOpcode::$name => stringify!($name),)*
                }
            }

            /// Length rule enforced before the handler runs
            pub fn length_rule(&self) -> LengthRule {
                match self {
                    $(RequestOpcode::$name => length_rule!($kind $len),)*
                }
            }
        }
    };
}

define_opcodes! {
    CreateWindow = 1, at_least 32;
    ChangeWindowAttributes = 2, at_least 12;
    GetWindowAttributes = 3, exact 8;
    DestroyWindow = 4, exact 8;
    DestroySubwindows = 5, exact 8;
    ChangeSaveSet = 6, exact 8;
    ReparentWindow = 7, exact 16;
    MapWindow = 8, exact 8;
    MapSubwindows = 9, exact 8;
    UnmapWindow = 10, exact 8;
    UnmapSubwindows = 11, exact 8;
    ConfigureWindow = 12, at_least 12;
    CirculateWindow = 13, exact 8;
    GetGeometry = 14, exact 8;
    QueryTree = 15, exact 8;
    InternAtom = 16, at_least 8;
    GetAtomName = 17, exact 8;
    ChangeProperty = 18, at_least 24;
    DeleteProperty = 19, exact 12;
    GetProperty = 20, exact 24;
    ListProperties = 21, exact 8;
    SetSelectionOwner = 22, exact 16;
    GetSelectionOwner = 23, exact 8;
    ConvertSelection = 24, exact 24;
    SendEvent = 25, exact 44;
    GrabPointer = 26, exact 24;
    UngrabPointer = 27, exact 8;
    GrabButton = 28, exact 24;
    UngrabButton = 29, exact 12;
    ChangeActivePointerGrab = 30, exact 16;
    GrabKeyboard = 31, exact 16;
    UngrabKeyboard = 32, exact 8;
    GrabKey = 33, exact 16;
    UngrabKey = 34, exact 12;
    AllowEvents = 35, exact 8;
    GrabServer = 36, exact 4;
    UngrabServer = 37, exact 4;
    QueryPointer = 38, exact 8;
    GetMotionEvents = 39, exact 16;
    TranslateCoordinates = 40, exact 16;
    WarpPointer = 41, exact 24;
    SetInputFocus = 42, exact 12;
    GetInputFocus = 43, exact 4;
    QueryKeymap = 44, exact 4;
    OpenFont = 45, at_least 12;
    CloseFont = 46, exact 8;
    QueryFont = 47, exact 8;
    QueryTextExtents = 48, at_least 8;
    ListFonts = 49, at_least 8;
    ListFontsWithInfo = 50, at_least 8;
    SetFontPath = 51, at_least 8;
    GetFontPath = 52, exact 4;
    CreatePixmap = 53, exact 16;
    FreePixmap = 54, exact 8;
    CreateGC = 55, at_least 16;
    ChangeGC = 56, at_least 12;
    CopyGC = 57, exact 16;
    SetDashes = 58, at_least 12;
    SetClipRectangles = 59, at_least 12;
    FreeGC = 60, exact 8;
    ClearArea = 61, exact 16;
    CopyArea = 62, exact 28;
    CopyPlane = 63, exact 32;
    PolyPoint = 64, at_least 12;
    PolyLine = 65, at_least 12;
    PolySegment = 66, at_least 12;
    PolyRectangle = 67, at_least 12;
    PolyArc = 68, at_least 12;
    FillPoly = 69, at_least 16;
    PolyFillRectangle = 70, at_least 12;
    PolyFillArc = 71, at_least 12;
    PutImage = 72, at_least 24;
    GetImage = 73, exact 20;
    PolyText8 = 74, at_least 16;
    PolyText16 = 75, at_least 16;
    ImageText8 = 76, at_least 16;
    ImageText16 = 77, at_least 16;
    CreateColormap = 78, exact 16;
    FreeColormap = 79, exact 8;
    CopyColormapAndFree = 80, exact 12;
    InstallColormap = 81, exact 8;
    UninstallColormap = 82, exact 8;
    ListInstalledColormaps = 83, exact 8;
    AllocColor = 84, exact 16;
    AllocNamedColor = 85, at_least 12;
    AllocColorCells = 86, exact 12;
    AllocColorPlanes = 87, exact 16;
    FreeColors = 88, at_least 12;
    StoreColors = 89, at_least 8;
    StoreNamedColor = 90, at_least 16;
    QueryColors = 91, at_least 8;
    LookupColor = 92, at_least 12;
    CreateCursor = 93, exact 32;
    CreateGlyphCursor = 94, exact 32;
    FreeCursor = 95, exact 8;
    RecolorCursor = 96, exact 20;
    QueryBestSize = 97, exact 12;
    QueryExtension = 98, at_least 8;
    ListExtensions = 99, exact 4;
    ChangeKeyboardMapping = 100, at_least 8;
    GetKeyboardMapping = 101, exact 8;
    ChangeKeyboardControl = 102, at_least 8;
    GetKeyboardControl = 103, exact 4;
    Bell = 104, exact 4;
    ChangePointerControl = 105, exact 12;
    GetPointerControl = 106, exact 4;
    SetScreenSaver = 107, exact 12;
    GetScreenSaver = 108, exact 4;
    ChangeHosts = 109, at_least 8;
    ListHosts = 110, exact 4;
    SetAccessControl = 111, exact 4;
    SetCloseDownMode = 112, exact 4;
    KillClient = 113, exact 8;
    RotateProperties = 114, at_least 12;
    ForceScreenSaver = 115, exact 4;
    SetPointerMapping = 116, at_least 4;
    GetPointerMapping = 117, exact 4;
    SetModifierMapping = 118, at_least 4;
    GetModifierMapping = 119, exact 4;
    NoOperation = 127, at_least 4;
}

impl std::fmt::Display for RequestOpcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request header (common to all requests)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHeader {
    pub opcode: u8,
    pub detail: u8, // Request-specific detail byte
    pub length: u16, // Length in 4-byte units
}

impl RequestHeader {
    /// Get total request size in bytes
    pub fn size(&self) -> usize {
        (self.length as usize) * 4
    }

    /// Bytes following the header
    pub fn body_len(&self) -> usize {
        self.size().saturating_sub(4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_table() {
        assert_eq!(RequestOpcode::from_u8(1), Some(RequestOpcode::CreateWindow));
        assert_eq!(RequestOpcode::from_u8(127), Some(RequestOpcode::NoOperation));
        assert_eq!(RequestOpcode::from_u8(120), None);
        assert_eq!(RequestOpcode::from_u8(0), None);
        assert_eq!(RequestOpcode::GetProperty.as_str(), "GetProperty");
    }

    #[test]
    fn test_length_rules() {
        assert!(RequestOpcode::GetGeometry.length_rule().accepts(8));
        assert!(!RequestOpcode::GetGeometry.length_rule().accepts(12));
        assert!(RequestOpcode::CreateWindow.length_rule().accepts(40));
        assert!(!RequestOpcode::CreateWindow.length_rule().accepts(28));
    }
}
