//! Core X11 protocol types
//!
//! Identifiers, enumerations and mask constants shared by the codec and the
//! server state. They are kept close to the wire representation.

use std::fmt;

/// Resource identifier (windows, pixmaps, graphics contexts, ...).
/// Only the low 29 bits are significant on the wire.
pub type ResourceId = u32;

/// Connected client index. Client `n` owns id block `n`.
pub type ClientId = u32;

/// Server time in milliseconds, wrapping at 32 bits
pub type Timestamp = u32;

/// The `CurrentTime` wire value
pub const CURRENT_TIME: Timestamp = 0;

/// `None` for any resource field
pub const NONE: ResourceId = 0;

/// Atom - interned string identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Atom(pub u32);

impl Atom {
    pub const NONE: Atom = Atom(0);
    pub const PRIMARY: Atom = Atom(1);
    pub const SECONDARY: Atom = Atom(2);
    pub const ARC: Atom = Atom(3);
    pub const ATOM: Atom = Atom(4);
    pub const BITMAP: Atom = Atom(5);
    pub const CARDINAL: Atom = Atom(6);
    pub const COLORMAP: Atom = Atom(7);
    pub const CURSOR: Atom = Atom(8);
    pub const CUT_BUFFER0: Atom = Atom(9);
    pub const CUT_BUFFER1: Atom = Atom(10);
    pub const CUT_BUFFER2: Atom = Atom(11);
    pub const CUT_BUFFER3: Atom = Atom(12);
    pub const CUT_BUFFER4: Atom = Atom(13);
    pub const CUT_BUFFER5: Atom = Atom(14);
    pub const CUT_BUFFER6: Atom = Atom(15);
    pub const CUT_BUFFER7: Atom = Atom(16);
    pub const DRAWABLE: Atom = Atom(17);
    pub const FONT: Atom = Atom(18);
    pub const INTEGER: Atom = Atom(19);
    pub const PIXMAP: Atom = Atom(20);
    pub const POINT: Atom = Atom(21);
    pub const RECTANGLE: Atom = Atom(22);
    pub const RESOURCE_MANAGER: Atom = Atom(23);
    pub const RGB_COLOR_MAP: Atom = Atom(24);
    pub const RGB_BEST_MAP: Atom = Atom(25);
    pub const RGB_BLUE_MAP: Atom = Atom(26);
    pub const RGB_DEFAULT_MAP: Atom = Atom(27);
    pub const RGB_GRAY_MAP: Atom = Atom(28);
    pub const RGB_GREEN_MAP: Atom = Atom(29);
    pub const RGB_RED_MAP: Atom = Atom(30);
    pub const STRING: Atom = Atom(31);
    pub const VISUALID: Atom = Atom(32);
    pub const WINDOW: Atom = Atom(33);
    pub const WM_COMMAND: Atom = Atom(34);
    pub const WM_HINTS: Atom = Atom(35);
    pub const WM_CLIENT_MACHINE: Atom = Atom(36);
    pub const WM_ICON_NAME: Atom = Atom(37);
    pub const WM_ICON_SIZE: Atom = Atom(38);
    pub const WM_NAME: Atom = Atom(39);
    pub const WM_NORMAL_HINTS: Atom = Atom(40);
    pub const WM_SIZE_HINTS: Atom = Atom(41);
    pub const WM_ZOOM_HINTS: Atom = Atom(42);
    pub const MIN_SPACE: Atom = Atom(43);
    pub const NORM_SPACE: Atom = Atom(44);
    pub const MAX_SPACE: Atom = Atom(45);
    pub const END_SPACE: Atom = Atom(46);
    pub const SUPERSCRIPT_X: Atom = Atom(47);
    pub const SUPERSCRIPT_Y: Atom = Atom(48);
    pub const SUBSCRIPT_X: Atom = Atom(49);
    pub const SUBSCRIPT_Y: Atom = Atom(50);
    pub const UNDERLINE_POSITION: Atom = Atom(51);
    pub const UNDERLINE_THICKNESS: Atom = Atom(52);
    pub const STRIKEOUT_ASCENT: Atom = Atom(53);
    pub const STRIKEOUT_DESCENT: Atom = Atom(54);
    pub const ITALIC_ANGLE: Atom = Atom(55);
    pub const X_HEIGHT: Atom = Atom(56);
    pub const QUAD_WIDTH: Atom = Atom(57);
    pub const WEIGHT: Atom = Atom(58);
    pub const POINT_SIZE: Atom = Atom(59);
    pub const RESOLUTION: Atom = Atom(60);
    pub const COPYRIGHT: Atom = Atom(61);
    pub const NOTICE: Atom = Atom(62);
    pub const FONT_NAME: Atom = Atom(63);
    pub const FAMILY_NAME: Atom = Atom(64);
    pub const FULL_NAME: Atom = Atom(65);
    pub const CAP_HEIGHT: Atom = Atom(66);
    pub const WM_CLASS: Atom = Atom(67);
    pub const WM_TRANSIENT_FOR: Atom = Atom(68);

    /// Highest predefined atom; interned atoms start right after it
    pub const LAST_PREDEFINED: Atom = Atom(68);

    pub fn new(id: u32) -> Self {
        Atom(id)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "atom {}", self.0)
    }
}

/// Axis-aligned rectangle in absolute screen coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Rect {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn contains(&self, px: i32, py: i32) -> bool {
        px >= self.x && px < self.right() && py >= self.y && py < self.bottom()
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// Shrink every edge by `n` pixels
    pub fn inset(&self, n: i32) -> Rect {
        Rect::new(
            self.x + n,
            self.y + n,
            (self.width - 2 * n).max(0),
            (self.height - 2 * n).max(0),
        )
    }

    pub fn translate(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }
}

/// Point (x, y coordinate)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub x: i16,
    pub y: i16,
}

impl Point {
    pub fn new(x: i16, y: i16) -> Self {
        Point { x, y }
    }
}

/// Rectangle as carried by drawing requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rectangle {
    pub x: i16,
    pub y: i16,
    pub width: u16,
    pub height: u16,
}

impl Rectangle {
    pub fn new(x: i16, y: i16, width: u16, height: u16) -> Self {
        Rectangle {
            x,
            y,
            width,
            height,
        }
    }
}

/// Segment (for drawing line segments)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub x1: i16,
    pub y1: i16,
    pub x2: i16,
    pub y2: i16,
}

/// Arc (for drawing arcs and ellipses)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arc {
    pub x: i16,
    pub y: i16,
    pub width: u16,
    pub height: u16,
    pub angle1: i16, // Start angle in 1/64 degrees
    pub angle2: i16, // Arc angle in 1/64 degrees
}

/// Window class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowClass {
    CopyFromParent = 0,
    InputOutput = 1,
    InputOnly = 2,
}

impl WindowClass {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(WindowClass::CopyFromParent),
            1 => Some(WindowClass::InputOutput),
            2 => Some(WindowClass::InputOnly),
            _ => None,
        }
    }
}

/// Map state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapState {
    Unmapped = 0,
    Unviewable = 1,
    Viewable = 2,
}

/// Stack mode for ConfigureWindow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackMode {
    Above = 0,
    Below = 1,
    TopIf = 2,
    BottomIf = 3,
    Opposite = 4,
}

impl StackMode {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(StackMode::Above),
            1 => Some(StackMode::Below),
            2 => Some(StackMode::TopIf),
            3 => Some(StackMode::BottomIf),
            4 => Some(StackMode::Opposite),
            _ => None,
        }
    }
}

/// What happens to a client's resources when its connection closes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CloseDownMode {
    #[default]
    Destroy = 0,
    RetainPermanent = 1,
    RetainTemporary = 2,
}

impl CloseDownMode {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(CloseDownMode::Destroy),
            1 => Some(CloseDownMode::RetainPermanent),
            2 => Some(CloseDownMode::RetainTemporary),
            _ => None,
        }
    }
}

/// Reply status of GrabPointer / GrabKeyboard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrabStatus {
    Success = 0,
    AlreadyGrabbed = 1,
    InvalidTime = 2,
    NotViewable = 3,
    Frozen = 4,
}

/// Event masks
pub mod event_mask {
    pub const NO_EVENT: u32 = 0;
    pub const KEY_PRESS: u32 = 1 << 0;
    pub const KEY_RELEASE: u32 = 1 << 1;
    pub const BUTTON_PRESS: u32 = 1 << 2;
    pub const BUTTON_RELEASE: u32 = 1 << 3;
    pub const ENTER_WINDOW: u32 = 1 << 4;
    pub const LEAVE_WINDOW: u32 = 1 << 5;
    pub const POINTER_MOTION: u32 = 1 << 6;
    pub const POINTER_MOTION_HINT: u32 = 1 << 7;
    pub const BUTTON1_MOTION: u32 = 1 << 8;
    pub const BUTTON2_MOTION: u32 = 1 << 9;
    pub const BUTTON3_MOTION: u32 = 1 << 10;
    pub const BUTTON4_MOTION: u32 = 1 << 11;
    pub const BUTTON5_MOTION: u32 = 1 << 12;
    pub const BUTTON_MOTION: u32 = 1 << 13;
    pub const KEYMAP_STATE: u32 = 1 << 14;
    pub const EXPOSURE: u32 = 1 << 15;
    pub const VISIBILITY_CHANGE: u32 = 1 << 16;
    pub const STRUCTURE_NOTIFY: u32 = 1 << 17;
    pub const RESIZE_REDIRECT: u32 = 1 << 18;
    pub const SUBSTRUCTURE_NOTIFY: u32 = 1 << 19;
    pub const SUBSTRUCTURE_REDIRECT: u32 = 1 << 20;
    pub const FOCUS_CHANGE: u32 = 1 << 21;
    pub const PROPERTY_CHANGE: u32 = 1 << 22;
    pub const COLORMAP_CHANGE: u32 = 1 << 23;
    pub const OWNER_GRAB_BUTTON: u32 = 1 << 24;

    /// Bits a client may legally select
    pub const ALL: u32 = (1 << 25) - 1;

    /// Events that can be selected only by one client at a time
    pub const EXCLUSIVE: u32 = SUBSTRUCTURE_REDIRECT | RESIZE_REDIRECT | BUTTON_PRESS;

    /// Events the pointer grab can ask for
    pub const POINTER_EVENTS: u32 = BUTTON_PRESS
        | BUTTON_RELEASE
        | ENTER_WINDOW
        | LEAVE_WINDOW
        | POINTER_MOTION
        | POINTER_MOTION_HINT
        | BUTTON1_MOTION
        | BUTTON2_MOTION
        | BUTTON3_MOTION
        | BUTTON4_MOTION
        | BUTTON5_MOTION
        | BUTTON_MOTION
        | KEYMAP_STATE;

    /// Events allowed in a do-not-propagate mask
    pub const DEVICE_EVENTS: u32 = KEY_PRESS
        | KEY_RELEASE
        | BUTTON_PRESS
        | BUTTON_RELEASE
        | POINTER_MOTION
        | BUTTON1_MOTION
        | BUTTON2_MOTION
        | BUTTON3_MOTION
        | BUTTON4_MOTION
        | BUTTON5_MOTION
        | BUTTON_MOTION;
}

/// Keyboard/pointer modifier masks
pub mod modifier_mask {
    pub const SHIFT: u16 = 1 << 0;
    pub const LOCK: u16 = 1 << 1;
    pub const CONTROL: u16 = 1 << 2;
    pub const MOD1: u16 = 1 << 3;
    pub const MOD2: u16 = 1 << 4;
    pub const MOD3: u16 = 1 << 5;
    pub const MOD4: u16 = 1 << 6;
    pub const MOD5: u16 = 1 << 7;
    pub const BUTTON1: u16 = 1 << 8;
    pub const BUTTON2: u16 = 1 << 9;
    pub const BUTTON3: u16 = 1 << 10;
    pub const BUTTON4: u16 = 1 << 11;
    pub const BUTTON5: u16 = 1 << 12;
    pub const ANY_MODIFIER: u16 = 1 << 15;

    /// All key modifier bits (no button bits)
    pub const KEYS: u16 = 0xff;
    /// All button state bits
    pub const BUTTONS: u16 = 0x1f00;
}

/// Detail field of EnterNotify/LeaveNotify and FocusIn/FocusOut
pub mod notify_detail {
    pub const ANCESTOR: u8 = 0;
    pub const VIRTUAL: u8 = 1;
    pub const INFERIOR: u8 = 2;
    pub const NONLINEAR: u8 = 3;
    pub const NONLINEAR_VIRTUAL: u8 = 4;
    pub const POINTER: u8 = 5;
    pub const POINTER_ROOT: u8 = 6;
    pub const NONE: u8 = 7;
}

/// Mode field of crossing and focus events
pub mod notify_mode {
    pub const NORMAL: u8 = 0;
    pub const GRAB: u8 = 1;
    pub const UNGRAB: u8 = 2;
    pub const WHILE_GRABBED: u8 = 3;
}

/// Image format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Bitmap = 0,
    XYPixmap = 1,
    ZPixmap = 2,
}

impl ImageFormat {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(ImageFormat::Bitmap),
            1 => Some(ImageFormat::XYPixmap),
            2 => Some(ImageFormat::ZPixmap),
            _ => None,
        }
    }
}

/// Byte order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    LSBFirst = 0,
    MSBFirst = 1,
}

impl ByteOrder {
    /// Decode the first byte of the connection setup
    pub fn from_marker(marker: u8) -> Option<Self> {
        match marker {
            0x6c => Some(ByteOrder::LSBFirst),
            0x42 => Some(ByteOrder::MSBFirst),
            _ => None,
        }
    }

    pub fn marker(&self) -> u8 {
        match self {
            ByteOrder::LSBFirst => 0x6c,
            ByteOrder::MSBFirst => 0x42,
        }
    }
}
