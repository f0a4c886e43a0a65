//! X11 protocol events
//!
//! Events are sent from the server to clients to notify them of state changes,
//! user input, and other interesting occurrences. Every event is 32 bytes on
//! the wire. The sequence number belongs to the receiving client, so it is
//! only supplied at encode time.

use super::codec::WireWriter;
use super::types::*;

/// Event type codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EventType {
    KeyPress = 2,
    KeyRelease = 3,
    ButtonPress = 4,
    ButtonRelease = 5,
    MotionNotify = 6,
    EnterNotify = 7,
    LeaveNotify = 8,
    FocusIn = 9,
    FocusOut = 10,
    KeymapNotify = 11,
    Expose = 12,
    GraphicsExposure = 13,
    NoExposure = 14,
    VisibilityNotify = 15,
    CreateNotify = 16,
    DestroyNotify = 17,
    UnmapNotify = 18,
    MapNotify = 19,
    MapRequest = 20,
    ReparentNotify = 21,
    ConfigureNotify = 22,
    ConfigureRequest = 23,
    GravityNotify = 24,
    ResizeRequest = 25,
    CirculateNotify = 26,
    CirculateRequest = 27,
    PropertyNotify = 28,
    SelectionClear = 29,
    SelectionRequest = 30,
    SelectionNotify = 31,
    ColormapNotify = 32,
    ClientMessage = 33,
    MappingNotify = 34,
}

/// Bit set in the type byte of events delivered through SendEvent
pub const SEND_EVENT_FLAG: u8 = 0x80;

/// Server-generated events plus events forwarded verbatim by SendEvent
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    KeyPress(KeyPressEvent),
    KeyRelease(KeyReleaseEvent),
    ButtonPress(ButtonPressEvent),
    ButtonRelease(ButtonReleaseEvent),
    MotionNotify(MotionNotifyEvent),
    EnterNotify(EnterNotifyEvent),
    LeaveNotify(LeaveNotifyEvent),
    FocusIn(FocusInEvent),
    FocusOut(FocusOutEvent),
    KeymapNotify(KeymapNotifyEvent),
    Expose(ExposeEvent),
    GraphicsExposure(GraphicsExposureEvent),
    NoExposure(NoExposureEvent),
    CreateNotify(CreateNotifyEvent),
    DestroyNotify(DestroyNotifyEvent),
    UnmapNotify(UnmapNotifyEvent),
    MapNotify(MapNotifyEvent),
    MapRequest(MapRequestEvent),
    ReparentNotify(ReparentNotifyEvent),
    ConfigureNotify(ConfigureNotifyEvent),
    ConfigureRequest(ConfigureRequestEvent),
    ResizeRequest(ResizeRequestEvent),
    CirculateNotify(CirculateNotifyEvent),
    CirculateRequest(CirculateRequestEvent),
    PropertyNotify(PropertyNotifyEvent),
    SelectionClear(SelectionClearEvent),
    SelectionRequest(SelectionRequestEvent),
    SelectionNotify(SelectionNotifyEvent),
    ColormapNotify(ColormapNotifyEvent),
    MappingNotify(MappingNotifyEvent),
    /// Raw event body supplied by a SendEvent request
    Sent([u8; 32]),
}

impl Event {
    /// Get the event type code
    pub fn code(&self) -> u8 {
        match self {
            Event::KeyPress(_) => EventType::KeyPress as u8,
            Event::KeyRelease(_) => EventType::KeyRelease as u8,
            Event::ButtonPress(_) => EventType::ButtonPress as u8,
            Event::ButtonRelease(_) => EventType::ButtonRelease as u8,
            Event::MotionNotify(_) => EventType::MotionNotify as u8,
            Event::EnterNotify(_) => EventType::EnterNotify as u8,
            Event::LeaveNotify(_) => EventType::LeaveNotify as u8,
            Event::FocusIn(_) => EventType::FocusIn as u8,
            Event::FocusOut(_) => EventType::FocusOut as u8,
            Event::KeymapNotify(_) => EventType::KeymapNotify as u8,
            Event::Expose(_) => EventType::Expose as u8,
            Event::GraphicsExposure(_) => EventType::GraphicsExposure as u8,
            Event::NoExposure(_) => EventType::NoExposure as u8,
            Event::CreateNotify(_) => EventType::CreateNotify as u8,
            Event::DestroyNotify(_) => EventType::DestroyNotify as u8,
            Event::UnmapNotify(_) => EventType::UnmapNotify as u8,
            Event::MapNotify(_) => EventType::MapNotify as u8,
            Event::MapRequest(_) => EventType::MapRequest as u8,
            Event::ReparentNotify(_) => EventType::ReparentNotify as u8,
            Event::ConfigureNotify(_) => EventType::ConfigureNotify as u8,
            Event::ConfigureRequest(_) => EventType::ConfigureRequest as u8,
            Event::ResizeRequest(_) => EventType::ResizeRequest as u8,
            Event::CirculateNotify(_) => EventType::CirculateNotify as u8,
            Event::CirculateRequest(_) => EventType::CirculateRequest as u8,
            Event::PropertyNotify(_) => EventType::PropertyNotify as u8,
            Event::SelectionClear(_) => EventType::SelectionClear as u8,
            Event::SelectionRequest(_) => EventType::SelectionRequest as u8,
            Event::SelectionNotify(_) => EventType::SelectionNotify as u8,
            Event::ColormapNotify(_) => EventType::ColormapNotify as u8,
            Event::MappingNotify(_) => EventType::MappingNotify as u8,
            Event::Sent(raw) => raw[0] & !SEND_EVENT_FLAG,
        }
    }

    /// Encode event to wire format (32 bytes)
    pub fn encode(&self, order: ByteOrder, sequence: u16) -> [u8; 32] {
        let mut w = WireWriter::with_capacity(order, 32);
        match self {
            Event::KeyPress(e) => e.encode(&mut w, sequence),
            Event::KeyRelease(e) => e.encode(&mut w, sequence),
            Event::ButtonPress(e) => e.encode(&mut w, sequence),
            Event::ButtonRelease(e) => e.encode(&mut w, sequence),
            Event::MotionNotify(e) => e.encode(&mut w, sequence),
            Event::EnterNotify(e) => e.encode(&mut w, sequence),
            Event::LeaveNotify(e) => e.encode(&mut w, sequence),
            Event::FocusIn(e) => e.encode(&mut w, sequence),
            Event::FocusOut(e) => e.encode(&mut w, sequence),
            Event::KeymapNotify(e) => e.encode(&mut w),
            Event::Expose(e) => e.encode(&mut w, sequence),
            Event::GraphicsExposure(e) => e.encode(&mut w, sequence),
            Event::NoExposure(e) => e.encode(&mut w, sequence),
            Event::CreateNotify(e) => e.encode(&mut w, sequence),
            Event::DestroyNotify(e) => e.encode(&mut w, sequence),
            Event::UnmapNotify(e) => e.encode(&mut w, sequence),
            Event::MapNotify(e) => e.encode(&mut w, sequence),
            Event::MapRequest(e) => e.encode(&mut w, sequence),
            Event::ReparentNotify(e) => e.encode(&mut w, sequence),
            Event::ConfigureNotify(e) => e.encode(&mut w, sequence),
            Event::ConfigureRequest(e) => e.encode(&mut w, sequence),
            Event::ResizeRequest(e) => e.encode(&mut w, sequence),
            Event::CirculateNotify(e) => e.encode(&mut w, sequence),
            Event::CirculateRequest(e) => e.encode(&mut w, sequence),
            Event::PropertyNotify(e) => e.encode(&mut w, sequence),
            Event::SelectionClear(e) => e.encode(&mut w, sequence),
            Event::SelectionRequest(e) => e.encode(&mut w, sequence),
            Event::SelectionNotify(e) => e.encode(&mut w, sequence),
            Event::ColormapNotify(e) => e.encode(&mut w, sequence),
            Event::MappingNotify(e) => e.encode(&mut w, sequence),
            Event::Sent(raw) => {
                // The body stays in the sender's byte order; only the
                // sequence number is the receiver's.
                w.write_u8(raw[0] | SEND_EVENT_FLAG);
                w.write_u8(raw[1]);
                w.write_u16(sequence);
                w.write_bytes(&raw[4..]);
            }
        }
        w.into_event()
    }
}

// Key, button and motion events share a common structure
macro_rules! define_key_button_event {
    ($name:ident, $code:expr) => {
        #[derive(Debug, Clone, PartialEq)]
        pub struct $name {
            pub detail: u8, // Keycode, button or motion hint
            pub time: Timestamp,
            pub root: ResourceId,
            pub event: ResourceId,
            pub child: ResourceId,
            pub root_x: i16,
            pub root_y: i16,
            pub event_x: i16,
            pub event_y: i16,
            pub state: u16, // Modifier mask
            pub same_screen: bool,
        }

        impl $name {
            pub fn encode(&self, w: &mut WireWriter, sequence: u16) {
                w.write_u8($code);
                w.write_u8(self.detail);
                w.write_u16(sequence);
                w.write_u32(self.time);
                w.write_u32(self.root);
                w.write_u32(self.event);
                w.write_u32(self.child);
                w.write_i16(self.root_x);
                w.write_i16(self.root_y);
                w.write_i16(self.event_x);
                w.write_i16(self.event_y);
                w.write_u16(self.state);
                w.write_bool(self.same_screen);
            }
        }
    };
}

define_key_button_event!(KeyPressEvent, 2);
define_key_button_event!(KeyReleaseEvent, 3);
define_key_button_event!(ButtonPressEvent, 4);
define_key_button_event!(ButtonReleaseEvent, 5);
define_key_button_event!(MotionNotifyEvent, 6);

macro_rules! define_enter_leave_event {
    ($name:ident, $code:expr) => {
        #[derive(Debug, Clone, PartialEq)]
        pub struct $name {
            pub detail: u8,
            pub time: Timestamp,
            pub root: ResourceId,
            pub event: ResourceId,
            pub child: ResourceId,
            pub root_x: i16,
            pub root_y: i16,
            pub event_x: i16,
            pub event_y: i16,
            pub state: u16,
            pub mode: u8,
            pub same_screen_focus: u8,
        }

        impl $name {
            pub fn encode(&self, w: &mut WireWriter, sequence: u16) {
                w.write_u8($code);
                w.write_u8(self.detail);
                w.write_u16(sequence);
                w.write_u32(self.time);
                w.write_u32(self.root);
                w.write_u32(self.event);
                w.write_u32(self.child);
                w.write_i16(self.root_x);
                w.write_i16(self.root_y);
                w.write_i16(self.event_x);
                w.write_i16(self.event_y);
                w.write_u16(self.state);
                w.write_u8(self.mode);
                w.write_u8(self.same_screen_focus);
            }
        }
    };
}

define_enter_leave_event!(EnterNotifyEvent, 7);
define_enter_leave_event!(LeaveNotifyEvent, 8);

macro_rules! define_focus_event {
    ($name:ident, $code:expr) => {
        #[derive(Debug, Clone, PartialEq)]
        pub struct $name {
            pub detail: u8,
            pub event: ResourceId,
            pub mode: u8,
        }

        impl $name {
            pub fn encode(&self, w: &mut WireWriter, sequence: u16) {
                w.write_u8($code);
                w.write_u8(self.detail);
                w.write_u16(sequence);
                w.write_u32(self.event);
                w.write_u8(self.mode);
            }
        }
    };
}

define_focus_event!(FocusInEvent, 9);
define_focus_event!(FocusOutEvent, 10);

/// Key state for keycodes 8..255; carries no sequence number
#[derive(Debug, Clone, PartialEq)]
pub struct KeymapNotifyEvent {
    pub keys: [u8; 31],
}

impl KeymapNotifyEvent {
    pub fn encode(&self, w: &mut WireWriter) {
        w.write_u8(EventType::KeymapNotify as u8);
        w.write_bytes(&self.keys);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExposeEvent {
    pub window: ResourceId,
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
    pub count: u16, // Number of following expose events
}

impl ExposeEvent {
    pub fn encode(&self, w: &mut WireWriter, sequence: u16) {
        w.write_u8(EventType::Expose as u8);
        w.write_pad(1);
        w.write_u16(sequence);
        w.write_u32(self.window);
        w.write_u16(self.x);
        w.write_u16(self.y);
        w.write_u16(self.width);
        w.write_u16(self.height);
        w.write_u16(self.count);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphicsExposureEvent {
    pub drawable: ResourceId,
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
    pub minor_opcode: u16,
    pub count: u16,
    pub major_opcode: u8,
}

impl GraphicsExposureEvent {
    pub fn encode(&self, w: &mut WireWriter, sequence: u16) {
        w.write_u8(EventType::GraphicsExposure as u8);
        w.write_pad(1);
        w.write_u16(sequence);
        w.write_u32(self.drawable);
        w.write_u16(self.x);
        w.write_u16(self.y);
        w.write_u16(self.width);
        w.write_u16(self.height);
        w.write_u16(self.minor_opcode);
        w.write_u16(self.count);
        w.write_u8(self.major_opcode);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NoExposureEvent {
    pub drawable: ResourceId,
    pub minor_opcode: u16,
    pub major_opcode: u8,
}

impl NoExposureEvent {
    pub fn encode(&self, w: &mut WireWriter, sequence: u16) {
        w.write_u8(EventType::NoExposure as u8);
        w.write_pad(1);
        w.write_u16(sequence);
        w.write_u32(self.drawable);
        w.write_u16(self.minor_opcode);
        w.write_u8(self.major_opcode);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateNotifyEvent {
    pub parent: ResourceId,
    pub window: ResourceId,
    pub x: i16,
    pub y: i16,
    pub width: u16,
    pub height: u16,
    pub border_width: u16,
    pub override_redirect: bool,
}

impl CreateNotifyEvent {
    pub fn encode(&self, w: &mut WireWriter, sequence: u16) {
        w.write_u8(EventType::CreateNotify as u8);
        w.write_pad(1);
        w.write_u16(sequence);
        w.write_u32(self.parent);
        w.write_u32(self.window);
        w.write_i16(self.x);
        w.write_i16(self.y);
        w.write_u16(self.width);
        w.write_u16(self.height);
        w.write_u16(self.border_width);
        w.write_bool(self.override_redirect);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DestroyNotifyEvent {
    pub event: ResourceId,
    pub window: ResourceId,
}

impl DestroyNotifyEvent {
    pub fn encode(&self, w: &mut WireWriter, sequence: u16) {
        w.write_u8(EventType::DestroyNotify as u8);
        w.write_pad(1);
        w.write_u16(sequence);
        w.write_u32(self.event);
        w.write_u32(self.window);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnmapNotifyEvent {
    pub event: ResourceId,
    pub window: ResourceId,
    pub from_configure: bool,
}

impl UnmapNotifyEvent {
    pub fn encode(&self, w: &mut WireWriter, sequence: u16) {
        w.write_u8(EventType::UnmapNotify as u8);
        w.write_pad(1);
        w.write_u16(sequence);
        w.write_u32(self.event);
        w.write_u32(self.window);
        w.write_bool(self.from_configure);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapNotifyEvent {
    pub event: ResourceId,
    pub window: ResourceId,
    pub override_redirect: bool,
}

impl MapNotifyEvent {
    pub fn encode(&self, w: &mut WireWriter, sequence: u16) {
        w.write_u8(EventType::MapNotify as u8);
        w.write_pad(1);
        w.write_u16(sequence);
        w.write_u32(self.event);
        w.write_u32(self.window);
        w.write_bool(self.override_redirect);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapRequestEvent {
    pub parent: ResourceId,
    pub window: ResourceId,
}

impl MapRequestEvent {
    pub fn encode(&self, w: &mut WireWriter, sequence: u16) {
        w.write_u8(EventType::MapRequest as u8);
        w.write_pad(1);
        w.write_u16(sequence);
        w.write_u32(self.parent);
        w.write_u32(self.window);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReparentNotifyEvent {
    pub event: ResourceId,
    pub window: ResourceId,
    pub parent: ResourceId,
    pub x: i16,
    pub y: i16,
    pub override_redirect: bool,
}

impl ReparentNotifyEvent {
    pub fn encode(&self, w: &mut WireWriter, sequence: u16) {
        w.write_u8(EventType::ReparentNotify as u8);
        w.write_pad(1);
        w.write_u16(sequence);
        w.write_u32(self.event);
        w.write_u32(self.window);
        w.write_u32(self.parent);
        w.write_i16(self.x);
        w.write_i16(self.y);
        w.write_bool(self.override_redirect);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigureNotifyEvent {
    pub event: ResourceId,
    pub window: ResourceId,
    pub above_sibling: ResourceId,
    pub x: i16,
    pub y: i16,
    pub width: u16,
    pub height: u16,
    pub border_width: u16,
    pub override_redirect: bool,
}

impl ConfigureNotifyEvent {
    pub fn encode(&self, w: &mut WireWriter, sequence: u16) {
        w.write_u8(EventType::ConfigureNotify as u8);
        w.write_pad(1);
        w.write_u16(sequence);
        w.write_u32(self.event);
        w.write_u32(self.window);
        w.write_u32(self.above_sibling);
        w.write_i16(self.x);
        w.write_i16(self.y);
        w.write_u16(self.width);
        w.write_u16(self.height);
        w.write_u16(self.border_width);
        w.write_bool(self.override_redirect);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigureRequestEvent {
    pub stack_mode: u8,
    pub parent: ResourceId,
    pub window: ResourceId,
    pub sibling: ResourceId,
    pub x: i16,
    pub y: i16,
    pub width: u16,
    pub height: u16,
    pub border_width: u16,
    pub value_mask: u16,
}

impl ConfigureRequestEvent {
    pub fn encode(&self, w: &mut WireWriter, sequence: u16) {
        w.write_u8(EventType::ConfigureRequest as u8);
        w.write_u8(self.stack_mode);
        w.write_u16(sequence);
        w.write_u32(self.parent);
        w.write_u32(self.window);
        w.write_u32(self.sibling);
        w.write_i16(self.x);
        w.write_i16(self.y);
        w.write_u16(self.width);
        w.write_u16(self.height);
        w.write_u16(self.border_width);
        w.write_u16(self.value_mask);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResizeRequestEvent {
    pub window: ResourceId,
    pub width: u16,
    pub height: u16,
}

impl ResizeRequestEvent {
    pub fn encode(&self, w: &mut WireWriter, sequence: u16) {
        w.write_u8(EventType::ResizeRequest as u8);
        w.write_pad(1);
        w.write_u16(sequence);
        w.write_u32(self.window);
        w.write_u16(self.width);
        w.write_u16(self.height);
    }
}

/// Place values of circulate events
pub mod circulate_place {
    pub const ON_TOP: u8 = 0;
    pub const ON_BOTTOM: u8 = 1;
}

#[derive(Debug, Clone, PartialEq)]
pub struct CirculateNotifyEvent {
    pub event: ResourceId,
    pub window: ResourceId,
    pub place: u8,
}

impl CirculateNotifyEvent {
    pub fn encode(&self, w: &mut WireWriter, sequence: u16) {
        w.write_u8(EventType::CirculateNotify as u8);
        w.write_pad(1);
        w.write_u16(sequence);
        w.write_u32(self.event);
        w.write_u32(self.window);
        w.write_pad(4);
        w.write_u8(self.place);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CirculateRequestEvent {
    pub parent: ResourceId,
    pub window: ResourceId,
    pub place: u8,
}

impl CirculateRequestEvent {
    pub fn encode(&self, w: &mut WireWriter, sequence: u16) {
        w.write_u8(EventType::CirculateRequest as u8);
        w.write_pad(1);
        w.write_u16(sequence);
        w.write_u32(self.parent);
        w.write_u32(self.window);
        w.write_pad(4);
        w.write_u8(self.place);
    }
}

/// State values of PropertyNotify
pub mod property_state {
    pub const NEW_VALUE: u8 = 0;
    pub const DELETED: u8 = 1;
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyNotifyEvent {
    pub window: ResourceId,
    pub atom: Atom,
    pub time: Timestamp,
    pub state: u8,
}

impl PropertyNotifyEvent {
    pub fn encode(&self, w: &mut WireWriter, sequence: u16) {
        w.write_u8(EventType::PropertyNotify as u8);
        w.write_pad(1);
        w.write_u16(sequence);
        w.write_u32(self.window);
        w.write_u32(self.atom.get());
        w.write_u32(self.time);
        w.write_u8(self.state);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectionClearEvent {
    pub time: Timestamp,
    pub owner: ResourceId,
    pub selection: Atom,
}

impl SelectionClearEvent {
    pub fn encode(&self, w: &mut WireWriter, sequence: u16) {
        w.write_u8(EventType::SelectionClear as u8);
        w.write_pad(1);
        w.write_u16(sequence);
        w.write_u32(self.time);
        w.write_u32(self.owner);
        w.write_u32(self.selection.get());
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectionRequestEvent {
    pub time: Timestamp,
    pub owner: ResourceId,
    pub requestor: ResourceId,
    pub selection: Atom,
    pub target: Atom,
    pub property: Atom,
}

impl SelectionRequestEvent {
    pub fn encode(&self, w: &mut WireWriter, sequence: u16) {
        w.write_u8(EventType::SelectionRequest as u8);
        w.write_pad(1);
        w.write_u16(sequence);
        w.write_u32(self.time);
        w.write_u32(self.owner);
        w.write_u32(self.requestor);
        w.write_u32(self.selection.get());
        w.write_u32(self.target.get());
        w.write_u32(self.property.get());
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectionNotifyEvent {
    pub time: Timestamp,
    pub requestor: ResourceId,
    pub selection: Atom,
    pub target: Atom,
    pub property: Atom,
}

impl SelectionNotifyEvent {
    pub fn encode(&self, w: &mut WireWriter, sequence: u16) {
        w.write_u8(EventType::SelectionNotify as u8);
        w.write_pad(1);
        w.write_u16(sequence);
        w.write_u32(self.time);
        w.write_u32(self.requestor);
        w.write_u32(self.selection.get());
        w.write_u32(self.target.get());
        w.write_u32(self.property.get());
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColormapNotifyEvent {
    pub window: ResourceId,
    pub colormap: ResourceId,
    pub new: bool,
    pub installed: bool,
}

impl ColormapNotifyEvent {
    pub fn encode(&self, w: &mut WireWriter, sequence: u16) {
        w.write_u8(EventType::ColormapNotify as u8);
        w.write_pad(1);
        w.write_u16(sequence);
        w.write_u32(self.window);
        w.write_u32(self.colormap);
        w.write_bool(self.new);
        w.write_bool(self.installed);
    }
}

/// Request values of MappingNotify
pub mod mapping_request {
    pub const MODIFIER: u8 = 0;
    pub const KEYBOARD: u8 = 1;
    pub const POINTER: u8 = 2;
}

#[derive(Debug, Clone, PartialEq)]
pub struct MappingNotifyEvent {
    pub request: u8,
    pub first_keycode: u8,
    pub count: u8,
}

impl MappingNotifyEvent {
    pub fn encode(&self, w: &mut WireWriter, sequence: u16) {
        w.write_u8(EventType::MappingNotify as u8);
        w.write_pad(1);
        w.write_u16(sequence);
        w.write_u8(self.request);
        w.write_u8(self.first_keycode);
        w.write_u8(self.count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_button_press_layout() {
        let event = Event::ButtonPress(ButtonPressEvent {
            detail: 1,
            time: 0x0102_0304,
            root: 3,
            event: 0x0020_0001,
            child: 0,
            root_x: 15,
            root_y: 25,
            event_x: 5,
            event_y: 5,
            state: 0,
            same_screen: true,
        });
        let bytes = event.encode(ByteOrder::LSBFirst, 9);
        assert_eq!(bytes[0], 4);
        assert_eq!(bytes[1], 1);
        assert_eq!(&bytes[2..4], &[9, 0]);
        assert_eq!(&bytes[4..8], &[4, 3, 2, 1]);
        assert_eq!(&bytes[12..16], &[1, 0, 0x20, 0]);
        assert_eq!(&bytes[20..22], &[15, 0]);
        assert_eq!(bytes[30], 1);
    }

    #[test]
    fn test_configure_notify_big_endian() {
        let event = Event::ConfigureNotify(ConfigureNotifyEvent {
            event: 1,
            window: 2,
            above_sibling: 0,
            x: -1,
            y: 2,
            width: 300,
            height: 200,
            border_width: 1,
            override_redirect: false,
        });
        let bytes = event.encode(ByteOrder::MSBFirst, 0x0102);
        assert_eq!(bytes[0], 22);
        assert_eq!(&bytes[2..4], &[1, 2]);
        assert_eq!(&bytes[16..18], &[0xff, 0xff]);
        assert_eq!(&bytes[20..22], &[0x01, 0x2c]);
    }

    #[test]
    fn test_sent_event_sets_flag_and_sequence() {
        let mut raw = [0u8; 32];
        raw[0] = EventType::ClientMessage as u8;
        raw[1] = 32;
        raw[2] = 0xaa;
        raw[4] = 0x55;
        let event = Event::Sent(raw);
        assert_eq!(event.code(), 33);
        let bytes = event.encode(ByteOrder::LSBFirst, 5);
        assert_eq!(bytes[0], 33 | SEND_EVENT_FLAG);
        assert_eq!(&bytes[2..4], &[5, 0]);
        assert_eq!(bytes[4], 0x55);
    }

    #[test]
    fn test_keymap_notify_has_no_sequence() {
        let mut keys = [0u8; 31];
        keys[0] = 0x80;
        let bytes = Event::KeymapNotify(KeymapNotifyEvent { keys }).encode(ByteOrder::LSBFirst, 7);
        assert_eq!(bytes[0], 11);
        assert_eq!(bytes[1], 0x80);
    }
}
