//! Input routing: pointer and keyboard events, focus and grabs
//!
//! The backend reports raw device input; this module turns it into core
//! events. Pointer events start at the window under the pointer, keyboard
//! events at the focus window, and both propagate up the tree until a
//! client selects them or a do-not-propagate mask stops them. An active grab
//! redirects everything to the grabbing client.
//!
//! Enter/Leave and FocusIn/FocusOut share one ancestor-chain walk between
//! the old and new window.
//!
//! Synchronous grab modes are recorded but never freeze event processing.

use super::Server;
use crate::backend::BackendEvent;
use crate::protocol::*;
use crate::resources::window::PassiveGrab;

/// Keyboard focus target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    None,
    PointerRoot,
    Window(ResourceId),
}

impl Focus {
    /// Wire value (None = 0, PointerRoot = 1)
    pub fn id(&self) -> ResourceId {
        match self {
            Focus::None => 0,
            Focus::PointerRoot => 1,
            Focus::Window(w) => *w,
        }
    }

    pub fn from_id(id: ResourceId) -> Self {
        match id {
            0 => Focus::None,
            1 => Focus::PointerRoot,
            w => Focus::Window(w),
        }
    }
}

/// Where focus goes when the focus window becomes unviewable
pub mod revert_to {
    pub const NONE: u8 = 0;
    pub const POINTER_ROOT: u8 = 1;
    pub const PARENT: u8 = 2;
}

/// How a grab was activated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrabKind {
    /// GrabPointer / GrabKeyboard
    Active,
    /// GrabButton / GrabKey triggered by input
    Passive,
    /// Implicit grab of a button press
    Automatic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grab {
    pub client: ClientId,
    pub window: ResourceId,
    pub owner_events: bool,
    pub event_mask: u32,
    pub pointer_sync: bool,
    pub keyboard_sync: bool,
    pub confine_to: ResourceId,
    pub cursor: ResourceId,
    pub kind: GrabKind,
    pub time: Timestamp,
    /// Button or key that activated a passive grab
    pub detail: u8,
}

impl Grab {
    fn from_passive(window: ResourceId, p: &PassiveGrab, detail: u8, time: Timestamp) -> Self {
        Grab {
            client: p.client,
            window,
            owner_events: p.owner_events,
            event_mask: p.event_mask,
            pointer_sync: p.pointer_sync,
            keyboard_sync: p.keyboard_sync,
            confine_to: p.confine_to,
            cursor: p.cursor,
            kind: GrabKind::Passive,
            time,
            detail,
        }
    }
}

/// Arguments of GrabPointer
#[derive(Debug, Clone, Copy)]
pub struct PointerGrabRequest {
    pub window: ResourceId,
    pub owner_events: bool,
    pub event_mask: u32,
    pub pointer_sync: bool,
    pub keyboard_sync: bool,
    pub confine_to: ResourceId,
    pub cursor: ResourceId,
    pub time: Timestamp,
}

/// Arguments of WarpPointer
#[derive(Debug, Clone, Copy)]
pub struct Warp {
    pub src_window: ResourceId,
    pub dst_window: ResourceId,
    pub src_x: i16,
    pub src_y: i16,
    pub src_width: u16,
    pub src_height: u16,
    pub dst_x: i16,
    pub dst_y: i16,
}

/// Pointer, keyboard and focus state
#[derive(Debug, Clone)]
pub struct InputState {
    pub root: ResourceId,
    pub screen: Rect,
    pub pointer_x: i16,
    pub pointer_y: i16,
    /// Deepest viewable window containing the pointer
    pub pointer_window: ResourceId,
    /// Button bits of the modifier state
    pub buttons: u16,
    /// Key bits of the modifier state
    pub modifiers: u16,
    /// One bit per keycode currently down
    pub keys: [u8; 32],
    pub pointer_grab: Option<Grab>,
    pub keyboard_grab: Option<Grab>,
    pub pointer_grab_time: Timestamp,
    pub keyboard_grab_time: Timestamp,
    pub focus: Focus,
    pub revert_to: u8,
    pub focus_time: Timestamp,
}

impl InputState {
    pub fn new(root: ResourceId, screen: Rect) -> Self {
        InputState {
            root,
            screen,
            pointer_x: (screen.width / 2) as i16,
            pointer_y: (screen.height / 2) as i16,
            pointer_window: root,
            buttons: 0,
            modifiers: 0,
            keys: [0; 32],
            pointer_grab: None,
            keyboard_grab: None,
            pointer_grab_time: 0,
            keyboard_grab_time: 0,
            focus: Focus::PointerRoot,
            revert_to: revert_to::POINTER_ROOT,
            focus_time: 0,
        }
    }

    /// Modifier and button state as reported in events
    pub fn state(&self) -> u16 {
        self.modifiers | self.buttons
    }

    pub fn key_down(&self, keycode: u8) -> bool {
        self.keys[keycode as usize / 8] & (1 << (keycode % 8)) != 0
    }

    fn set_key(&mut self, keycode: u8, down: bool) {
        let bit = 1 << (keycode % 8);
        if down {
            self.keys[keycode as usize / 8] |= bit;
        } else {
            self.keys[keycode as usize / 8] &= !bit;
        }
    }
}

/// A time argument is stale if older than the last change or in the future
fn time_is_valid(time: Timestamp, last: Timestamp, now: Timestamp) -> bool {
    time == CURRENT_TIME || (time >= last && time <= now)
}

/// Core device event being routed
#[derive(Debug, Clone, Copy)]
struct DeviceInput {
    kind: EventType,
    detail: u8,
    time: Timestamp,
    state: u16,
}

/// One step of an Enter/Leave or FocusIn/FocusOut sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Crossing {
    window: ResourceId,
    detail: u8,
    entering: bool,
}

impl Server {
    /// Feed one backend input event through routing
    pub fn process_input(&mut self, event: BackendEvent) {
        self.devices.screen_saver.active = false;
        match event {
            BackendEvent::Motion { x, y, time } => self.pointer_motion(x, y, time),
            BackendEvent::ButtonPress { button, time } => self.button_press(button, time),
            BackendEvent::ButtonRelease { button, time } => self.button_release(button, time),
            BackendEvent::KeyPress { keycode, time } => self.key_press(keycode, time),
            BackendEvent::KeyRelease { keycode, time } => self.key_release(keycode, time),
        }
    }

    fn event_time(&self, time: Timestamp) -> Timestamp {
        if time == CURRENT_TIME {
            self.now()
        } else {
            time
        }
    }

    /// Pointer position relative to `window`'s content area
    fn pointer_relative(&self, window: ResourceId) -> (i16, i16) {
        let (ox, oy) = self.inner_origin(window);
        (
            (self.input.pointer_x as i32 - ox) as i16,
            (self.input.pointer_y as i32 - oy) as i16,
        )
    }

    fn device_event(&self, input: &DeviceInput, window: ResourceId, source: ResourceId) -> Event {
        let (event_x, event_y) = self.pointer_relative(window);
        let child = if source == window || !self.is_inferior(window, source) {
            NONE
        } else {
            self.child_toward(window, source)
        };
        macro_rules! build {
            ($variant:ident, $ty:ident) => {
                Event::$variant($ty {
                    detail: input.detail,
                    time: input.time,
                    root: self.input.root,
                    event: window,
                    child,
                    root_x: self.input.pointer_x,
                    root_y: self.input.pointer_y,
                    event_x,
                    event_y,
                    state: input.state,
                    same_screen: true,
                })
            };
        }
        match input.kind {
            EventType::KeyPress => build!(KeyPress, KeyPressEvent),
            EventType::KeyRelease => build!(KeyRelease, KeyReleaseEvent),
            EventType::ButtonPress => build!(ButtonPress, ButtonPressEvent),
            EventType::ButtonRelease => build!(ButtonRelease, ButtonReleaseEvent),
            _ => build!(MotionNotify, MotionNotifyEvent),
        }
    }

    /// Walk from `source` toward the root and deliver to the first window
    /// where some client selects `mask`. `only` restricts the candidates to
    /// one client; `stop_at` ends the walk (the focus window for keys).
    /// Returns the window and the clients that received the event.
    fn propagate_device_event(
        &self,
        input: &DeviceInput,
        source: ResourceId,
        mask: u32,
        only: Option<ClientId>,
        stop_at: Option<ResourceId>,
    ) -> Option<(ResourceId, Vec<ClientId>)> {
        let mut current = source;
        loop {
            let window = self.registry.window(current).ok()?;
            let clients: Vec<ClientId> = window
                .clients_selecting(mask)
                .into_iter()
                .filter(|c| only.map_or(true, |o| o == *c))
                .collect();
            if !clients.is_empty() {
                let event = self.device_event(input, current, source);
                for client in &clients {
                    self.send_event(*client, &event);
                }
                return Some((current, clients));
            }
            if window.attributes.do_not_propagate_mask & mask != 0 || Some(current) == stop_at {
                return None;
            }
            current = window.parent?;
        }
    }

    /// Deliver honoring `grab`: with owner_events the grabbing client gets
    /// the event where it would normally go, otherwise (or failing that)
    /// relative to the grab window if the grab mask asks for it
    fn deliver_grabbed(&self, input: &DeviceInput, source: ResourceId, mask: u32, grab: &Grab) {
        if grab.owner_events
            && self
                .propagate_device_event(input, source, mask, Some(grab.client), None)
                .is_some()
        {
            return;
        }
        if grab.event_mask & mask != 0 {
            let event = self.device_event(input, grab.window, source);
            self.send_event(grab.client, &event);
        }
    }

    fn motion_mask(&self) -> u32 {
        let mut mask = event_mask::POINTER_MOTION;
        let buttons = self.input.buttons;
        if buttons != 0 {
            mask |= event_mask::BUTTON_MOTION;
        }
        for i in 0..5 {
            if buttons & (modifier_mask::BUTTON1 << i) != 0 {
                mask |= event_mask::BUTTON1_MOTION << i;
            }
        }
        mask
    }

    /// Move the pointer to absolute root coordinates
    pub fn pointer_motion(&mut self, x: i16, y: i16, time: Timestamp) {
        let mut bounds = self.input.screen;
        if let Some(grab) = self.input.pointer_grab {
            if grab.confine_to != NONE {
                if let Ok(w) = self.registry.window(grab.confine_to) {
                    bounds = w.inner();
                }
            }
        }
        let x = (x as i32).clamp(bounds.x, bounds.right() - 1) as i16;
        let y = (y as i32).clamp(bounds.y, bounds.bottom() - 1) as i16;
        if (x, y) == (self.input.pointer_x, self.input.pointer_y) {
            return;
        }
        self.input.pointer_x = x;
        self.input.pointer_y = y;
        self.update_pointer_window(notify_mode::NORMAL);

        let input = DeviceInput {
            kind: EventType::MotionNotify,
            detail: 0,
            time: self.event_time(time),
            state: self.input.state(),
        };
        let mask = self.motion_mask();
        let source = self.input.pointer_window;
        match self.input.pointer_grab {
            Some(grab) => self.deliver_grabbed(&input, source, mask, &grab),
            None => {
                self.propagate_device_event(&input, source, mask, None, None);
            }
        }
    }

    /// Windows from the root down to `window`, inclusive
    fn path_from_root(&self, window: ResourceId) -> Vec<ResourceId> {
        let mut path = self.ancestors(window);
        path.reverse();
        path.push(window);
        path
    }

    pub fn button_press(&mut self, physical: u8, time: Timestamp) {
        let button = self.devices.logical_button(physical);
        if button == 0 || button > 5 {
            return;
        }
        let time = self.event_time(time);
        let input = DeviceInput {
            kind: EventType::ButtonPress,
            detail: button,
            time,
            state: self.input.state(),
        };
        let source = self.input.pointer_window;
        let mask = event_mask::BUTTON_PRESS;

        if self.input.pointer_grab.is_none() {
            let passive = self.path_from_root(source).into_iter().find_map(|w| {
                let window = self.registry.window(w).ok()?;
                let grab = window
                    .button_grabs
                    .iter()
                    .find(|g| g.matches(button, input.state))?;
                let confine_ok = grab.confine_to == NONE || self.is_viewable(grab.confine_to);
                confine_ok.then(|| Grab::from_passive(w, grab, button, time))
            });
            if let Some(grab) = passive {
                log::debug!("Passive button grab on {:#x} for client {}", grab.window, grab.client);
                self.input.pointer_grab = Some(grab);
                self.input.pointer_grab_time = time;
            }
        }

        match self.input.pointer_grab {
            Some(grab) => self.deliver_grabbed(&input, source, mask, &grab),
            None => {
                if let Some((window, clients)) =
                    self.propagate_device_event(&input, source, mask, None, None)
                {
                    // ButtonPress is exclusive, so there is one receiver
                    if let Some(&client) = clients.first() {
                        let selected = self
                            .registry
                            .window(window)
                            .map(|w| w.event_mask_for(client))
                            .unwrap_or(0);
                        self.input.pointer_grab = Some(Grab {
                            client,
                            window,
                            owner_events: selected & event_mask::OWNER_GRAB_BUTTON != 0,
                            event_mask: selected,
                            pointer_sync: false,
                            keyboard_sync: false,
                            confine_to: NONE,
                            cursor: NONE,
                            kind: GrabKind::Automatic,
                            time,
                            detail: button,
                        });
                        self.input.pointer_grab_time = time;
                    }
                }
            }
        }
        self.input.buttons |= modifier_mask::BUTTON1 << (button - 1);
    }

    pub fn button_release(&mut self, physical: u8, time: Timestamp) {
        let button = self.devices.logical_button(physical);
        if button == 0 || button > 5 {
            return;
        }
        let input = DeviceInput {
            kind: EventType::ButtonRelease,
            detail: button,
            time: self.event_time(time),
            state: self.input.state(),
        };
        let source = self.input.pointer_window;
        let mask = event_mask::BUTTON_RELEASE;
        match self.input.pointer_grab {
            Some(grab) => self.deliver_grabbed(&input, source, mask, &grab),
            None => {
                self.propagate_device_event(&input, source, mask, None, None);
            }
        }
        self.input.buttons &= !(modifier_mask::BUTTON1 << (button - 1));
        if self.input.buttons == 0 {
            if let Some(grab) = self.input.pointer_grab {
                if grab.kind != GrabKind::Active {
                    self.input.pointer_grab = None;
                    self.update_pointer_window(notify_mode::UNGRAB);
                }
            }
        }
    }

    /// Window keyboard events start from, plus the window they stop at
    fn keyboard_source(&self) -> Option<(ResourceId, Option<ResourceId>)> {
        let pointer = self.input.pointer_window;
        match self.input.focus {
            Focus::None => None,
            Focus::PointerRoot => Some((pointer, None)),
            Focus::Window(f) => {
                if pointer == f || self.is_inferior(f, pointer) {
                    Some((pointer, Some(f)))
                } else {
                    Some((f, Some(f)))
                }
            }
        }
    }

    pub fn key_press(&mut self, keycode: u8, time: Timestamp) {
        let time = self.event_time(time);
        let input = DeviceInput {
            kind: EventType::KeyPress,
            detail: keycode,
            time,
            state: self.input.state(),
        };
        self.input.set_key(keycode, true);
        let modifier = self.devices.modifier_bit(keycode);
        let routed = self.keyboard_source();

        if self.input.keyboard_grab.is_none() {
            if let Some((source, _)) = routed {
                let passive = self.path_from_root(source).into_iter().find_map(|w| {
                    let window = self.registry.window(w).ok()?;
                    let grab = window
                        .key_grabs
                        .iter()
                        .find(|g| g.matches(keycode, input.state))?;
                    Some(Grab::from_passive(w, grab, keycode, time))
                });
                if let Some(grab) = passive {
                    log::debug!("Passive key grab on {:#x} for client {}", grab.window, grab.client);
                    self.activate_keyboard_grab(grab);
                }
            }
        }

        let mask = event_mask::KEY_PRESS;
        match (self.input.keyboard_grab, routed) {
            (Some(grab), Some((source, _))) => self.deliver_keyboard_grabbed(&input, source, mask, &grab),
            (Some(grab), None) => {
                let event = self.device_event(&input, grab.window, grab.window);
                self.send_event(grab.client, &event);
            }
            (None, Some((source, stop_at))) => {
                self.propagate_device_event(&input, source, mask, None, stop_at);
            }
            (None, None) => {}
        }
        self.input.modifiers |= modifier;
    }

    pub fn key_release(&mut self, keycode: u8, time: Timestamp) {
        let input = DeviceInput {
            kind: EventType::KeyRelease,
            detail: keycode,
            time: self.event_time(time),
            state: self.input.state(),
        };
        let mask = event_mask::KEY_RELEASE;
        let routed = self.keyboard_source();
        match (self.input.keyboard_grab, routed) {
            (Some(grab), Some((source, _))) => self.deliver_keyboard_grabbed(&input, source, mask, &grab),
            (Some(grab), None) => {
                let event = self.device_event(&input, grab.window, grab.window);
                self.send_event(grab.client, &event);
            }
            (None, Some((source, stop_at))) => {
                self.propagate_device_event(&input, source, mask, None, stop_at);
            }
            (None, None) => {}
        }
        self.input.set_key(keycode, false);
        let modifier = self.devices.modifier_bit(keycode);
        if modifier != 0 {
            // Another key on the same modifier may still be down
            let still_down = self
                .devices
                .modifier_map()
                .iter()
                .any(|k| *k != 0 && self.input.key_down(*k) && self.devices.modifier_bit(*k) & modifier != 0);
            if !still_down {
                self.input.modifiers &= !modifier;
            }
        }
        if let Some(grab) = self.input.keyboard_grab {
            if grab.kind == GrabKind::Passive && grab.detail == keycode {
                self.release_keyboard_grab();
            }
        }
    }

    /// Keyboard grabs report every key event regardless of a mask
    fn deliver_keyboard_grabbed(&self, input: &DeviceInput, source: ResourceId, mask: u32, grab: &Grab) {
        let grab = Grab {
            event_mask: mask,
            ..*grab
        };
        self.deliver_grabbed(input, source, mask, &grab);
    }

    /// Lowest common ancestor of two windows (the root at worst)
    fn common_ancestor(&self, a: ResourceId, b: ResourceId) -> ResourceId {
        let a_path = self.path_from_root(a);
        let b_path = self.path_from_root(b);
        a_path
            .iter()
            .zip(&b_path)
            .take_while(|(x, y)| x == y)
            .last()
            .map(|(x, _)| *x)
            .unwrap_or(self.input.root)
    }

    /// The Leave/Enter (or FocusOut/FocusIn) steps when moving from `from`
    /// to `to`, in emission order
    fn crossing_chain(&self, from: ResourceId, to: ResourceId) -> Vec<Crossing> {
        let mut steps = Vec::new();
        if from == to {
            return steps;
        }
        let leave = |window, detail| Crossing {
            window,
            detail,
            entering: false,
        };
        let enter = |window, detail| Crossing {
            window,
            detail,
            entering: true,
        };
        // Windows strictly between `low` and its ancestor `high`, bottom-up
        let between = |low: ResourceId, high: ResourceId| -> Vec<ResourceId> {
            self.ancestors(low).into_iter().take_while(|w| *w != high).collect()
        };

        if self.is_inferior(from, to) {
            steps.push(leave(from, notify_detail::INFERIOR));
            for w in between(to, from).into_iter().rev() {
                steps.push(enter(w, notify_detail::VIRTUAL));
            }
            steps.push(enter(to, notify_detail::ANCESTOR));
        } else if self.is_inferior(to, from) {
            steps.push(leave(from, notify_detail::ANCESTOR));
            for w in between(from, to) {
                steps.push(leave(w, notify_detail::VIRTUAL));
            }
            steps.push(enter(to, notify_detail::INFERIOR));
        } else {
            let common = self.common_ancestor(from, to);
            steps.push(leave(from, notify_detail::NONLINEAR));
            for w in between(from, common) {
                steps.push(leave(w, notify_detail::NONLINEAR_VIRTUAL));
            }
            for w in between(to, common).into_iter().rev() {
                steps.push(enter(w, notify_detail::NONLINEAR_VIRTUAL));
            }
            steps.push(enter(to, notify_detail::NONLINEAR));
        }
        steps
    }

    /// Is `window` the focus window or one of its inferiors?
    fn has_focus(&self, window: ResourceId) -> bool {
        match self.input.focus {
            Focus::Window(f) => f == window || self.is_inferior(f, window),
            Focus::PointerRoot => true,
            Focus::None => false,
        }
    }

    fn send_keymap_notify(&self, window: ResourceId) {
        let mut keys = [0u8; 31];
        keys.copy_from_slice(&self.input.keys[1..]);
        self.deliver_to_selecting(
            window,
            event_mask::KEYMAP_STATE,
            &Event::KeymapNotify(KeymapNotifyEvent { keys }),
        );
    }

    /// Recompute the window under the pointer and emit Enter/Leave events
    pub fn update_pointer_window(&mut self, mode: u8) {
        let old = self.input.pointer_window;
        let new = self.window_at(self.input.pointer_x as i32, self.input.pointer_y as i32);
        if old == new {
            return;
        }
        self.input.pointer_window = new;
        // A destroyed window leaves no chain; start from the root
        let from = if self.registry.window(old).is_ok() {
            old
        } else {
            self.input.root
        };
        let time = self.now();
        let state = self.input.state();
        for step in self.crossing_chain(from, new) {
            let (event_x, event_y) = self.pointer_relative(step.window);
            let child = if step.entering || self.is_inferior(step.window, new) {
                self.child_toward(step.window, new)
            } else {
                NONE
            };
            let same_screen_focus = 0x02 | self.has_focus(step.window) as u8;
            let (mask, event) = if step.entering {
                (
                    event_mask::ENTER_WINDOW,
                    Event::EnterNotify(EnterNotifyEvent {
                        detail: step.detail,
                        time,
                        root: self.input.root,
                        event: step.window,
                        child,
                        root_x: self.input.pointer_x,
                        root_y: self.input.pointer_y,
                        event_x,
                        event_y,
                        state,
                        mode,
                        same_screen_focus,
                    }),
                )
            } else {
                (
                    event_mask::LEAVE_WINDOW,
                    Event::LeaveNotify(LeaveNotifyEvent {
                        detail: step.detail,
                        time,
                        root: self.input.root,
                        event: step.window,
                        child,
                        root_x: self.input.pointer_x,
                        root_y: self.input.pointer_y,
                        event_x,
                        event_y,
                        state,
                        mode,
                        same_screen_focus,
                    }),
                )
            };
            self.deliver_crossing(step.window, mask, &event);
            if step.entering {
                self.send_keymap_notify(step.window);
            }
        }
    }

    /// During a pointer grab only the grabbing client sees crossing events
    fn deliver_crossing(&self, window: ResourceId, mask: u32, event: &Event) {
        match self.input.pointer_grab {
            Some(grab) => {
                let selected = self
                    .registry
                    .window(window)
                    .map(|w| w.event_mask_for(grab.client))
                    .unwrap_or(0);
                if (grab.owner_events && selected & mask != 0)
                    || (grab.window == window && grab.event_mask & mask != 0)
                {
                    self.send_event(grab.client, event);
                }
            }
            None => {
                self.deliver_to_selecting(window, mask, event);
            }
        }
    }

    fn send_focus_event(&self, window: ResourceId, detail: u8, mode: u8, entering: bool) {
        let event = if entering {
            Event::FocusIn(FocusInEvent {
                detail,
                event: window,
                mode,
            })
        } else {
            Event::FocusOut(FocusOutEvent {
                detail,
                event: window,
                mode,
            })
        };
        self.deliver_to_selecting(window, event_mask::FOCUS_CHANGE, &event);
        if entering {
            self.send_keymap_notify(window);
        }
    }

    /// FocusIn/FocusOut for a focus change from `from` to `to`
    fn focus_events(&self, from: Focus, to: Focus, mode: u8) {
        let root = self.input.root;
        let pseudo_detail = |focus: Focus| match focus {
            Focus::PointerRoot => notify_detail::POINTER_ROOT,
            _ => notify_detail::NONE,
        };
        match (from, to) {
            (Focus::Window(a), Focus::Window(b)) => {
                let a = if self.registry.window(a).is_ok() { a } else { root };
                for step in self.crossing_chain(a, b) {
                    self.send_focus_event(step.window, step.detail, mode, step.entering);
                }
            }
            (Focus::Window(a), pseudo) => {
                if self.registry.window(a).is_ok() {
                    self.send_focus_event(a, notify_detail::NONLINEAR, mode, false);
                    for w in self.ancestors(a) {
                        self.send_focus_event(w, notify_detail::NONLINEAR_VIRTUAL, mode, false);
                    }
                }
                self.send_focus_event(root, pseudo_detail(pseudo), mode, true);
            }
            (pseudo, Focus::Window(b)) => {
                self.send_focus_event(root, pseudo_detail(pseudo), mode, false);
                for w in self.ancestors(b).into_iter().rev() {
                    self.send_focus_event(w, notify_detail::NONLINEAR_VIRTUAL, mode, true);
                }
                self.send_focus_event(b, notify_detail::NONLINEAR, mode, true);
            }
            (a, b) => {
                if a != b {
                    self.send_focus_event(root, pseudo_detail(a), mode, false);
                    self.send_focus_event(root, pseudo_detail(b), mode, true);
                }
            }
        }
    }

    fn focus_mode(&self) -> u8 {
        if self.input.keyboard_grab.is_some() {
            notify_mode::WHILE_GRABBED
        } else {
            notify_mode::NORMAL
        }
    }

    /// SetInputFocus
    pub fn set_input_focus(
        &mut self,
        focus: ResourceId,
        revert: u8,
        time: Timestamp,
    ) -> X11Result<()> {
        if revert > revert_to::PARENT {
            return Err(X11Error::bad_value(revert as u32));
        }
        let target = Focus::from_id(focus);
        if let Focus::Window(w) = target {
            self.registry.window(w)?;
            if !self.is_viewable(w) {
                return Err(X11Error::bad_match());
            }
        }
        let now = self.now();
        if !time_is_valid(time, self.input.focus_time, now) {
            return Ok(());
        }
        let old = self.input.focus;
        self.input.focus = target;
        self.input.revert_to = revert;
        self.input.focus_time = if time == CURRENT_TIME { now } else { time };
        self.focus_events(old, target, self.focus_mode());
        log::debug!("Input focus {:?} -> {:?}", old, target);
        Ok(())
    }

    /// Move focus away from a window that stopped being viewable
    fn revert_focus(&mut self) {
        let old = self.input.focus;
        let Focus::Window(w) = old else {
            return;
        };
        let target = match self.input.revert_to {
            revert_to::PARENT => {
                let parent = self
                    .ancestors(w)
                    .into_iter()
                    .find(|a| self.is_viewable(*a))
                    .unwrap_or(self.input.root);
                self.input.revert_to = revert_to::NONE;
                Focus::Window(parent)
            }
            revert_to::POINTER_ROOT => Focus::PointerRoot,
            _ => Focus::None,
        };
        self.input.focus = target;
        self.focus_events(old, target, self.focus_mode());
    }

    /// GrabPointer
    pub fn grab_pointer(&mut self, client: ClientId, req: PointerGrabRequest) -> X11Result<GrabStatus> {
        self.registry.window(req.window)?;
        if req.event_mask & !event_mask::POINTER_EVENTS != 0 {
            return Err(X11Error::bad_value(req.event_mask));
        }
        if req.confine_to != NONE {
            self.registry.window(req.confine_to)?;
        }
        if req.cursor != NONE {
            self.registry.cursor(req.cursor)?;
        }
        if let Some(grab) = self.input.pointer_grab {
            if grab.client != client {
                return Ok(GrabStatus::AlreadyGrabbed);
            }
        }
        let now = self.now();
        if !time_is_valid(req.time, self.input.pointer_grab_time, now) {
            return Ok(GrabStatus::InvalidTime);
        }
        if !self.is_viewable(req.window)
            || (req.confine_to != NONE && !self.is_viewable(req.confine_to))
        {
            return Ok(GrabStatus::NotViewable);
        }
        let time = if req.time == CURRENT_TIME { now } else { req.time };
        self.input.pointer_grab = Some(Grab {
            client,
            window: req.window,
            owner_events: req.owner_events,
            event_mask: req.event_mask,
            pointer_sync: req.pointer_sync,
            keyboard_sync: req.keyboard_sync,
            confine_to: req.confine_to,
            cursor: req.cursor,
            kind: GrabKind::Active,
            time,
            detail: 0,
        });
        self.input.pointer_grab_time = time;
        log::debug!("Client {} grabbed the pointer on {:#x}", client, req.window);
        if req.confine_to != NONE {
            // Force a re-clamp of the current position into the confine window
            let (x, y) = (self.input.pointer_x, self.input.pointer_y);
            self.input.pointer_x = i16::MIN;
            self.pointer_motion(x, y, time);
        }
        Ok(GrabStatus::Success)
    }

    /// UngrabPointer
    pub fn ungrab_pointer(&mut self, client: ClientId, time: Timestamp) {
        let Some(grab) = self.input.pointer_grab else {
            return;
        };
        if grab.client != client || !time_is_valid(time, self.input.pointer_grab_time, self.now()) {
            return;
        }
        self.input.pointer_grab = None;
        log::debug!("Client {} released the pointer", client);
        self.update_pointer_window(notify_mode::UNGRAB);
    }

    /// ChangeActivePointerGrab; ignored for passive grabs
    pub fn change_active_pointer_grab(
        &mut self,
        client: ClientId,
        cursor: ResourceId,
        time: Timestamp,
        event_mask: u32,
    ) -> X11Result<()> {
        if cursor != NONE {
            self.registry.cursor(cursor)?;
        }
        if event_mask & !event_mask::POINTER_EVENTS != 0 {
            return Err(X11Error::bad_value(event_mask));
        }
        let now = self.now();
        let last = self.input.pointer_grab_time;
        if let Some(grab) = self.input.pointer_grab.as_mut() {
            if grab.client == client && grab.kind != GrabKind::Passive && time_is_valid(time, last, now) {
                grab.cursor = cursor;
                grab.event_mask = event_mask;
            }
        }
        Ok(())
    }

    fn activate_keyboard_grab(&mut self, grab: Grab) {
        let from = self.input.focus;
        self.input.keyboard_grab = Some(grab);
        self.input.keyboard_grab_time = grab.time;
        let target = Focus::Window(grab.window);
        if from != target {
            self.focus_events(from, target, notify_mode::GRAB);
        }
    }

    fn release_keyboard_grab(&mut self) {
        let Some(grab) = self.input.keyboard_grab.take() else {
            return;
        };
        let to = self.input.focus;
        let from = Focus::Window(grab.window);
        if from != to {
            self.focus_events(from, to, notify_mode::UNGRAB);
        }
    }

    /// GrabKeyboard
    pub fn grab_keyboard(
        &mut self,
        client: ClientId,
        window: ResourceId,
        owner_events: bool,
        pointer_sync: bool,
        keyboard_sync: bool,
        time: Timestamp,
    ) -> X11Result<GrabStatus> {
        self.registry.window(window)?;
        if let Some(grab) = self.input.keyboard_grab {
            if grab.client != client {
                return Ok(GrabStatus::AlreadyGrabbed);
            }
        }
        let now = self.now();
        if !time_is_valid(time, self.input.keyboard_grab_time, now) {
            return Ok(GrabStatus::InvalidTime);
        }
        if !self.is_viewable(window) {
            return Ok(GrabStatus::NotViewable);
        }
        let time = if time == CURRENT_TIME { now } else { time };
        let grab = Grab {
            client,
            window,
            owner_events,
            event_mask: event_mask::KEY_PRESS | event_mask::KEY_RELEASE,
            pointer_sync,
            keyboard_sync,
            confine_to: NONE,
            cursor: NONE,
            kind: GrabKind::Active,
            time,
            detail: 0,
        };
        match self.input.keyboard_grab {
            // Regrab by the holder only moves the grab window
            Some(old) => {
                self.input.keyboard_grab = Some(grab);
                self.input.keyboard_grab_time = time;
                if old.window != window {
                    self.focus_events(Focus::Window(old.window), Focus::Window(window), notify_mode::WHILE_GRABBED);
                }
            }
            None => self.activate_keyboard_grab(grab),
        }
        log::debug!("Client {} grabbed the keyboard on {:#x}", client, window);
        Ok(GrabStatus::Success)
    }

    /// UngrabKeyboard
    pub fn ungrab_keyboard(&mut self, client: ClientId, time: Timestamp) {
        let Some(grab) = self.input.keyboard_grab else {
            return;
        };
        if grab.client != client || !time_is_valid(time, self.input.keyboard_grab_time, self.now()) {
            return;
        }
        log::debug!("Client {} released the keyboard", client);
        self.release_keyboard_grab();
    }

    /// GrabButton / GrabKey. A conflicting grab by another client is an
    /// Access error; the client's own overlapping grab is replaced.
    pub fn add_passive_grab(
        &mut self,
        window: ResourceId,
        grab: PassiveGrab,
        keyboard: bool,
    ) -> X11Result<()> {
        let w = self.registry.window_mut(window)?;
        let grabs = if keyboard { &mut w.key_grabs } else { &mut w.button_grabs };
        let conflicts = |g: &PassiveGrab| {
            (g.detail == 0 || grab.detail == 0 || g.detail == grab.detail)
                && (g.modifiers == modifier_mask::ANY_MODIFIER
                    || grab.modifiers == modifier_mask::ANY_MODIFIER
                    || g.modifiers == grab.modifiers)
        };
        if grabs.iter().any(|g| g.client != grab.client && conflicts(g)) {
            return Err(X11Error::bad_access());
        }
        grabs.retain(|g| !(g.client == grab.client && g.detail == grab.detail && g.modifiers == grab.modifiers));
        grabs.push(grab);
        Ok(())
    }

    /// UngrabButton / UngrabKey
    pub fn remove_passive_grab(
        &mut self,
        client: ClientId,
        window: ResourceId,
        detail: u8,
        modifiers: u16,
        keyboard: bool,
    ) -> X11Result<()> {
        let w = self.registry.window_mut(window)?;
        let grabs = if keyboard { &mut w.key_grabs } else { &mut w.button_grabs };
        grabs.retain(|g| !(g.client == client && g.overlaps(detail, modifiers)));
        Ok(())
    }

    /// AllowEvents. Events are never frozen, so a valid request has no
    /// further effect.
    pub fn allow_events(&mut self, mode: u8, time: Timestamp) -> X11Result<()> {
        if mode > 7 {
            return Err(X11Error::bad_value(mode as u32));
        }
        if time != CURRENT_TIME && time > self.now() {
            log::debug!("AllowEvents with a future time ignored");
        }
        Ok(())
    }

    /// Drop a departing client's active grabs
    pub fn release_client_input(&mut self, client: ClientId) {
        if self.input.pointer_grab.map_or(false, |g| g.client == client) {
            self.input.pointer_grab = None;
            self.update_pointer_window(notify_mode::UNGRAB);
        }
        if self.input.keyboard_grab.map_or(false, |g| g.client == client) {
            self.release_keyboard_grab();
        }
    }

    /// Re-evaluate input state after the tree changed: grabs and focus on
    /// windows that stopped being viewable are released, and the pointer
    /// window is recomputed
    pub fn refresh_input(&mut self) {
        if let Some(grab) = self.input.pointer_grab {
            let confine_lost = grab.confine_to != NONE && !self.is_viewable(grab.confine_to);
            if !self.is_viewable(grab.window) || confine_lost {
                self.input.pointer_grab = None;
            }
        }
        if let Some(grab) = self.input.keyboard_grab {
            if !self.is_viewable(grab.window) {
                self.input.keyboard_grab = None;
            }
        }
        if let Focus::Window(w) = self.input.focus {
            if !self.is_viewable(w) {
                self.revert_focus();
            }
        }
        self.update_pointer_window(notify_mode::NORMAL);
    }

    /// WarpPointer
    pub fn warp_pointer(&mut self, warp: Warp) -> X11Result<()> {
        if warp.src_window != NONE {
            let src = self.registry.window(warp.src_window)?.inner();
            let width = if warp.src_width == 0 {
                src.width - warp.src_x as i32
            } else {
                warp.src_width as i32
            };
            let height = if warp.src_height == 0 {
                src.height - warp.src_y as i32
            } else {
                warp.src_height as i32
            };
            let area = Rect::new(src.x + warp.src_x as i32, src.y + warp.src_y as i32, width, height);
            if !area.contains(self.input.pointer_x as i32, self.input.pointer_y as i32) {
                return Ok(());
            }
        }
        let (x, y) = if warp.dst_window == NONE {
            (
                self.input.pointer_x as i32 + warp.dst_x as i32,
                self.input.pointer_y as i32 + warp.dst_y as i32,
            )
        } else {
            let (ox, oy) = self.inner_origin(self.registry.window(warp.dst_window)?.id);
            (ox + warp.dst_x as i32, oy + warp.dst_y as i32)
        };
        let x = x.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
        let y = y.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
        self.pointer_motion(x, y, CURRENT_TIME);
        if let Err(e) = self.backend.warp_pointer(self.input.pointer_x, self.input.pointer_y) {
            log::debug!("Backend warp_pointer failed: {}", e);
        }
        Ok(())
    }

    /// QueryPointer relative to `window`
    pub fn query_pointer(&self, window: ResourceId) -> X11Result<PointerReply> {
        self.registry.window(window)?;
        let (win_x, win_y) = self.pointer_relative(window);
        Ok(PointerReply {
            same_screen: true,
            root: self.input.root,
            child: self.child_containing(window, self.input.pointer_x as i32, self.input.pointer_y as i32),
            root_x: self.input.pointer_x,
            root_y: self.input.pointer_y,
            win_x,
            win_y,
            mask: self.input.state(),
        })
    }

    /// SendEvent. `destination` 0 is PointerWindow, 1 is InputFocus.
    pub fn send_client_event(
        &mut self,
        propagate: bool,
        destination: ResourceId,
        mask: u32,
        raw: [u8; 32],
    ) -> X11Result<()> {
        if mask & !event_mask::ALL != 0 {
            return Err(X11Error::bad_value(mask));
        }
        let code = raw[0] & !SEND_EVENT_FLAG;
        if !(2..=34).contains(&code) {
            return Err(X11Error::bad_value(code as u32));
        }
        let pointer = self.input.pointer_window;
        let (target, stop_at) = match destination {
            0 => (pointer, None),
            1 => match self.input.focus {
                Focus::None => return Ok(()),
                Focus::PointerRoot => (pointer, None),
                Focus::Window(f) => {
                    if pointer == f || self.is_inferior(f, pointer) {
                        (pointer, Some(f))
                    } else {
                        (f, Some(f))
                    }
                }
            },
            w => {
                self.registry.window(w)?;
                (w, None)
            }
        };
        let event = Event::Sent(raw);

        if mask == 0 {
            if let Some(owner) = self.registry.owner(target) {
                self.send_event(owner, &event);
            }
            return Ok(());
        }
        if !propagate {
            self.deliver_to_selecting(target, mask, &event);
            return Ok(());
        }
        let mut current = target;
        let mut remaining = mask;
        loop {
            let Ok(window) = self.registry.window(current) else {
                return Ok(());
            };
            if self.deliver_to_selecting(current, remaining, &event) {
                return Ok(());
            }
            remaining &= !window.attributes.do_not_propagate_mask;
            if remaining == 0 || Some(current) == stop_at {
                return Ok(());
            }
            match window.parent {
                Some(parent) => current = parent,
                None => return Ok(()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::server_ids::ROOT_WINDOW;
    use crate::resources::window::cw;
    use crate::server::test_util::*;
    use crate::server::tree::CreateWindowParams;

    fn window(server: &mut Server, client: ClientId, id: ResourceId, parent: ResourceId, rect: (i16, i16, u16, u16)) {
        server
            .create_window(
                client,
                CreateWindowParams {
                    id,
                    parent,
                    x: rect.0,
                    y: rect.1,
                    width: rect.2,
                    height: rect.3,
                    border_width: 0,
                    class: 0,
                    depth: 0,
                    visual: 0,
                    value_mask: 0,
                    values: Vec::new(),
                },
            )
            .unwrap();
        server.map_window(client, id).unwrap();
    }

    fn select(server: &mut Server, client: ClientId, id: ResourceId, mask: u32) {
        server
            .change_window_attributes(client, id, cw::EVENT_MASK, &[mask])
            .unwrap();
    }

    fn codes(packets: &[[u8; 32]]) -> Vec<u8> {
        packets.iter().map(|p| p[0]).collect()
    }

    fn event_window(p: &[u8; 32]) -> u32 {
        u32::from_le_bytes([p[12], p[13], p[14], p[15]])
    }

    const A: ResourceId = 0x0020_0001;
    const B: ResourceId = 0x0020_0002;

    #[test]
    fn test_crossing_chain_details() {
        let mut server = server();
        let (c, _) = connect(&mut server);
        window(&mut server, c, A, ROOT_WINDOW, (0, 0, 100, 100));
        window(&mut server, c, B, A, (10, 10, 20, 20));
        window(&mut server, c, 0x0020_0003, ROOT_WINDOW, (200, 200, 10, 10));

        let down = server.crossing_chain(ROOT_WINDOW, B);
        assert_eq!(
            down,
            vec![
                Crossing { window: ROOT_WINDOW, detail: notify_detail::INFERIOR, entering: false },
                Crossing { window: A, detail: notify_detail::VIRTUAL, entering: true },
                Crossing { window: B, detail: notify_detail::ANCESTOR, entering: true },
            ]
        );
        let across = server.crossing_chain(B, 0x0020_0003);
        assert_eq!(
            across,
            vec![
                Crossing { window: B, detail: notify_detail::NONLINEAR, entering: false },
                Crossing { window: A, detail: notify_detail::NONLINEAR_VIRTUAL, entering: false },
                Crossing { window: 0x0020_0003, detail: notify_detail::NONLINEAR, entering: true },
            ]
        );
    }

    #[test]
    fn test_motion_generates_enter_leave() {
        let mut server = server();
        let (c, out) = connect(&mut server);
        window(&mut server, c, A, ROOT_WINDOW, (0, 0, 100, 100));
        select(&mut server, c, A, event_mask::ENTER_WINDOW | event_mask::LEAVE_WINDOW | event_mask::POINTER_MOTION);
        out.take_packets();

        server.process_input(BackendEvent::Motion { x: 50, y: 50, time: 0 });
        let packets = out.take_packets();
        assert_eq!(
            codes(&packets),
            vec![EventType::EnterNotify as u8, EventType::MotionNotify as u8]
        );
        assert_eq!(packets[0][1], notify_detail::ANCESTOR);

        server.process_input(BackendEvent::Motion { x: 500, y: 500, time: 0 });
        let packets = out.take_packets();
        assert_eq!(codes(&packets), vec![EventType::LeaveNotify as u8]);
        assert_eq!(packets[0][1], notify_detail::ANCESTOR);
    }

    #[test]
    fn test_button_press_propagates_and_grabs() {
        let mut server = server();
        let (c, out) = connect(&mut server);
        window(&mut server, c, A, ROOT_WINDOW, (0, 0, 100, 100));
        window(&mut server, c, B, A, (0, 0, 50, 50));
        select(&mut server, c, A, event_mask::BUTTON_PRESS | event_mask::BUTTON_RELEASE);
        server.process_input(BackendEvent::Motion { x: 10, y: 10, time: 0 });
        out.take_packets();

        server.process_input(BackendEvent::ButtonPress { button: 1, time: 0 });
        let packets = out.take_packets();
        assert_eq!(codes(&packets), vec![EventType::ButtonPress as u8]);
        assert_eq!(event_window(&packets[0]), A);
        // child is B
        assert_eq!(u32::from_le_bytes([packets[0][16], packets[0][17], packets[0][18], packets[0][19]]), B);
        let grab = server.input.pointer_grab.unwrap();
        assert_eq!(grab.kind, GrabKind::Automatic);
        assert_eq!(grab.window, A);

        server.process_input(BackendEvent::ButtonRelease { button: 1, time: 0 });
        let packets = out.take_packets();
        assert_eq!(codes(&packets), vec![EventType::ButtonRelease as u8]);
        // state carries the button that was down
        assert_eq!(u16::from_le_bytes([packets[0][28], packets[0][29]]), modifier_mask::BUTTON1);
        assert!(server.input.pointer_grab.is_none());
    }

    #[test]
    fn test_do_not_propagate_stops_event() {
        let mut server = server();
        let (c, out) = connect(&mut server);
        window(&mut server, c, A, ROOT_WINDOW, (0, 0, 100, 100));
        window(&mut server, c, B, A, (0, 0, 50, 50));
        select(&mut server, c, A, event_mask::BUTTON_PRESS);
        server
            .change_window_attributes(c, B, cw::DONT_PROPAGATE, &[event_mask::BUTTON_PRESS])
            .unwrap();
        server.process_input(BackendEvent::Motion { x: 10, y: 10, time: 0 });
        out.take_packets();
        server.process_input(BackendEvent::ButtonPress { button: 1, time: 0 });
        assert!(out.take_packets().is_empty());
    }

    #[test]
    fn test_active_grab_redirects_to_grabber() {
        let mut server = server();
        let (a, a_out) = connect(&mut server);
        let (b, b_out) = connect(&mut server);
        window(&mut server, a, A, ROOT_WINDOW, (0, 0, 100, 100));
        select(&mut server, a, A, event_mask::POINTER_MOTION);

        let request = PointerGrabRequest {
            window: ROOT_WINDOW,
            owner_events: false,
            event_mask: event_mask::POINTER_MOTION,
            pointer_sync: false,
            keyboard_sync: false,
            confine_to: NONE,
            cursor: NONE,
            time: CURRENT_TIME,
        };
        assert_eq!(server.grab_pointer(b, request).unwrap(), GrabStatus::Success);
        assert_eq!(server.grab_pointer(a, request).unwrap(), GrabStatus::AlreadyGrabbed);
        a_out.take_packets();
        b_out.take_packets();

        server.process_input(BackendEvent::Motion { x: 20, y: 20, time: 0 });
        assert!(a_out.take_packets().is_empty());
        let packets = b_out.take_packets();
        assert_eq!(codes(&packets), vec![EventType::MotionNotify as u8]);
        assert_eq!(event_window(&packets[0]), ROOT_WINDOW);

        server.ungrab_pointer(b, CURRENT_TIME);
        assert!(server.input.pointer_grab.is_none());
    }

    #[test]
    fn test_grab_on_unviewable_window() {
        let mut server = server();
        let (c, _) = connect(&mut server);
        window(&mut server, c, A, ROOT_WINDOW, (0, 0, 100, 100));
        server.unmap_window(A).unwrap();
        let status = server
            .grab_keyboard(c, A, false, false, false, CURRENT_TIME)
            .unwrap();
        assert_eq!(status, GrabStatus::NotViewable);
    }

    #[test]
    fn test_focus_events_and_revert() {
        let mut server = server();
        let (c, out) = connect(&mut server);
        window(&mut server, c, A, ROOT_WINDOW, (0, 0, 100, 100));
        window(&mut server, c, B, A, (0, 0, 50, 50));
        select(&mut server, c, A, event_mask::FOCUS_CHANGE);
        select(&mut server, c, B, event_mask::FOCUS_CHANGE);
        out.take_packets();

        server.set_input_focus(B, revert_to::PARENT, CURRENT_TIME).unwrap();
        let packets = out.take_packets();
        assert_eq!(
            codes(&packets),
            vec![EventType::FocusIn as u8, EventType::FocusIn as u8]
        );
        assert_eq!(packets[0][1], notify_detail::NONLINEAR_VIRTUAL);
        assert_eq!(packets[1][1], notify_detail::NONLINEAR);

        server.unmap_window(B).unwrap();
        assert_eq!(server.input.focus, Focus::Window(A));
        assert_eq!(server.input.revert_to, revert_to::NONE);
        let packets = out.take_packets();
        let focus: Vec<(u8, u8)> = packets
            .iter()
            .filter(|p| p[0] == EventType::FocusOut as u8 || p[0] == EventType::FocusIn as u8)
            .map(|p| (p[0], p[1]))
            .collect();
        assert_eq!(
            focus,
            vec![
                (EventType::FocusOut as u8, notify_detail::ANCESTOR),
                (EventType::FocusIn as u8, notify_detail::INFERIOR),
            ]
        );

        let err = server.set_input_focus(B, revert_to::NONE, CURRENT_TIME).unwrap_err();
        assert_eq!(err.code, ErrorCode::Match);
    }

    #[test]
    fn test_keyboard_follows_focus() {
        let mut server = server();
        let (c, out) = connect(&mut server);
        window(&mut server, c, A, ROOT_WINDOW, (0, 0, 100, 100));
        window(&mut server, c, B, ROOT_WINDOW, (200, 200, 50, 50));
        select(&mut server, c, A, event_mask::KEY_PRESS);
        select(&mut server, c, B, event_mask::KEY_PRESS);
        server.set_input_focus(B, revert_to::NONE, CURRENT_TIME).unwrap();
        server.process_input(BackendEvent::Motion { x: 10, y: 10, time: 0 });
        out.take_packets();

        server.process_input(BackendEvent::KeyPress { keycode: 50, time: 0 });
        server.process_input(BackendEvent::KeyPress { keycode: 38, time: 0 });
        let packets = out.take_packets();
        assert_eq!(packets.len(), 2);
        assert!(packets.iter().all(|p| event_window(p) == B));
        assert_eq!(u16::from_le_bytes([packets[1][28], packets[1][29]]), modifier_mask::SHIFT);
        server.process_input(BackendEvent::KeyRelease { keycode: 50, time: 0 });
        assert_eq!(server.input.modifiers, 0);
    }

    #[test]
    fn test_passive_button_grab() {
        let mut server = server();
        let (owner, owner_out) = connect(&mut server);
        let (wm, wm_out) = connect(&mut server);
        window(&mut server, owner, A, ROOT_WINDOW, (0, 0, 100, 100));
        select(&mut server, owner, A, event_mask::BUTTON_PRESS);
        let passive = PassiveGrab {
            client: wm,
            detail: 1,
            modifiers: modifier_mask::ANY_MODIFIER,
            owner_events: false,
            event_mask: event_mask::BUTTON_PRESS | event_mask::BUTTON_RELEASE,
            pointer_sync: false,
            keyboard_sync: false,
            confine_to: NONE,
            cursor: NONE,
        };
        server.add_passive_grab(ROOT_WINDOW, passive.clone(), false).unwrap();
        let conflicting = PassiveGrab { client: owner, ..passive };
        assert_eq!(
            server.add_passive_grab(ROOT_WINDOW, conflicting, false).unwrap_err().code,
            ErrorCode::Access
        );
        server.process_input(BackendEvent::Motion { x: 10, y: 10, time: 0 });
        owner_out.take_packets();
        wm_out.take_packets();

        server.process_input(BackendEvent::ButtonPress { button: 1, time: 0 });
        assert!(owner_out.take_packets().is_empty());
        let packets = wm_out.take_packets();
        assert_eq!(codes(&packets), vec![EventType::ButtonPress as u8]);
        assert_eq!(event_window(&packets[0]), ROOT_WINDOW);
        assert_eq!(server.input.pointer_grab.unwrap().kind, GrabKind::Passive);

        server.process_input(BackendEvent::ButtonRelease { button: 1, time: 0 });
        assert!(server.input.pointer_grab.is_none());
    }

    #[test]
    fn test_send_event_propagation() {
        let mut server = server();
        let (c, out) = connect(&mut server);
        let (other, other_out) = connect(&mut server);
        window(&mut server, c, A, ROOT_WINDOW, (0, 0, 100, 100));
        window(&mut server, c, B, A, (0, 0, 50, 50));
        select(&mut server, other, A, event_mask::STRUCTURE_NOTIFY);
        out.take_packets();
        other_out.take_packets();

        let mut raw = [0u8; 32];
        raw[0] = EventType::ClientMessage as u8;
        server.send_client_event(true, B, event_mask::STRUCTURE_NOTIFY, raw).unwrap();
        let packets = other_out.take_packets();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0][0], EventType::ClientMessage as u8 | SEND_EVENT_FLAG);

        // Empty mask goes to the creator
        server.send_client_event(false, B, 0, raw).unwrap();
        assert_eq!(out.take_packets().len(), 1);
        assert!(other_out.take_packets().is_empty());

        raw[0] = 99;
        assert!(server.send_client_event(false, B, 0, raw).is_err());
    }

    #[test]
    fn test_warp_and_query_pointer() {
        let mut server = server();
        let (c, _) = connect(&mut server);
        window(&mut server, c, A, ROOT_WINDOW, (100, 100, 100, 100));
        server
            .warp_pointer(Warp {
                src_window: NONE,
                dst_window: A,
                src_x: 0,
                src_y: 0,
                src_width: 0,
                src_height: 0,
                dst_x: 5,
                dst_y: 6,
            })
            .unwrap();
        assert_eq!(server.input.pointer_window, A);
        let reply = server.query_pointer(A).unwrap();
        assert_eq!((reply.root_x, reply.root_y), (105, 106));
        assert_eq!((reply.win_x, reply.win_y), (5, 6));
        let root = server.query_pointer(ROOT_WINDOW).unwrap();
        assert_eq!(root.child, A);
    }

    #[test]
    fn test_disconnect_releases_grab() {
        let mut server = server();
        let (c, _) = connect(&mut server);
        let (_other, _) = connect(&mut server);
        server
            .grab_keyboard(c, ROOT_WINDOW, false, false, false, CURRENT_TIME)
            .unwrap();
        assert!(server.input.keyboard_grab.is_some());
        server.disconnect_client(c);
        assert!(server.input.keyboard_grab.is_none());
    }
}
