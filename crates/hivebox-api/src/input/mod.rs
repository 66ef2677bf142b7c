//! Input value types shared between the host and extensions.
//!
//! Two layers of types live here:
//!
//! - **Raw payloads** ([`KeyInput`], [`PointerInput`]): what actually gets
//!   forwarded to a remote client.  The host builds these from the capture
//!   layer's events, and extensions build them when they synthesize input
//!   (e.g. broadcasting a keypress to every client).
//!
//! - **Event views** ([`KeyboardEvent`], [`MouseEvent`]): the per-extension
//!   copy the host constructs for each dispatch round.  A view carries the
//!   resolved target client (possibly none) and the sticky `handled` flag.
//!
//! Every extension in a dispatch round receives its own view; the host ORs
//! each view's `handled` back into the round's accumulated flag after the
//! extension returns, so the flag is monotonic within a round.

use crate::client::ClientHandle;

/// Opaque OS window handle used to correlate captured input with the client
/// window it was aimed at.  Resolution to a client happens in the host via
/// the profile configuration.
pub type WindowHandle = u64;

/// Whether a key transitioned down or up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Down,
    Up,
}

/// Modifier key state captured alongside a key event (Ctrl / Alt / Shift).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers(pub u8);

impl Modifiers {
    pub const CTRL: u8 = 0b001;
    pub const ALT: u8 = 0b010;
    pub const SHIFT: u8 = 0b100;

    pub fn ctrl(self) -> bool {
        self.0 & Self::CTRL != 0
    }

    pub fn alt(self) -> bool {
        self.0 & Self::ALT != 0
    }

    pub fn shift(self) -> bool {
        self.0 & Self::SHIFT != 0
    }
}

/// A single keyboard input payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyInput {
    /// Platform virtual-key code.
    pub key_code: u16,
    /// Down or up transition.
    pub state: KeyState,
    /// Modifier state at capture time.
    pub modifiers: Modifiers,
    /// Milliseconds since system start, from the capture layer.
    pub time_ms: u32,
}

/// Mouse button identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    X1,
    X2,
}

/// Message tag for a pointer event.
///
/// `Move` exists so the capture layer can hand the host a uniform stream; the
/// host drops pure moves before fan-out (they flood extensions with
/// coordinates that are rarely useful and costly to process).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseMessage {
    /// Pointer motion only.  Never forwarded to extensions.
    Move,
    /// A button was pressed.
    ButtonDown(MouseButton),
    /// A button was released.
    ButtonUp(MouseButton),
    /// The wheel was scrolled; positive delta = away from the user.
    Wheel { delta: i16 },
}

/// A single pointer input payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerInput {
    pub message: MouseMessage,
    /// Whether `x`/`y` are absolute screen coordinates or relative motion.
    pub is_absolute: bool,
    pub x: i32,
    pub y: i32,
    /// Raw platform flag bits, passed through untouched.
    pub flags: u32,
    pub time_ms: u32,
}

impl PointerInput {
    /// True for pure pointer-motion events, which the host filters out
    /// before any extension sees them.
    pub fn is_move(&self) -> bool {
        matches!(self.message, MouseMessage::Move)
    }
}

/// Per-extension view of one keyboard event.
#[derive(Debug, Clone)]
pub struct KeyboardEvent {
    /// Resolved target client, if the window handle or the active-client
    /// configuration produced one.
    pub client: Option<ClientHandle>,
    /// Sticky handled flag.  Set it to mark the event consumed; the host
    /// never clears it mid-round.
    pub handled: bool,
    pub input: KeyInput,
}

/// Per-extension view of one mouse event.  Pure moves are filtered before a
/// view is ever constructed.
#[derive(Debug, Clone)]
pub struct MouseEvent {
    pub client: Option<ClientHandle>,
    pub handled: bool,
    pub input: PointerInput,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modifiers_flags_decode() {
        let m = Modifiers(Modifiers::CTRL | Modifiers::SHIFT);
        assert!(m.ctrl());
        assert!(!m.alt());
        assert!(m.shift());
    }

    #[test]
    fn test_pointer_move_is_move() {
        let input = PointerInput {
            message: MouseMessage::Move,
            is_absolute: true,
            x: 10,
            y: 20,
            flags: 0,
            time_ms: 0,
        };
        assert!(input.is_move());
    }

    #[test]
    fn test_pointer_button_and_wheel_are_not_move() {
        let button = PointerInput {
            message: MouseMessage::ButtonDown(MouseButton::Left),
            is_absolute: true,
            x: 0,
            y: 0,
            flags: 0,
            time_ms: 0,
        };
        let wheel = PointerInput {
            message: MouseMessage::Wheel { delta: 120 },
            ..button
        };
        assert!(!button.is_move());
        assert!(!wheel.is_move());
    }
}
