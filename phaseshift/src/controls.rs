//! Debounced button state and pointer location fed by the host.
//!
//! The host translates its own key/touch events into [`Controls::press`],
//! [`Controls::release`] and [`Controls::set_pointer`]. Forms read levels
//! with [`Controls::is_pressed`] and consume edges with
//! [`Controls::is_pressed_unique`].

use crate::math::Vec2;

/// Logical buttons understood by the character forms.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Button {
    Left,
    Right,
    Jump,
    /// Form ability: dash, phase, throw.
    Action,
    SwitchForm,
}

impl Button {
    pub const ALL: [Button; 5] = [
        Button::Left,
        Button::Right,
        Button::Jump,
        Button::Action,
        Button::SwitchForm,
    ];

    const fn index(self) -> usize {
        match self {
            Button::Left => 0,
            Button::Right => 1,
            Button::Jump => 2,
            Button::Action => 3,
            Button::SwitchForm => 4,
        }
    }
}

/// Level and edge state of a single button.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ButtonState {
    down: bool,
    /// Set on a fresh press, cleared when the edge is consumed or the
    /// button is released.
    armed: bool,
}

impl ButtonState {
    fn press(&mut self) {
        if !self.down {
            self.down = true;
            self.armed = true;
        }
    }

    fn release(&mut self) {
        self.down = false;
        self.armed = false;
    }
}

#[derive(Clone, Debug, Default)]
pub struct Controls {
    buttons: [ButtonState; 5],
    pointer: Option<Vec2>,
}

impl Controls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a press. Repeated presses while held do not re-arm the edge.
    pub fn press(&mut self, button: Button) {
        self.buttons[button.index()].press();
    }

    pub fn release(&mut self, button: Button) {
        self.buttons[button.index()].release();
    }

    pub fn set(&mut self, button: Button, down: bool) {
        if down {
            self.press(button);
        } else {
            self.release(button);
        }
    }

    pub fn release_all(&mut self) {
        for state in &mut self.buttons {
            state.release();
        }
    }

    /// Returns true while the button is held.
    pub fn is_pressed(&self, button: Button) -> bool {
        self.buttons[button.index()].down
    }

    /// Returns true once per continuous press, consuming the edge.
    pub fn is_pressed_unique(&mut self, button: Button) -> bool {
        let state = &mut self.buttons[button.index()];
        if state.down && state.armed {
            state.armed = false;
            true
        } else {
            false
        }
    }

    /// Drop any unconsumed edge so the button must be released and pressed
    /// again before `is_pressed_unique` fires. Idempotent.
    pub fn require_unique_press(&mut self, button: Button) {
        self.buttons[button.index()].armed = false;
    }

    /// -1.0 for left, 1.0 for right, 0.0 for neither or both.
    pub fn horizontal(&self) -> f32 {
        let mut axis = 0.0;
        if self.is_pressed(Button::Left) {
            axis -= 1.0;
        }
        if self.is_pressed(Button::Right) {
            axis += 1.0;
        }
        axis
    }

    /// Pointer/touch location in world coordinates, if any.
    pub fn pointer(&self) -> Option<Vec2> {
        self.pointer
    }

    pub fn set_pointer(&mut self, pointer: Option<Vec2>) {
        self.pointer = pointer;
    }
}
