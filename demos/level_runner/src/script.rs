use phaseshift::{Button, Controls};

/// One button change, `at` frames into the loop.
#[derive(Clone, Copy, Debug)]
pub struct Cue {
    pub at: u32,
    pub button: Button,
    pub down: bool,
}

const fn cue(at: u32, button: Button, down: bool) -> Cue {
    Cue { at, button, down }
}

/// Looping input script, restarted whenever a level (re)starts.
#[derive(Debug, Clone)]
pub struct Timeline {
    cues: Vec<Cue>,
    period: u32,
    frame: u32,
}

impl Timeline {
    pub fn new(mut cues: Vec<Cue>, period: u32) -> Self {
        cues.sort_by_key(|c| c.at);
        Self {
            cues,
            period: period.max(1),
            frame: 0,
        }
    }

    /// Run right, hop every second, dash or phase now and then and try the
    /// next form once per loop.
    pub fn autopilot() -> Self {
        Self::new(
            vec![
                cue(0, Button::Right, true),
                cue(20, Button::Jump, true),
                cue(34, Button::Jump, false),
                cue(50, Button::Action, true),
                cue(56, Button::Action, false),
                cue(80, Button::Jump, true),
                cue(84, Button::Jump, false),
                cue(150, Button::SwitchForm, true),
                cue(152, Button::SwitchForm, false),
            ],
            180,
        )
    }

    pub fn restart(&mut self, controls: &mut Controls) {
        controls.release_all();
        self.frame = 0;
    }

    /// Apply the cues due this frame and advance.
    pub fn apply(&mut self, controls: &mut Controls) {
        let at = self.frame % self.period;
        for c in self.cues.iter().filter(|c| c.at == at) {
            controls.set(c.button, c.down);
        }
        self.frame += 1;
    }
}
