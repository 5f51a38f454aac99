/// Fixed-timestep accumulator.
///
/// Frame deltas are clamped before they are accumulated, so a stalled
/// frame can never queue an unbounded number of physics ticks.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedStepper {
    fixed_dt: f32,
    max_frame_delta: f32,
    accumulator: f32,
    total_ticks: u64,
}

impl FixedStepper {
    pub fn new(fixed_dt: f32, max_frame_delta: f32) -> Self {
        Self {
            fixed_dt,
            max_frame_delta,
            accumulator: 0.0,
            total_ticks: 0,
        }
    }

    pub fn fixed_dt(&self) -> f32 {
        self.fixed_dt
    }

    pub fn accumulator(&self) -> f32 {
        self.accumulator
    }

    pub fn total_ticks(&self) -> u64 {
        self.total_ticks
    }

    /// Accumulate `delta` and run `tick(fixed_dt)` once per whole fixed step.
    /// Returns the number of ticks run this frame.
    ///
    /// A step that is not positive and finite never ticks.
    pub fn advance(&mut self, delta: f32, mut tick: impl FnMut(f32)) -> u32 {
        if !(self.fixed_dt.is_finite() && self.fixed_dt > 0.0) {
            log::warn!("fixed step {} cannot advance", self.fixed_dt);
            return 0;
        }
        let delta = if delta.is_finite() {
            delta.clamp(0.0, self.max_frame_delta)
        } else {
            log::warn!("ignoring non-finite frame delta {delta}");
            0.0
        };
        self.accumulator += delta;

        let mut ticks = 0;
        while self.accumulator >= self.fixed_dt {
            tick(self.fixed_dt);
            self.accumulator -= self.fixed_dt;
            ticks += 1;
        }
        self.total_ticks += u64::from(ticks);
        ticks
    }

    /// Interpolation alpha for rendering between ticks (0.0 to 1.0).
    pub fn alpha(&self) -> f32 {
        if self.fixed_dt > 0.0 {
            (self.accumulator / self.fixed_dt).min(1.0)
        } else {
            0.0
        }
    }
}
