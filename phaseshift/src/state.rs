/// A behavior unit owned by a [`StateMachine`].
///
/// `C` is the context threaded through every hook (for character forms
/// this is [`FormContext`](crate::forms::FormContext)). Implementors are
/// usually enums, one variant per state, carrying the data the state
/// captured on entry.
pub trait State<C: ?Sized>: Sized {
    /// Short name used in transition logs.
    fn name(&self) -> &'static str;

    /// One-time entry action, e.g. applying an impulse.
    fn start(&mut self, _ctx: &mut C) {}

    /// Called once per render frame, before the physics ticks of that frame.
    fn update(&mut self, _ctx: &mut C, _delta: f32) {}

    /// Called once per fixed physics tick.
    fn step(&mut self, _ctx: &mut C, _fixed_delta: f32) {}

    /// Decide the follow-up state after `update`. `frames` counts update
    /// calls since this state became active (1 on the first poll).
    ///
    /// Returning `Some` always transitions. The context is mutable so a
    /// decision can consume an input edge.
    fn next_state(&self, ctx: &mut C, frames: u32) -> Option<Self>;

    /// Undo whatever `start` set up (gravity, damping, flags).
    fn destroy(&mut self, _ctx: &mut C) {}
}

/// Holds exactly one active state.
///
/// The initial state is started lazily on the first `update` (or by an
/// explicit `start`), so construction never needs a context.
#[derive(Debug, Clone)]
pub struct StateMachine<S> {
    active: S,
    frames: u32,
    started: bool,
}

impl<S> StateMachine<S> {
    pub fn new(initial: S) -> Self {
        Self {
            active: initial,
            frames: 0,
            started: false,
        }
    }

    pub fn active(&self) -> &S {
        &self.active
    }

    /// Update calls since the active state was entered.
    pub fn frames(&self) -> u32 {
        self.frames
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Start the initial state. Calling it again is a no-op.
    pub fn start<C: ?Sized>(&mut self, ctx: &mut C)
    where
        S: State<C>,
    {
        if !self.started {
            self.started = true;
            self.frames = 0;
            self.active.start(ctx);
        }
    }

    /// Run the active state's frame logic, then poll for a transition.
    pub fn update<C: ?Sized>(&mut self, ctx: &mut C, delta: f32)
    where
        S: State<C>,
    {
        self.start(ctx);
        self.frames += 1;
        self.active.update(ctx, delta);
        if let Some(next) = self.active.next_state(ctx, self.frames) {
            self.transition(ctx, next);
        }
    }

    /// Forward a fixed tick to whatever state is active now.
    pub fn step<C: ?Sized>(&mut self, ctx: &mut C, fixed_delta: f32)
    where
        S: State<C>,
    {
        if self.started {
            self.active.step(ctx, fixed_delta);
        }
    }

    /// Replace the active state: destroy the old one, start the new one.
    pub fn transition<C: ?Sized>(&mut self, ctx: &mut C, next: S)
    where
        S: State<C>,
    {
        if self.started {
            self.active.destroy(ctx);
        }
        log::debug!("state {} -> {}", self.active.name(), next.name());
        self.active = next;
        self.frames = 0;
        self.started = true;
        self.active.start(ctx);
    }

    /// Tear down the active state. A later `update` starts it again.
    pub fn destroy<C: ?Sized>(&mut self, ctx: &mut C)
    where
        S: State<C>,
    {
        if self.started {
            self.started = false;
            self.active.destroy(ctx);
        }
    }
}
