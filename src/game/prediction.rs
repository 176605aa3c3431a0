//! Client-Side Prediction and Remote-Player Interpolation
//!
//! `Predictor` runs the same `step_mut` the server runs, locally and ahead of
//! it, then reconciles against server snapshots as they arrive.
//! `InterpolationBuffer` is unrelated: it smooths the *remote* player's
//! rendered position between snapshots rather than predicting anything.
//! Neither type has a direct teacher counterpart (the teacher's Bevy client
//! was out of scope) — grounded on jakobhuuse-Netcode-in-Rust's client-side
//! reconciliation loop shape, reusing this crate's own `step_mut` and
//! `InputBuffer` for the actual simulation.

use tracing::warn;

use crate::game::input::{InputBuffer, PlayerInput};
use crate::game::state::{GameState, MatchConfig, PlayerId};
use crate::game::tick::step_mut;

/// Ticks of divergence tolerated before giving up on replay and hard-snapping
/// to the authoritative state.
pub const MAX_REPLAY: u32 = 16;

#[inline]
fn remote_of(id: PlayerId) -> PlayerId {
    1 - id
}

/// Owns the client's speculative mirror of `GameState` and the buffer of
/// locally-applied inputs needed to replay past a rollback point.
pub struct Predictor {
    pub state: GameState,
    local_id: PlayerId,
    pub predicted_tick: u32,
    buffer: InputBuffer,
    prev_local: PlayerInput,
    prev_remote: PlayerInput,
}

impl Predictor {
    pub fn new(state: GameState, local_id: PlayerId) -> Self {
        let predicted_tick = state.tick;
        Self {
            state,
            local_id,
            predicted_tick,
            buffer: InputBuffer::new(),
            prev_local: PlayerInput::NULL,
            prev_remote: PlayerInput::NULL,
        }
    }

    /// Advance the local mirror by one tick with this tick's local input.
    /// The remote player's input is unknown until the next snapshot, so it
    /// falls through `step_mut`'s missing-input rule (holds its last known
    /// input).
    pub fn predict_tick(&mut self, local_input: PlayerInput, config: &MatchConfig) {
        self.predicted_tick += 1;
        self.buffer.insert(self.predicted_tick, local_input);

        let mut inputs: [Option<PlayerInput>; 2] = [None, None];
        inputs[self.local_id as usize] = Some(local_input);

        let mut prev = [PlayerInput::NULL; 2];
        prev[self.local_id as usize] = self.prev_local;
        prev[remote_of(self.local_id) as usize] = self.prev_remote;

        step_mut(&mut self.state, inputs, prev, config);
        self.prev_local = local_input;
    }

    /// Reconcile against an authoritative snapshot. `server_last_buttons` is
    /// the buttons the server actually applied for each player on
    /// `server_tick`, used to seed the missing-input rule for any replay.
    pub fn apply_server_snapshot(
        &mut self,
        server_state: GameState,
        server_tick: u32,
        server_last_buttons: [u8; 2],
        config: &MatchConfig,
    ) {
        self.prev_remote =
            PlayerInput { buttons: server_last_buttons[remote_of(self.local_id) as usize], aim_x: 0.0, aim_y: 0.0 };

        if server_tick >= self.predicted_tick {
            self.state = server_state;
            self.predicted_tick = server_tick;
            self.buffer.prune_up_to(server_tick);
            return;
        }

        let gap = self.predicted_tick - server_tick;
        if gap > MAX_REPLAY {
            warn!(gap, server_tick, predicted_tick = self.predicted_tick, "prediction gap exceeded MAX_REPLAY, hard snapping");
            self.state = server_state;
            self.predicted_tick = server_tick;
            self.buffer.prune_up_to(server_tick);
            return;
        }

        self.state = server_state;
        let mut prev = [PlayerInput::NULL; 2];
        prev[self.local_id as usize] = self.prev_local;
        prev[remote_of(self.local_id) as usize] = self.prev_remote;
        let mut local_input = self.prev_local;
        for t in (server_tick + 1)..=self.predicted_tick {
            local_input = self.buffer.get(t).unwrap_or(local_input);
            let mut inputs: [Option<PlayerInput>; 2] = [None, None];
            inputs[self.local_id as usize] = Some(local_input);

            step_mut(&mut self.state, inputs, prev, config);
            prev[self.local_id as usize] = local_input;
        }
        self.prev_local = local_input;
        self.prev_remote = prev[remote_of(self.local_id) as usize];
        self.buffer.prune_up_to(server_tick);
    }
}

/// Milliseconds of extrapolation permitted past the newest known snapshot
/// before rendering freezes the remote player in place.
pub const MAX_EXTRAPOLATION_MS: f64 = 60.0;
const INTERPOLATION_CAPACITY: usize = 20;

/// One sampled remote-player frame, timestamped by local receive time (not
/// the server tick — the buffer is purely for rendering smoothness).
#[derive(Clone, Copy, Debug)]
pub struct RemoteSnapshot {
    pub receive_time_ms: f64,
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub facing: i32,
    pub state_flags: u8,
}

/// Ring buffer of recent remote-player snapshots, sampled at an arbitrary
/// render time by interpolating between the bracketing pair (or
/// extrapolating past the newest with constant velocity and gravity).
#[derive(Default)]
pub struct InterpolationBuffer {
    entries: Vec<RemoteSnapshot>,
}

impl InterpolationBuffer {
    pub fn new() -> Self {
        Self { entries: Vec::with_capacity(INTERPOLATION_CAPACITY) }
    }

    pub fn push(&mut self, snapshot: RemoteSnapshot) {
        self.entries.push(snapshot);
        if self.entries.len() > INTERPOLATION_CAPACITY {
            self.entries.remove(0);
        }
    }

    /// Render-facing position/velocity/facing/flags at `render_time_ms`.
    /// `None` if the buffer is empty.
    pub fn sample(&self, render_time_ms: f64) -> Option<RemoteSnapshot> {
        if self.entries.is_empty() {
            return None;
        }

        if render_time_ms <= self.entries[0].receive_time_ms {
            return Some(self.entries[0]);
        }

        for pair in self.entries.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if a.receive_time_ms <= render_time_ms && render_time_ms <= b.receive_time_ms {
                let span = b.receive_time_ms - a.receive_time_ms;
                let t = if span > 0.0 { (render_time_ms - a.receive_time_ms) / span } else { 1.0 };
                return Some(RemoteSnapshot {
                    receive_time_ms: render_time_ms,
                    x: a.x + (b.x - a.x) * t,
                    y: a.y + (b.y - a.y) * t,
                    vx: b.vx,
                    vy: b.vy,
                    facing: b.facing,
                    state_flags: b.state_flags,
                });
            }
        }

        let newest = *self.entries.last().unwrap();
        let over_ms = render_time_ms - newest.receive_time_ms;
        if over_ms <= MAX_EXTRAPOLATION_MS {
            let dt_s = over_ms / 1000.0;
            const GRAVITY_PER_S2: f64 = 0.5 * 60.0 * 60.0;
            Some(RemoteSnapshot {
                receive_time_ms: render_time_ms,
                x: newest.x + newest.vx * dt_s,
                y: newest.y + newest.vy * dt_s + 0.5 * GRAVITY_PER_S2 * dt_s * dt_s,
                ..newest
            })
        } else {
            Some(newest)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::map::arena;
    use crate::game::state::MatchConfig;

    fn config() -> MatchConfig {
        MatchConfig { seed: 1, map: arena(), tick_rate: 60, initial_lives: 1, match_duration_ticks: 1800, sudden_death_start_tick: 1200 }
    }

    #[test]
    fn predicting_ahead_then_reconciling_matches_a_fresh_replay() {
        let cfg = config();
        let base = GameState::new(&cfg);
        let mut predictor = Predictor::new(base.clone(), 0);

        for _ in 0..5 {
            predictor.predict_tick(PlayerInput::NULL, &cfg);
        }
        assert_eq!(predictor.predicted_tick, 5);

        let mut server_state = base;
        let prev = [PlayerInput::NULL, PlayerInput::NULL];
        for _ in 0..3 {
            step_mut(&mut server_state, [Some(PlayerInput::NULL), Some(PlayerInput::NULL)], prev, &cfg);
        }
        predictor.apply_server_snapshot(server_state.clone_for_snapshot(), 3, [0, 0], &cfg);

        assert_eq!(predictor.predicted_tick, 5);
        assert_eq!(predictor.state.tick, 5);
    }

    #[test]
    fn gap_beyond_max_replay_hard_snaps() {
        let cfg = config();
        let mut predictor = Predictor::new(GameState::new(&cfg), 0);
        for _ in 0..40 {
            predictor.predict_tick(PlayerInput::NULL, &cfg);
        }
        let server_state = GameState::new(&cfg);
        predictor.apply_server_snapshot(server_state.clone_for_snapshot(), 0, [0, 0], &cfg);
        assert_eq!(predictor.predicted_tick, 0);
        assert_eq!(predictor.state.tick, 0);
    }

    #[test]
    fn interpolation_samples_between_two_points() {
        let mut buf = InterpolationBuffer::new();
        buf.push(RemoteSnapshot { receive_time_ms: 0.0, x: 0.0, y: 0.0, vx: 0.0, vy: 0.0, facing: 1, state_flags: 1 });
        buf.push(RemoteSnapshot { receive_time_ms: 100.0, x: 100.0, y: 0.0, vx: 0.0, vy: 0.0, facing: 1, state_flags: 1 });
        let mid = buf.sample(50.0).unwrap();
        assert_eq!(mid.x, 50.0);
    }

    #[test]
    fn interpolation_freezes_past_max_extrapolation() {
        let mut buf = InterpolationBuffer::new();
        buf.push(RemoteSnapshot { receive_time_ms: 0.0, x: 0.0, y: 0.0, vx: 10.0, vy: 0.0, facing: 1, state_flags: 1 });
        let frozen = buf.sample(10_000.0).unwrap();
        assert_eq!(frozen.x, 0.0);
    }
}
