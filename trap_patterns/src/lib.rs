//! # trap_patterns
//!
//! Pattern generators for short serpentine trap compositions.  A single
//! [`Params`] tuple fully determines four concurrent note-event timelines:
//!
//! * **Rhythm** — eighth-note hi-hats that burst into machine-gun rolls
//!   toward the end of each bar, driven by the *rattle* factor
//! * **Bass** — an 808 line carrying a sine-shaped pitch envelope
//!   (the *slither*), resolved downstream into pitch-bend steps
//! * **Percussion** — kick/snare strikes on a fixed grid
//! * **Atmosphere** — sustained dissonant semitone pairs every two bars
//!
//! Generation is pure and deterministic: no randomness, no I/O, no shared
//! state.  Each generator consumes `(params, grid)` over the step index
//! space `0..grid.total_steps()` and returns a finished event list; event
//! ordering and delta-time accounting belong to the scheduler, not here.
//!
//! ## Quick start
//!
//! ```rust
//! use trap_patterns::{Grid, Params, Slither, rhythm_events, bass_events};
//!
//! let grid = Grid::default();
//! let params = Params::new("F_Minor", 53, 130, Slither::new(2000, 5.0), 0.5)
//!     .unwrap();
//!
//! let hats = rhythm_events(&params, &grid);
//! let bass = bass_events(&params, &grid);
//! assert!(bass.iter().all(|e| e.slither.is_some()));
//! assert!(hats.iter().all(|e| e.slither.is_none()));
//! ```

use serde::Serialize;
use thiserror::Error;

// ════════════════════════════════════════════════════════════════════════════
// Reference data — keys, scale shape, drum map
// ════════════════════════════════════════════════════════════════════════════

/// Key name → root MIDI note, the keys the batch grid sweeps over.
pub const KEYS: &[(&str, u8)] = &[
    ("F_Minor", 53),
    ("G_Minor", 55),
    ("C_Minor", 48),
];

/// Phrygian scale shape: root, b2, b3, 4, 5, b6, b7.
///
/// Reference data for the melodic/harmonic language of the library; the
/// generators use fixed offsets from the root rather than walking this
/// table, but the b2 (`1`) is where the atmosphere cluster's rub comes from.
pub const PHRYGIAN: [u8; 7] = [0, 1, 3, 5, 7, 8, 10];

/// Closed hi-hat, General MIDI drum map.
pub const CLOSED_HAT: u8 = 42;
/// Kick drum, General MIDI drum map.
pub const KICK: u8 = 36;
/// Snare drum, General MIDI drum map.
pub const SNARE: u8 = 38;

/// Look up the root MIDI note for a key name.
///
/// ```rust
/// assert_eq!(trap_patterns::key_root("G_Minor"), Some(55));
/// assert_eq!(trap_patterns::key_root("H_Minor"), None);
/// ```
pub fn key_root(name: &str) -> Option<u8> {
    KEYS.iter().find(|(k, _)| *k == name).map(|(_, root)| *root)
}

// ════════════════════════════════════════════════════════════════════════════
// Grid — structural constants, passed explicitly into every generator
// ════════════════════════════════════════════════════════════════════════════

/// Step-grid geometry of one composition.
///
/// One step is a sixteenth note.  The default grid is 8 bars of 16 steps
/// at 120 ticks per step (480 ticks per quarter note).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Grid {
    /// Bars per composition.
    pub bars:          u32,
    /// Sixteenth-note steps per bar.
    pub steps_per_bar: u32,
    /// MIDI ticks per step.
    pub ticks_per_step: u32,
}

impl Default for Grid {
    fn default() -> Self {
        Grid { bars: 8, steps_per_bar: 16, ticks_per_step: 120 }
    }
}

impl Grid {
    /// Total step count of the composition.
    pub const fn total_steps(&self) -> u32 {
        self.bars * self.steps_per_bar
    }

    /// MIDI division (ticks per quarter note): four steps to the quarter.
    pub const fn ticks_per_quarter(&self) -> u16 {
        (self.ticks_per_step * 4) as u16
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Slither — sine-shaped pitch-envelope spec + synthesis
// ════════════════════════════════════════════════════════════════════════════

/// Lowest pitch-bend value (signed 14-bit).
pub const BEND_MIN: i32 = -8192;
/// Highest pitch-bend value (signed 14-bit).
pub const BEND_MAX: i32 = 8191;

/// Parameters for on-the-fly sine-bend synthesis: a wiggle `magnitude`
/// in pitch-bend units and a `frequency` factor in radians per sample.
///
/// The spec is carried on a [`NoteEvent`] and sampled later; generation
/// only records intent.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Slither {
    pub magnitude: i32,
    pub frequency: f64,
}

impl Slither {
    pub fn new(magnitude: i32, frequency: f64) -> Self {
        Slither { magnitude, frequency }
    }

    /// Sample one cycle of the wiggle at `samples` points.
    ///
    /// Sample `w` is `round(sin(w · frequency) · magnitude)`, clamped to
    /// the signed 14-bit pitch-bend range.  Out-of-range magnitudes are
    /// therefore lossy by policy, never an error.
    ///
    /// ```rust
    /// use trap_patterns::Slither;
    /// let s = Slither::new(2000, 5.0);
    /// assert_eq!(s.offsets(4), vec![0, -1918, -1088, 1301]);
    /// ```
    pub fn offsets(&self, samples: u32) -> Vec<i16> {
        (0..samples)
            .map(|w| {
                let raw = ((w as f64 * self.frequency).sin() * self.magnitude as f64)
                    .round() as i64;
                raw.clamp(BEND_MIN as i64, BEND_MAX as i64) as i16
            })
            .collect()
    }
}

// ════════════════════════════════════════════════════════════════════════════
// NoteEvent — one discrete musical hit
// ════════════════════════════════════════════════════════════════════════════

/// A single note hit on a timeline, before scheduling.
///
/// `start` and `duration` are in MIDI ticks.  Events carry no ordering
/// guarantee at creation; the scheduler establishes stable ascending
/// order by `start`.
#[derive(Clone, Debug, PartialEq)]
pub struct NoteEvent {
    pub pitch:    u8,
    pub velocity: u8,
    pub start:    u32,
    pub duration: u32,
    /// Pitch-envelope intent, resolved into bend steps by the scheduler.
    pub slither:  Option<Slither>,
}

impl NoteEvent {
    fn plain(pitch: u8, velocity: u8, start: u32, duration: u32) -> Self {
        NoteEvent { pitch, velocity, start, duration, slither: None }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Params — the parameter tuple driving one composition
// ════════════════════════════════════════════════════════════════════════════

/// Parameter-validation failures, rejected at entry and never clamped.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ParamError {
    #[error("bpm {0} outside supported range 4–1000")]
    Bpm(u32),
    #[error("root note {0} outside supported range 24–114")]
    Root(u8),
    #[error("rattle factor {0} must be finite and non-negative")]
    Rattle(f64),
    #[error("slither frequency {0} must be finite")]
    SlitherFrequency(f64),
}

/// One point of the parameter sweep.  Immutable; fully determines one
/// generated composition.
///
/// Construct through [`Params::new`], which enforces the ranges the
/// generators rely on (the bass sits two octaves below `root`, the
/// atmosphere a ninth above, so `root` must leave room on both sides;
/// the tempo meta event stores `60_000_000 / bpm` in 24 bits).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Params {
    pub key:     String,
    pub root:    u8,
    pub bpm:     u32,
    pub slither: Slither,
    pub rattle:  f64,
}

impl Params {
    pub fn new(
        key: &str,
        root: u8,
        bpm: u32,
        slither: Slither,
        rattle: f64,
    ) -> Result<Self, ParamError> {
        let params = Params { key: key.to_string(), root, bpm, slither, rattle };
        params.validate()?;
        Ok(params)
    }

    /// Re-check the invariants enforced by [`Params::new`].
    pub fn validate(&self) -> Result<(), ParamError> {
        if self.bpm < 4 || self.bpm > 1000 {
            return Err(ParamError::Bpm(self.bpm));
        }
        if self.root < 24 || self.root > 114 {
            return Err(ParamError::Root(self.root));
        }
        if !self.rattle.is_finite() || self.rattle < 0.0 {
            return Err(ParamError::Rattle(self.rattle));
        }
        if !self.slither.frequency.is_finite() {
            return Err(ParamError::SlitherFrequency(self.slither.frequency));
        }
        Ok(())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Generators — one per timeline, sharing the step-iteration contract
// ════════════════════════════════════════════════════════════════════════════

/// Hi-hat timeline: eighth-note ticks that accelerate into bursts.
///
/// On every even step, the normalized position inside the bar decides
/// between a standard tick and a four-hit burst.  The burst fires when
/// `progress > 0.5` **and** `progress · rattle > 0.6`, so trigger density
/// rises monotonically with the rattle factor and with position in the
/// bar.  Burst hits fade linearly: velocities 110, 95, 80, 65.
pub fn rhythm_events(params: &Params, grid: &Grid) -> Vec<NoteEvent> {
    let mut events = Vec::new();
    let sub_dur = grid.ticks_per_step * 2 / 4;

    for i in (0..grid.total_steps()).step_by(2) {
        let t = i * grid.ticks_per_step;
        let progress = (i % grid.steps_per_bar) as f64 / grid.steps_per_bar as f64;

        if progress > 0.5 && progress * params.rattle > 0.6 {
            for r in 0..4u32 {
                events.push(NoteEvent::plain(
                    CLOSED_HAT,
                    (110 - 15 * r) as u8,
                    t + r * sub_dur,
                    sub_dur,
                ));
            }
        } else {
            events.push(NoteEvent::plain(CLOSED_HAT, 90, t, 50));
        }
    }
    events
}

/// 808 bass timeline: hits on the kick anchors, each carrying the
/// slither envelope for later bend synthesis.
///
/// Triggers on beat 0 of every bar, plus beat 10 of even bars within
/// each four-bar phrase.  The note sits two octaves below the root.
pub fn bass_events(params: &Params, grid: &Grid) -> Vec<NoteEvent> {
    let mut events = Vec::new();

    for i in 0..grid.total_steps() {
        let beat = i % grid.steps_per_bar;
        let bar_pos = (i / grid.steps_per_bar) % 4;

        if beat == 0 || (beat == 10 && bar_pos % 2 == 0) {
            events.push(NoteEvent {
                pitch:    params.root - 24,
                velocity: 120,
                start:    i * grid.ticks_per_step,
                duration: 800,
                slither:  Some(params.slither),
            });
        }
    }
    events
}

/// Kick/snare timeline: kicks on beats 0 and 10, snare on beat 8.
pub fn percussion_events(_params: &Params, grid: &Grid) -> Vec<NoteEvent> {
    let mut events = Vec::new();

    for i in 0..grid.total_steps() {
        let beat = i % grid.steps_per_bar;
        let t = i * grid.ticks_per_step;

        if beat == 0 || beat == 10 {
            events.push(NoteEvent::plain(KICK, 127, t, 100));
        }
        if beat == 8 {
            events.push(NoteEvent::plain(SNARE, 127, t, 100));
        }
    }
    events
}

/// Atmosphere timeline: every 32 steps, a sustained dissonant pair —
/// the octave above the root against the b2 above that (the Phrygian rub).
pub fn atmosphere_events(params: &Params, grid: &Grid) -> Vec<NoteEvent> {
    let mut events = Vec::new();

    for i in 0..grid.total_steps() {
        if i % 32 == 0 {
            let t = i * grid.ticks_per_step;
            events.push(NoteEvent::plain(params.root + 12, 60, t, 3800));
            events.push(NoteEvent::plain(params.root + 13, 60, t, 3800));
        }
    }
    events
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn params(rattle: f64) -> Params {
        Params::new("F_Minor", 53, 130, Slither::new(2000, 5.0), rattle).unwrap()
    }

    // ── reference data ───────────────────────────────────────────────────
    #[test]
    fn key_lookup() {
        assert_eq!(key_root("F_Minor"), Some(53));
        assert_eq!(key_root("C_Minor"), Some(48));
        assert_eq!(key_root("B_Minor"), None);
    }

    #[test]
    fn phrygian_has_flat_second() {
        assert_eq!(PHRYGIAN[1], 1);
        assert_eq!(PHRYGIAN.len(), 7);
    }

    #[test]
    fn default_grid_geometry() {
        let g = Grid::default();
        assert_eq!(g.total_steps(), 128);
        assert_eq!(g.ticks_per_quarter(), 480);
    }

    // ── params validation ────────────────────────────────────────────────
    #[test]
    fn rejects_zero_bpm() {
        let r = Params::new("F_Minor", 53, 0, Slither::new(2000, 5.0), 0.5);
        assert_eq!(r, Err(ParamError::Bpm(0)));
    }

    #[test]
    fn rejects_root_without_bass_headroom() {
        // Bass is root − 24; root 20 would underflow the note range.
        let r = Params::new("X", 20, 130, Slither::new(2000, 5.0), 0.5);
        assert_eq!(r, Err(ParamError::Root(20)));
    }

    #[test]
    fn rejects_negative_rattle() {
        let r = Params::new("F_Minor", 53, 130, Slither::new(2000, 5.0), -0.1);
        assert!(matches!(r, Err(ParamError::Rattle(_))));
    }

    #[test]
    fn rejects_nan_slither_frequency() {
        let r = Params::new("F_Minor", 53, 130, Slither::new(2000, f64::NAN), 0.5);
        assert!(matches!(r, Err(ParamError::SlitherFrequency(_))));
    }

    // ── slither synthesis ────────────────────────────────────────────────
    #[test]
    fn slither_offsets_sample_the_sine() {
        // sin(0)=0, sin(5)≈−0.9589, sin(10)≈−0.5440, sin(15)≈0.6503
        let s = Slither::new(2000, 5.0);
        assert_eq!(s.offsets(4), vec![0, -1918, -1088, 1301]);
    }

    #[test]
    fn slither_offsets_clamp_to_bend_range() {
        let s = Slither::new(9000, std::f64::consts::FRAC_PI_2);
        let o = s.offsets(4);
        assert_eq!(o[1], BEND_MAX as i16); // sin(π/2) = 1 → 9000 → clamp
        assert_eq!(o[3], BEND_MIN as i16); // sin(3π/2) = −1 → −9000 → clamp
        assert!(o.iter().all(|&v| (BEND_MIN..=BEND_MAX).contains(&(v as i32))));
    }

    // ── rhythm generator ─────────────────────────────────────────────────
    #[test]
    fn low_rattle_never_bursts() {
        // Max progress on the even-step grid is 0.875; 0.875·0.5 < 0.6.
        let evs = rhythm_events(&params(0.5), &Grid::default());
        assert_eq!(evs.len(), 64);
        assert!(evs.iter().all(|e| e.velocity == 90 && e.duration == 50));
    }

    #[test]
    fn burst_at_three_quarter_bar() {
        // progress 0.75 at step 12: 0.75·1.2 = 0.9 > 0.6 → machine gun.
        let evs = rhythm_events(&params(1.2), &Grid::default());
        let step_12: Vec<_> = evs
            .iter()
            .filter(|e| e.start >= 1440 && e.start < 1680)
            .collect();
        assert_eq!(step_12.len(), 4);
        let vels: Vec<u8> = step_12.iter().map(|e| e.velocity).collect();
        assert_eq!(vels, vec![110, 95, 80, 65]);
        assert_eq!(step_12[0].start, 1440);
        assert_eq!(step_12[1].start, 1500);
        assert!(step_12.iter().all(|e| e.duration == 60));
    }

    #[test]
    fn burst_count_grows_with_rattle() {
        let grid = Grid::default();
        let bursts = |k: f64| {
            rhythm_events(&params(k), &grid)
                .iter()
                .filter(|e| e.duration == 60)
                .count()
        };
        // 0, 1 and 3 burst steps per bar over 8 bars, 4 hits each.
        assert_eq!(bursts(0.5), 0);
        assert_eq!(bursts(0.8), 32);
        assert_eq!(bursts(1.2), 96);
        assert!(bursts(0.5) <= bursts(0.8) && bursts(0.8) <= bursts(1.2));
    }

    #[test]
    fn rhythm_stays_on_the_hat() {
        let evs = rhythm_events(&params(1.2), &Grid::default());
        assert!(evs.iter().all(|e| e.pitch == CLOSED_HAT));
    }

    // ── bass generator ───────────────────────────────────────────────────
    #[test]
    fn bass_hits_and_envelope() {
        let p = params(0.5);
        let evs = bass_events(&p, &Grid::default());
        // Beat 0 of all 8 bars + beat 10 of bars 0,2 in each 4-bar phrase.
        assert_eq!(evs.len(), 12);
        for e in &evs {
            assert_eq!(e.pitch, 53 - 24);
            assert_eq!(e.velocity, 120);
            assert_eq!(e.duration, 800);
            assert_eq!(e.slither, Some(p.slither));
        }
    }

    #[test]
    fn bass_beat_ten_only_on_even_bars() {
        let evs = bass_events(&params(0.5), &Grid::default());
        let beat_ten: Vec<u32> = evs
            .iter()
            .map(|e| e.start / 120)
            .filter(|step| step % 16 == 10)
            .collect();
        assert_eq!(beat_ten, vec![10, 42, 74, 106]);
    }

    // ── percussion generator ─────────────────────────────────────────────
    #[test]
    fn percussion_counts() {
        let evs = percussion_events(&params(0.5), &Grid::default());
        let kicks = evs.iter().filter(|e| e.pitch == KICK).count();
        let snares = evs.iter().filter(|e| e.pitch == SNARE).count();
        assert_eq!(kicks, 16); // two per bar
        assert_eq!(snares, 8); // one per bar
        assert!(evs.iter().all(|e| e.velocity == 127 && e.duration == 100));
    }

    // ── atmosphere generator ─────────────────────────────────────────────
    #[test]
    fn atmosphere_semitone_pairs() {
        let evs = atmosphere_events(&params(0.5), &Grid::default());
        assert_eq!(evs.len(), 8); // steps 0, 32, 64, 96 × two notes
        for pair in evs.chunks(2) {
            assert_eq!(pair[0].start, pair[1].start);
            assert_eq!(pair[0].pitch, 53 + 12);
            assert_eq!(pair[1].pitch, 53 + 13);
            assert_eq!(pair[0].duration, 3800);
        }
    }

    // ── determinism across the board ─────────────────────────────────────
    #[test]
    fn generators_are_deterministic() {
        let p = params(0.8);
        let g = Grid::default();
        assert_eq!(rhythm_events(&p, &g), rhythm_events(&p, &g));
        assert_eq!(bass_events(&p, &g), bass_events(&p, &g));
        assert_eq!(percussion_events(&p, &g), percussion_events(&p, &g));
        assert_eq!(atmosphere_events(&p, &g), atmosphere_events(&p, &g));
    }
}
