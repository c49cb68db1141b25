//! # trap_engine
//!
//! Event scheduling and Standard MIDI File encoding for the serpentine
//! trap engine.  Takes the four event timelines produced by
//! [`trap_patterns`], resolves them into delta-timed instruction
//! sequences (note-on / pitch-bend steps / note-off), and serialises a
//! format-1 SMF — byte-for-byte deterministic for a given [`Params`].
//!
//! ## Quick start
//!
//! ```rust
//! use trap_patterns::{Params, Slither};
//! use trap_engine::{generate, describe};
//!
//! let params = Params::new("F_Minor", 53, 130, Slither::new(2000, 5.0), 0.5)
//!     .unwrap();
//!
//! let bytes = generate(&params).unwrap();
//! assert_eq!(&bytes[0..4], b"MThd");
//!
//! let record = describe(&params);
//! assert_eq!(record.filename, "Trap_F_Minor_130_Slither5_Rattle0.5.mid");
//! ```
//!
//! ## Track layout
//!
//! | # | Timeline | Leading meta | Channel |
//! |---|---|---|---|
//! | 0 | Rhythm (hats) | tempo | 0 |
//! | 1 | Bass (808) | program 38, Synth Bass 1 | 0 |
//! | 2 | Percussion (kick/snare) | — | 0 |
//! | 3 | Atmosphere (cluster pads) | program 97, FX Soundtrack | 0 |

use serde::Serialize;
use thiserror::Error;
use trap_patterns::{
    atmosphere_events, bass_events, percussion_events, rhythm_events, Grid, NoteEvent,
    ParamError, Params,
};

/// GM program for the 808 bass track: Synth Bass 1.
pub const SYNTH_BASS: u8 = 38;
/// GM program for the atmosphere track: FX 2 (Soundtrack).
pub const SOUNDTRACK_PAD: u8 = 97;

/// Bend steps synthesised per enveloped note (one wiggle cycle).
const WIGGLES: u32 = 4;

// ════════════════════════════════════════════════════════════════════════════
// Errors
// ════════════════════════════════════════════════════════════════════════════

/// Engine failures.  Pitch-bend overflow is *not* here: out-of-range bend
/// values clamp to the 14-bit range by documented policy.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum EngineError {
    #[error(transparent)]
    Param(#[from] ParamError),
    #[error("velocity {0} out of range 0–127")]
    VelocityOutOfRange(u8),
    #[error("pitch {0} out of range 0–127")]
    PitchOutOfRange(u8),
}

// ════════════════════════════════════════════════════════════════════════════
// Instruction — one primitive of a delta-timed track sequence
// ════════════════════════════════════════════════════════════════════════════

/// A primitive track instruction.  Channel events carry the delta (ticks
/// since the previous instruction in the same track); leading meta
/// instructions always encode at delta 0.
///
/// The running sum of deltas up to any instruction is that instruction's
/// absolute tick position — sequences are append-only once scheduled.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Instruction {
    Tempo { micros_per_quarter: u32 },
    Program { program: u8 },
    NoteOn { pitch: u8, velocity: u8, delta: u32 },
    PitchBend { value: i16, delta: u32 },
    NoteOff { pitch: u8, delta: u32 },
}

/// One named track: an instruction sequence bound to a MIDI channel.
#[derive(Clone, Debug, PartialEq)]
pub struct Track {
    pub name:         &'static str,
    pub channel:      u8,
    pub instructions: Vec<Instruction>,
}

impl Track {
    fn new(name: &'static str, instructions: Vec<Instruction>) -> Self {
        Track { name, channel: 0, instructions }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Scheduler — events to delta-timed instructions
// ════════════════════════════════════════════════════════════════════════════

/// Resolve an unordered event list into a delta-timed instruction sequence.
///
/// Events are stable-sorted by start tick (ties keep emission order).
/// A running cursor tracks the end of the previous note; a start tick
/// behind the cursor yields a zero delta, silently absorbing the overlap.
/// That clamp is a policy the file structure depends on, not an error —
/// the bass line deliberately overlaps itself by 80 ticks at the
/// beat-10 → beat-0 seam, and the atmosphere pairs start simultaneously.
///
/// Enveloped events expand into `WIGGLES` pitch-bend steps of
/// `duration / WIGGLES` ticks each, then a note-off and a final centering
/// bend at delta 0.
pub fn schedule(events: &[NoteEvent]) -> Result<Vec<Instruction>, EngineError> {
    let mut sorted = events.to_vec();
    sorted.sort_by_key(|e| e.start);

    let mut out = Vec::new();
    let mut last_tick: u32 = 0;

    for e in &sorted {
        if e.velocity > 127 {
            return Err(EngineError::VelocityOutOfRange(e.velocity));
        }
        if e.pitch > 127 {
            return Err(EngineError::PitchOutOfRange(e.pitch));
        }

        let delta = e.start.saturating_sub(last_tick);
        out.push(Instruction::NoteOn { pitch: e.pitch, velocity: e.velocity, delta });

        match e.slither {
            None => {
                out.push(Instruction::NoteOff { pitch: e.pitch, delta: e.duration });
            }
            Some(slither) => {
                let wiggle_len = e.duration / WIGGLES;
                for value in slither.offsets(WIGGLES) {
                    out.push(Instruction::PitchBend { value, delta: wiggle_len });
                }
                out.push(Instruction::NoteOff { pitch: e.pitch, delta: 0 });
                out.push(Instruction::PitchBend { value: 0, delta: 0 });
            }
        }
        last_tick = e.start + e.duration;
    }
    Ok(out)
}

// ════════════════════════════════════════════════════════════════════════════
// Composition — the four scheduled tracks of one parameter tuple
// ════════════════════════════════════════════════════════════════════════════

/// Four scheduled tracks plus the shared MIDI division, ready to encode.
/// Built per [`Params`], consumed once by [`encode`].
#[derive(Clone, Debug, PartialEq)]
pub struct Composition {
    pub ticks_per_quarter: u16,
    pub tracks:            Vec<Track>,
}

impl Composition {
    /// Generate and schedule all four timelines for one parameter tuple.
    ///
    /// Track 0 leads with the tempo meta (`60_000_000 / bpm`); the bass
    /// and atmosphere tracks lead with their program selects.
    pub fn render(params: &Params, grid: &Grid) -> Result<Self, EngineError> {
        params.validate()?;

        let mut rhythm = vec![Instruction::Tempo {
            micros_per_quarter: 60_000_000 / params.bpm,
        }];
        rhythm.extend(schedule(&rhythm_events(params, grid))?);

        let mut bass = vec![Instruction::Program { program: SYNTH_BASS }];
        bass.extend(schedule(&bass_events(params, grid))?);

        let percussion = schedule(&percussion_events(params, grid))?;

        let mut atmosphere = vec![Instruction::Program { program: SOUNDTRACK_PAD }];
        atmosphere.extend(schedule(&atmosphere_events(params, grid))?);

        Ok(Composition {
            ticks_per_quarter: grid.ticks_per_quarter(),
            tracks: vec![
                Track::new("Rhythm", rhythm),
                Track::new("Bass", bass),
                Track::new("Percussion", percussion),
                Track::new("Atmosphere", atmosphere),
            ],
        })
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Encoder — Composition to SMF format-1 bytes
// ════════════════════════════════════════════════════════════════════════════

/// Serialise a composition to a complete format-1 SMF byte vector.
pub fn encode(composition: &Composition) -> Vec<u8> {
    let mut out = Vec::new();

    // ── Header chunk: MThd, length 6, format 1, track count, division ──
    out.extend_from_slice(b"MThd");
    out.extend_from_slice(&6u32.to_be_bytes());
    out.extend_from_slice(&1u16.to_be_bytes());
    out.extend_from_slice(&(composition.tracks.len() as u16).to_be_bytes());
    out.extend_from_slice(&composition.ticks_per_quarter.to_be_bytes());

    for track in &composition.tracks {
        let chunk = track_chunk(track);
        out.extend_from_slice(b"MTrk");
        out.extend_from_slice(&(chunk.len() as u32).to_be_bytes());
        out.extend_from_slice(&chunk);
    }
    out
}

fn track_chunk(track: &Track) -> Vec<u8> {
    let mut t = Vec::new();
    let ch = track.channel & 0x0F;

    // ── Track name meta-event ─────────────────────────────────────────
    let name = track.name.as_bytes();
    t.push(0x00);
    t.push(0xFF);
    t.push(0x03);
    push_vlq(&mut t, name.len() as u32);
    t.extend_from_slice(name);

    for ins in &track.instructions {
        match *ins {
            Instruction::Tempo { micros_per_quarter } => {
                t.extend_from_slice(&[0x00, 0xFF, 0x51, 0x03]);
                t.push((micros_per_quarter >> 16) as u8);
                t.push((micros_per_quarter >> 8) as u8);
                t.push(micros_per_quarter as u8);
            }
            Instruction::Program { program } => {
                t.push(0x00);
                t.push(0xC0 | ch);
                t.push(program & 0x7F);
            }
            Instruction::NoteOn { pitch, velocity, delta } => {
                push_vlq(&mut t, delta);
                t.push(0x90 | ch);
                t.push(pitch);
                t.push(velocity);
            }
            Instruction::PitchBend { value, delta } => {
                // Wire format is the bend value rebased to 0..=16383,
                // split into 7-bit LSB/MSB.
                push_vlq(&mut t, delta);
                let raw = (value as i32 + 8192) as u16;
                t.push(0xE0 | ch);
                t.push((raw & 0x7F) as u8);
                t.push(((raw >> 7) & 0x7F) as u8);
            }
            Instruction::NoteOff { pitch, delta } => {
                push_vlq(&mut t, delta);
                t.push(0x80 | ch);
                t.push(pitch);
                t.push(0x00);
            }
        }
    }

    // ── End of Track meta-event ───────────────────────────────────────
    t.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]);
    t
}

/// Append a MIDI variable-length quantity.
fn push_vlq(out: &mut Vec<u8>, mut value: u32) {
    let mut groups = [0u8; 5];
    let mut n = 0;
    loop {
        groups[n] = (value & 0x7F) as u8;
        value >>= 7;
        n += 1;
        if value == 0 {
            break;
        }
    }
    for i in (0..n).rev() {
        out.push(if i == 0 { groups[i] } else { groups[i] | 0x80 });
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Public surface — generate / describe
// ════════════════════════════════════════════════════════════════════════════

/// Manifest record for one parameter tuple: the output filename plus the
/// fields that determined it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrackRecord {
    pub filename:          String,
    pub key:               String,
    pub bpm:               u32,
    pub slither_magnitude: i32,
    pub slither_frequency: f64,
    pub rattle:            f64,
}

/// Render one parameter tuple to a complete SMF byte vector.
///
/// Pure and deterministic: identical tuples yield byte-identical output.
/// Fails before producing any bytes; never returns a partial file.
pub fn generate(params: &Params) -> Result<Vec<u8>, EngineError> {
    let composition = Composition::render(params, &Grid::default())?;
    Ok(encode(&composition))
}

/// Manifest record for one parameter tuple.
pub fn describe(params: &Params) -> TrackRecord {
    TrackRecord {
        filename: format!(
            "Trap_{}_{}_Slither{}_Rattle{}.mid",
            params.key, params.bpm, params.slither.frequency, params.rattle
        ),
        key:               params.key.clone(),
        bpm:               params.bpm,
        slither_magnitude: params.slither.magnitude,
        slither_frequency: params.slither.frequency,
        rattle:            params.rattle,
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
