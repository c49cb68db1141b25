//! # trap_forge
//!
//! Batch driver for the serpentine trap engine: enumerates the full
//! parameter grid (key × tempo × slither × rattle), renders every
//! combination to a `.mid` file, and writes a JSON manifest describing
//! the library.
//!
//! Each tuple is generated independently by a pure function, so the sweep
//! is embarrassingly parallel — rendering fans out over a rayon pool with
//! no shared state beyond the output directory.

use std::fs;
use std::io::BufWriter;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::Serialize;
use tracing::info;

use trap_engine::{describe, generate, TrackRecord};
use trap_patterns::{ParamError, Params, Slither, KEYS};

// ════════════════════════════════════════════════════════════════════════════
// The sweep grid
// ════════════════════════════════════════════════════════════════════════════

/// Tempo sweep: 130 to 160 BPM in steps of 5.
pub const BPMS: std::ops::Range<u32> = 130..165;
const BPM_STEP: u32 = 5;

/// Slither sweep: (magnitude, frequency) pairs for the 808 sine bend.
pub const SLITHERS: [(i32, f64); 3] = [(2000, 5.0), (4000, 8.0), (8192, 12.0)];

/// Rattle sweep: how hard the hats accelerate toward each bar's end.
pub const RATTLES: [f64; 3] = [0.5, 0.8, 1.2];

/// Enumerate every tuple of the grid, in deterministic order.
pub fn grid() -> Result<Vec<Params>, ParamError> {
    let mut params = Vec::new();
    for (key, root) in KEYS {
        for bpm in BPMS.step_by(BPM_STEP as usize) {
            for (magnitude, frequency) in SLITHERS {
                for rattle in RATTLES {
                    params.push(Params::new(
                        key,
                        *root,
                        bpm,
                        Slither::new(magnitude, frequency),
                        rattle,
                    )?);
                }
            }
        }
    }
    Ok(params)
}

// ════════════════════════════════════════════════════════════════════════════
// Manifest
// ════════════════════════════════════════════════════════════════════════════

/// One manifest row: the engine's record plus the library's author tag.
#[derive(Clone, Debug, Serialize)]
pub struct ManifestEntry {
    #[serde(flatten)]
    pub record: TrackRecord,
    pub author: String,
}

// ════════════════════════════════════════════════════════════════════════════
// The forge
// ════════════════════════════════════════════════════════════════════════════

/// Render the whole grid into `out_dir` and write `manifest.json`.
///
/// Returns the number of tracks forged.  Filenames are unique because the
/// grid enumerates each tuple exactly once and the filename encodes the
/// tuple.  Manifest entries are sorted by filename so the output does not
/// depend on worker interleaving.
pub fn run(out_dir: &Path, author: &str) -> Result<usize> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("creating output directory {}", out_dir.display()))?;

    let params = grid()?;
    let total = params.len();
    let forged = AtomicUsize::new(0);

    let mut entries = params
        .par_iter()
        .map(|p| -> Result<ManifestEntry> {
            let record = describe(p);
            let bytes = generate(p)?;
            let path = out_dir.join(&record.filename);
            fs::write(&path, &bytes)
                .with_context(|| format!("writing {}", path.display()))?;

            let done = forged.fetch_add(1, Ordering::Relaxed) + 1;
            if done % 50 == 0 {
                info!("{done}/{total} tracks forged");
            }
            Ok(ManifestEntry { record, author: author.to_string() })
        })
        .collect::<Result<Vec<_>>>()?;

    entries.sort_by(|a, b| a.record.filename.cmp(&b.record.filename));

    let manifest_path = out_dir.join("manifest.json");
    let file = fs::File::create(&manifest_path)
        .with_context(|| format!("creating {}", manifest_path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &entries)
        .context("writing manifest")?;

    Ok(total)
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
