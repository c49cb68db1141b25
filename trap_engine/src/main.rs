//! trap_engine — one-shot demo render.
//!
//! Writes a single composition for the default tuple so the output can be
//! auditioned in any DAW without running the full batch sweep.

use std::io::Write;

use trap_engine::{describe, generate};
use trap_patterns::{Params, Slither};

fn main() {
    let params = match Params::new("F_Minor", 53, 140, Slither::new(4000, 8.0), 0.8) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Invalid parameters: {e}");
            std::process::exit(1);
        }
    };

    let record = describe(&params);
    println!("Rendering {} …", record.filename);

    let bytes = match generate(&params) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Render failed: {e}");
            std::process::exit(1);
        }
    };

    let result = std::fs::File::create(&record.filename)
        .and_then(|mut f| f.write_all(&bytes));
    match result {
        Ok(()) => println!("  ✓  {} bytes written to '{}'", bytes.len(), record.filename),
        Err(e) => {
            eprintln!("  ⚠  File error: {e}");
            std::process::exit(1);
        }
    }
}
