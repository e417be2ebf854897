//! XYZR input: one ball per line, the last four columns are x, y, z and radius.
//!
//! Leading columns (atom names, serials) are ignored, as are blank lines and
//! lines starting with `#`.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use log::debug;

use crate::types::Ball;

fn parse_line(line: &str) -> Option<Ball> {
    let mut parts = line.split_whitespace().rev();
    let r: f64 = parts.next()?.parse().ok()?;
    let z: f64 = parts.next()?.parse().ok()?;
    let y: f64 = parts.next()?.parse().ok()?;
    let x: f64 = parts.next()?.parse().ok()?;
    Some(Ball::new(x, y, z, r))
}

/// Read balls from XYZR text.
///
/// # Errors
/// Returns an error if reading from the underlying reader fails.
pub fn parse_xyzr<R: BufRead>(reader: R) -> io::Result<Vec<Ball>> {
    let mut balls = Vec::new();
    let mut skipped = 0usize;
    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        match parse_line(trimmed) {
            Some(ball) => balls.push(ball),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        debug!("skipped {skipped} unparsable xyzr lines");
    }
    Ok(balls)
}

/// Read balls from an XYZR file.
///
/// # Errors
/// Returns an error if the file cannot be opened or read.
pub fn parse_xyzr_file(path: &Path) -> io::Result<Vec<Ball>> {
    parse_xyzr(BufReader::new(File::open(path)?))
}
