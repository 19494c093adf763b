//! Named failpoints for forcing errors in tests.
//!
//! Failpoints are process-wide so that they reach code running on runtime
//! worker threads. `GRACEDB_FAILPOINTS=name1,name2` enables points from the
//! environment; the variable is read once, on the first check.

use std::sync::OnceLock;

use parking_lot::Mutex;

use crate::common::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Always,
    Once,
}

static FAILPOINTS: Mutex<Vec<(String, Mode)>> = parking_lot::const_mutex(Vec::new());

/// Fail every time `name` is hit.
pub fn enable(name: &str) {
    set(name, Mode::Always);
}

/// Fail the next time `name` is hit, then disable it.
pub fn enable_once(name: &str) {
    set(name, Mode::Once);
}

fn set(name: &str, mode: Mode) {
    let mut points = FAILPOINTS.lock();
    points.retain(|(n, _)| n != name);
    points.push((name.to_string(), mode));
}

pub fn disable(name: &str) {
    FAILPOINTS.lock().retain(|(n, _)| n != name);
}

pub fn clear() {
    FAILPOINTS.lock().clear();
}

pub fn is_enabled(name: &str) -> bool {
    if FAILPOINTS.lock().iter().any(|(n, _)| n == name) {
        return true;
    }
    env_enabled(name)
}

/// Points named in the environment, read on first use.
fn env_points() -> &'static [String] {
    static POINTS: OnceLock<Vec<String>> = OnceLock::new();
    POINTS.get_or_init(|| {
        std::env::var("GRACEDB_FAILPOINTS")
            .map(|raw| parse_points(&raw))
            .unwrap_or_default()
    })
}

fn parse_points(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

fn env_enabled(name: &str) -> bool {
    env_points().iter().any(|p| p == name)
}

/// Return `Error::Failpoint` if `name` is enabled. A one-shot point fires for
/// exactly one caller.
pub fn maybe_fail(name: &str) -> Result<()> {
    let fired = {
        let mut points = FAILPOINTS.lock();
        match points.iter().position(|(n, _)| n == name) {
            Some(i) => {
                if points[i].1 == Mode::Once {
                    points.remove(i);
                }
                true
            }
            None => false,
        }
    };
    if fired || env_enabled(name) {
        Err(Error::Failpoint(name.to_string()))
    } else {
        Ok(())
    }
}
