// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Built-in leaf kinds and their configuration
//!
//! A [`LeafKind`] validates the kind-specific `config` object of a leaf atom
//! before it reaches a queue. Executors deserialize the same typed configs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A registered kind of leaf atom
pub trait LeafKind: Send + Sync {
    /// Tag carried in the `typeTag` field
    fn type_tag(&self) -> &str;

    /// Check a leaf's configuration, returning a human-readable reason on error
    fn validate(&self, config: &Value) -> Result<(), String>;
}

/// Test atom that simulates work in steps and can fail on demand
#[derive(Debug, Clone, Copy, Default)]
pub struct DummyKind;

pub const DUMMY_TAG: &str = "DummyAtom";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DummyConfig {
    #[serde(default = "default_steps")]
    pub steps: u32,
    /// Simulated work per step
    #[serde(default)]
    pub step_ms: u64,
    /// 1-based step at which the atom fails
    #[serde(default)]
    pub fail_at: Option<u32>,
}

fn default_steps() -> u32 {
    1
}

impl DummyConfig {
    pub fn from_value(config: &Value) -> Result<Self, String> {
        let parsed: DummyConfig = serde_json::from_value(config.clone()).map_err(|e| e.to_string())?;
        if parsed.steps == 0 {
            return Err("steps must be at least 1".to_string());
        }
        if let Some(fail_at) = parsed.fail_at {
            if fail_at == 0 || fail_at > parsed.steps {
                return Err(format!("failAt {fail_at} outside 1..={}", parsed.steps));
            }
        }
        Ok(parsed)
    }
}

impl LeafKind for DummyKind {
    fn type_tag(&self) -> &str {
        DUMMY_TAG
    }

    fn validate(&self, config: &Value) -> Result<(), String> {
        DummyConfig::from_value(config).map(|_| ())
    }
}

/// Move positioners through a set of points, acquiring data at each
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanKind;

pub const SCAN_TAG: &str = "ScanAtom";

/// Largest number of points a single scan may visit
pub const MAX_SCAN_POINTS: usize = 1_000_000;

/// Where a scan goes: explicit points, or a regular line along one axis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScanConfig {
    Points {
        positions: Vec<Vec<f64>>,
    },
    Line {
        axis: String,
        start: f64,
        stop: f64,
        step: f64,
    },
}

impl ScanConfig {
    pub fn from_value(config: &Value) -> Result<Self, String> {
        let parsed: ScanConfig = serde_json::from_value(config.clone())
            .map_err(|_| "expected {positions} or {axis, start, stop, step}".to_string())?;
        parsed.check()?;
        Ok(parsed)
    }

    fn check(&self) -> Result<(), String> {
        match self {
            ScanConfig::Points { positions } => {
                if positions.is_empty() {
                    return Err("positions must not be empty".to_string());
                }
                let width = positions[0].len();
                if width == 0 || positions.iter().any(|p| p.len() != width) {
                    return Err("every position needs the same, non-zero number of axes".to_string());
                }
                if positions.iter().flatten().any(|v| !v.is_finite()) {
                    return Err("positions must be finite".to_string());
                }
                if positions.len() > MAX_SCAN_POINTS {
                    return Err(too_many_points(positions.len() as f64));
                }
            }
            ScanConfig::Line {
                axis,
                start,
                stop,
                step,
            } => {
                if axis.is_empty() {
                    return Err("axis must be named".to_string());
                }
                if !(start.is_finite() && stop.is_finite() && step.is_finite()) {
                    return Err("start, stop and step must be finite".to_string());
                }
                if *step == 0.0 && start != stop {
                    return Err("step must be non-zero".to_string());
                }
                if (stop - start) * step < 0.0 {
                    return Err("step points away from stop".to_string());
                }
                let count = line_count(*start, *stop, *step);
                if !count.is_finite() || count > MAX_SCAN_POINTS as f64 {
                    return Err(too_many_points(count));
                }
            }
        }
        Ok(())
    }

    /// How many points the scan visits
    pub fn point_count(&self) -> usize {
        match self {
            ScanConfig::Points { positions } => positions.len(),
            // saturating cast; validated configs stay within MAX_SCAN_POINTS
            ScanConfig::Line {
                start, stop, step, ..
            } => line_count(*start, *stop, *step) as usize,
        }
    }

    /// Points visited, in order, computed as they are consumed
    pub fn points(&self) -> ScanPoints<'_> {
        ScanPoints {
            config: self,
            next: 0,
            len: self.point_count(),
        }
    }
}

fn line_count(start: f64, stop: f64, step: f64) -> f64 {
    if step == 0.0 {
        return 1.0;
    }
    // tolerate float drift on the final point
    ((stop - start) / step + 1e-9).floor() + 1.0
}

fn too_many_points(count: f64) -> String {
    format!("{count} points exceed the limit of {MAX_SCAN_POINTS}")
}

/// Lazy iterator over the points of a [`ScanConfig`]
#[derive(Debug, Clone)]
pub struct ScanPoints<'a> {
    config: &'a ScanConfig,
    next: usize,
    len: usize,
}

impl Iterator for ScanPoints<'_> {
    type Item = Vec<f64>;

    fn next(&mut self) -> Option<Vec<f64>> {
        if self.next >= self.len {
            return None;
        }
        let index = self.next;
        self.next += 1;
        match self.config {
            ScanConfig::Points { positions } => positions.get(index).cloned(),
            ScanConfig::Line { start, step, .. } => Some(vec![start + step * index as f64]),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.len - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ScanPoints<'_> {}

impl LeafKind for ScanKind {
    fn type_tag(&self) -> &str {
        SCAN_TAG
    }

    fn validate(&self, config: &Value) -> Result<(), String> {
        ScanConfig::from_value(config).map(|_| ())
    }
}
