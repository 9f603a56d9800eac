//! FastHenry input (`.inp`) emission for an imported model

use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::model::ImportResult;

/// `.default` parameters; `None` and zero values are left out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentDefaults {
    pub w: Option<f64>,
    pub h: Option<f64>,
    pub sigma: Option<f64>,
    pub nhinc: Option<u32>,
    pub nwinc: Option<u32>,
    pub rh: Option<f64>,
    pub rw: Option<f64>,
}

impl Default for SegmentDefaults {
    fn default() -> Self {
        Self {
            w: Some(1.0),
            h: Some(0.5),
            sigma: Some(5.8e4),
            nhinc: Some(1),
            nwinc: Some(1),
            rh: Some(2.0),
            rw: Some(2.0),
        }
    }
}

/// A `.external` port between two nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalPort {
    pub node1: String,
    pub node2: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencySweep {
    pub fmin: f64,
    pub fmax: f64,
    pub ndec: f64,
}

impl Default for FrequencySweep {
    fn default() -> Self {
        Self {
            fmin: 1e4,
            fmax: 1e8,
            ndec: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InpOptions {
    pub title: String,
    pub units: String,
    pub defaults: SegmentDefaults,
    pub externals: Vec<ExternalPort>,
    pub freq: FrequencySweep,
}

impl Default for InpOptions {
    fn default() -> Self {
        Self {
            title: "Imported geometry".into(),
            units: "mm".into(),
            defaults: SegmentDefaults::default(),
            externals: Vec::new(),
            freq: FrequencySweep::default(),
        }
    }
}

/// Render a complete input file; node and segment names are lower-cased
pub fn write_inp(model: &ImportResult, options: &InpOptions) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = render(&mut out, model, options);
    out
}

fn render(out: &mut String, model: &ImportResult, options: &InpOptions) -> std::fmt::Result {
    writeln!(out, "* {}", options.title)?;
    writeln!(out)?;
    writeln!(out, ".units {}", options.units)?;
    writeln!(out)?;

    let d = &options.defaults;
    let mut parts = Vec::new();
    let mut real = |key: &str, value: Option<f64>| {
        if let Some(v) = value.filter(|&v| v != 0.0) {
            parts.push(format!("{}={}", key, v));
        }
    };
    real("w", d.w);
    real("h", d.h);
    real("sigma", d.sigma);
    real("nhinc", d.nhinc.map(f64::from));
    real("nwinc", d.nwinc.map(f64::from));
    real("rh", d.rh);
    real("rw", d.rw);
    if !parts.is_empty() {
        writeln!(out, ".default {}", parts.join(" "))?;
        writeln!(out)?;
    }

    for node in &model.nodes {
        writeln!(
            out,
            "{} x={} y={} z={}",
            node.name.to_lowercase(),
            node.x,
            node.y,
            node.z
        )?;
    }
    if !model.nodes.is_empty() {
        writeln!(out)?;
    }

    for segment in &model.segments {
        writeln!(
            out,
            "{} {} {} w={} h={}",
            segment.name.to_lowercase(),
            segment.node1.to_lowercase(),
            segment.node2.to_lowercase(),
            segment.w,
            segment.h
        )?;
    }
    if !model.segments.is_empty() {
        writeln!(out)?;
    }

    for port in &options.externals {
        write!(out, ".external {} {}", port.node1.to_lowercase(), port.node2.to_lowercase())?;
        if let Some(name) = &port.name {
            write!(out, " {}", name)?;
        }
        writeln!(out)?;
    }
    if !options.externals.is_empty() {
        writeln!(out)?;
    }

    let f = &options.freq;
    writeln!(out, ".freq fmin={} fmax={} ndec={}", f.fmin, f.fmax, f.ndec)?;
    writeln!(out)?;
    writeln!(out, ".end")
}
