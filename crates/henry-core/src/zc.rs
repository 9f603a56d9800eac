//! Parser for the solver's impedance matrix file (`Zc.mat`)
//!
//! ```text
//! Row 1: n1 to n2, port name: in
//! Impedance matrix for frequency = 10000 1 x 1
//!   0.0123 +0.456j
//! ```

use serde::{Deserialize, Serialize};

/// One matrix row/column: the port between two nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    pub row: usize,
    pub node1: String,
    pub node2: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Complex {
    pub re: f64,
    pub im: f64,
}

impl Complex {
    pub fn norm(&self) -> f64 {
        self.re.hypot(self.im)
    }
}

/// Impedance matrix at one frequency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyBlock {
    pub frequency: f64,
    pub rows: usize,
    pub cols: usize,
    pub matrix: Vec<Vec<Complex>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZcMatrix {
    pub ports: Vec<Port>,
    pub frequencies: Vec<FrequencyBlock>,
}

/// Parse `Zc.mat` text; `None` for blank input
pub fn parse_zc_mat(text: &str) -> Option<ZcMatrix> {
    if text.trim().is_empty() {
        return None;
    }

    let lines: Vec<&str> = text.lines().collect();
    let mut out = ZcMatrix::default();
    let mut i = 0;

    while i < lines.len() && lines[i].starts_with("Row") {
        if let Some(port) = parse_port(lines[i]) {
            out.ports.push(port);
        }
        i += 1;
    }

    while i < lines.len() {
        let Some((frequency, rows, cols)) = parse_block_header(lines[i]) else {
            i += 1;
            continue;
        };
        i += 1;

        // Bounded by the lines left, whatever the header claims
        let mut matrix = Vec::with_capacity(rows.min(lines.len() - i));
        while matrix.len() < rows && i < lines.len() {
            matrix.push(parse_entries(lines[i]));
            i += 1;
        }
        out.frequencies.push(FrequencyBlock {
            frequency,
            rows,
            cols,
            matrix,
        });
    }

    Some(out)
}

/// `Row N: a to b[, port name: p]`
fn parse_port(line: &str) -> Option<Port> {
    let rest = line.strip_prefix("Row")?.trim_start();
    let (row, rest) = rest.split_once(':')?;
    let row: usize = row.trim().parse().ok()?;

    let (nodes, name) = match rest.split_once(',') {
        Some((nodes, tail)) => {
            let mut words = tail.split_whitespace();
            let name = match (words.next(), words.next(), words.next()) {
                (Some(p), Some(n), Some(name))
                    if p.eq_ignore_ascii_case("port") && n.eq_ignore_ascii_case("name:") =>
                {
                    Some(name.to_string())
                }
                _ => None,
            };
            (nodes, name)
        }
        None => (rest, None),
    };

    let mut words = nodes.split_whitespace();
    let node1 = words.next()?.to_string();
    if !words.next()?.eq_ignore_ascii_case("to") {
        return None;
    }
    let node2 = words.next()?.to_string();

    Some(Port {
        row,
        node1,
        node2,
        name: name.unwrap_or_else(|| format!("port{}", row)),
    })
}

/// `Impedance matrix for frequency = F R x C`
fn parse_block_header(line: &str) -> Option<(f64, usize, usize)> {
    const PREFIX: &str = "impedance matrix for frequency";
    let lower = line.trim().to_ascii_lowercase();
    let rest = lower.strip_prefix(PREFIX)?.trim_start().strip_prefix('=')?;

    let mut words = rest.split_whitespace();
    let frequency: f64 = words.next()?.parse().ok()?;
    let dims: String = words.collect::<Vec<_>>().join("");
    let (rows, cols) = dims.split_once('x')?;
    Some((frequency, rows.parse().ok()?, cols.parse().ok()?))
}

/// Whitespace separated `re ±imj` pairs
fn parse_entries(line: &str) -> Vec<Complex> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let mut entries = Vec::new();
    let mut k = 1;
    while k < words.len() {
        let imaginary = words[k]
            .strip_suffix('j')
            .filter(|im| im.starts_with(['+', '-']))
            .and_then(|im| im.parse::<f64>().ok());
        match (words[k - 1].parse::<f64>(), imaginary) {
            (Ok(re), Some(im)) => {
                entries.push(Complex { re, im });
                k += 2;
            }
            _ => k += 1,
        }
    }
    entries
}
