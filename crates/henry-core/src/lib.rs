//! Geometry-to-filament reduction for inductance extraction
//!
//! Turns solid/edge geometry into the node and segment lists a FastHenry-style
//! field solver consumes:
//!
//! - [`extract`]: one filament per solid (longest bounding-box axis) and per
//!   standalone edge
//! - [`merge`]: proximity deduplication of filament endpoints
//! - [`assemble`]: named nodes, resolved segments and the summary line
//! - [`pipeline`]: the in-process import, [`worker`]: the isolated one
//! - [`solver`], [`zc`], [`netlist`], [`library`]: solver plumbing

pub mod assemble;
pub mod config;
pub mod constants;
pub mod error;
pub mod extract;
pub mod library;
pub mod merge;
pub mod model;
pub mod netlist;
pub mod pipeline;
mod process;
pub mod solver;
pub mod worker;
pub mod zc;

pub use config::{ImportSettings, Settings};
pub use error::{Error, ErrorKind, ErrorPayload, Result};
pub use library::Library;
pub use merge::{MergeStrategy, MergedNodes, NodeMerger};
pub use model::{CanonicalNode, FinalSegment, ImportResult, RawNode, RawSegment, ReductionOptions};
pub use netlist::{InpOptions, write_inp};
pub use pipeline::{BackendProbe, import_geometry, probe};
pub use solver::{SolverConfig, SolverOptions, SolverOutput, run_solver};
pub use worker::{ImportWorker, import_file, run_import_worker};
pub use zc::{ZcMatrix, parse_zc_mat};
