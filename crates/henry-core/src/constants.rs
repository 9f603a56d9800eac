//! Global constants for henry-core

/// Default merge tolerance: raw nodes strictly closer than this share a node
pub const MERGE_TOLERANCE: f64 = 1e-6;

/// Smallest cross-section width/height ever emitted
pub const MIN_CROSS_SECTION: f64 = 1e-6;

/// Square side of a standalone-edge filament as a fraction of its length
pub const EDGE_SECTION_RATIO: f64 = 0.05;

/// Decimal places kept in emitted cross-section dimensions
pub const ROUND_DIGITS: i32 = 8;

/// Raw node count above which the grid merge strategy is used
pub const GRID_MERGE_THRESHOLD: usize = 4096;

/// Wall-clock bound of one geometry import worker, in seconds
pub const IMPORT_TIMEOUT_SECS: u64 = 120;

/// Wall-clock bound of one solver run, in seconds
pub const SOLVER_TIMEOUT_SECS: u64 = 300;

/// Default solver executable
pub const SOLVER_EXECUTABLE: &str = "fasthenry";

/// Circuit description file written into the solver workspace
pub const SOLVER_INPUT_FILE: &str = "input.inp";

/// Impedance matrix written by the solver into its working directory
pub const RESULT_MATRIX_FILE: &str = "Zc.mat";

/// Extension of example circuit files
pub const EXAMPLE_EXTENSION: &str = "inp";

/// Example files of this size or larger are not listed
pub const MAX_EXAMPLE_SIZE: u64 = 500_000;

/// Poll interval while waiting on a child process, in milliseconds
pub const PROCESS_POLL_MILLIS: u64 = 50;
