//! Encoding of grounded temporal and numeric planning problems into constraint satisfaction problems
//! over a bounded number of layers.
//!
//! A plan of horizon `H` is a sequence of layers `0..=H`, each layer having a time and the state of
//! all literals and fluents before (`Pre`) and after (`Post`) the actions starting or ending on it.
//! The [`encoder::Encoder`] builds the formula for a given horizon over exact real arithmetic and checks it
//! with the z3 SMT solver, through the `strata` model layer.

pub mod effects;
pub mod encoder;
pub mod error;
pub mod numeric;
pub mod params;
pub mod plan;
pub mod problem;
pub mod samples;
pub mod session;
pub mod translate;
pub mod vars;

pub use encoder::Encoder;
pub use error::EncodingError;
pub use params::EncoderConfig;
pub use session::{SolveOutcome, UnknownReason};
