//! Labelled models over boolean and real variables, solved incrementally by the z3 SMT solver.
//!
//! Variables are created in a [`model::Model`] and referred to by dense identifiers, so that
//! the structures indexing them carry no lifetime. Constraints are z3 formulas, optionally
//! enforced under a scope of literals. A [`solver::Solver`] posts them lazily and solves under
//! assumptions, with resource limits. A solution is read back as a [`model::SavedAssignment`]
//! holding exact rational values.

pub mod collections;
pub mod model;
pub mod params;
pub mod solver;
