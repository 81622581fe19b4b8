//! Compiled slate constraints.
//!
//! The [`ConstraintSpec`] is the immutable artifact every other component
//! borrows: drivers and track flattened into sorted arrays, scoring
//! constants, and a content hash. It is produced once per run by
//! [`compile`] and never touches the external store again.

mod compile;
mod driver;
mod hash;
mod spec;
mod track;

pub use compile::{compile, FixtureStore, OntologyStore, RawDriverRecord, RawTrackRecord};
pub use driver::DriverConstraint;
pub use hash::canonical_encoding;
pub use spec::{ConstraintSpec, SlateMeta};
pub use track::{TrackArchetype, TrackConstraint};
