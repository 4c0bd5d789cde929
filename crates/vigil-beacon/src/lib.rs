//! Randomness for panel selection.
//!
//! Panels are drawn from an explicit randomness source rather than anything a
//! caller can influence through timing or ids. [`SeededBeacon`] makes draws
//! reproducible from a published seed; [`ContributionBeacon`] derives each
//! round from commit-revealed contributions.

pub mod canonical;
pub mod contribution;
pub mod error;
pub mod selection;
pub mod source;

pub use canonical::{compute_canonical_randomness, compute_challenge};
pub use contribution::ContributionBeacon;
pub use error::{BeaconError, Result};
pub use selection::{select_panel, PanelDraw};
pub use source::{BeaconOutput, RandomnessSource, SeededBeacon};
