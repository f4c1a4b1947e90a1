use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::JobError;
use crate::filters::{grayscale, sepia};
use crate::video::types::Frame;

/// Registry of available background filters
///
/// The set is closed: adding a filter means adding a variant here, which
/// forces every match over filters to be revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    Grayscale,
    Sepia,
    Identity,
}

/// Registered names, including legacy aliases
const NAMES: &[(&str, FilterKind)] = &[
    ("grayscale", FilterKind::Grayscale),
    ("sepia", FilterKind::Sepia),
    ("identity", FilterKind::Identity),
    ("no transform", FilterKind::Identity),
];

impl FilterKind {
    /// Look up a filter by its registered name
    pub fn from_name(name: &str) -> Result<Self, JobError> {
        NAMES
            .iter()
            .find(|(registered, _)| *registered == name)
            .map(|(_, kind)| *kind)
            .ok_or_else(|| JobError::InvalidFilter {
                name: name.to_string(),
            })
    }

    /// Canonical name of this filter
    pub fn name(&self) -> &'static str {
        match self {
            FilterKind::Grayscale => "grayscale",
            FilterKind::Sepia => "sepia",
            FilterKind::Identity => "identity",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            FilterKind::Grayscale => "Desaturates the background to luma only",
            FilterKind::Sepia => "Warm brown tone remap of the background",
            FilterKind::Identity => "Leaves the background unchanged",
        }
    }

    /// All registered names, aliases included
    pub fn available() -> Vec<&'static str> {
        NAMES.iter().map(|(name, _)| *name).collect()
    }

    /// Apply the filter to a frame; output has the input's dimensions
    pub fn apply(&self, frame: &Frame) -> Frame {
        match self {
            FilterKind::Grayscale => grayscale(frame),
            FilterKind::Sepia => sepia(frame),
            FilterKind::Identity => frame.clone(),
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
