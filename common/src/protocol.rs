//! Wire types for the instrument gateway protocol.
//!
//! - The proxy deserializes these from gateway responses.
//! - The simulated instrument serializes them.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Property key => list of string values, as declared on one remote attribute.
///
/// Ordered so rendering the same set twice yields the same text.
pub type PropertySet = BTreeMap<String, Vec<String>>;

/// Attribute name => its declared properties.
pub type PropertyMap = HashMap<String, PropertySet>;

/// Attribute name => free-form info blob (label, unit, format, ...).
pub type InfoMap = HashMap<String, serde_json::Value>;

/// Quality flag attached by the instrument to every attribute reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    #[default]
    Valid,
    Invalid,
    Alarm,
    Changing,
    Warning,
}

/// Value of an attribute: either a single number or a sample sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Scalar(f64),
    Spectrum(Vec<f64>),
}

impl AttributeValue {
    /// The value as a sample sequence; a scalar becomes a one-element sequence.
    #[must_use]
    pub fn into_samples(self) -> Vec<f64> {
        match self {
            Self::Scalar(value) => vec![value],
            Self::Spectrum(samples) => samples,
        }
    }

    /// The value as a scalar. One-element spectra are accepted.
    #[must_use]
    pub fn as_scalar(&self) -> Option<f64> {
        match *self {
            Self::Scalar(value) => Some(value),
            Self::Spectrum(ref samples) => match samples.as_slice() {
                &[value] => Some(value),
                _ => None,
            },
        }
    }
}

/// One attribute read from the instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeReading {
    pub value: AttributeValue,
    #[serde(default)]
    pub quality: Quality,
    pub timestamp: DateTime<Utc>,
}

/// Request body of the batched property and info endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamesRequest {
    pub names: Vec<String>,
}
