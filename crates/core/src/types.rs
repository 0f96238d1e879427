/// Node identifiers are positive and never reused within a document.
pub type NodeId = u32;

/// Link identifiers start at 1; 0 means "no links".
pub type LinkId = u32;

/// Raw generation parameters as handed over by the metadata parsing layer.
///
/// Every value is a string; numeric coercion happens in [`crate::params`].
pub type RawParameters = std::collections::BTreeMap<String, String>;
