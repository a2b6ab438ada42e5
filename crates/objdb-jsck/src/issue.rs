//! The checker's issue model (design doc §4.7): every defect the scan can
//! find reduces to one of three shapes, each carrying the raw key and the
//! before/after value a repair would apply.

/// What's wrong with a key, independent of which scan step found it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueKind {
    /// A key exists that shouldn't (no object type, field, or index names
    /// it in the currently recorded schema).
    InvalidKey,
    /// A key's value doesn't decode or doesn't match what its owning field
    /// or index entry should hold.
    InvalidValue,
    /// A key is absent that the data model requires to exist.
    MissingKey,
}

/// A single checker finding.
#[derive(Debug, Clone)]
pub struct Issue {
    pub kind: IssueKind,
    pub key: Vec<u8>,
    /// The value found at `key`, if any (absent for `MissingKey`).
    pub old_value: Option<Vec<u8>>,
    /// The value a repair would write, `None` meaning a repair would
    /// delete `key` instead.
    pub new_value: Option<Vec<u8>>,
}
