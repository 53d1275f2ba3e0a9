//! Error types for the cast-analysis crate.
use thiserror::Error;

/// Error type for the crate.
#[derive(Clone, PartialEq, Debug, Error)]
pub enum AnalysisError {
    /// A vector did not have the length required by the cast it was added to.
    #[error("field `{key}` has length {got}, cast length is {expected}")]
    ShapeMismatch {
        /// Name of the offending field.
        key: String,
        /// Length of the supplied vector.
        got: usize,
        /// Length required by the cast.
        expected: usize,
    },
    /// A field or property lookup failed.
    #[error("no field or property named `{0}`")]
    KeyNotFound(String),
    /// A key was requested across a collection but is absent from at least one cast.
    #[error("key `{0}` not found in all casts")]
    KeyNotFoundInAllCasts(String),
    /// An observation index was past the end of the profile.
    #[error("index {index} is greater than cast length {len}")]
    IndexOutOfRange {
        /// The requested observation index.
        index: usize,
        /// The cast length.
        len: usize,
    },
    /// A reference axis was not strictly increasing and coercion was not requested.
    #[error("reference field `{0}` is not monotonic")]
    NonMonotonic(String),
    /// The vertical grid must be uniformly spaced for the mode solver.
    #[error("vertical grid spacing is not uniform below the cutoff depth")]
    NonUniformGrid,
    /// Water-mass decomposition needs exactly three source waters.
    #[error("three source waters must be given, not {0}")]
    SourceWaterCount(usize),
    /// The source-water tracer matrix could not be inverted.
    #[error("source water tracers are degenerate")]
    DegenerateSources,
    /// An operation needed coordinates the cast does not carry.
    #[error("cast has no coordinates")]
    MissingCoordinates,
    /// Every observation relevant to the calculation was missing.
    #[error("profile is full of missing values, cannot do analysis")]
    NoValidData,
    /// Extending a cast by zero levels is a caller bug.
    #[error("cannot extend cast by zero levels")]
    EmptyExtension,
    /// Automatically derived field names differ between casts in a collection.
    #[error("derived field names diverge across casts ({0} vs {1})")]
    DivergentFieldKeys(String, String),
    /// A structured record carried no type discriminator.
    #[error("record has no type discriminator, data may be corrupt")]
    CorruptRecord,
    /// A structured record carried a discriminator this crate does not know.
    #[error("invalid record type `{0}`")]
    UnknownRecordType(String),

    /// Forward an error from the gsw crate.
    #[error("error bubbled up from gsw crate: {0}")]
    Seawater(String),
}

/// Shorthand for results.
pub type Result<T> = std::result::Result<T, AnalysisError>;
