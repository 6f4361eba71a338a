use core::fmt;

#[derive(Clone, Debug, PartialEq)]
pub enum GenomeError {
    Length { actual: usize },
    NonFinite { index: usize },
    InvertedTriangle { index: usize, a: f64, b: f64, c: f64 },
}

impl fmt::Display for GenomeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Length { actual } => {
                write!(f, "genome has {actual} genes, expected 45, 60 or 90")
            }
            Self::NonFinite { index } => write!(f, "gene {index} is not finite"),
            Self::InvertedTriangle { index, a, b, c } => write!(
                f,
                "membership triangle at gene {index} is not ordered: ({a}, {b}, {c})"
            ),
        }
    }
}

impl std::error::Error for GenomeError {}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GeneticError {
    TooFewParents { available: usize },
    LengthMismatch { expected: usize, actual: usize },
    FixedIndexOutOfRange { index: usize, gene_count: usize },
    LayoutMismatch { structure: usize, domains: usize },
}

impl fmt::Display for GeneticError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooFewParents { available } => write!(
                f,
                "breeding needs at least 2 parents, population has {available}"
            ),
            Self::LengthMismatch { expected, actual } => write!(
                f,
                "genome length mismatch: expected {expected} genes, got {actual}"
            ),
            Self::FixedIndexOutOfRange { index, gene_count } => write!(
                f,
                "fixed index {index} is outside a {gene_count}-gene layout"
            ),
            Self::LayoutMismatch { structure, domains } => write!(
                f,
                "layout has {structure} variable blocks but {domains} domains"
            ),
        }
    }
}

impl std::error::Error for GeneticError {}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TrackError {
    TooFewPoints { boundary: &'static str, points: usize },
    SelfIntersecting { boundary: &'static str, edge: usize, other: usize },
    DegenerateCheckpoint { index: usize },
}

impl fmt::Display for TrackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooFewPoints { boundary, points } => write!(
                f,
                "{boundary} boundary has {points} points, need 0 or at least 3"
            ),
            Self::SelfIntersecting {
                boundary,
                edge,
                other,
            } => write!(
                f,
                "{boundary} boundary is not simple: edge {edge} crosses edge {other}"
            ),
            Self::DegenerateCheckpoint { index } => {
                write!(f, "checkpoint {index} has zero length")
            }
        }
    }
}

impl std::error::Error for TrackError {}
