//! Errors returned when building shapes and editing the world.

/// A shape definition that would produce a degenerate or invalid shape.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ShapeError {
    #[error("Circle radius must be positive and finite, got {0}")]
    InvalidRadius(f64),
    #[error("Vertex {0} is not finite")]
    NonFiniteVertex(usize),
    #[error("A polygon needs at least 3 distinct vertices, got {0}")]
    TooFewVertices(usize),
    #[error("A polygon can have at most {max} vertices, got {got}")]
    TooManyVertices { got: usize, max: usize },
    #[error("Polygon vertices are collinear or too close together")]
    DegeneratePolygon,
    #[error("Box half extents must be positive and finite, got ({0}, {1})")]
    InvalidExtents(f64, f64),
    #[error("Edge endpoints are too close together")]
    DegenerateEdge,
    #[error("A chain needs at least {min} vertices, got {got}")]
    ChainTooShort { got: usize, min: usize },
    #[error("Chain vertices {0} and {1} are too close together")]
    ChainVerticesTooClose(usize, usize),
}

/// Failure to modify the contents of a [`World`][crate::World].
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum WorldError {
    #[error("The body does not exist")]
    NoSuchBody,
    #[error("The fixture does not exist")]
    NoSuchFixture,
    #[error("Density must be non-negative and finite, got {0}")]
    InvalidDensity(f64),
    #[error("Invalid shape")]
    Shape(#[from] ShapeError),
}
