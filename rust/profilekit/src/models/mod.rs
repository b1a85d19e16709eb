pub mod arrays;
pub mod attributes;
pub mod normalisation;
pub mod table;

pub use arrays::Array2D;
pub use attributes::{
    Attributes,
    LogEntry,
    MANDATORY_ATTRIBUTES,
};
pub use normalisation::{
    Normaliser,
    NullNormaliser,
    ProbabilisticQuotientNormaliser,
    TotalAreaNormaliser,
};
pub use table::{
    Table,
    Value,
};
