// Text pipeline: merge → normalize → (enrich) → extract, sequenced by `CvAnalyzer`.
// Everything here except the analyzer is pure and infallible.

pub mod analyzer;
pub mod fields;
pub mod merge;
pub mod normalize;

pub use analyzer::CvAnalyzer;
pub use fields::extract_fields;
pub use merge::merge_outputs;
pub use normalize::{normalize, normalize_lines};
