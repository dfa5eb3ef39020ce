pub mod analysis;
pub mod semantic;

pub use analysis::{AnalysisRequest, AnalysisResult, ExtractedFields, FieldName};
pub use semantic::{Entity, EntityCategory, SemanticProfile};
