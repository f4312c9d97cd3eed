// ============================================
// Behavioral Features (行為特徵)
// ============================================
//
// Logs ──► FeatureExtractor ──► RawUserMetrics ──► FeatureEngineer ──► FeatureVector

pub mod engineer;
pub mod extractor;
pub mod schema;

pub use engineer::{normalized_entropy, CohortContext, FeatureEngineer, DEFAULT_COHORT_RATING};
pub use extractor::{
    normalize_category, ExtractorConfig, FeatureExtractor, InteractionLogs, RawUserMetrics,
};
pub use schema::{Feature, FeatureGroup, FeatureVector, FEATURE_COUNT};
