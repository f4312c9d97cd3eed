pub mod cache;
pub mod clustering;
pub mod features;
pub mod pipeline;
pub mod recommend;
pub mod segments;

pub use cache::SegmentCache;
pub use clustering::{AgglomerativeClustering, ClusteringPreparer};
pub use features::{FeatureEngineer, FeatureExtractor};
pub use pipeline::{SegmentationRequest, SegmentationRun, SegmentationService, SegmentationSettings};
pub use recommend::SegmentRecommender;
pub use segments::SegmentCharacterizer;
