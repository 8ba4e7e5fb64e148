pub mod analyzer;
pub mod config;
pub mod detector;
pub mod error;
pub mod image_input;
pub mod pipeline;
pub mod record;
pub mod region;
pub mod store;

// Re-export commonly used items
pub use analyzer::{Action, Actions, AttributeAnalyzer, AttributeEstimate, OnnxAttributeAnalyzer};
pub use config::{PipelineConfig, Settings};
pub use detector::{create_detector, DetectParams, FaceDetector, HaarDetector, SeetaDetector};
pub use error::{AnalysisError, DecodeError, DetectionError, PipelineError, RegionError, StoreError};
pub use pipeline::{FaceError, FaceFailure, Pipeline, PipelineOutput};
pub use record::{FaceRecord, Gender, Race};
pub use region::FaceRegion;
pub use store::{CsvFileStore, MemoryStore, RecordSink, RecordStore, StoredRecord};
