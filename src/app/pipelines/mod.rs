pub mod cast_sheet_pipeline;
pub mod comparison_pipeline;
pub mod convert_pipeline;
pub mod mapping_pipeline;

pub use cast_sheet_pipeline::CastSheetPipeline;
pub use comparison_pipeline::ComparisonPipeline;
pub use convert_pipeline::ConvertPipeline;
pub use mapping_pipeline::MappingPipeline;
