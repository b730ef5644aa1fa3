//! Pipeline module.
//!
//! [`PipelineComposer`] is the entry point: it plans every requested column,
//! hands the plans to the [`PipelineAssembler`] and returns a
//! [`ComposedPipeline`] ready to be applied to a dataset.

mod assembler;
mod composed;
mod composer;

pub use assembler::{INDICATOR_TAG_PREFIX, PipelineAssembler, StageGroup};
pub use composed::ComposedPipeline;
pub use composer::{PipelineComposer, PipelineComposerBuilder, compose};
