//! Composition entry point.

use crate::config::{ColumnRequest, PipelineDefaults, validate_requests};
use crate::error::{ImputeError, Result};
use crate::pipeline::{ComposedPipeline, PipelineAssembler};
use crate::planner::{ColumnPlanner, TempNameAllocator};
use crate::schema::{ColumnSchema, DatasetView};
use crate::stages::{PolarsStageFactory, StageFactory};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

/// Validates requests, plans every column and assembles the pipeline.
///
/// By default the first failing column (in request order) is reported. With
/// [`PipelineComposerBuilder::collect_all_errors`] every request is planned
/// and all failures are returned together as [`ImputeError::Multiple`].
/// Empty-request, validation and duplicate-name checks always stop
/// immediately.
///
/// # Example
///
/// ```rust,ignore
/// use lex_impute::{ColumnRequest, DatasetView, PipelineComposer, StrategyKind};
///
/// let input = DatasetView::new(df);
/// let pipeline = PipelineComposer::builder()
///     .collect_all_errors(true)
///     .build()
///     .compose(&[ColumnRequest::new("age").strategy(StrategyKind::Mean)], &input)?;
///
/// let output = pipeline.apply(&input)?;
/// ```
#[derive(Clone)]
pub struct PipelineComposer {
    defaults: PipelineDefaults,
    collect_all_errors: bool,
    factory: Arc<dyn StageFactory>,
}

impl Default for PipelineComposer {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl std::fmt::Debug for PipelineComposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineComposer")
            .field("defaults", &self.defaults)
            .field("collect_all_errors", &self.collect_all_errors)
            .finish_non_exhaustive()
    }
}

impl PipelineComposer {
    pub fn builder() -> PipelineComposerBuilder {
        PipelineComposerBuilder::default()
    }

    /// Create a composer with the given defaults and the polars stages.
    pub fn new(defaults: PipelineDefaults) -> Self {
        Self::builder().defaults(defaults).build()
    }

    pub fn defaults(&self) -> &PipelineDefaults {
        &self.defaults
    }

    /// Compose a pipeline for `requests` against the schema of `input`.
    pub fn compose(&self, requests: &[ColumnRequest], input: &DatasetView) -> Result<ComposedPipeline> {
        self.compose_schema(requests, input.schema())
    }

    /// Compose against a bare schema. No data is read.
    pub fn compose_schema(
        &self,
        requests: &[ColumnRequest],
        schema: &ColumnSchema,
    ) -> Result<ComposedPipeline> {
        if requests.is_empty() {
            return Err(ImputeError::EmptyRequest);
        }
        validate_requests(requests)?;
        check_duplicates(requests)?;

        let mut allocator = TempNameAllocator::new(schema);
        for request in requests {
            allocator.reserve(request.output.as_str());
        }

        let mut plans = Vec::with_capacity(requests.len());
        let mut errors = Vec::new();
        for request in requests {
            match ColumnPlanner::plan(request, &self.defaults, schema, &mut allocator) {
                Ok(plan) => plans.push(plan),
                Err(e) if self.collect_all_errors => errors.push(e),
                Err(e) => return Err(e),
            }
        }
        match errors.len() {
            0 => {}
            1 => return Err(errors.remove(0)),
            _ => return Err(ImputeError::Multiple(errors)),
        }

        let pipeline = PipelineAssembler::assemble(plans, schema, self.factory.as_ref())?;
        info!(
            "Composed pipeline for {} column(s): [{}]",
            requests.len(),
            pipeline
                .stage_kinds()
                .iter()
                .map(|k| k.to_string())
                .collect::<Vec<_>>()
                .join(" -> ")
        );
        Ok(pipeline)
    }
}

fn check_duplicates(requests: &[ColumnRequest]) -> Result<()> {
    let mut seen = HashSet::with_capacity(requests.len());
    for request in requests {
        if !seen.insert(request.output.as_str()) {
            return Err(ImputeError::DuplicateOutputName(request.output.clone()));
        }
    }
    Ok(())
}

/// Builder for [`PipelineComposer`].
#[derive(Default)]
pub struct PipelineComposerBuilder {
    defaults: PipelineDefaults,
    collect_all_errors: bool,
    factory: Option<Arc<dyn StageFactory>>,
}

impl PipelineComposerBuilder {
    /// Pipeline-wide fallbacks for unset request fields.
    pub fn defaults(mut self, defaults: PipelineDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Plan every request and report all failures instead of the first.
    pub fn collect_all_errors(mut self, collect: bool) -> Self {
        self.collect_all_errors = collect;
        self
    }

    /// Use a custom stage factory instead of [`PolarsStageFactory`].
    pub fn factory(mut self, factory: Arc<dyn StageFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn build(self) -> PipelineComposer {
        PipelineComposer {
            defaults: self.defaults,
            collect_all_errors: self.collect_all_errors,
            factory: self
                .factory
                .unwrap_or_else(|| Arc::new(PolarsStageFactory)),
        }
    }
}

/// Compose with the polars stages and first-error diagnostics.
pub fn compose(
    requests: &[ColumnRequest],
    defaults: &PipelineDefaults,
    input: &DatasetView,
) -> Result<ComposedPipeline> {
    PipelineComposer::new(*defaults).compose(requests, input)
}
