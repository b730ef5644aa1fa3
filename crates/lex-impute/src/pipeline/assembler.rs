//! Pipeline assembly.
//!
//! Folds the per-column plans into at most five stage groups, chained in the
//! fixed order Indicator → Coercer → Replacer → Merger → Dropper. Within a
//! group, instructions follow request order.

use crate::error::{ImputeError, Result};
use crate::pipeline::ComposedPipeline;
use crate::schema::{ColumnSchema, SchemaView};
use crate::stages::{
    CoerceInstruction, DropInstruction, IndicatorInstruction, MergeInstruction, MergePart,
    ReplaceInstruction, Stage, StageFactory, StageKind,
};
use crate::types::ColumnPlan;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, error};

/// Tag prefix of the indicator part of a merged column.
pub const INDICATOR_TAG_PREFIX: &str = "IsMissing";

/// One stage group: a batch of same-kind instructions for one collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "stage", content = "instructions", rename_all = "snake_case")]
pub enum StageGroup {
    Indicator(Vec<IndicatorInstruction>),
    Coercer(Vec<CoerceInstruction>),
    Replacer(Vec<ReplaceInstruction>),
    Merger(Vec<MergeInstruction>),
    Dropper(DropInstruction),
}

impl StageGroup {
    pub fn kind(&self) -> StageKind {
        match self {
            Self::Indicator(_) => StageKind::Indicator,
            Self::Coercer(_) => StageKind::Coercer,
            Self::Replacer(_) => StageKind::Replacer,
            Self::Merger(_) => StageKind::Merger,
            Self::Dropper(_) => StageKind::Dropper,
        }
    }

    /// Number of instructions (columns) in the group.
    pub fn len(&self) -> usize {
        match self {
            Self::Indicator(v) => v.len(),
            Self::Coercer(v) => v.len(),
            Self::Replacer(v) => v.len(),
            Self::Merger(v) => v.len(),
            Self::Dropper(d) => d.columns.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Build the collaborator for this group.
    pub fn instantiate(&self, factory: &dyn StageFactory) -> Box<dyn Stage> {
        match self {
            Self::Indicator(v) => factory.indicator(v.clone()),
            Self::Coercer(v) => factory.coercer(v.clone()),
            Self::Replacer(v) => factory.replacer(v.clone()),
            Self::Merger(v) => factory.merger(v.clone()),
            Self::Dropper(d) => factory.dropper(d.clone()),
        }
    }
}

impl fmt::Display for StageGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind())?;
        match self {
            Self::Indicator(v) => {
                for i in v {
                    write!(f, "\n    {} -> {}", i.source, i.output)?;
                }
            }
            Self::Coercer(v) => {
                for i in v {
                    write!(f, "\n    {} as {}", i.column, i.target)?;
                }
            }
            Self::Replacer(v) => {
                for i in v {
                    let mode = if i.impute_by_slot { "by slot" } else { "whole column" };
                    write!(f, "\n    {} -> {} ({}, {})", i.source, i.output, i.strategy, mode)?;
                }
            }
            Self::Merger(v) => {
                for i in v {
                    let parts: Vec<String> = i
                        .parts
                        .iter()
                        .map(|p| format!("{}:{}", p.tag, p.column))
                        .collect();
                    write!(f, "\n    [{}] -> {}", parts.join(", "), i.output)?;
                }
            }
            Self::Dropper(d) => {
                write!(f, "\n    drop [{}]", d.columns.join(", "))?;
                write!(f, "\n    order [{}]", d.output_order.join(", "))?;
            }
        }
        Ok(())
    }
}

/// Accumulates instructions per group while walking the plans.
#[derive(Debug, Default)]
struct GroupAccumulator {
    indicators: Vec<IndicatorInstruction>,
    coercions: Vec<CoerceInstruction>,
    replacements: Vec<ReplaceInstruction>,
    merges: Vec<MergeInstruction>,
    drops: Vec<String>,
    outputs: Vec<String>,
}

impl GroupAccumulator {
    fn push(&mut self, plan: &ColumnPlan) {
        self.outputs.push(plan.output.clone());

        let Some(indicator) = &plan.indicator else {
            self.replacements.push(ReplaceInstruction {
                source: plan.source.clone(),
                output: plan.output.clone(),
                strategy: plan.strategy,
                impute_by_slot: plan.impute_by_slot,
            });
            return;
        };

        self.indicators.push(IndicatorInstruction {
            source: plan.source.clone(),
            output: indicator.indicator_column.clone(),
        });
        if indicator.needs_coercion {
            self.coercions.push(CoerceInstruction {
                column: indicator.indicator_column.clone(),
                target: plan.source_type.item,
            });
        }
        self.replacements.push(ReplaceInstruction {
            source: plan.source.clone(),
            output: indicator.value_column.clone(),
            strategy: plan.strategy,
            impute_by_slot: plan.impute_by_slot,
        });
        self.merges.push(MergeInstruction {
            output: plan.output.clone(),
            parts: vec![
                MergePart {
                    tag: plan.source.clone(),
                    column: indicator.value_column.clone(),
                },
                MergePart {
                    tag: format!("{}.{}", INDICATOR_TAG_PREFIX, plan.source),
                    column: indicator.indicator_column.clone(),
                },
            ],
        });
        self.drops.push(indicator.value_column.clone());
        self.drops.push(indicator.indicator_column.clone());
    }

    /// Finalize into the non-empty groups, in pipeline order.
    fn finish(self) -> Vec<StageGroup> {
        let mut groups = Vec::with_capacity(5);
        if !self.indicators.is_empty() {
            groups.push(StageGroup::Indicator(self.indicators));
        }
        if !self.coercions.is_empty() {
            groups.push(StageGroup::Coercer(self.coercions));
        }
        if !self.replacements.is_empty() {
            groups.push(StageGroup::Replacer(self.replacements));
        }
        if !self.merges.is_empty() {
            groups.push(StageGroup::Merger(self.merges));
        }
        if !self.drops.is_empty() {
            groups.push(StageGroup::Dropper(DropInstruction {
                columns: self.drops,
                output_order: self.outputs,
            }));
        }
        groups
    }
}

/// Builds a [`ComposedPipeline`] from resolved column plans.
pub struct PipelineAssembler;

impl PipelineAssembler {
    /// Group the plans, instantiate one collaborator per non-empty group and
    /// verify the resulting schema.
    pub fn assemble(
        plans: Vec<ColumnPlan>,
        input: &ColumnSchema,
        factory: &dyn StageFactory,
    ) -> Result<ComposedPipeline> {
        let mut accumulator = GroupAccumulator::default();
        for plan in &plans {
            accumulator.push(plan);
        }
        let groups = accumulator.finish();

        let mut schema = input.clone();
        let mut stages = Vec::with_capacity(groups.len());
        for group in &groups {
            let stage = group.instantiate(factory);
            schema = stage.output_schema(&schema)?;
            debug!("Assembled {} stage with {} instruction(s)", group.kind(), group.len());
            stages.push(stage);
        }

        let output = Self::verify_output(&plans, input, &schema)?;

        Ok(ComposedPipeline::new(input.clone(), output, plans, groups, stages))
    }

    /// The staged schema must be the untouched input columns followed by the
    /// requested outputs, in request order. Returns the projection onto the
    /// requested outputs.
    fn verify_output(
        plans: &[ColumnPlan],
        input: &ColumnSchema,
        staged: &ColumnSchema,
    ) -> Result<ColumnSchema> {
        let outputs: Vec<&str> = plans.iter().map(|p| p.output.as_str()).collect();
        let requested: HashSet<&str> = outputs.iter().copied().collect();
        let expected: Vec<&str> = input
            .column_names()
            .into_iter()
            .filter(|name| !requested.contains(name))
            .chain(outputs.iter().copied())
            .collect();
        let actual = staged.column_names();

        if actual != expected {
            error!(
                "Assembled schema {:?} does not match expected {:?}",
                actual, expected
            );
            return Err(ImputeError::InternalInvariant(format!(
                "assembled schema {:?} does not match expected {:?}",
                actual, expected
            )));
        }

        let output = staged.select(&outputs)?;
        if output.column_names() != outputs {
            return Err(ImputeError::InternalInvariant(format!(
                "output schema {:?} does not match requested {:?}",
                output.column_names(),
                outputs
            )));
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StrategyKind;
    use crate::schema::SchemaColumn;
    use crate::stages::PolarsStageFactory;
    use crate::types::{ColumnType, IndicatorPlan, ItemKind};
    use pretty_assertions::assert_eq;

    fn input() -> ColumnSchema {
        ColumnSchema::new(vec![
            SchemaColumn::new("id", ColumnType::scalar(ItemKind::Int64)),
            SchemaColumn::new("age", ColumnType::scalar(ItemKind::Float64)),
            SchemaColumn::new("smoker", ColumnType::scalar(ItemKind::Boolean)),
        ])
    }

    fn plain(output: &str, source: &str, item: ItemKind) -> ColumnPlan {
        ColumnPlan {
            output: output.to_string(),
            source: source.to_string(),
            source_type: ColumnType::scalar(item),
            strategy: StrategyKind::Mean,
            impute_by_slot: true,
            indicator: None,
        }
    }

    fn with_indicator(mut plan: ColumnPlan, index: usize, needs_coercion: bool) -> ColumnPlan {
        plan.indicator = Some(IndicatorPlan {
            indicator_column: format!("__is_missing_{index}"),
            value_column: format!("__replaced_{index}"),
            needs_coercion,
        });
        plan
    }

    #[test]
    fn test_only_replacer_without_indicators() {
        let plans = vec![plain("age", "age", ItemKind::Float64)];

        let pipeline = PipelineAssembler::assemble(plans, &input(), &PolarsStageFactory).unwrap();

        assert_eq!(pipeline.stage_kinds(), vec![StageKind::Replacer]);
        assert_eq!(pipeline.output_schema().column_names(), vec!["age"]);
    }

    #[test]
    fn test_full_chain_with_coercion() {
        let plans = vec![with_indicator(plain("age", "age", ItemKind::Float64), 0, true)];

        let pipeline = PipelineAssembler::assemble(plans, &input(), &PolarsStageFactory).unwrap();

        assert_eq!(
            pipeline.stage_kinds(),
            vec![
                StageKind::Indicator,
                StageKind::Coercer,
                StageKind::Replacer,
                StageKind::Merger,
                StageKind::Dropper,
            ]
        );
        assert_eq!(
            pipeline.groups()[3],
            StageGroup::Merger(vec![MergeInstruction {
                output: "age".to_string(),
                parts: vec![
                    MergePart {
                        tag: "age".to_string(),
                        column: "__replaced_0".to_string(),
                    },
                    MergePart {
                        tag: "IsMissing.age".to_string(),
                        column: "__is_missing_0".to_string(),
                    },
                ],
            }])
        );
        assert_eq!(
            pipeline.output_schema().get("age").unwrap().column_type,
            ColumnType::vector(ItemKind::Float64, Some(2))
        );
    }

    #[test]
    fn test_identity_indicator_skips_coercer() {
        let mut plan = with_indicator(plain("smoker", "smoker", ItemKind::Boolean), 0, false);
        plan.strategy = StrategyKind::Maximum;
        let plans = vec![plan];

        let pipeline = PipelineAssembler::assemble(plans, &input(), &PolarsStageFactory).unwrap();

        assert!(!pipeline.stage_kinds().contains(&StageKind::Coercer));
    }

    #[test]
    fn test_mixed_requests_keep_request_order() {
        let plans = vec![
            with_indicator(plain("age_filled", "age", ItemKind::Float64), 0, true),
            plain("id", "id", ItemKind::Int64),
        ];

        let pipeline = PipelineAssembler::assemble(plans, &input(), &PolarsStageFactory).unwrap();

        assert_eq!(pipeline.output_schema().column_names(), vec!["age_filled", "id"]);
        let StageGroup::Dropper(drop) = pipeline.groups().last().unwrap() else {
            panic!("expected a dropper group");
        };
        assert_eq!(drop.columns, vec!["__replaced_0", "__is_missing_0"]);
        assert_eq!(drop.output_order, vec!["age_filled", "id"]);
    }

    /// Polars stages, except for a dropper that keeps every temporary column.
    struct LeakingDropperFactory;

    impl StageFactory for LeakingDropperFactory {
        fn indicator(&self, instructions: Vec<IndicatorInstruction>) -> Box<dyn Stage> {
            PolarsStageFactory.indicator(instructions)
        }

        fn coercer(&self, instructions: Vec<CoerceInstruction>) -> Box<dyn Stage> {
            PolarsStageFactory.coercer(instructions)
        }

        fn replacer(&self, instructions: Vec<ReplaceInstruction>) -> Box<dyn Stage> {
            PolarsStageFactory.replacer(instructions)
        }

        fn merger(&self, instructions: Vec<MergeInstruction>) -> Box<dyn Stage> {
            PolarsStageFactory.merger(instructions)
        }

        fn dropper(&self, instruction: DropInstruction) -> Box<dyn Stage> {
            PolarsStageFactory.dropper(DropInstruction {
                columns: Vec::new(),
                output_order: instruction.output_order,
            })
        }
    }

    #[test]
    fn test_leftover_temporary_is_internal_error() {
        let plans = vec![with_indicator(plain("age", "age", ItemKind::Float64), 0, true)];

        let result = PipelineAssembler::assemble(plans, &input(), &LeakingDropperFactory);

        let Err(err) = result else {
            panic!("expected assembly to fail");
        };
        assert!(matches!(err, ImputeError::InternalInvariant(ref reason) if reason.contains("__replaced_0")));
        assert!(err.is_internal());
    }

    #[test]
    fn test_unsupported_replacement_fails_assembly() {
        let schema = ColumnSchema::new(vec![SchemaColumn::new(
            "city",
            ColumnType::scalar(ItemKind::Text),
        )]);
        let plans = vec![plain("city", "city", ItemKind::Text)];

        let result = PipelineAssembler::assemble(plans, &schema, &PolarsStageFactory);

        assert!(matches!(result, Err(ImputeError::ReplacementUnsupported { .. })));
    }

    #[test]
    fn test_group_display() {
        let group = StageGroup::Replacer(vec![ReplaceInstruction {
            source: "age".to_string(),
            output: "age".to_string(),
            strategy: StrategyKind::Mean,
            impute_by_slot: true,
        }]);

        assert_eq!(group.to_string(), "Replacer\n    age -> age (mean, by slot)");
    }
}
