//! Per-column planning.
//!
//! Turns one [`ColumnRequest`] into a fully resolved [`ColumnPlan`]: the
//! effective strategy and flags, and, when an indicator is emitted, the
//! temporary columns and whether the indicator needs a coercion stage.
//!
//! The planner only enforces what it alone can verify (source presence,
//! vector shape, indicator representability). Whether a strategy suits an
//! item type is left to the replacer.

use crate::config::{ColumnRequest, PipelineDefaults};
use crate::error::{ImputeError, Result};
use crate::planner::compatibility::TypeCompatibilityChecker;
use crate::planner::names::{INDICATOR_LABEL, REPLACEMENT_LABEL, TempNameAllocator};
use crate::schema::SchemaView;
use crate::types::{ColumnPlan, ColumnType, IndicatorPlan};
use tracing::debug;

/// Plans individual columns.
pub struct ColumnPlanner;

impl ColumnPlanner {
    /// Resolve one request against the schema.
    ///
    /// Temporary names are drawn from `allocator` only after every check has
    /// passed, so a failed plan never consumes names.
    pub fn plan<S: SchemaView + ?Sized>(
        request: &ColumnRequest,
        defaults: &PipelineDefaults,
        schema: &S,
        allocator: &mut TempNameAllocator,
    ) -> Result<ColumnPlan> {
        let source = request.source_name();
        let index = schema
            .try_get_column_index(source)
            .ok_or_else(|| ImputeError::ColumnNotFound(source.to_string()))?;
        let source_type = schema
            .column_type(index)
            .ok_or_else(|| ImputeError::ColumnNotFound(source.to_string()))?;

        let strategy = request.strategy.unwrap_or(defaults.strategy);
        let impute_by_slot = Self::resolve_slot_flag(request, defaults, &source_type)?;
        let emit_indicator = request.emit_indicator.unwrap_or(defaults.emit_indicator);

        let indicator = if emit_indicator {
            let compat = TypeCompatibilityChecker::can_represent_indicator(source_type.item);
            if !compat.possible {
                return Err(ImputeError::IncompatibleIndicator {
                    column: request.output.clone(),
                    item_type: source_type.item.to_string(),
                });
            }
            Some(IndicatorPlan {
                indicator_column: allocator.allocate_one(INDICATOR_LABEL),
                value_column: allocator.allocate_one(REPLACEMENT_LABEL),
                needs_coercion: !compat.is_identity,
            })
        } else {
            None
        };

        debug!(
            "Planned '{}' from '{}' ({}): strategy={}, by_slot={}, indicator={}",
            request.output,
            source,
            source_type,
            strategy,
            impute_by_slot,
            indicator.is_some()
        );

        Ok(ColumnPlan {
            output: request.output.clone(),
            source: source.to_string(),
            source_type,
            strategy,
            impute_by_slot,
            indicator,
        })
    }

    /// Effective slot flag.
    ///
    /// Variable-length vectors can only be imputed as a whole: an explicit
    /// `true` is rejected, an unset flag resolves to `false`.
    fn resolve_slot_flag(
        request: &ColumnRequest,
        defaults: &PipelineDefaults,
        source_type: &ColumnType,
    ) -> Result<bool> {
        let variable_length = !source_type.has_known_length();
        match request.impute_by_slot {
            Some(true) if variable_length => Err(ImputeError::SlotImputationUnsupported(
                request.output.clone(),
            )),
            Some(flag) => Ok(flag),
            None => Ok(defaults.impute_by_slot && !variable_length),
        }
    }
}
