//! Step skip assertions.

use tracing::{debug, warn};

use crate::services::ExpressionEvaluator;
use crate::topology::{PhaseStep, SkipScope, StepSkipStrategy};

use super::decision::{Advice, AdvisoryDecision};
use super::event::ExecutionContext;

/// Decide whether a step should be skipped before it runs.
///
/// A strategy naming the step explicitly wins over an all-steps strategy.
/// An assertion that fails to evaluate still skips, carrying the error so
/// the executor can surface it.
pub fn skip_advice(
    phase_step: &PhaseStep,
    step_id: &str,
    evaluator: &dyn ExpressionEvaluator,
    context: &ExecutionContext,
) -> Advice {
    let Some(strategy) = select_strategy(&phase_step.skip_strategies, step_id) else {
        return Advice::not_applicable();
    };
    let expression = strategy.assertion_expression.clone();

    match evaluator.evaluate(&expression, context) {
        Ok(true) => {
            debug!(step = %step_id, expression = %expression, "Skip assertion held");
            AdvisoryDecision::Skip {
                expression,
                error: None,
            }
            .into()
        }
        Ok(false) => Advice::not_applicable(),
        Err(e) => {
            warn!(
                step = %step_id,
                expression = %expression,
                error = %e,
                "Skip assertion failed to evaluate"
            );
            AdvisoryDecision::Skip {
                expression,
                error: Some(e.to_string()),
            }
            .into()
        }
    }
}

fn select_strategy<'a>(
    strategies: &'a [StepSkipStrategy],
    step_id: &str,
) -> Option<&'a StepSkipStrategy> {
    strategies
        .iter()
        .find(|s| s.scope == SkipScope::SpecificSteps && s.covers(step_id))
        .or_else(|| strategies.iter().find(|s| s.scope == SkipScope::AllSteps))
}
