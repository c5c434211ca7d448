//! Policy evaluation and authorization decisions.

mod arbiter;
mod evaluator;
mod resolver;

pub use arbiter::{is_owner, AuthorizationArbiter, DecisionAudit, DecisionRecord};
pub use evaluator::ConditionEvaluator;
pub use resolver::AttributeResolver;
