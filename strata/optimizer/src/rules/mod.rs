//! The fifteen named rewrite rules, grouped by file the way the driver
//! references them: boolean simplification, constant folding, the
//! pattern-driven predicate rewriters, predicate compaction, the three
//! pushdown rules, and join reordering — in that dependency order.

pub mod boolean_rewrite;
pub mod constant_fold;
pub mod expr_rewrite;
pub mod join_reorder;
pub mod predicate_compaction;
pub mod predicate_rewrite;
pub mod pushdown;

pub use boolean_rewrite::{BooleanRewriteAndFlatten, BooleanRewriteDemorganNary, BooleanRewriteInversion};
pub use constant_fold::{ConstantFoldExpression, ConstantFoldReduce};
pub use join_reorder::{InnerJoinCorrelatedFilter, InnerJoinSmallestTableLeft};
pub use predicate_compaction::PredicateCompaction;
pub use predicate_rewrite::{
    PredicateRewriterAnyeqToContains, PredicateRewriterCaseToIfnull, PredicateRewriterEndsWithToLike,
    PredicateRewriterReplaceLikeWithInString, PredicateRewriterStartsWithToLike,
};
pub use pushdown::{LimitPushdown, PredicatePushdown, ProjectionPushdown};

use crate::rule::OptimizerRule;

/// The rule set in spec order. `Optimizer::new` uses this to build its
/// default pipeline; order matters (§4.3): boolean simplification before
/// predicate pushdown, pushdown before projection pushdown, limit pushdown
/// last.
pub fn default_rules() -> Vec<Box<dyn OptimizerRule>> {
    vec![
        Box::new(ConstantFoldExpression::new()),
        Box::new(ConstantFoldReduce::new()),
        Box::new(BooleanRewriteInversion::new()),
        Box::new(BooleanRewriteAndFlatten::new()),
        Box::new(BooleanRewriteDemorganNary::new()),
        Box::new(PredicateRewriterStartsWithToLike::new()),
        Box::new(PredicateRewriterEndsWithToLike::new()),
        Box::new(PredicateRewriterReplaceLikeWithInString::new()),
        Box::new(PredicateRewriterCaseToIfnull::new()),
        Box::new(PredicateRewriterAnyeqToContains::new()),
        Box::new(PredicateCompaction::new()),
        Box::new(PredicatePushdown::new()),
        Box::new(ProjectionPushdown::new()),
        Box::new(LimitPushdown::new()),
        Box::new(InnerJoinSmallestTableLeft::new()),
        Box::new(InnerJoinCorrelatedFilter::new()),
    ]
}
