//! Logical plan optimization and physical planning (§4.3, §4.4): the fixed
//! sequence of rewrite rules that simplifies and pushes work toward
//! connectors, and the planner that lowers an optimized `LogicalPlan` into
//! the closed physical operator set `strata-physical-plan` executes.

pub mod optimizer;
pub mod physical_planner;
pub mod rule;
pub mod rules;

pub use optimizer::{Optimizer, OptimizerStats};
pub use physical_planner::PhysicalPlanner;
pub use rule::{ApplyOrder, OptimizerRule};
pub use rules::{
    BooleanRewriteAndFlatten, BooleanRewriteDemorganNary, BooleanRewriteInversion, ConstantFoldExpression,
    ConstantFoldReduce, InnerJoinCorrelatedFilter, InnerJoinSmallestTableLeft, LimitPushdown, PredicateCompaction,
    PredicatePushdown, PredicateRewriterAnyeqToContains, PredicateRewriterCaseToIfnull, PredicateRewriterEndsWithToLike,
    PredicateRewriterReplaceLikeWithInString, PredicateRewriterStartsWithToLike, ProjectionPushdown,
};
