//! Compiles bound `strata_expr::Expr` trees into vectorized `PhysicalExpr`
//! nodes that evaluate directly against Arrow arrays, and the scalar
//! function registry they dispatch through.

pub mod columnar_value;
pub mod compile;
pub mod convert;
pub mod expressions;
pub mod functions;
pub mod physical_expr;

pub use columnar_value::ColumnarValue;
pub use compile::compile;
pub use convert::{cast_array, scalar_to_array, scalar_vec_to_array};
pub use expressions::{
    AliasExpr, AndExpr, ArithmeticExpr, BetweenExpr, CallExpr, CaseExpr, CaseWhenThen, CastExpr,
    CoalesceExpr, ColumnExpr, CompareExpr, InListExpr, IsNullExpr, LikeExpr, LiteralExpr, NotExpr,
    OrExpr, SubscriptExpr,
};
pub use functions::{FunctionRegistry, ScalarFunctionImpl, ScalarFunctionSignature};
pub use physical_expr::{PhysicalExpr, PhysicalExprRef};
