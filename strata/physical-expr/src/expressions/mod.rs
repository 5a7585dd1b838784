pub mod alias;
pub mod arithmetic;
pub mod between;
pub mod boolean;
pub mod call;
pub mod case;
pub mod cast;
pub mod coalesce;
pub mod column;
pub mod compare;
pub mod in_list;
pub mod is_null;
pub mod like;
pub mod literal;
pub mod subscript;

pub use alias::AliasExpr;
pub use arithmetic::ArithmeticExpr;
pub use between::BetweenExpr;
pub use boolean::{AndExpr, NotExpr, OrExpr};
pub use call::CallExpr;
pub use case::{CaseExpr, CaseWhenThen};
pub use cast::CastExpr;
pub use coalesce::CoalesceExpr;
pub use column::ColumnExpr;
pub use compare::CompareExpr;
pub use in_list::InListExpr;
pub use is_null::IsNullExpr;
pub use like::LikeExpr;
pub use literal::LiteralExpr;
pub use subscript::SubscriptExpr;
