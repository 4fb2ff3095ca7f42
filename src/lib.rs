pub mod error;
pub mod interp;
pub mod resolver;
pub mod schema;
pub mod tree;
pub mod value;

pub use error::StrataError;
pub use resolver::{ResolverFn, register_resolver};
pub use schema::{EnumType, Field, FieldType, Schema, TypeKind};
pub use tree::{ConfigTree, Flag, NodeView, merge};
pub use value::{Scalar, Value};
