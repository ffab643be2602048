pub mod registry;
pub mod value;

pub use registry::{DbError, TenantConnectionRegistry};
pub use value::{Params, SqlValue};
