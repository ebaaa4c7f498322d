mod endpoint;
pub use endpoint::*;

pub mod error;

mod method_descriptor;
pub use method_descriptor::*;

mod service_registry;
pub use service_registry::*;

mod value_kind;
pub use value_kind::*;

mod with_methods_trait;
pub use with_methods_trait::*;
