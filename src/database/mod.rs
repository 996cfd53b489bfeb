pub mod descriptor;
pub mod factory;
pub mod policy;
pub mod registry;
pub mod router;

pub use descriptor::ConnectionDescriptor;
pub use factory::{ConnectionError, ConnectionFactory};
pub use policy::{TenancyMode, TenantContext};
pub use registry::ConnectionRegistry;
pub use router::{RouteError, RouterState, TenantRouter};
