mod middleware;
mod public;

pub use middleware::{LogOptions, RequestContext, cache_control_value};
pub use public::{HttpState, RouterOptions, build_router};
