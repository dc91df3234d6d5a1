//! Coarse-grained route policy: `(role, route-pattern, method)` grants loaded once at startup.
//! Keep logic small and fast; the table is immutable after load.

mod evaluator;
mod model;
mod pattern;
mod public;
mod source;

pub use evaluator::PolicyTable;
pub use model::{Decision, Method, PolicyRule};
pub use pattern::RoutePattern;
pub use public::{is_public, PUBLIC_ROUTES};
pub use source::{load_policy, parse_rules};
