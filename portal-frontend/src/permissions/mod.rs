//! Module/page permission resolution.
//!
//! Content-store payloads are normalized at the boundary ([`normalize`]),
//! joined with a user's view matrix once per snapshot ([`derive`]), and
//! evaluated per route ([`resolver`]).

pub mod aliases;
pub mod derive;
pub mod normalize;
pub mod resolver;
pub mod snapshot;

pub use aliases::SlugAliases;
pub use derive::{derive_state, DerivedPermissions};
pub use resolver::{AccessDecision, AllowReason, PermissionResolver, RouteMatch};
pub use snapshot::{Fetch, PermissionSnapshot};
