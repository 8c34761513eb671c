//! Identity handling: the local ⇄ target mapping file, the blacklist,
//! automatic mapping discovery and bulk identity management.

pub mod auto_map;
pub mod blacklist;
pub mod manage;
pub mod mapping_file;

pub use auto_map::{auto_map, AutoMapOutcome};
pub use blacklist::Blacklist;
pub use manage::{manage, ManageReport, UserManageAction};
pub use mapping_file::IdentityMap;
