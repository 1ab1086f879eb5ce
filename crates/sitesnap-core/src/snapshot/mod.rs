//! Site snapshot enumeration.
//!
//! This module turns a set of filesystem roots into the lazy sequence of
//! entries that make up one export: real files first, then synthetic ones.

pub mod policy;
pub mod roots;
pub mod walker;

pub use policy::ExclusionPolicy;
pub use roots::SiteRoot;
pub use roots::SiteRoots;
pub use walker::SiteEnumerator;
pub use walker::Walked;
