//! Control Catalog
//!
//! Declarative STIG-style control definitions: policy text, reference tags
//! (CCI, NIST 800-53), an applicability rule, and the check procedure the
//! engine executes.
//!
//! # Usage
//!
//! ```ignore
//! use redoubt::catalog::Catalog;
//!
//! let catalog = Catalog::from_file("controls/stig_sqlserver2022_db.yml")?;
//! for control in catalog.controls() {
//!     println!("{}: {} [{}]", control.id, control.title, control.severity);
//! }
//! ```

mod control;
mod loader;
mod tags;

pub use control::{
    Applicability, CheckSpec, Compare, ContextFlag, ContextKey, Control, Expected, Severity,
};
pub use loader::{Catalog, CatalogError, CatalogStats};
pub use tags::{ControlTags, NistRef};
