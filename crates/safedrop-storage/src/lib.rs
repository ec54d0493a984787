//! SafeDrop Storage Library
//!
//! Filesystem side of the upload pipeline:
//!
//! - [`LocalStorage`] moves a fully validated staged upload into the public
//!   storage root under its server-derived name.
//! - [`DeliveryGuard`] resolves a requested name to a file that is provably
//!   inside the storage root and carries an allow-listed extension.
//! - [`disposition`] builds `Content-Disposition` values safe for any client.

pub mod delivery;
pub mod disposition;
pub mod error;
pub mod local;

pub use delivery::{DeliveryGuard, ResolvedFile};
pub use disposition::{content_disposition, DispositionMode};
pub use error::{DeliveryError, StorageError, StorageResult};
pub use local::LocalStorage;
