//! Fragment records and their sources.
//!
//! - [`record`]: the [`Fragment`] type and Tn5 insertion sites
//! - [`reader`]: streaming fragment-file reader
//! - [`barcode`]: ordered cell barcode whitelists

pub mod barcode;
pub mod reader;
pub mod record;

pub use barcode::BarcodeWhitelist;
pub use reader::FragmentReader;
pub use record::Fragment;
