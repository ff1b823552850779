//! The ip2geo library: GeoIP and ASN enrichment of IPv4 addresses.
//!
//! Addresses are read one per line, looked up in the GeoLite2 City and ASN
//! databases, and written back as a line rendered from a `%` token template or
//! as a flat JSON object.
//!
//! # Examples
//!
//! Formatting a record without touching a database:
//!
//! ```rust
//! use ip2geo::db::AsRecord;
//! use ip2geo::{FieldRegistry, Normalizer, Template};
//!
//! let registry = FieldRegistry::modern();
//! let asn = AsRecord { number: Some(15169), organization: Some("GOOGLE".into()) };
//! let record = Normalizer::new(&registry).normalize("8.8.8.8", None, Some(&asn));
//!
//! let template = Template::compile("%ip AS%asnum %asname (%ci)", &registry);
//! assert_eq!(template.render(&record), "8.8.8.8 AS15169 GOOGLE (None)");
//! ```
//!
//! Enriching a stream with the real databases:
//!
//! ```rust,no_run
//! use camino::Utf8Path;
//! use ip2geo::{FieldRegistry, Formatter, LineDriver, MaxMindDb};
//!
//! # fn main() -> anyhow::Result<()> {
//! let registry = FieldRegistry::modern();
//! let db = MaxMindDb::open(Utf8Path::new("/usr/share/GeoIP"))?;
//! let mut driver = LineDriver::new(&db, &registry, Formatter::new(None, false, &registry));
//! driver.run(std::io::stdin(), &mut std::io::stdout())?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod db;
pub mod driver;
pub mod error;
pub mod fields;
pub mod format;
pub mod input;
pub mod record;
pub mod template;
pub mod update;

pub use crate::db::{GeoLookup, MaxMindDb};
pub use crate::driver::LineDriver;
pub use crate::error::Error;
pub use crate::fields::{Field, FieldDescriptor, FieldRegistry};
pub use crate::format::Formatter;
pub use crate::record::{NormalizedRecord, Normalizer};
pub use crate::template::Template;
