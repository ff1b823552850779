use camino::Utf8PathBuf;

/// Process exit status reported for each class of fatal setup failure.
///
/// These values are relied on by scripts that branch on the exit status and
/// must not be renumbered.
pub mod exit_code {
    pub const SUCCESS: u8 = 0;
    pub const FAILURE: u8 = 1;
    pub const DATABASE_MISSING: u8 = 2;
    pub const UPDATER_MISSING: u8 = 3;
    pub const UPDATER_FAILED: u8 = 4;
    pub const CONFIG_INVALID: u8 = 5;
    pub const USAGE: u8 = 6;
}

/// Fatal setup errors for the ip2geo library.
///
/// Per-line lookup misses and malformed input lines are not errors; they never
/// surface through this type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// MMDB database file was not found at the expected path.
    #[error("required GeoIP database not present: {path}\n       Use \"--download\" to fetch it, or point \"--geoipdir\" at the directory holding it.")]
    DatabaseNotFound { path: Utf8PathBuf },

    /// MMDB database file exists but could not be opened as a MaxMind database.
    #[error("could not open GeoIP database {path}")]
    DatabaseUnreadable {
        path: Utf8PathBuf,
        #[source]
        source: maxminddb::MaxMindDBError,
    },

    /// The `geoipupdate` executable is not installed or not on `PATH`.
    #[error("no \"{program}\" executable found\n       Install it from https://github.com/maxmind/geoipupdate (or your package manager) and retry.")]
    UpdaterNotFound { program: String },

    /// The `geoipupdate` executable ran but reported failure.
    #[error("\"{program}\" failed ({status}); check the account ID, license key and edition IDs in {config}")]
    UpdaterFailed {
        program: String,
        status: String,
        config: Utf8PathBuf,
    },

    /// The directory to download into could not be created.
    #[error("could not create GeoIP database directory {path}")]
    DatabaseDirUnwritable {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The `geoipupdate` configuration file does not exist.
    #[error("GeoIP configuration file not present: {path}\n       Create it, or pass \"--geoipconf\" with the location of an existing GeoIP.conf.")]
    ConfigNotFound { path: Utf8PathBuf },

    /// The `geoipupdate` configuration file exists but could not be read.
    #[error("could not read GeoIP configuration {path}")]
    ConfigUnreadable {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The `geoipupdate` configuration file could not be parsed.
    #[error("malformed GeoIP configuration {path}: {reason}")]
    ConfigMalformed { path: Utf8PathBuf, reason: String },

    /// A field registry was built from conflicting descriptors.
    #[error("invalid field registry: {reason}")]
    InvalidRegistry { reason: String },
}

impl Error {
    /// The exit status the process should terminate with for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::DatabaseNotFound { .. } | Error::DatabaseUnreadable { .. } => {
                exit_code::DATABASE_MISSING
            }
            Error::UpdaterNotFound { .. } => exit_code::UPDATER_MISSING,
            Error::UpdaterFailed { .. } | Error::DatabaseDirUnwritable { .. } => {
                exit_code::UPDATER_FAILED
            }
            Error::ConfigNotFound { .. }
            | Error::ConfigUnreadable { .. }
            | Error::ConfigMalformed { .. } => exit_code::CONFIG_INVALID,
            Error::InvalidRegistry { .. } => exit_code::USAGE,
        }
    }
}

/// Convenience type alias for Results using the library error.
pub type Result<T> = std::result::Result<T, Error>;
