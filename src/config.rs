//! Locating the databases: `--geoipdir`, a `geoipupdate` configuration file,
//! or the usual system directories.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};

use crate::db::{ASN_DB_FILENAME, CITY_DB_FILENAME};
use crate::error::{Error, Result};

/// Where `geoipupdate` looks for its configuration by default.
pub const DEFAULT_CONF_PATH: &str = "/etc/GeoIP.conf";

/// Searched in order when no directory is configured.
pub const DEFAULT_DB_DIRS: [&str; 3] = [
    "/usr/share/GeoIP",
    "/opt/homebrew/var/GeoIP",
    "/var/lib/GeoIP",
];

/// The subset of a `GeoIP.conf` that ip2geo cares about.
///
/// The file is a list of `Key value...` lines; blank lines and lines starting
/// with `#` are ignored, as are keys this tool does not use.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GeoIpConf {
    pub path: Utf8PathBuf,
    pub database_directory: Option<Utf8PathBuf>,
    pub edition_ids: Vec<String>,
    pub account_id: Option<String>,
    pub license_key: Option<String>,
}

impl GeoIpConf {
    /// Read and parse the configuration at `path`.
    ///
    /// # Errors
    ///
    /// `ConfigNotFound` if the file does not exist, `ConfigUnreadable` if it
    /// cannot be read, `ConfigMalformed` if a line cannot be parsed.
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(Error::ConfigNotFound {
                    path: path.to_path_buf(),
                })
            }
            Err(err) if err.kind() == io::ErrorKind::InvalidData => {
                return Err(Error::ConfigMalformed {
                    path: path.to_path_buf(),
                    reason: "not valid UTF-8".to_string(),
                })
            }
            Err(source) => {
                return Err(Error::ConfigUnreadable {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let conf = Self::parse(path, &text)?;
        log::debug!("loaded {}", path);
        Ok(conf)
    }

    /// Parse configuration text; `path` is only used in error messages.
    pub fn parse(path: &Utf8Path, text: &str) -> Result<Self> {
        let malformed = |lineno: usize, reason: &str| Error::ConfigMalformed {
            path: path.to_path_buf(),
            reason: format!("line {lineno}: {reason}"),
        };

        let mut conf = GeoIpConf {
            path: path.to_path_buf(),
            ..Default::default()
        };

        for (i, line) in text.lines().enumerate() {
            let lineno = i + 1;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (key, value) = match line.split_once(char::is_whitespace) {
                Some((key, value)) if !value.trim().is_empty() => (key, value.trim()),
                _ => return Err(malformed(lineno, &format!("\"{line}\" has no value"))),
            };

            match key {
                "DatabaseDirectory" => {
                    conf.database_directory = Some(Utf8PathBuf::from(value));
                }
                "EditionIDs" | "ProductIds" => {
                    conf.edition_ids = value.split_whitespace().map(str::to_string).collect();
                }
                "AccountID" | "UserId" => {
                    if !value.chars().all(|c| c.is_ascii_digit()) {
                        return Err(malformed(lineno, "AccountID must be numeric"));
                    }
                    conf.account_id = Some(value.to_string());
                }
                "LicenseKey" => conf.license_key = Some(value.to_string()),
                other => log::trace!("ignoring {other} in {path}"),
            }
        }

        Ok(conf)
    }

    /// Check that `geoipupdate` will fetch both databases ip2geo reads.
    pub fn require_editions(&self) -> Result<()> {
        let missing: Vec<&str> = [CITY_DB_FILENAME, ASN_DB_FILENAME]
            .iter()
            .filter_map(|file| file.strip_suffix(".mmdb"))
            .filter(|edition| !self.edition_ids.iter().any(|id| id == edition))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::ConfigMalformed {
                path: self.path.clone(),
                reason: format!("EditionIDs must include {}", missing.join(" and ")),
            })
        }
    }
}

/// Pick the directory to open databases from.
///
/// An explicit directory wins, then `DatabaseDirectory` from the
/// configuration file, then the first of [`DEFAULT_DB_DIRS`] that exists.
pub fn resolve_database_dir(
    geoipdir: Option<&Utf8Path>,
    conf: Option<&GeoIpConf>,
) -> Utf8PathBuf {
    if let Some(dir) = geoipdir {
        return dir.to_path_buf();
    }
    if let Some(dir) = conf.and_then(|c| c.database_directory.as_ref()) {
        return dir.clone();
    }
    DEFAULT_DB_DIRS
        .iter()
        .map(Utf8Path::new)
        .find(|path| path.exists())
        .unwrap_or_else(|| Utf8Path::new(DEFAULT_DB_DIRS[0]))
        .to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# GeoIP.conf file for `geoipupdate` program, for versions >= 3.1.1.
AccountID 123456
LicenseKey 000000000000

# Enter the edition IDs of the databases you would like to update.
EditionIDs GeoLite2-ASN GeoLite2-City GeoLite2-Country

DatabaseDirectory /var/lib/GeoIP
LockFile /var/lib/GeoIP/.geoipupdate.lock
";

    fn parse(text: &str) -> Result<GeoIpConf> {
        GeoIpConf::parse(Utf8Path::new("GeoIP.conf"), text)
    }

    #[test]
    fn parses_geoipupdate_conf() {
        let conf = parse(SAMPLE).unwrap();
        assert_eq!(conf.account_id.as_deref(), Some("123456"));
        assert_eq!(conf.license_key.as_deref(), Some("000000000000"));
        assert_eq!(
            conf.database_directory,
            Some(Utf8PathBuf::from("/var/lib/GeoIP"))
        );
        assert_eq!(conf.edition_ids.len(), 3);
        conf.require_editions().unwrap();
    }

    #[test]
    fn key_without_value_is_malformed() {
        let err = parse("AccountID 1\nDatabaseDirectory\n").unwrap_err();
        assert_eq!(err.exit_code(), crate::error::exit_code::CONFIG_INVALID);
        assert!(err.to_string().contains("line 2"), "{err}");
    }

    #[test]
    fn non_numeric_account_is_malformed() {
        assert!(parse("AccountID abc\n").is_err());
    }

    #[test]
    fn missing_editions_are_reported() {
        let conf = parse("EditionIDs GeoLite2-Country GeoLite2-ASN\n").unwrap();
        let err = conf.require_editions().unwrap_err();
        assert!(err.to_string().contains("GeoLite2-City"), "{err}");
        assert!(!err.to_string().contains("GeoLite2-ASN"), "{err}");
    }

    #[test]
    fn missing_file_is_config_not_found() {
        let err = GeoIpConf::load(Utf8Path::new("/nonexistent/GeoIP.conf")).unwrap_err();
        assert!(matches!(err, Error::ConfigNotFound { .. }));
    }

    #[test]
    fn unreadable_path_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8Path::from_path(dir.path()).unwrap();
        let err = GeoIpConf::load(path).unwrap_err();
        assert!(matches!(err, Error::ConfigUnreadable { .. }), "{err:?}");
        assert_eq!(err.exit_code(), crate::error::exit_code::CONFIG_INVALID);
        assert!(err.to_string().contains(path.as_str()));
    }

    #[test]
    fn load_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("GeoIP.conf")).unwrap();
        std::fs::write(&path, SAMPLE).unwrap();
        let conf = GeoIpConf::load(&path).unwrap();
        assert_eq!(conf.path, path);
    }

    #[test]
    fn explicit_dir_beats_config() {
        let conf = parse("DatabaseDirectory /from/conf\n").unwrap();
        assert_eq!(
            resolve_database_dir(Some(Utf8Path::new("/explicit")), Some(&conf)),
            Utf8PathBuf::from("/explicit")
        );
        assert_eq!(
            resolve_database_dir(None, Some(&conf)),
            Utf8PathBuf::from("/from/conf")
        );
    }

    #[test]
    fn falls_back_to_system_dirs() {
        let dir = resolve_database_dir(None, None);
        assert!(DEFAULT_DB_DIRS.contains(&dir.as_str()));
    }
}
