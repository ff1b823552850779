//! Refreshing the databases with MaxMind's `geoipupdate`.

use std::io;
use std::process::{Command, Stdio};

use camino::Utf8Path;

use crate::config::GeoIpConf;
use crate::error::{Error, Result};

pub const GEOIPUPDATE: &str = "geoipupdate";

/// Runs `geoipupdate` against a configuration file.
#[derive(Clone, Debug)]
pub struct Updater {
    program: String,
}

impl Default for Updater {
    fn default() -> Self {
        Self::with_program(GEOIPUPDATE)
    }
}

impl Updater {
    /// Use `program` instead of the `geoipupdate` found on `PATH`.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self, conf: &GeoIpConf, dir: Option<&Utf8Path>) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-f").arg(conf.path.as_str());
        if let Some(dir) = dir {
            cmd.arg("-d").arg(dir.as_str());
        }
        if log::log_enabled!(log::Level::Debug) {
            cmd.arg("-v");
        }
        cmd.stdin(Stdio::null());
        cmd
    }

    /// Download the editions listed in `conf`, into `dir` when given or the
    /// configuration's `DatabaseDirectory` otherwise.
    ///
    /// # Errors
    ///
    /// `DatabaseDirUnwritable` when the target directory cannot be created,
    /// `UpdaterNotFound` when the program is not installed, `UpdaterFailed`
    /// when it cannot be started or exits unsuccessfully.
    pub fn run(&self, conf: &GeoIpConf, dir: Option<&Utf8Path>) -> Result<()> {
        if let Some(dir) = dir.or(conf.database_directory.as_deref()) {
            if !dir.is_dir() {
                log::info!("creating {}", dir);
                std::fs::create_dir_all(dir).map_err(|source| Error::DatabaseDirUnwritable {
                    path: dir.to_path_buf(),
                    source,
                })?;
            }
        }

        let mut cmd = self.command(conf, dir);
        log::info!("running {:?}", cmd);

        let status = match cmd.status() {
            Ok(status) => status,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(Error::UpdaterNotFound {
                    program: self.program.clone(),
                })
            }
            Err(err) => {
                return Err(Error::UpdaterFailed {
                    program: self.program.clone(),
                    status: err.to_string(),
                    config: conf.path.clone(),
                })
            }
        };

        if status.success() {
            log::info!("{} finished", self.program);
            Ok(())
        } else {
            Err(Error::UpdaterFailed {
                program: self.program.clone(),
                status: status.to_string(),
                config: conf.path.clone(),
            })
        }
    }
}
