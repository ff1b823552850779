//! Read-only access to the GeoLite2 City and ASN databases.

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr};

use camino::{Utf8Path, Utf8PathBuf};
use maxminddb::{geoip2, MaxMindDBError, Mmap, Reader};

use crate::error::{Error, Result};

pub const CITY_DB_FILENAME: &str = "GeoLite2-City.mmdb";
pub const ASN_DB_FILENAME: &str = "GeoLite2-ASN.mmdb";

/// Location attributes for one address, as found in the City database.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LocationRecord {
    pub city: Option<String>,
    pub region_code: Option<String>,
    pub country_name: Option<String>,
    pub postal_code: Option<String>,
    pub country_code: Option<String>,
    pub country_code3: Option<String>,
    pub continent: Option<String>,
    pub metro_code: Option<u16>,
    pub area_code: Option<String>,
    pub time_zone: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Autonomous system that announces an address.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AsRecord {
    pub number: Option<u32>,
    pub organization: Option<String>,
}

/// Source of per-address location and AS data.
///
/// A miss (address not in the database, or not an address at all) is `None`;
/// implementations never fail a lookup.
pub trait GeoLookup {
    fn lookup_location(&self, ip: &str) -> Option<LocationRecord>;

    fn lookup_asn(&self, ip: &str) -> Option<AsRecord>;
}

/// The pair of memory-mapped MaxMind databases.
pub struct MaxMindDb {
    city_reader: Reader<Mmap>,
    asn_reader: Reader<Mmap>,
}

impl MaxMindDb {
    /// Open `GeoLite2-City.mmdb` and `GeoLite2-ASN.mmdb` from `dir`.
    ///
    /// # Errors
    ///
    /// `DatabaseNotFound` if either file is absent, `DatabaseUnreadable` if it
    /// is not a valid MaxMind database.
    pub fn open(dir: &Utf8Path) -> Result<Self> {
        let city_reader = open_reader(dir.join(CITY_DB_FILENAME))?;
        let asn_reader = open_reader(dir.join(ASN_DB_FILENAME))?;
        Ok(Self {
            city_reader,
            asn_reader,
        })
    }
}

fn open_reader(path: Utf8PathBuf) -> Result<Reader<Mmap>> {
    if !path.is_file() {
        return Err(Error::DatabaseNotFound { path });
    }
    match Reader::open_mmap(&path) {
        Ok(reader) => {
            log::debug!(
                "opened {} ({}, built {})",
                path,
                reader.metadata.database_type,
                reader.metadata.build_epoch
            );
            Ok(reader)
        }
        Err(source) => Err(Error::DatabaseUnreadable { path, source }),
    }
}

/// Only dotted-quad IPv4 is looked up; anything else is a miss.
#[inline]
fn parse_ipv4(ip: &str) -> Option<IpAddr> {
    ip.parse::<Ipv4Addr>().ok().map(IpAddr::V4)
}

#[inline]
fn english(names: &Option<BTreeMap<&str, &str>>) -> Option<String> {
    names
        .as_ref()
        .and_then(|n| n.get("en"))
        .map(|name| (*name).to_string())
}

fn log_lookup_error(db: &str, ip: &str, err: MaxMindDBError) {
    match err {
        MaxMindDBError::AddressNotFoundError(_) => {}
        err => log::debug!("{db} lookup for {ip} failed: {err}"),
    }
}

impl GeoLookup for MaxMindDb {
    fn lookup_location(&self, ip: &str) -> Option<LocationRecord> {
        let addr = parse_ipv4(ip)?;
        let city = match self.city_reader.lookup::<geoip2::City>(addr) {
            Ok(city) => city,
            Err(err) => {
                log_lookup_error("City", ip, err);
                return None;
            }
        };

        let mut record = LocationRecord::default();

        if let Some(c) = city.city {
            record.city = english(&c.names);
        }

        if let Some(subdivision) = city.subdivisions.as_ref().and_then(|s| s.first()) {
            record.region_code = subdivision.iso_code.map(str::to_string);
        }

        if let Some(country) = city.country {
            record.country_code = country.iso_code.map(str::to_string);
            record.country_name = english(&country.names);
        }

        record.continent = city
            .continent
            .and_then(|c| c.code)
            .map(str::to_string);

        record.postal_code = city.postal.and_then(|p| p.code).map(str::to_string);

        if let Some(location) = city.location {
            record.latitude = location.latitude;
            record.longitude = location.longitude;
            record.metro_code = location.metro_code;
            record.time_zone = location.time_zone.map(str::to_string);
        }

        Some(record)
    }

    fn lookup_asn(&self, ip: &str) -> Option<AsRecord> {
        let addr = parse_ipv4(ip)?;
        match self.asn_reader.lookup::<geoip2::Asn>(addr) {
            Ok(asn) => Some(AsRecord {
                number: asn.autonomous_system_number,
                organization: asn.autonomous_system_organization.map(str::to_string),
            }),
            Err(err) => {
                log_lookup_error("ASN", ip, err);
                None
            }
        }
    }
}
