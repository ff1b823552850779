//! Output tokens and the canonical fields they stand for.
//!
//! A [`FieldRegistry`] is the fixed set of `%`-prefixed tokens accepted in a
//! `--format` template. Two editions ship built in: [`FieldRegistry::modern`]
//! for GeoLite2 databases and [`FieldRegistry::legacy`], which keeps the field
//! names of the older GeoLite Legacy output (3-letter country code, DMA code,
//! area code, time zone). Exactly one registry is active per run, and it is
//! handed explicitly to the normalizer and the template compiler.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::error::{Error, Result};

/// Every token starts with this byte.
pub const TOKEN_PREFIX: char = '%';

/// A canonical geolocation or ownership attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    IpAddress,
    City,
    RegionCode,
    CountryName,
    PostalCode,
    CountryCode,
    CountryCode3,
    Continent,
    MetroCode,
    AreaCode,
    TimeZone,
    DmaCode,
    Latitude,
    Longitude,
    AsNumber,
    AsName,
}

impl Field {
    /// The stable key used for this field in structured output.
    pub fn canonical_name(self) -> &'static str {
        match self {
            Field::IpAddress => "ipaddress",
            Field::City => "city",
            Field::RegionCode => "region_code",
            Field::CountryName => "country_name",
            Field::PostalCode => "postal_code",
            Field::CountryCode => "country_code",
            Field::CountryCode3 => "country_code3",
            Field::Continent => "continent",
            Field::MetroCode => "metro_code",
            Field::AreaCode => "area_code",
            Field::TimeZone => "time_zone",
            Field::DmaCode => "dma_code",
            Field::Latitude => "latitude",
            Field::Longitude => "longitude",
            Field::AsNumber => "asnum",
            Field::AsName => "asname",
        }
    }
}

impl Serialize for Field {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.canonical_name())
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}

/// A template token and the field it substitutes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldDescriptor {
    /// Token as written in a template, including the leading `%`
    pub token: String,
    /// Field the token resolves to
    #[serde(rename = "name")]
    pub field: Field,
    /// Human-readable description for help output
    pub description: String,
}

impl FieldDescriptor {
    pub fn new(token: impl Into<String>, field: Field, description: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            field,
            description: description.into(),
        }
    }

    pub fn canonical_name(&self) -> &'static str {
        self.field.canonical_name()
    }
}

/// Which built-in registry is active.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Edition {
    #[default]
    Modern,
    Legacy,
}

/// Immutable table of template tokens.
#[derive(Clone, Debug)]
pub struct FieldRegistry {
    descriptors: Vec<FieldDescriptor>,
    /// Indexes into `descriptors`, longest token first.
    by_length: Vec<usize>,
}

impl FieldRegistry {
    /// Build a registry from arbitrary descriptors.
    ///
    /// # Errors
    ///
    /// Fails if a token is empty, lacks the `%` prefix, or is declared twice.
    pub fn new(descriptors: Vec<FieldDescriptor>) -> Result<Self> {
        for (i, d) in descriptors.iter().enumerate() {
            if !d.token.starts_with(TOKEN_PREFIX) || d.token.len() < 2 {
                return Err(Error::InvalidRegistry {
                    reason: format!("token {:?} must be '%' followed by a name", d.token),
                });
            }
            if descriptors[..i].iter().any(|prev| prev.token == d.token) {
                return Err(Error::InvalidRegistry {
                    reason: format!("duplicate token {}", d.token),
                });
            }
        }

        let mut by_length: Vec<usize> = (0..descriptors.len()).collect();
        by_length.sort_by_key(|&i| std::cmp::Reverse(descriptors[i].token.len()));

        Ok(Self {
            descriptors,
            by_length,
        })
    }

    /// Registry for a built-in edition.
    pub fn for_edition(edition: Edition) -> Self {
        match edition {
            Edition::Modern => Self::modern(),
            Edition::Legacy => Self::legacy(),
        }
    }

    /// Fields available from GeoLite2 City and ASN databases.
    pub fn modern() -> Self {
        Self::from_static(&[
            ("%ip", Field::IpAddress, "IP Address"),
            ("%ci", Field::City, "City"),
            ("%rc", Field::RegionCode, "Region Code (State)"),
            ("%cn", Field::CountryName, "Country Name"),
            ("%pc", Field::PostalCode, "Postal (ZIP) Code"),
            ("%cc", Field::CountryCode, "Country Code"),
            ("%co", Field::Continent, "Continent"),
            ("%mc", Field::MetroCode, "Metro Code"),
            ("%lat", Field::Latitude, "Latitude"),
            ("%lon", Field::Longitude, "Longitude"),
            ("%asnum", Field::AsNumber, "AS Number"),
            ("%asname", Field::AsName, "AS Name"),
        ])
    }

    /// Field names of the GeoLite Legacy output.
    pub fn legacy() -> Self {
        Self::from_static(&[
            ("%ip", Field::IpAddress, "IP Address"),
            ("%ci", Field::City, "City"),
            ("%rc", Field::RegionCode, "Region Code (State)"),
            ("%cn", Field::CountryName, "Country Name"),
            ("%pc", Field::PostalCode, "Postal (ZIP) Code"),
            ("%cc2", Field::CountryCode, "Country Code (2 char)"),
            ("%cc3", Field::CountryCode3, "Country Code (3 char)"),
            ("%co", Field::Continent, "Continent"),
            ("%mc", Field::MetroCode, "Metro Code"),
            ("%ac", Field::AreaCode, "Telephone Area Code"),
            ("%tz", Field::TimeZone, "Time Zone Name"),
            ("%dc", Field::DmaCode, "DMA Code"),
            ("%lat", Field::Latitude, "Latitude"),
            ("%lon", Field::Longitude, "Longitude"),
            ("%asnum", Field::AsNumber, "AS Number"),
            ("%asname", Field::AsName, "AS Name"),
        ])
    }

    fn from_static(table: &[(&str, Field, &str)]) -> Self {
        let descriptors = table
            .iter()
            .map(|&(token, field, description)| FieldDescriptor::new(token, field, description))
            .collect();
        // built-in tables are prefixed and unique
        match Self::new(descriptors) {
            Ok(registry) => registry,
            Err(err) => unreachable!("built-in registry rejected: {err}"),
        }
    }

    /// Descriptors in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.descriptors.iter()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Exact lookup of a token.
    pub fn get(&self, token: &str) -> Option<&FieldDescriptor> {
        self.descriptors.iter().find(|d| d.token == token)
    }

    /// The longest token that `text` starts with.
    #[inline]
    pub fn longest_match(&self, text: &str) -> Option<&FieldDescriptor> {
        self.by_length
            .iter()
            .map(|&i| &self.descriptors[i])
            .find(|d| text.starts_with(d.token.as_str()))
    }

    /// Fields in output order: `ipaddress` first, the registry's own fields,
    /// then `asnum` and `asname`, each exactly once.
    pub fn record_fields(&self) -> Vec<Field> {
        let mut fields = vec![Field::IpAddress];
        for d in &self.descriptors {
            if !fields.contains(&d.field) && !matches!(d.field, Field::AsNumber | Field::AsName) {
                fields.push(d.field);
            }
        }
        fields.push(Field::AsNumber);
        fields.push(Field::AsName);
        fields
    }

    /// One `token : description` line per field, for `--help` and `--list-fields`.
    pub fn help_text(&self) -> String {
        let mut out = String::new();
        for d in &self.descriptors {
            out.push_str(&format!("{:>10} : {}\n", d.token, d.description));
        }
        out
    }
}

impl Default for FieldRegistry {
    fn default() -> Self {
        Self::modern()
    }
}
