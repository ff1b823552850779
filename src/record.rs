//! Merging City and ASN lookups into one flat record per address.

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::db::{AsRecord, LocationRecord};
use crate::fields::{Field, FieldRegistry};

/// Rendered in template mode for a field with no value.
pub const NO_VALUE: &str = "None";

/// AS name reported when the ASN database has no entry for an address.
pub const UNKNOWN_AS_NAME: &str = "None";

/// A single scalar in a normalized record.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Str(String),
    Float(f64),
    Int(u64),
    None,
}

impl FieldValue {
    fn from_opt_str(value: Option<&String>) -> Self {
        value.map_or(FieldValue::None, |s| FieldValue::Str(s.clone()))
    }

    /// Append the template-mode rendering of this value to `out`.
    ///
    /// Floats always carry a decimal point (`37.0`, `-122.1`); missing values
    /// render as `None`.
    #[inline]
    pub fn render_into(&self, out: &mut String) {
        match self {
            FieldValue::Str(s) => out.push_str(s),
            FieldValue::Float(f) if f.is_finite() => out.push_str(ryu::Buffer::new().format(*f)),
            FieldValue::Float(f) => out.push_str(&f.to_string()),
            FieldValue::Int(i) => out.push_str(itoa::Buffer::new().format(*i)),
            FieldValue::None => out.push_str(NO_VALUE),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Str(s) => serializer.serialize_str(s),
            FieldValue::Float(f) => serializer.serialize_f64(*f),
            FieldValue::Int(i) => serializer.serialize_u64(*i),
            FieldValue::None => serializer.serialize_none(),
        }
    }
}

/// Field values for one input address, in output order.
///
/// Holds exactly the fields of the registry it was built for, plus
/// `ipaddress`, `asnum` and `asname`.
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedRecord {
    entries: Vec<(Field, FieldValue)>,
}

impl NormalizedRecord {
    pub fn get(&self, field: Field) -> Option<&FieldValue> {
        self.entries
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &FieldValue)> {
        self.entries.iter().map(|(f, value)| (*f, value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for NormalizedRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (field, value) in self.iter() {
            map.serialize_entry(field.canonical_name(), value)?;
        }
        map.end()
    }
}

/// Builds [`NormalizedRecord`]s for the fields of one registry.
#[derive(Clone, Debug)]
pub struct Normalizer {
    fields: Vec<Field>,
}

impl Normalizer {
    pub fn new(registry: &FieldRegistry) -> Self {
        Self {
            fields: registry.record_fields(),
        }
    }

    /// Merge lookup results for `ip` into a record.
    ///
    /// Never fails. A location miss leaves every location field empty; an AS
    /// miss yields `asnum = 0` and `asname = "None"` as concrete values rather
    /// than empty ones.
    pub fn normalize(
        &self,
        ip: &str,
        location: Option<&LocationRecord>,
        asn: Option<&AsRecord>,
    ) -> NormalizedRecord {
        let entries = self
            .fields
            .iter()
            .map(|&field| {
                let value = match field {
                    Field::IpAddress => FieldValue::Str(ip.to_string()),
                    Field::AsNumber => {
                        FieldValue::Int(asn.and_then(|a| a.number).map_or(0, u64::from))
                    }
                    Field::AsName => FieldValue::Str(
                        asn.and_then(|a| a.organization.clone())
                            .unwrap_or_else(|| UNKNOWN_AS_NAME.to_string()),
                    ),
                    _ => location.map_or(FieldValue::None, |loc| location_value(loc, field)),
                };
                (field, value)
            })
            .collect();

        NormalizedRecord { entries }
    }
}

fn location_value(loc: &LocationRecord, field: Field) -> FieldValue {
    match field {
        Field::City => FieldValue::from_opt_str(loc.city.as_ref()),
        Field::RegionCode => FieldValue::from_opt_str(loc.region_code.as_ref()),
        Field::CountryName => FieldValue::from_opt_str(loc.country_name.as_ref()),
        Field::PostalCode => FieldValue::from_opt_str(loc.postal_code.as_ref()),
        Field::CountryCode => FieldValue::from_opt_str(loc.country_code.as_ref()),
        Field::CountryCode3 => FieldValue::from_opt_str(loc.country_code3.as_ref()),
        Field::Continent => FieldValue::from_opt_str(loc.continent.as_ref()),
        Field::AreaCode => FieldValue::from_opt_str(loc.area_code.as_ref()),
        Field::TimeZone => FieldValue::from_opt_str(loc.time_zone.as_ref()),
        // GeoLite2 metro codes are the DMA codes of the legacy databases
        Field::MetroCode | Field::DmaCode => loc
            .metro_code
            .map_or(FieldValue::None, |code| FieldValue::Int(code.into())),
        Field::Latitude => loc.latitude.map_or(FieldValue::None, FieldValue::Float),
        Field::Longitude => loc.longitude.map_or(FieldValue::None, FieldValue::Float),
        Field::IpAddress | Field::AsNumber | Field::AsName => FieldValue::None,
    }
}
