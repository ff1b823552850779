//! GeoLite2-shaped City and ASN databases written on the fly for tests.
//!
//! Files use the MaxMind DB layout: a binary search tree of 24-bit records,
//! a 16-byte separator, the data section, then the metadata marker and map.

#![allow(dead_code)]

use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;

use tempfile::TempDir;

const METADATA_MARKER: &[u8] = b"\xAB\xCD\xEFMaxMind.com";

/// In both databases, with a full City record.
pub const MILTON: &str = "216.160.83.60";
/// In the City database only; two subdivisions, no postal or metro code.
pub const LONDON: &str = "81.2.69.170";
/// In the ASN database only.
pub const ATT: &str = "12.81.92.5";
/// In the ASN database with a number but no organization.
pub const TELSTRA: &str = "1.128.0.1";
/// In neither database.
pub const UNKNOWN: &str = "10.0.0.1";

/// A value in the data section.
pub enum Value {
    Str(&'static str),
    Double(f64),
    U16(u16),
    U32(u32),
    U64(u64),
    Map(Vec<(&'static str, Value)>),
    Array(Vec<Value>),
}

impl Value {
    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Value::Str(s) => {
                control(out, 2, s.len());
                out.extend_from_slice(s.as_bytes());
            }
            Value::Double(d) => {
                control(out, 3, 8);
                out.extend_from_slice(&d.to_be_bytes());
            }
            Value::U16(n) => {
                control(out, 5, 2);
                out.extend_from_slice(&n.to_be_bytes());
            }
            Value::U32(n) => {
                control(out, 6, 4);
                out.extend_from_slice(&n.to_be_bytes());
            }
            Value::U64(n) => {
                control(out, 9, 8);
                out.extend_from_slice(&n.to_be_bytes());
            }
            Value::Map(entries) => {
                control(out, 7, entries.len());
                for (key, value) in entries {
                    Value::Str(*key).encode(out);
                    value.encode(out);
                }
            }
            Value::Array(items) => {
                control(out, 11, items.len());
                for item in items {
                    item.encode(out);
                }
            }
        }
    }
}

/// Control byte for `type_num` and `size`. Types above 7 are extended: the
/// first byte carries type 0 and the size, the second `type_num - 7`.
fn control(out: &mut Vec<u8>, type_num: u8, size: usize) {
    let (size_bits, extra): (u8, Vec<u8>) = match size {
        0..=28 => (size as u8, vec![]),
        29..=284 => (29, vec![(size - 29) as u8]),
        _ => (30, ((size - 285) as u16).to_be_bytes().to_vec()),
    };
    if type_num > 7 {
        out.push(size_bits);
        out.push(type_num - 7);
    } else {
        out.push((type_num << 5) | size_bits);
    }
    out.extend_from_slice(&extra);
}

#[derive(Clone, Copy)]
enum Record {
    Empty,
    Node(usize),
    Data(usize),
}

/// Builds an IPv4 MaxMind DB in memory.
pub struct MmdbWriter {
    database_type: &'static str,
    nodes: Vec<[Record; 2]>,
    data: Vec<u8>,
}

impl MmdbWriter {
    pub fn new(database_type: &'static str) -> Self {
        Self {
            database_type,
            nodes: vec![[Record::Empty; 2]],
            data: Vec::new(),
        }
    }

    /// Map every address in `network` (CIDR form) to `value`.
    pub fn insert(&mut self, network: &str, value: Value) {
        let (addr, prefix_len) = network.split_once('/').expect("network in CIDR form");
        let bits = u32::from(addr.parse::<Ipv4Addr>().expect("IPv4 network"));
        let prefix_len: usize = prefix_len.parse().expect("numeric prefix length");
        assert!((1..=32).contains(&prefix_len), "prefix length {prefix_len}");

        let offset = self.data.len();
        value.encode(&mut self.data);

        let mut node = 0;
        for depth in 0..prefix_len {
            let bit = ((bits >> (31 - depth)) & 1) as usize;
            if depth + 1 == prefix_len {
                self.nodes[node][bit] = Record::Data(offset);
                break;
            }
            node = match self.nodes[node][bit] {
                Record::Node(next) => next,
                Record::Empty => {
                    let next = self.nodes.len();
                    self.nodes.push([Record::Empty; 2]);
                    self.nodes[node][bit] = Record::Node(next);
                    next
                }
                Record::Data(_) => panic!("{network} is inside an earlier network"),
            };
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let node_count = self.nodes.len();
        let mut out = Vec::new();
        for node in &self.nodes {
            for record in node {
                let value = match *record {
                    Record::Empty => node_count,
                    Record::Node(next) => next,
                    Record::Data(offset) => node_count + 16 + offset,
                };
                out.extend_from_slice(&(value as u32).to_be_bytes()[1..]);
            }
        }
        out.extend_from_slice(&[0; 16]);
        out.extend_from_slice(&self.data);
        out.extend_from_slice(METADATA_MARKER);
        Value::Map(vec![
            ("binary_format_major_version", Value::U16(2)),
            ("binary_format_minor_version", Value::U16(0)),
            ("build_epoch", Value::U64(1_700_000_000)),
            ("database_type", Value::Str(self.database_type)),
            (
                "description",
                Value::Map(vec![("en", Value::Str("ip2geo test data"))]),
            ),
            ("ip_version", Value::U16(4)),
            ("languages", Value::Array(vec![Value::Str("en")])),
            ("node_count", Value::U32(node_count as u32)),
            ("record_size", Value::U16(24)),
        ])
        .encode(&mut out);
        out
    }

    pub fn write(&self, path: &Path) {
        fs::write(path, self.to_bytes()).unwrap();
    }
}

fn names(en: &'static str, de: &'static str) -> Value {
    Value::Map(vec![("de", Value::Str(de)), ("en", Value::Str(en))])
}

pub fn city_db() -> MmdbWriter {
    let mut db = MmdbWriter::new("GeoLite2-City");
    db.insert(
        "216.160.83.56/29",
        Value::Map(vec![
            (
                "city",
                Value::Map(vec![
                    ("geoname_id", Value::U32(5803556)),
                    ("names", names("Milton", "Milton")),
                ]),
            ),
            (
                "continent",
                Value::Map(vec![
                    ("code", Value::Str("NA")),
                    ("geoname_id", Value::U32(6255149)),
                    ("names", names("North America", "Nordamerika")),
                ]),
            ),
            (
                "country",
                Value::Map(vec![
                    ("geoname_id", Value::U32(6252001)),
                    ("iso_code", Value::Str("US")),
                    ("names", names("United States", "USA")),
                ]),
            ),
            (
                "location",
                Value::Map(vec![
                    ("accuracy_radius", Value::U16(22)),
                    ("latitude", Value::Double(47.2513)),
                    ("longitude", Value::Double(-122.3149)),
                    ("metro_code", Value::U16(819)),
                    ("time_zone", Value::Str("America/Los_Angeles")),
                ]),
            ),
            ("postal", Value::Map(vec![("code", Value::Str("98354"))])),
            (
                "subdivisions",
                Value::Array(vec![Value::Map(vec![
                    ("geoname_id", Value::U32(5815135)),
                    ("iso_code", Value::Str("WA")),
                    ("names", names("Washington", "Washington")),
                ])]),
            ),
        ]),
    );
    db.insert(
        "81.2.69.160/27",
        Value::Map(vec![
            (
                "city",
                Value::Map(vec![("names", names("London", "London"))]),
            ),
            (
                "continent",
                Value::Map(vec![
                    ("code", Value::Str("EU")),
                    ("names", names("Europe", "Europa")),
                ]),
            ),
            (
                "country",
                Value::Map(vec![
                    ("iso_code", Value::Str("GB")),
                    ("names", names("United Kingdom", "Vereinigtes Königreich")),
                ]),
            ),
            (
                "location",
                Value::Map(vec![
                    ("accuracy_radius", Value::U16(100)),
                    ("latitude", Value::Double(51.5142)),
                    ("longitude", Value::Double(-0.0931)),
                    ("time_zone", Value::Str("Europe/London")),
                ]),
            ),
            (
                "subdivisions",
                Value::Array(vec![
                    Value::Map(vec![
                        ("iso_code", Value::Str("ENG")),
                        ("names", names("England", "England")),
                    ]),
                    Value::Map(vec![
                        ("iso_code", Value::Str("LND")),
                        ("names", names("London", "London")),
                    ]),
                ]),
            ),
        ]),
    );
    db
}

pub fn asn_db() -> MmdbWriter {
    let mut db = MmdbWriter::new("GeoLite2-ASN");
    db.insert(
        "216.160.83.56/29",
        Value::Map(vec![
            ("autonomous_system_number", Value::U32(209)),
            (
                "autonomous_system_organization",
                Value::Str("Qwest Communications Company, LLC"),
            ),
        ]),
    );
    db.insert(
        "12.81.92.0/22",
        Value::Map(vec![
            ("autonomous_system_number", Value::U32(7018)),
            ("autonomous_system_organization", Value::Str("AT&T Services")),
        ]),
    );
    db.insert(
        "1.128.0.0/11",
        Value::Map(vec![("autonomous_system_number", Value::U32(1221))]),
    );
    db
}

/// A directory holding `GeoLite2-City.mmdb` and `GeoLite2-ASN.mmdb`.
pub fn maxmind_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    city_db().write(&dir.path().join("GeoLite2-City.mmdb"));
    asn_db().write(&dir.path().join("GeoLite2-ASN.mmdb"));
    dir
}
