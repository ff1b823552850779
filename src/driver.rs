//! The per-line loop: validate, look up, normalize, format, emit.

use std::io::{self, Write};

use anyhow::Result;
use ripline::{
    line_buffer::{LineBufferBuilder, LineBufferReader},
    lines::LineIter,
};
use rustc_hash::FxHashMap as HashMap;

use crate::db::GeoLookup;
use crate::fields::FieldRegistry;
use crate::format::Formatter;
use crate::input::candidate;
use crate::record::{NormalizedRecord, Normalizer};

/// Upper bound on cached rendered lines.
const CACHE_LIMIT: usize = 100_000;

/// What happened to one input line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineOutcome {
    /// Not a dotted-quad; nothing written.
    Discarded,
    /// Looked up and written.
    Emitted,
    /// Written from the cache of earlier lines with the same address.
    Cached,
}

/// Running totals for a run, logged at info level when input is exhausted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    pub lines: u64,
    pub emitted: u64,
    pub discarded: u64,
    pub cache_hits: u64,
}

impl Stats {
    fn count(&mut self, outcome: LineOutcome) {
        self.lines += 1;
        match outcome {
            LineOutcome::Discarded => self.discarded += 1,
            LineOutcome::Emitted => self.emitted += 1,
            LineOutcome::Cached => {
                self.emitted += 1;
                self.cache_hits += 1;
            }
        }
    }
}

/// Enriches addresses read one per line.
pub struct LineDriver<'a, L: GeoLookup + ?Sized> {
    lookup: &'a L,
    normalizer: Normalizer,
    formatter: Formatter,
    cache: HashMap<String, String>,
    stats: Stats,
}

impl<'a, L: GeoLookup + ?Sized> LineDriver<'a, L> {
    pub fn new(lookup: &'a L, registry: &FieldRegistry, formatter: Formatter) -> Self {
        Self {
            lookup,
            normalizer: Normalizer::new(registry),
            formatter,
            cache: HashMap::with_capacity_and_hasher(4096, Default::default()),
            stats: Stats::default(),
        }
    }

    /// Look up both databases for `ip` and build its record.
    pub fn record(&self, ip: &str) -> NormalizedRecord {
        let location = self.lookup.lookup_location(ip);
        let asn = self.lookup.lookup_asn(ip);
        self.normalizer
            .normalize(ip, location.as_ref(), asn.as_ref())
    }

    /// Process one raw input line, writing at most one output line to `out`.
    pub fn process_line<W: Write + ?Sized>(
        &mut self,
        line: &[u8],
        out: &mut W,
    ) -> Result<LineOutcome> {
        let Some(ip) = candidate(line) else {
            self.stats.count(LineOutcome::Discarded);
            return Ok(LineOutcome::Discarded);
        };

        let outcome = if let Some(cached) = self.cache.get(ip) {
            out.write_all(cached.as_bytes())?;
            LineOutcome::Cached
        } else {
            let rendered = self.formatter.format(&self.record(ip))?;
            out.write_all(rendered.as_bytes())?;
            if self.cache.len() < CACHE_LIMIT {
                self.cache.insert(ip.to_string(), rendered);
            }
            LineOutcome::Emitted
        };
        out.write_all(b"\n")?;

        self.stats.count(outcome);
        Ok(outcome)
    }

    /// Process every line of `reader` in order.
    pub fn run<R: io::Read, W: Write + ?Sized>(&mut self, reader: R, out: &mut W) -> Result<()> {
        let mut line_buffer = LineBufferBuilder::new().capacity(65536).build();
        let mut lb_reader = LineBufferReader::new(reader, &mut line_buffer);

        while lb_reader.fill()? {
            let buffer = lb_reader.buffer();
            for line in LineIter::new(b'\n', buffer) {
                self.process_line(line, out)?;
            }
            lb_reader.consume_all();
        }
        Ok(())
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }
}
