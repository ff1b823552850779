use anyhow::{Error, Result};
use camino::Utf8PathBuf;
use clap::{CommandFactory, FromArgMatches, Parser, ValueEnum};
use log::LevelFilter;
use std::io::{self, IsTerminal, Write};
use std::process::ExitCode;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use ip2geo::config::{self, GeoIpConf};
use ip2geo::error::exit_code;
use ip2geo::fields::Edition;
use ip2geo::input::FileOrStdin;
use ip2geo::template::DEFAULT_TEMPLATE;
use ip2geo::update::Updater;
use ip2geo::{FieldRegistry, Formatter, LineDriver, MaxMindDb};

/// Check if the error chain contains a broken pipe error.
#[inline(always)]
fn is_broken_pipe(err: &Error) -> bool {
    // Look for a broken pipe error in the error chain
    for cause in err.chain() {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            if io_err.kind() == io::ErrorKind::BrokenPipe {
                return true;
            }
        }
    }
    false
}

/// Exit status for an error: the setup category if there is one, else 1.
fn error_exit_code(err: &Error) -> u8 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<ip2geo::Error>())
        .map_or(exit_code::FAILURE, ip2geo::Error::exit_code)
}

#[derive(Parser, Debug)]
#[clap(
    author,
    version,
    about = "Perform GeoIP lookups on IPv4 addresses read one per line, displaying output in normalized format.",
    long_about = None
)]
struct Args {
    /// Output format string. Tokens such as %ip, %lat or %asname are replaced
    /// with the field values; use --list-fields to see all of them
    /// [default: "%ip","%lat","%lon","%asnum","%asname"]
    #[clap(short, long, value_name = "TEMPLATE")]
    format: Option<String>,

    /// Output one JSON object per address instead of the format string
    #[clap(long)]
    json: bool,

    /// Directory containing GeoLite2-City.mmdb and GeoLite2-ASN.mmdb
    #[clap(
        short,
        long,
        value_name = "DIR",
        value_hint = clap::ValueHint::DirPath,
        env = "GEOIP_MMDB_DIR"
    )]
    geoipdir: Option<Utf8PathBuf>,

    /// geoipupdate configuration file; its DatabaseDirectory is used when
    /// --geoipdir is not given [default for --download: /etc/GeoIP.conf]
    #[clap(
        short = 'c',
        long,
        value_name = "FILE",
        value_hint = clap::ValueHint::FilePath,
        env = "GEOIP_CONF"
    )]
    geoipconf: Option<Utf8PathBuf>,

    /// Download the latest databases with geoipupdate and exit
    #[clap(short, long)]
    download: bool,

    /// Which set of format tokens to accept
    #[clap(long, value_enum, default_value_t = ArgsFieldSet::Modern)]
    fields: ArgsFieldSet,

    /// Display the available format tokens and exit
    #[clap(short = 'L', long)]
    list_fields: bool,

    /// Diagnostic verbosity on stderr (overrides RUST_LOG)
    #[clap(long, value_enum, value_name = "LEVEL")]
    log_level: Option<ArgsLogLevel>,

    /// Input file(s) to process. Leave empty or use "-" to read from stdin
    #[clap(value_name = "FILE", value_hint = clap::ValueHint::FilePath)]
    input: Vec<Utf8PathBuf>,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, ValueEnum)]
enum ArgsFieldSet {
    /// GeoLite2 fields
    Modern,
    /// GeoLite Legacy fields, including %cc3, %dc, %ac and %tz
    Legacy,
}

impl From<ArgsFieldSet> for Edition {
    fn from(set: ArgsFieldSet) -> Self {
        match set {
            ArgsFieldSet::Modern => Edition::Modern,
            ArgsFieldSet::Legacy => Edition::Legacy,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, ValueEnum)]
enum ArgsLogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<ArgsLogLevel> for LevelFilter {
    fn from(level: ArgsLogLevel) -> Self {
        match level {
            ArgsLogLevel::Off => LevelFilter::Off,
            ArgsLogLevel::Error => LevelFilter::Error,
            ArgsLogLevel::Warn => LevelFilter::Warn,
            ArgsLogLevel::Info => LevelFilter::Info,
            ArgsLogLevel::Debug => LevelFilter::Debug,
            ArgsLogLevel::Trace => LevelFilter::Trace,
        }
    }
}

/// The derived command, with the token table in the long help of `--format`.
fn command() -> clap::Command {
    let tokens = FieldRegistry::modern().help_text();
    Args::command().mut_arg("format", move |arg| {
        arg.long_help(format!(
            "Output format string. Tokens are replaced with the field values of each address.\n\
             [default: {DEFAULT_TEMPLATE}]\n\n\
             Tokens:\n{tokens}\n\
             \"--fields legacy --list-fields\" shows the legacy tokens."
        ))
    })
}

fn parse_args() -> Result<Args, clap::Error> {
    let matches = command().try_get_matches()?;
    Args::from_arg_matches(&matches)
}

fn init_logger(level: Option<LevelFilter>) {
    let mut builder = env_logger::Builder::from_default_env();
    match level {
        Some(level) => {
            builder.filter_level(level);
        }
        None if std::env::var_os("RUST_LOG").is_none() => {
            builder.filter_level(LevelFilter::Warn);
        }
        None => {}
    }
    builder.format_timestamp(None);
    // a second init only happens in tests
    let _ = builder.try_init();
}

fn report(err: &Error) {
    let choice = if io::stderr().is_terminal() {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };
    let mut stderr = StandardStream::stderr(choice);
    let _ = stderr.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true));
    let _ = write!(stderr, "ERROR:");
    let _ = stderr.reset();

    // Print detailed error information based on environment variables
    if std::env::var("RUST_BACKTRACE").is_ok_and(|v| v == "1")
        && std::env::var("RUST_LIB_BACKTRACE").map_or(true, |v| v == "1")
    {
        let _ = writeln!(stderr, " {:?}", err);
    } else {
        let _ = writeln!(stderr, " {:#}", err);
    }
}

fn main() -> ExitCode {
    let args = match parse_args() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::from(exit_code::USAGE)
            } else {
                ExitCode::SUCCESS
            };
        }
    };
    init_logger(args.log_level.map(LevelFilter::from));

    // Use a separate run function to handle the actual work
    let err = match run_main(args) {
        Ok(code) => return code,
        Err(err) => err,
    };

    // Handle broken pipe errors gracefully
    if is_broken_pipe(&err) {
        return ExitCode::SUCCESS;
    }

    report(&err);
    ExitCode::from(error_exit_code(&err))
}

fn run_main(args: Args) -> Result<ExitCode> {
    let registry = FieldRegistry::for_edition(args.fields.into());

    // if user asks to see available format tokens
    if args.list_fields {
        let mut out = io::stdout().lock();
        if args.json {
            let fields: Vec<_> = registry.iter().collect();
            serde_json::to_writer_pretty(&mut out, &fields)?;
            writeln!(out)?;
        } else {
            write!(out, "{}", registry.help_text())?;
        }
        return Ok(ExitCode::SUCCESS);
    }

    if args.download {
        download(&args)?;
        return Ok(ExitCode::SUCCESS);
    }

    let conf = args
        .geoipconf
        .as_deref()
        .map(GeoIpConf::load)
        .transpose()?;
    let dbdir = config::resolve_database_dir(args.geoipdir.as_deref(), conf.as_ref());
    log::debug!("reading databases from {}", dbdir);
    let db = MaxMindDb::open(&dbdir)?;

    run(args, &registry, &db)?;

    Ok(ExitCode::SUCCESS)
}

fn download(args: &Args) -> Result<()> {
    let conf_path = args
        .geoipconf
        .clone()
        .unwrap_or_else(|| Utf8PathBuf::from(config::DEFAULT_CONF_PATH));
    let conf = GeoIpConf::load(&conf_path)?;
    conf.require_editions()?;

    Updater::default().run(&conf, args.geoipdir.as_deref())?;
    Ok(())
}

fn run(args: Args, registry: &FieldRegistry, db: &MaxMindDb) -> Result<()> {
    let formatter = Formatter::new(args.format.as_deref(), args.json, registry);
    let mut driver = LineDriver::new(db, registry, formatter);
    let mut out = io::BufWriter::with_capacity(65536, io::stdout().lock());

    let mut inputs = args.input;
    // if no files specified, add stdin
    if inputs.is_empty() {
        inputs.push(Utf8PathBuf::from("-"));
    }

    for path in inputs {
        let file = FileOrStdin::from_path(path);
        log::debug!("processing {}", file);
        let reader = file.reader()?;
        driver.run(reader, &mut out)?;
        out.flush()?;
    }

    let stats = driver.stats();
    log::info!(
        "{} lines read, {} records written, {} lines discarded, {} cache hits",
        stats.lines,
        stats.emitted,
        stats.discarded,
        stats.cache_hits
    );
    Ok(())
}
