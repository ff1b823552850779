use anyhow::{Context, Result};
use bstr::ByteSlice;
use camino::Utf8PathBuf;
use std::fmt;
use std::fs::File;
use std::io::{self, Read};

/// Check that `s` is four groups of one to three ASCII digits joined by dots.
///
/// Only the shape is checked. `999.999.999.999` passes; deciding that such an
/// address has no data is left to the database lookup.
#[inline]
pub fn is_dotted_quad(s: &[u8]) -> bool {
    let mut groups = 0;
    let mut digits = 0;
    for &b in s {
        match b {
            b'0'..=b'9' => {
                digits += 1;
                if digits > 3 {
                    return false;
                }
            }
            b'.' => {
                if digits == 0 || groups == 3 {
                    return false;
                }
                groups += 1;
                digits = 0;
            }
            _ => return false,
        }
    }
    groups == 3 && digits > 0
}

/// Trim an input line and return it if it holds a dotted-quad address.
#[inline]
pub fn candidate(line: &[u8]) -> Option<&str> {
    let trimmed = line.trim();
    if is_dotted_quad(trimmed) {
        // digits and dots only
        std::str::from_utf8(trimmed).ok()
    } else {
        None
    }
}

/// A source that can be either a file or stdin.
#[derive(Default, Clone, Debug)]
pub enum FileOrStdin {
    /// Input from a file.
    File(Utf8PathBuf),
    /// Input from stdin.
    #[default]
    Stdin,
}

impl fmt::Display for FileOrStdin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileOrStdin::File(path) => write!(f, "{}", path),
            FileOrStdin::Stdin => write!(f, "<stdin>"),
        }
    }
}

impl FileOrStdin {
    /// Create a new FileOrStdin from a path.
    ///
    /// If the path is "-", stdin is used.
    pub fn from_path(path: Utf8PathBuf) -> Self {
        if path.as_str() == "-" {
            FileOrStdin::Stdin
        } else {
            FileOrStdin::File(path)
        }
    }

    /// Open the input source as a reader.
    pub fn reader(&self) -> Result<InputReader> {
        match self {
            FileOrStdin::File(path) => {
                let file =
                    File::open(path).with_context(|| format!("failed to open file: {}", path))?;
                Ok(InputReader::File(file))
            }
            FileOrStdin::Stdin => Ok(InputReader::Stdin(io::stdin())),
        }
    }
}

/// A reader for input from either a file or stdin.
pub enum InputReader {
    /// A reader for a file.
    File(File),
    /// A reader for stdin.
    Stdin(io::Stdin),
}

impl Read for InputReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            InputReader::File(ref mut rdr) => rdr.read(buf),
            InputReader::Stdin(ref mut rdr) => rdr.read(buf),
        }
    }
}
