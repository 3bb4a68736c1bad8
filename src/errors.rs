//
// Errors
//
use std::error;
use std::fmt;
use std::io;
use std::num;
use std::path::PathBuf;
use std::result;

/// Type alias for wordgraph errors
pub type Result<X> = result::Result<X, Error>;

/// Wrapper for many kinds of errors occuring while building a graph
#[derive(Debug)]
pub enum Error {
    /// Bad settings or collaborators. Always raised before any phase starts.
    Configuration(String),
    /// A corpus file could not be read or parsed. Workers skip these.
    Ingestion(PathBuf, String),
    /// Intermediate files that do not agree with one another. The phase must be re-run.
    MergeInconsistency(String),
    /// Something failed inside the named phase
    Phase(&'static str, Box<Error>),
    ThreadPool(rayon::ThreadPoolBuildError),
    IOError(io::Error),
    ParseIntError(num::ParseIntError),
    JsonError(serde_json::Error),
    RegexError(regex::Error),
    MissingFile(&'static str, Option<io::Error>),
    Other(String),
}

impl Error {
    /// Attach the phase name, unless it's already there
    pub fn in_phase(self, phase: &'static str) -> Error {
        match self {
            Error::Phase(..) => self,
            other => Error::Phase(phase, Box::new(other)),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Configuration(ref info) => write!(f, "Configuration error: {}", info),
            Error::Ingestion(ref path, ref info) => {
                write!(f, "Could not ingest {}: {}", path.display(), info)
            }
            Error::MergeInconsistency(ref info) => write!(f, "Inconsistent intermediate data: {}", info),
            Error::Phase(phase, ref err) => write!(f, "The {} phase failed. {}", phase, err),
            Error::ThreadPool(ref err) => write!(f, "Could not start worker pool: {}", err),
            Error::IOError(ref err) => write!(f, "IO error: {}", err),
            Error::ParseIntError(ref err) => write!(f, "Error parsing integer: {}", err),
            Error::JsonError(ref err) => write!(f, "JSON error: {}", err),
            Error::RegexError(ref err) => write!(f, "Regex error: {}", err),
            Error::MissingFile(ref info, ref opt_err) => {
                write!(f,
                    "The {} must already exist at this point but there was a problem opening it. \
                    Wrong directory? Maybe missed a step? The OS error was: ",
                    info)?;
                if let Some(ref err) = *opt_err { err.fmt(f) }
                else { write!(f, "Unknown") }
            },
            Error::Other(ref info) => write!(f, "{}", info),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::Phase(_, ref err) => Some(err.as_ref()),
            Error::ThreadPool(ref err) => Some(err),
            Error::IOError(ref err) => Some(err),
            Error::ParseIntError(ref err) => Some(err),
            Error::JsonError(ref err) => Some(err),
            Error::RegexError(ref err) => Some(err),
            Error::MissingFile(_, Some(ref err)) => Some(err),
            _ => None,
        }
    }
}
//
// Convert everything else into Error
//
impl From<rayon::ThreadPoolBuildError> for Error {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        Error::ThreadPool(err)
    }
}
impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::IOError(err)
    }
}
impl From<num::ParseIntError> for Error {
    fn from(err: num::ParseIntError) -> Self {
        Error::ParseIntError(err)
    }
}
impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::JsonError(err)
    }
}
impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Error::RegexError(err)
    }
}

//
// Convert Error into a general io Error
//
impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        io::Error::new(io::ErrorKind::Other, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as StdError;

    #[test]
    fn phase_is_attached_once() {
        let err = Error::MergeInconsistency("d001_s0000_p0000.edges is truncated".into())
            .in_phase("word pairs processing")
            .in_phase("all");
        let text = err.to_string();
        assert!(text.starts_with("The word pairs processing phase failed."));
        assert!(text.contains("d001_s0000_p0000.edges"));
        assert!(err.source().is_some());
    }
}
