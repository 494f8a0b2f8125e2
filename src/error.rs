use std::io;
use std::string::FromUtf8Error;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, PartialEq)]
#[non_exhaustive]
pub enum Error {
    // Wire codec errors. A name error aborts the whole packet; a record
    // error only drops the record it occurred in.
    #[error("insufficient data for base length type")]
    ErrBaseLen,
    #[error("insufficient data for resource body length")]
    ErrResourceLen,
    #[error("segment prefix is reserved")]
    ErrReserved,
    #[error("compression pointer must point backward")]
    ErrInvalidPtr,
    #[error("compression pointer loop")]
    ErrPtrLoop,
    #[error("name exceeds maximum length")]
    ErrNameTooLong,
    #[error("name exceeds maximum label count")]
    ErrTooManyLabels,
    #[error("segment length exceeds label limit")]
    ErrLabelTooLong,

    // Engine errors.
    #[error("connection closed")]
    ErrConnectionClosed,
    #[error("service name already in use")]
    ErrServiceNameAlreadyInUse,
    #[error("service type must end with '._tcp.local.' or '._udp.local.'")]
    ErrBadServiceType,
    #[error("browser for this service type already exists")]
    ErrBrowserAlreadyExists,

    // Cross-context bridge contract (see the crate docs on `Zeroconf`):
    // a caller marshaling work into the event-loop context observes this
    // when its response does not arrive before the caller's timeout.
    #[error("event loop blocked")]
    ErrEventLoopBlocked,

    #[error("{0}")]
    Io(#[source] IoError),
    #[error("utf8: {0}")]
    Utf8(#[from] FromUtf8Error),
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
#[error("io error: {0}")]
pub struct IoError(#[from] pub io::Error);

// Workaround for wanting PartialEq for io::Error.
impl PartialEq for IoError {
    fn eq(&self, other: &Self) -> bool {
        self.0.kind() == other.0.kind()
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(IoError(e))
    }
}
