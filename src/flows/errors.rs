use std::fmt;

#[derive(Debug)]
pub enum CaptureError {
    Io(std::io::Error),
    Malformed(String),
    UnsupportedLinktype(i32),
    UnsupportedFormat(&'static str),
}

impl From<std::io::Error> for CaptureError {
    fn from(e: std::io::Error) -> Self {
        CaptureError::Io(e)
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "unable to read capture: {}", e),
            Self::Malformed(e) => write!(f, "malformed capture: {}", e),
            Self::UnsupportedLinktype(l) => write!(f, "unsupported link type: {}", l),
            Self::UnsupportedFormat(name) => write!(f, "unsupported capture format: {}", name),
        }
    }
}

impl std::error::Error for CaptureError {}
