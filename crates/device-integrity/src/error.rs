use std::fmt;
use std::io;
use std::path::PathBuf;

#[derive(Debug)]
pub enum IntegrityError {
    Io { path: PathBuf, source: io::Error },
    Command { program: String, detail: String },
    Syscall { name: &'static str, source: io::Error },
    Unsupported(&'static str),
}

impl IntegrityError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn command(program: &str, detail: impl Into<String>) -> Self {
        Self::Command {
            program: program.to_string(),
            detail: detail.into(),
        }
    }

    pub(crate) fn last_os_error(name: &'static str) -> Self {
        Self::Syscall {
            name,
            source: io::Error::last_os_error(),
        }
    }
}

impl fmt::Display for IntegrityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "read {}: {}", path.display(), source),
            Self::Command { program, detail } => {
                write!(f, "command '{}' failed: {}", program, detail)
            }
            Self::Syscall { name, source } => write!(f, "{} failed: {}", name, source),
            Self::Unsupported(what) => write!(f, "{} is not supported on this platform", what),
        }
    }
}

impl std::error::Error for IntegrityError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } | Self::Syscall { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, IntegrityError>;
