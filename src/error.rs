use thiserror::Error;

/// Failures while bringing the serial link up. Once the workers are running
/// nothing in here is produced; runtime I/O problems are logged and absorbed.
#[derive(Debug, Error)]
pub enum LinkError{
    #[error("failed to enumerate serial ports: {0}")]
    Enumerate(#[source] serialport::Error),
    #[error("failed to open {port}: {source}")]
    Open{
        port: String,
        #[source]
        source: serialport::Error,
    },
    #[error("failed to clone handle for {port}: {source}")]
    Clone{
        port: String,
        #[source]
        source: serialport::Error,
    },
    #[error("failed to spawn {worker} worker: {source}")]
    Spawn{
        worker: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// A single inbound line that could not be turned into telemetry.
#[derive(Debug, Error)]
pub enum FrameError{
    #[error("line is not valid utf-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("line is not valid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("expected a json object, got {0}")]
    NotAnObject(&'static str),
    #[error("line exceeds {limit} bytes")]
    Oversize{ limit: usize },
}

#[derive(Debug, Error)]
pub enum ConfigError{
    #[error("failed to read config {path}: {source}")]
    Read{
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// The input backend could not be started.
#[cfg(feature = "gamepad")]
#[derive(Debug, Error)]
pub enum InputError{
    #[error("gamepad backend unavailable: {0}")]
    Backend(#[source] gilrs::Error),
}

pub type Result<T, E = LinkError> = std::result::Result<T, E>;

#[cfg(all(test, feature = "gamepad"))]
mod tests{
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_input_error_keeps_backend_source(){
        let backend = gilrs::Error::Other(Box::new(std::io::Error::new(std::io::ErrorKind::NotFound, "no evdev")));
        let err = InputError::Backend(backend);
        assert!(err.to_string().starts_with("gamepad backend unavailable"));
        assert!(err.source().is_some());
    }
}
