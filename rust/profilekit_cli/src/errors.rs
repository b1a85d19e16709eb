#[derive(Debug)]
pub enum CliError {
    Config {
        source: String,
    },
    ParseError {
        msg: String,
    },
    Io {
        source: String,
        path: Option<String>,
    },
    Processing {
        kind: &'static str,
        source: String,
    },
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Config { source } => write!(f, "Error interpreting the config: {}", source),
            CliError::ParseError { msg } => write!(f, "Error parsing config: {}", msg),
            CliError::Io { source, path } => {
                if let Some(path) = path {
                    write!(f, "Error reading file {}: {}", path, source)
                } else {
                    write!(f, "Error reading file: {}", source)
                }
            }
            CliError::Processing { kind, source } => {
                write!(f, "Error processing data ({}): {}", kind, source)
            }
        }
    }
}

impl From<profilekit::ProfilingError> for CliError {
    fn from(e: profilekit::ProfilingError) -> Self {
        CliError::Processing {
            kind: e.kind(),
            source: e.to_string(),
        }
    }
}
