use thiserror::Error;

/// Malformed range expression.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid range token: '{0}'")]
    InvalidToken(String),

    #[error("Invalid number: '{0}'")]
    InvalidNumber(String),

    #[error("Descending range: {start}-{end}")]
    DescendingRange { start: i64, end: i64 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("Invalid selection: {0}")]
    InvalidSelection(#[from] ParseError),

    #[error("Column not found: '{0}'")]
    ColumnNotFound(String),

    #[error("No columns requested")]
    EmptyColumnMap,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("Unknown placeholder: '{{{0}}}'")]
    UnknownPlaceholder(String),

    #[error("Unclosed placeholder starting at byte {0}")]
    UnclosedPlaceholder(usize),

    #[error("Single '}}' encountered at byte {0}")]
    UnmatchedBrace(usize),

    #[error("Header has {header} columns but row has {row} values")]
    LengthMismatch { header: usize, row: usize },
}

/// Caller-side misconfiguration detected before a batch starts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Phone column '{0}' is not part of the selected table")]
    PhoneColumnMissing(String),
}

/// Hard faults raised by a transport. "Recipient unreachable" is not one of
/// these; transports report it as `Ok(false)`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Browser session error: {0}")]
    Session(String),

    #[error("WebDriver protocol error: {0}")]
    Protocol(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError::Http(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Malformed upload: {0}")]
    MalformedUpload(String),

    #[error("Row {row} has {found} fields, expected at most {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Input has no header row")]
    EmptyInput,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Could not determine a configuration directory")]
    NoConfigDir,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StepError {
    #[error("Step '{step}' needs '{product}', which has not been produced yet")]
    MissingProduct { step: String, product: String },
}

/// Any error the library can surface to a host.
#[derive(Error, Debug)]
pub enum BulkSenderError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Step(#[from] StepError),
}
