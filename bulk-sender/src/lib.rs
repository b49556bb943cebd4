//! Personalized bulk messaging through a web chat client
//!
//! This crate loads a contact list, selects rows with compact range
//! expressions such as `2-40,45`, renders a `{Column}` message template per
//! contact and sends the messages one at a time through a [`Transport`],
//! reporting every outcome to a [`LogSink`].

pub mod cancellation;
pub mod chat;
pub mod config;
pub mod decode;
pub mod dispatch;
pub mod errors;
pub mod log_sink;
pub mod normalize;
pub mod range;
pub mod selector;
pub mod steps;
pub mod table;
pub mod template;
pub mod transport;
pub mod webdriver;
pub mod wizard;

pub use cancellation::BatchContext;
pub use chat::{ChatSelectors, ChatTransport, DownloadLabels};
pub use config::{ConfigKey, ConfigStore};
pub use dispatch::{
    run_batch, send_all, BatchEnd, BatchOptions, BatchReport, Delivery, FailureReason, FaultPolicy,
    SendOutcome,
};
pub use errors::{
    BulkSenderError, ConfigError, ConfigurationError, DecodeError, ParseError, RenderError,
    SelectionError, StepError, TransportError,
};
pub use log_sink::{LogCapture, LogEntry, LogSink, TracingSink};
pub use normalize::capitalize;
pub use range::{parse_range, RecipientSet};
pub use selector::{select, ColumnSpec, FieldKind, SelectedTable};
pub use steps::{steps, Product, StepDescriptor, StepId};
pub use table::{CellValue, Table};
pub use template::{render, Template};
pub use transport::Transport;
pub use webdriver::{TabHandle, WebDriverSession};
pub use wizard::Wizard;
