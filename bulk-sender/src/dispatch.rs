//! The send loop: one personalized message per selected recipient.
//!
//! Recipients are processed strictly in table order, one transport call at a
//! time. Each recipient ends in exactly one [`SendOutcome`] and is never
//! retried within the batch. Unreachable recipients and render failures are
//! per-recipient outcomes; only a missing phone column aborts the batch up
//! front.

use std::sync::{Arc, OnceLock};

use futures::{Stream, StreamExt};
use tracing::{debug, warn};

use crate::cancellation::BatchContext;
use crate::errors::{ConfigurationError, RenderError, TransportError};
use crate::log_sink::LogSink;
use crate::selector::SelectedTable;
use crate::template::Template;
use crate::transport::Transport;

/// What to do when the transport raises a hard fault.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FaultPolicy {
    /// Log the fault, count the recipient as failed and carry on.
    #[default]
    Continue,
    /// Count the recipient as failed and end the batch.
    Abort,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The recipient is not on the messaging surface.
    Unreachable,
    Render(RenderError),
    Transport(TransportError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Delivered,
    /// No usable phone value; the transport was not called.
    Skipped,
    Failed(FailureReason),
}

impl SendOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, SendOutcome::Delivered)
    }
}

/// How a batch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchEnd {
    /// Every recipient was processed.
    Finished,
    /// The cancellation token fired between recipients.
    Cancelled,
    /// A transport fault under [`FaultPolicy::Abort`].
    Aborted,
}

/// Terminal state of one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub row_number: Option<String>,
    pub phone: Option<String>,
    pub outcome: SendOutcome,
}

#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    pub fault_policy: FaultPolicy,
    pub context: BatchContext,
}

/// Counts gathered by draining a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub total: usize,
    pub delivered: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Set once the stream has been drained.
    pub end: Option<BatchEnd>,
    pub deliveries: Vec<Delivery>,
}

impl BatchReport {
    pub fn processed(&self) -> usize {
        self.delivered + self.failed + self.skipped
    }

    /// True when the batch stopped before reaching every recipient.
    pub fn is_partial(&self) -> bool {
        self.processed() < self.total
    }

    pub fn cancelled(&self) -> bool {
        self.end == Some(BatchEnd::Cancelled)
    }

    /// True when a fault ended the batch, even on its last recipient.
    pub fn aborted(&self) -> bool {
        self.end == Some(BatchEnd::Aborted)
    }

    fn record(&mut self, delivery: Delivery) {
        match delivery.outcome {
            SendOutcome::Delivered => self.delivered += 1,
            SendOutcome::Skipped => self.skipped += 1,
            SendOutcome::Failed(_) => self.failed += 1,
        }
        self.deliveries.push(delivery);
    }
}

/// Starts a batch over `table`, returning a lazy stream of outcomes.
///
/// The stream consumes the table's rows and is not restartable. Nothing is
/// sent until the stream is polled. Fails before touching any row when
/// `phone_column` is not a column of `table`.
pub fn send_all<'a, T, L>(
    template: &str,
    table: SelectedTable,
    phone_column: &str,
    transport: &'a T,
    sink: &'a L,
    options: BatchOptions,
) -> Result<impl Stream<Item = Delivery> + Unpin + 'a, ConfigurationError>
where
    T: Transport + ?Sized,
    L: LogSink + ?Sized,
{
    let end = Arc::new(OnceLock::new());
    start_batch(template, table, phone_column, transport, sink, options, end)
}

fn start_batch<'a, T, L>(
    template: &str,
    table: SelectedTable,
    phone_column: &str,
    transport: &'a T,
    sink: &'a L,
    options: BatchOptions,
    end: Arc<OnceLock<BatchEnd>>,
) -> Result<impl Stream<Item = Delivery> + Unpin + 'a, ConfigurationError>
where
    T: Transport + ?Sized,
    L: LogSink + ?Sized,
{
    let Some(phone_index) = table.column_index(phone_column) else {
        sink.emit(&format!("Phone column '{phone_column}' not found"));
        return Err(ConfigurationError::PhoneColumnMissing(
            phone_column.to_string(),
        ));
    };

    let template = Template::parse(template);
    let (head, rows) = table.into_parts();
    let BatchOptions {
        fault_policy,
        context,
    } = options;

    Ok(Box::pin(async_stream::stream! {
        let total = rows.len();
        let mut outcome = BatchEnd::Finished;

        for (position, row) in rows.into_iter().enumerate() {
            if context.is_cancelled() {
                debug!(processed = position, total, "batch cancelled");
                sink.emit("Batch cancelled");
                outcome = BatchEnd::Cancelled;
                break;
            }

            let row_number = row.first().cloned().flatten();
            let phone = row
                .get(phone_index)
                .cloned()
                .flatten()
                .filter(|phone| !phone.trim().is_empty());

            let Some(phone) = phone else {
                sink.emit(&format!(
                    "Skipped row {}: no phone number",
                    row_number.as_deref().unwrap_or("?")
                ));
                yield Delivery { row_number, phone: None, outcome: SendOutcome::Skipped };
                continue;
            };

            let text = match template.as_ref().map_err(Clone::clone).and_then(|t| t.render(&head, &row)) {
                Ok(text) => text,
                Err(err) => {
                    sink.emit(&format!("Could not render message for {phone}: {err}"));
                    yield Delivery {
                        row_number,
                        phone: Some(phone),
                        outcome: SendOutcome::Failed(FailureReason::Render(err)),
                    };
                    continue;
                }
            };

            debug!(%phone, position, total, "sending message");
            match transport.send(&phone, &text).await {
                Ok(true) => {
                    sink.emit(&format!("Message sent to {phone}"));
                    yield Delivery { row_number, phone: Some(phone), outcome: SendOutcome::Delivered };
                }
                Ok(false) => {
                    sink.emit(&format!("WARNING! {phone} is not on WhatsApp!"));
                    yield Delivery {
                        row_number,
                        phone: Some(phone),
                        outcome: SendOutcome::Failed(FailureReason::Unreachable),
                    };
                }
                Err(err) => {
                    warn!(%phone, error = %err, "transport fault");
                    sink.emit(&format!("Transport fault for {phone}: {err}"));
                    yield Delivery {
                        row_number,
                        phone: Some(phone),
                        outcome: SendOutcome::Failed(FailureReason::Transport(err)),
                    };
                    if fault_policy == FaultPolicy::Abort {
                        sink.emit("Batch aborted");
                        outcome = BatchEnd::Aborted;
                        break;
                    }
                }
            }
        }

        if outcome == BatchEnd::Finished {
            sink.emit("Done!");
        }
        let _ = end.set(outcome);
    }))
}

/// Runs a whole batch and summarizes it.
pub async fn run_batch<T, L>(
    template: &str,
    table: SelectedTable,
    phone_column: &str,
    transport: &T,
    sink: &L,
    options: BatchOptions,
) -> Result<BatchReport, ConfigurationError>
where
    T: Transport + ?Sized,
    L: LogSink + ?Sized,
{
    let mut report = BatchReport {
        total: table.len(),
        ..BatchReport::default()
    };
    let end = Arc::new(OnceLock::new());
    let mut deliveries =
        start_batch(template, table, phone_column, transport, sink, options, end.clone())?;
    while let Some(delivery) = deliveries.next().await {
        report.record(delivery);
    }
    report.end = end.get().copied();
    Ok(report)
}
