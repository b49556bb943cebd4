//! Session state of one operator walking through the wizard.

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::decode::{decode_upload, load_contacts};
use crate::dispatch::{run_batch, BatchOptions, BatchReport};
use crate::errors::{BulkSenderError, StepError};
use crate::log_sink::LogSink;
use crate::selector::{select, ColumnSpec, SelectedTable};
use crate::steps::{Product, StepId};
use crate::table::Table;
use crate::transport::Transport;
use crate::webdriver::TabHandle;

/// Holds the products published so far and refuses to run a step whose
/// inputs are missing.
///
/// Each product is owned by the wizard and replaced wholesale when its step
/// runs again.
#[derive(Debug)]
pub struct Wizard<L: LogSink> {
    sink: L,
    published: BTreeSet<Product>,
    contacts: Option<Table>,
    selected: Option<SelectedTable>,
    messaging_tab: Option<TabHandle>,
}

impl<L: LogSink> Wizard<L> {
    pub fn new(sink: L) -> Self {
        Self {
            sink,
            published: BTreeSet::new(),
            contacts: None,
            selected: None,
            messaging_tab: None,
        }
    }

    pub fn sink(&self) -> &L {
        &self.sink
    }

    pub fn is_published(&self, product: Product) -> bool {
        self.published.contains(&product)
    }

    /// Products `step` needs that are not published yet.
    pub fn missing(&self, step: StepId) -> Vec<Product> {
        step.descriptor()
            .requires
            .iter()
            .copied()
            .filter(|product| !self.is_published(*product))
            .collect()
    }

    pub fn is_available(&self, step: StepId) -> bool {
        self.missing(step).is_empty()
    }

    pub fn ensure_ready(&self, step: StepId) -> Result<(), StepError> {
        match self.missing(step).first() {
            Some(product) => Err(StepError::MissingProduct {
                step: step.to_string(),
                product: product.to_string(),
            }),
            None => Ok(()),
        }
    }

    fn publish(&mut self, product: Product) {
        let stale: Vec<Product> = self
            .published
            .iter()
            .copied()
            .filter(|derived| derived.derived_from() == Some(product))
            .collect();
        for derived in stale {
            debug!("Invalidating {} after new {}", derived, product);
            self.withdraw(derived);
        }
        self.published.insert(product);
    }

    fn withdraw(&mut self, product: Product) {
        self.published.remove(&product);
        match product {
            Product::ContactTable => self.contacts = None,
            Product::SelectedTable => self.selected = None,
            Product::MessagingTab => self.messaging_tab = None,
            Product::ContactsFile => {}
        }
    }

    pub fn mark_contacts_downloaded(&mut self) {
        self.publish(Product::ContactsFile);
        self.sink.emit("Contacts downloaded");
    }

    pub fn record_tab(&mut self, tab: TabHandle) {
        info!("Messaging tab is {}", tab.as_str());
        self.messaging_tab = Some(tab);
        self.publish(Product::MessagingTab);
        self.sink.emit("WhatsApp tab opened");
    }

    pub fn messaging_tab(&self) -> Option<&TabHandle> {
        self.messaging_tab.as_ref()
    }

    /// Replaces the contact table. Any selection made against the previous
    /// table is dropped.
    pub fn load_contacts(&mut self, table: Table) {
        info!(rows = table.len(), "contacts loaded");
        self.contacts = Some(table);
        self.publish(Product::ContactTable);
        self.sink.emit("Contacts loaded");
    }

    /// Loads contacts from CSV bytes.
    pub fn load_csv(&mut self, bytes: &[u8]) -> Result<&Table, BulkSenderError> {
        match load_contacts(bytes) {
            Ok(table) => {
                self.load_contacts(table);
                self.contacts().ok_or_else(|| missing(StepId::LoadContacts, Product::ContactTable))
            }
            Err(e) => {
                self.sink.emit(&format!("Could not load contacts: {e}"));
                Err(e.into())
            }
        }
    }

    /// Loads contacts from a browser upload (`data:...;base64,...`).
    pub fn load_upload(&mut self, content: &str) -> Result<&Table, BulkSenderError> {
        let bytes = match decode_upload(content) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.sink.emit(&format!("Could not load contacts: {e}"));
                return Err(e.into());
            }
        };
        self.load_csv(&bytes)
    }

    pub fn contacts(&self) -> Option<&Table> {
        self.contacts.as_ref()
    }

    /// Runs the selection step against the loaded contacts.
    ///
    /// On failure the previous selection, if any, stays published.
    pub fn select(
        &mut self,
        range_expr: &str,
        columns: &[ColumnSpec],
    ) -> Result<&SelectedTable, BulkSenderError> {
        self.ensure_ready(StepId::SelectContacts)?;
        let table = self
            .contacts
            .as_ref()
            .ok_or_else(|| missing(StepId::SelectContacts, Product::ContactTable))?;

        match select(table, range_expr, columns) {
            Ok(selected) => {
                info!(rows = selected.len(), "contacts selected");
                self.selected = Some(selected);
                self.publish(Product::SelectedTable);
                self.sink.emit("Contacts selected");
                self.selected().ok_or_else(|| missing(StepId::SelectContacts, Product::SelectedTable))
            }
            Err(e) => {
                self.sink.emit(&e.to_string());
                Err(e.into())
            }
        }
    }

    pub fn selected(&self) -> Option<&SelectedTable> {
        self.selected.as_ref()
    }

    /// Sends `template` to every selected contact. The selection stays
    /// published, so the step can run again.
    pub async fn send_batch<T>(
        &self,
        template: &str,
        phone_column: &str,
        transport: &T,
        options: BatchOptions,
    ) -> Result<BatchReport, BulkSenderError>
    where
        T: Transport + ?Sized,
    {
        self.ensure_ready(StepId::SendMessages)?;
        let selected = self
            .selected
            .clone()
            .ok_or_else(|| missing(StepId::SendMessages, Product::SelectedTable))?;
        let report = run_batch(template, selected, phone_column, transport, &self.sink, options).await?;
        info!(
            delivered = report.delivered,
            failed = report.failed,
            skipped = report.skipped,
            "batch finished"
        );
        Ok(report)
    }
}

fn missing(step: StepId, product: Product) -> BulkSenderError {
    StepError::MissingProduct {
        step: step.to_string(),
        product: product.to_string(),
    }
    .into()
}
