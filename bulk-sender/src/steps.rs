//! The fixed wizard: which step needs which data and what it produces.

use std::fmt;

/// Data published by one step and consumed by later ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Product {
    /// A CSV export sitting in the browser's download directory.
    ContactsFile,
    /// An open, logged-in chat client tab.
    MessagingTab,
    ContactTable,
    SelectedTable,
}

impl Product {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Product::ContactsFile => "contacts file",
            Product::MessagingTab => "messaging tab",
            Product::ContactTable => "contact table",
            Product::SelectedTable => "selected table",
        }
    }

    /// The product this one was computed from. Replacing the source
    /// invalidates it.
    pub const fn derived_from(&self) -> Option<Product> {
        match self {
            Product::SelectedTable => Some(Product::ContactTable),
            _ => None,
        }
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepId {
    DownloadContacts,
    MessagingLogin,
    LoadContacts,
    SelectContacts,
    SendMessages,
}

impl StepId {
    pub fn descriptor(&self) -> &'static StepDescriptor {
        // STEPS is declared in StepId order.
        &STEPS[*self as usize]
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.descriptor().title)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepDescriptor {
    pub id: StepId,
    pub title: &'static str,
    pub description: &'static str,
    /// Operator-supplied fields.
    pub inputs: &'static [&'static str],
    /// Products that must be published before the step can run.
    pub requires: &'static [Product],
    pub publishes: &'static [Product],
}

static STEPS: [StepDescriptor; 5] = [
    StepDescriptor {
        id: StepId::DownloadContacts,
        title: "Download contacts",
        description: "Export the contact spreadsheet as CSV through the browser",
        inputs: &["contacts_url", "button_file", "button_download", "button_extension"],
        requires: &[],
        publishes: &[Product::ContactsFile],
    },
    StepDescriptor {
        id: StepId::MessagingLogin,
        title: "WhatsApp login",
        description: "Open WhatsApp Web in a new tab and log in",
        inputs: &["whatsapp_url"],
        requires: &[],
        publishes: &[Product::MessagingTab],
    },
    StepDescriptor {
        id: StepId::LoadContacts,
        title: "Load contacts",
        description: "Upload the CSV file with the contacts",
        inputs: &["file"],
        requires: &[],
        publishes: &[Product::ContactTable],
    },
    StepDescriptor {
        id: StepId::SelectContacts,
        title: "Select contacts",
        description: "Pick the rows to message and the name, surname and phone columns",
        inputs: &["rows", "col_name", "col_surname", "col_phone"],
        requires: &[Product::ContactTable],
        publishes: &[Product::SelectedTable],
    },
    StepDescriptor {
        id: StepId::SendMessages,
        title: "Send messages",
        description: "Write the message template and send it to every selected contact",
        inputs: &["template"],
        requires: &[Product::SelectedTable, Product::MessagingTab],
        publishes: &[],
    },
];

/// The wizard's steps in order.
pub fn steps() -> &'static [StepDescriptor] {
    &STEPS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptors_match_ids() {
        for step in steps() {
            assert_eq!(step.id.descriptor(), step);
        }
    }

    #[test]
    fn test_every_requirement_is_published_earlier() {
        let mut published = Vec::new();
        for step in steps() {
            for product in step.requires {
                assert!(published.contains(product), "{} needs {}", step.title, product);
            }
            published.extend_from_slice(step.publishes);
        }
    }

    #[test]
    fn test_selected_table_depends_on_contacts() {
        assert_eq!(Product::SelectedTable.derived_from(), Some(Product::ContactTable));
        assert_eq!(Product::ContactTable.derived_from(), None);
    }
}
