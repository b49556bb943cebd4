//! WhatsApp Web automation on top of a [`WebDriverSession`].

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::errors::TransportError;
use crate::transport::Transport;
use crate::webdriver::{keys, TabHandle, WebDriverSession};

/// XPath locators for the chat client's UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSelectors {
    pub new_chat: String,
    pub search_box: String,
    pub search_result: String,
    pub message_box: String,
}

impl Default for ChatSelectors {
    fn default() -> Self {
        Self {
            new_chat: r#"//button[@title="New chat"]"#.to_string(),
            search_box: labelled_field("Search name or number"),
            search_result: r#"//div[@role="gridcell"]"#.to_string(),
            message_box: labelled_field("Type a message"),
        }
    }
}

fn labelled_field(label: &str) -> String {
    let label = xpath_literal(label);
    format!(
        "//*[@contenteditable='true'][@aria-label={label} or @title={label} or @aria-placeholder={label}]"
    )
}

/// Quotes `text` as an XPath 1.0 string literal.
pub fn xpath_literal(text: &str) -> String {
    if !text.contains('"') {
        return format!("\"{text}\"");
    }
    if !text.contains('\'') {
        return format!("'{text}'");
    }
    let parts: Vec<String> = text.split('"').map(|part| format!("\"{part}\"")).collect();
    format!("concat({})", parts.join(", '\"', "))
}

/// Keystrokes that type `text` as one message.
///
/// A bare Enter would send early, so line breaks become Shift+Enter followed
/// by a release of the modifier.
pub fn encode_message_keys(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 1);
    for ch in text.chars() {
        match ch {
            '\r' => {}
            '\n' => {
                out.push(keys::SHIFT);
                out.push(keys::ENTER);
                out.push(keys::NULL);
            }
            _ => out.push(ch),
        }
    }
    out.push(keys::ENTER);
    out
}

/// Sends messages through the chat client running in `tab`.
#[derive(Debug, Clone)]
pub struct ChatTransport<'a> {
    session: &'a WebDriverSession,
    tab: Option<TabHandle>,
    selectors: ChatSelectors,
    pace: Duration,
}

impl<'a> ChatTransport<'a> {
    pub fn new(session: &'a WebDriverSession) -> Self {
        Self {
            session,
            tab: None,
            selectors: ChatSelectors::default(),
            pace: Duration::from_millis(500),
        }
    }

    pub fn with_tab(mut self, tab: TabHandle) -> Self {
        self.tab = Some(tab);
        self
    }

    pub fn with_selectors(mut self, selectors: ChatSelectors) -> Self {
        self.selectors = selectors;
        self
    }

    /// Delay between UI actions.
    pub fn with_pace(mut self, pace: Duration) -> Self {
        self.pace = pace;
        self
    }

    /// Brings the chat tab to the front.
    pub async fn focus(&self) -> Result<(), TransportError> {
        if let Some(tab) = &self.tab {
            self.session.switch_to(tab).await?;
        }
        Ok(())
    }

    async fn settle(&self) {
        if !self.pace.is_zero() {
            tokio::time::sleep(self.pace).await;
        }
    }
}

#[async_trait]
impl Transport for ChatTransport<'_> {
    async fn send(&self, identity: &str, text: &str) -> Result<bool, TransportError> {
        let new_chat = self.session.require_element(&self.selectors.new_chat).await?;
        self.session.click(&new_chat).await?;
        self.settle().await;

        let search = self.session.require_element(&self.selectors.search_box).await?;
        self.session.send_keys(&search, identity).await?;
        self.settle().await;

        let Some(result) = self.session.find_element(&self.selectors.search_result).await? else {
            debug!("No chat found for {}", identity);
            return Ok(false);
        };
        self.session.click(&result).await?;
        self.settle().await;

        let message_box = self.session.require_element(&self.selectors.message_box).await?;
        self.session
            .send_keys(&message_box, &encode_message_keys(text))
            .await?;
        self.settle().await;
        Ok(true)
    }
}

/// Opens `url` in a new tab and leaves it focused.
pub async fn open_tab(session: &WebDriverSession, url: &str) -> Result<TabHandle, TransportError> {
    let tab = session.new_tab().await?;
    session.switch_to(&tab).await?;
    session.navigate(url).await?;
    info!("Opened {} in tab {}", url, tab.as_str());
    Ok(tab)
}

/// Visible menu labels of the spreadsheet's CSV export. They depend on the
/// spreadsheet UI's language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadLabels {
    pub file: String,
    pub download: String,
    pub extension: String,
}

impl Default for DownloadLabels {
    fn default() -> Self {
        Self {
            file: "File".to_string(),
            download: "Download".to_string(),
            extension: "Comma Separated Values (.csv)".to_string(),
        }
    }
}

fn menu_entry(label: &str) -> String {
    format!(
        "//*[normalize-space(text())={}]",
        xpath_literal(label.trim())
    )
}

/// Exports a spreadsheet as CSV through its menus.
///
/// Works in a throwaway tab that is closed afterwards; the previously focused
/// window is restored. The browser saves the file to its download directory.
pub async fn download_contacts(
    session: &WebDriverSession,
    url: &str,
    labels: &DownloadLabels,
    settle: Duration,
) -> Result<(), TransportError> {
    let previous = session.current_window().await?;
    open_tab(session, url).await?;

    for label in [&labels.file, &labels.download, &labels.extension] {
        let entry = session.require_element(&menu_entry(label)).await?;
        session.click(&entry).await?;
    }
    tokio::time::sleep(settle).await;

    session.close_window().await?;
    session.switch_to(&previous).await?;
    info!("Exported contacts from {}", url);
    Ok(())
}
