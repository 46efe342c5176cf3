//! Browser session
//!
//! One Chromium connection for the whole run. `PageOps` is the capability
//! surface the workflow driver is written against; `Session` implements it
//! over chromiumoxide. All element probing runs as injected script against
//! the live document, the same way the portal itself manipulates it.

use crate::{
    config::BrowserOptions,
    error::WorkflowError,
    locator::Locator,
    waiting::poll_until,
};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::error::CdpError;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Ceiling for individual CDP commands.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);
const LAUNCH_TIMEOUT: Duration = Duration::from_secs(20);

/// Page capabilities the workflow driver needs.
#[async_trait]
pub trait PageOps: Send + Sync {
    /// Navigate the session to `url`.
    async fn navigate(&self, url: &str) -> Result<(), WorkflowError>;

    /// Reload the current page.
    async fn reload(&self) -> Result<(), WorkflowError>;

    /// Current page title; empty when the page has not settled yet.
    async fn title(&self) -> Result<String, WorkflowError>;

    /// Wait for a `<title>` element to exist at all.
    async fn wait_for_title(&self, ceiling: Duration) -> Result<(), WorkflowError>;

    /// Wait until the title contains `fragment`.
    async fn wait_title_contains(
        &self,
        fragment: &str,
        ceiling: Duration,
    ) -> Result<(), WorkflowError>;

    /// Wait until the element is rendered visible.
    async fn wait_visible(&self, locator: &Locator, ceiling: Duration)
        -> Result<(), WorkflowError>;

    /// Wait until the element is visible and enabled.
    async fn wait_clickable(
        &self,
        locator: &Locator,
        ceiling: Duration,
    ) -> Result<(), WorkflowError>;

    /// Click the element.
    async fn click(&self, locator: &Locator) -> Result<(), WorkflowError>;

    /// Assign `value` to the element's value property.
    async fn fill(&self, locator: &Locator, value: &str) -> Result<(), WorkflowError>;

    /// Text content of the element.
    async fn text(&self, locator: &Locator) -> Result<String, WorkflowError>;
}

/// The live Chromium session, exclusively owned for the process lifetime.
pub struct Session {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
}

impl Session {
    /// Launch Chromium and open the working tab.
    pub async fn launch(options: &BrowserOptions) -> Result<Self, WorkflowError> {
        let config = browser_config(options)?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(map_cdp_error)?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    warn!(?err, "cdp event loop error");
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(map_cdp_error)?;

        info!(headless = options.headless, "chromium session established");

        Ok(Self {
            browser,
            page,
            handler_task,
        })
    }

    /// Close the session, releasing the browser process. Best effort; runs
    /// on every exit path.
    pub async fn close(mut self) {
        if let Err(err) = self.browser.close().await {
            warn!(?err, "failed to close browser cleanly");
        }
        if let Err(err) = self.browser.wait().await {
            debug!(?err, "browser wait after close failed");
        }
        self.handler_task.abort();
        info!("chromium session closed");
    }

    async fn eval_bool(&self, expression: &str) -> Result<bool, WorkflowError> {
        let result = self
            .page
            .evaluate(expression)
            .await
            .map_err(map_cdp_error)?;
        result
            .into_value::<bool>()
            .map_err(CdpError::from)
            .map_err(map_cdp_error)
    }
}

#[async_trait]
impl PageOps for Session {
    async fn navigate(&self, url: &str) -> Result<(), WorkflowError> {
        debug!(url, "navigating");
        self.page.goto(url).await.map_err(map_cdp_error)?;
        Ok(())
    }

    async fn reload(&self) -> Result<(), WorkflowError> {
        self.page.reload().await.map_err(map_cdp_error)?;
        Ok(())
    }

    async fn title(&self) -> Result<String, WorkflowError> {
        let title = self.page.get_title().await.map_err(map_cdp_error)?;
        Ok(title.unwrap_or_default())
    }

    async fn wait_for_title(&self, ceiling: Duration) -> Result<(), WorkflowError> {
        poll_until("title element", ceiling, || async move {
            self.eval_bool("document.getElementsByTagName('title').length > 0")
                .await
        })
        .await
    }

    async fn wait_title_contains(
        &self,
        fragment: &str,
        ceiling: Duration,
    ) -> Result<(), WorkflowError> {
        let expression = title_contains_probe(fragment);
        poll_until(&format!("title containing {fragment:?}"), ceiling, || {
            let expression = expression.clone();
            async move { self.eval_bool(&expression).await }
        })
        .await
    }

    async fn wait_visible(
        &self,
        locator: &Locator,
        ceiling: Duration,
    ) -> Result<(), WorkflowError> {
        let expression = visible_probe(locator);
        poll_until(&format!("{locator} visible"), ceiling, || {
            let expression = expression.clone();
            async move { self.eval_bool(&expression).await }
        })
        .await
    }

    async fn wait_clickable(
        &self,
        locator: &Locator,
        ceiling: Duration,
    ) -> Result<(), WorkflowError> {
        let expression = clickable_probe(locator);
        poll_until(&format!("{locator} clickable"), ceiling, || {
            let expression = expression.clone();
            async move { self.eval_bool(&expression).await }
        })
        .await
    }

    async fn click(&self, locator: &Locator) -> Result<(), WorkflowError> {
        let hit = self.eval_bool(&click_script(locator)).await?;
        if !hit {
            return Err(WorkflowError::ElementMissing(locator.to_string()));
        }
        debug!(%locator, "clicked");
        Ok(())
    }

    async fn fill(&self, locator: &Locator, value: &str) -> Result<(), WorkflowError> {
        let hit = self.eval_bool(&fill_script(locator, value)).await?;
        if !hit {
            return Err(WorkflowError::ElementMissing(locator.to_string()));
        }
        Ok(())
    }

    async fn text(&self, locator: &Locator) -> Result<String, WorkflowError> {
        let result = self
            .page
            .evaluate(text_script(locator))
            .await
            .map_err(map_cdp_error)?;
        let value: Option<String> = result
            .into_value()
            .map_err(CdpError::from)
            .map_err(map_cdp_error)?;
        value.ok_or_else(|| WorkflowError::ElementMissing(locator.to_string()))
    }
}

fn browser_config(options: &BrowserOptions) -> Result<BrowserConfig, WorkflowError> {
    let mut builder = BrowserConfig::builder()
        .request_timeout(COMMAND_TIMEOUT)
        .launch_timeout(LAUNCH_TIMEOUT)
        .no_sandbox()
        .args([
            "--disable-gpu",
            "--blink-settings=imagesEnabled=false",
            "--disable-extensions",
            "--disable-browser-side-navigation",
            "--disable-dev-shm-usage",
            "--no-first-run",
            "--no-default-browser-check",
        ]);

    if !options.headless {
        builder = builder.with_head();
    }

    if let Some(executable) = &options.executable {
        builder = builder.chrome_executable(executable.clone());
    }

    builder
        .build()
        .map_err(|err| WorkflowError::Browser(format!("browser config error: {err}")))
}

fn map_cdp_error(err: CdpError) -> WorkflowError {
    match err {
        CdpError::Timeout => WorkflowError::timeout("cdp command", COMMAND_TIMEOUT.as_millis() as u64),
        other => WorkflowError::Browser(other.to_string()),
    }
}

fn js_literal(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{value}\""))
}

fn title_contains_probe(fragment: &str) -> String {
    format!("(document.title || '').includes({})", js_literal(fragment))
}

fn visible_probe(locator: &Locator) -> String {
    format!(
        "(() => {{\n            const el = {lookup};\n            if (!el) {{ return false; }}\n            const style = window.getComputedStyle(el);\n            const rect = el.getBoundingClientRect();\n            return style.visibility !== 'hidden' && style.display !== 'none' && (rect.width > 0 || rect.height > 0 || el.getClientRects().length > 0);\n        }})()",
        lookup = locator.js_lookup(),
    )
}

fn clickable_probe(locator: &Locator) -> String {
    format!(
        "(() => {{\n            const el = {lookup};\n            if (!el) {{ return false; }}\n            const style = window.getComputedStyle(el);\n            const rect = el.getBoundingClientRect();\n            const visible = style.visibility !== 'hidden' && style.display !== 'none' && (rect.width > 0 || rect.height > 0);\n            return visible && !el.disabled;\n        }})()",
        lookup = locator.js_lookup(),
    )
}

fn click_script(locator: &Locator) -> String {
    format!(
        "(() => {{ const el = {lookup}; if (!el) {{ return false; }} el.click(); return true; }})()",
        lookup = locator.js_lookup(),
    )
}

fn fill_script(locator: &Locator, value: &str) -> String {
    format!(
        "(() => {{ const el = {lookup}; if (!el) {{ return false; }} el.value = {value}; return true; }})()",
        lookup = locator.js_lookup(),
        value = js_literal(value),
    )
}

fn text_script(locator: &Locator) -> String {
    format!(
        "(() => {{ const el = {lookup}; return el ? (el.textContent || '') : null; }})()",
        lookup = locator.js_lookup(),
    )
}
