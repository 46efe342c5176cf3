//! Workflow driver
//!
//! Owns the bounded retry loop around the stage sequence. Each attempt
//! executes the remaining stages in order from the last known stage; after a
//! timeout the next attempt refreshes the page, classifies it, and resumes
//! from wherever the session actually is. The stage value is threaded
//! through the loop explicitly: classify, transition, act.

use crate::{
    config::Credentials,
    error::WorkflowError,
    locator::Locator,
    session::PageOps,
    stage::{classify, Stage, TITLE_FORM_LANDING, TITLE_PORTAL},
};
use serde::Serialize;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info};
use url::Url;

/// Total attempts of the whole stage sequence before giving up.
pub const MAX_ATTEMPTS: u32 = 7;
/// Consecutive empty titles tolerated while classifying; the 6th is fatal
/// for the attempt.
pub const MAX_TITLE_REFRESHES: u32 = 6;

/// Ceiling for element/condition waits.
const ELEMENT_WAIT: Duration = Duration::from_secs(30);
/// Ceiling for title-appearance waits.
const TITLE_WAIT: Duration = Duration::from_secs(5);
/// Pause after an action before checking for asynchronous page updates.
const SETTLE_DELAY: Duration = Duration::from_secs(2);

const CAS_LOGIN_URL: &str = "https://newcas.gzhu.edu.cn/cas/login";
const PORTAL_HOME_URL: &str = "https://newmy.gzhu.edu.cn/up/view?m=up";
const FORM_START_URL: &str = "https://yqtb.gzhu.edu.cn/infoplus/form/XSJKZKSB/start?preview=true";

const LOGIN_WIDGET: Locator = Locator::Css("div.robot-mag-win.small-big-small");
const USERNAME_FIELD: Locator = Locator::Css("#un");
const PASSWORD_FIELD: Locator = Locator::Css("#pd");
const LOGIN_BUTTON: Locator = Locator::Css("#index_login_btn");
const PREVIEW_START: Locator = Locator::Css("#preview_start_button");
const FORM_CONTROL: Locator = Locator::Css("#V1_CTRL51");
const SUBMIT_BUTTON: Locator = Locator::XPath("//nobr[contains(text(), '提交')]/..");
const DIALOG_CONTENT: Locator = Locator::Css("div.dialog_content");
const DIALOG_ACK: Locator = Locator::Css("button.dialog_button.default.fr");

const SUCCESS_MESSAGES: [&str; 2] = ["Done successfully!", "办理成功!"];
const REMARKS_MARKERS: [&str; 2] = ["reviews", "备注"];

/// Final result of the run, consumed exactly once by the notifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub failed: bool,
}

/// CAS login URL carrying the portal as its return service.
fn login_url() -> Url {
    Url::parse_with_params(CAS_LOGIN_URL, &[("service", PORTAL_HOME_URL)])
        .expect("static login url is valid")
}

/// Drives the declaration workflow over a page port.
pub struct WorkflowDriver<'a, P: PageOps + ?Sized> {
    page: &'a P,
    credentials: &'a Credentials,
}

impl<'a, P: PageOps + ?Sized> WorkflowDriver<'a, P> {
    pub fn new(page: &'a P, credentials: &'a Credentials) -> Self {
        Self { page, credentials }
    }

    /// Run the stage sequence under the bounded retry loop.
    ///
    /// Timeout-class errors are absorbed here: each one costs an attempt,
    /// and exhausting the budget yields a failed outcome. Anything else
    /// propagates to the caller.
    pub async fn run(&self) -> Result<Outcome, WorkflowError> {
        let mut stage = Stage::Start;
        let mut attempt: u32 = 1;

        loop {
            info!(attempt, stage = stage.as_str(), "starting attempt");

            match self.attempt(attempt > 1, &mut stage).await {
                Ok(outcome) => return Ok(outcome),
                Err(err) if err.is_retryable() => {
                    let title = self.page.title().await.unwrap_or_default();
                    if title.is_empty() {
                        error!(attempt, %err, "attempt failed, current page title is empty");
                    } else {
                        error!(attempt, %err, %title, "attempt failed");
                    }

                    if attempt == MAX_ATTEMPTS {
                        error!("check-in failed, retry budget exhausted");
                        return Ok(Outcome { failed: true });
                    }
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// One pass over the remaining stages. On a recovery pass the stage is
    /// re-derived from the live page first.
    async fn attempt(&self, recover: bool, stage: &mut Stage) -> Result<Outcome, WorkflowError> {
        if recover {
            *stage = self.refresh_and_classify().await?;
        }

        loop {
            *stage = match *stage {
                Stage::Start => {
                    self.open_login().await?;
                    Stage::IdentityLogin
                }
                Stage::IdentityLogin => {
                    self.sign_in().await?;
                    Stage::Portal
                }
                Stage::Portal => {
                    self.open_form().await?;
                    Stage::FormLanding
                }
                Stage::FormLanding => {
                    self.start_declaration().await?;
                    Stage::FormLoading
                }
                Stage::FormLoading => {
                    self.page.wait_clickable(&FORM_CONTROL, ELEMENT_WAIT).await?;
                    Stage::FormReady
                }
                Stage::FormReady => return self.submit_declaration().await,
            };
        }
    }

    /// Reload until the page shows a non-empty title, then classify it.
    /// The refresh budget converts a persistently empty title into a
    /// retryable classification failure.
    async fn refresh_and_classify(&self) -> Result<Stage, WorkflowError> {
        let mut empty_titles: u32 = 0;

        loop {
            info!("refreshing page");
            self.page.reload().await?;

            if let Err(err) = self.page.wait_for_title(TITLE_WAIT).await {
                if !err.is_retryable() {
                    return Err(err);
                }
                // The title element never appeared; read whatever is there.
            }

            let title = self.page.title().await?;
            match classify(&title) {
                Some(stage) => {
                    info!(%title, stage = stage.as_str(), "page classified");
                    return Ok(stage);
                }
                None => {
                    info!("current page title is empty");
                    empty_titles += 1;
                    if empty_titles >= MAX_TITLE_REFRESHES {
                        return Err(WorkflowError::TitleUnavailable(empty_titles));
                    }
                }
            }
        }
    }

    async fn open_login(&self) -> Result<(), WorkflowError> {
        info!("navigating to the identity login page");
        self.page.navigate(login_url().as_str()).await
    }

    async fn sign_in(&self) -> Result<(), WorkflowError> {
        self.page.wait_visible(&LOGIN_WIDGET, ELEMENT_WAIT).await?;

        info!("signing in to the portal");
        self.page
            .fill(&USERNAME_FIELD, &self.credentials.student_id)
            .await?;
        self.page
            .fill(&PASSWORD_FIELD, &self.credentials.password)
            .await?;
        self.page.click(&LOGIN_BUTTON).await
    }

    async fn open_form(&self) -> Result<(), WorkflowError> {
        self.page.wait_title_contains(TITLE_PORTAL, TITLE_WAIT).await?;

        info!("opening the health declaration form");
        self.page.navigate(FORM_START_URL).await
    }

    async fn start_declaration(&self) -> Result<(), WorkflowError> {
        info!("entering the declaration landing page");
        self.page
            .wait_title_contains(TITLE_FORM_LANDING, TITLE_WAIT)
            .await?;
        self.page.wait_clickable(&PREVIEW_START, ELEMENT_WAIT).await?;
        self.page.click(&PREVIEW_START).await
    }

    async fn submit_declaration(&self) -> Result<Outcome, WorkflowError> {
        // A recovered session can resume here while the form is still
        // rendering, so re-assert the control before touching it.
        self.page.wait_clickable(&FORM_CONTROL, ELEMENT_WAIT).await?;

        info!("filling and submitting the form");
        self.page.click(&FORM_CONTROL).await?;
        self.page.click(&SUBMIT_BUTTON).await?;

        sleep(SETTLE_DELAY).await;
        self.page.wait_visible(&DIALOG_CONTENT, ELEMENT_WAIT).await?;
        let mut message = self.page.text(&DIALOG_CONTENT).await?;
        info!(text = %message, "result dialog");

        if is_success(&message) {
            info!("check-in succeeded");
            return Ok(Outcome { failed: false });
        }

        if needs_remarks(&message) {
            info!("remarks acknowledgement required");
            self.page.wait_clickable(&DIALOG_ACK, ELEMENT_WAIT).await?;
            self.page.click(&DIALOG_ACK).await?;

            sleep(SETTLE_DELAY).await;
            self.page.wait_visible(&DIALOG_CONTENT, ELEMENT_WAIT).await?;
            message = self.page.text(&DIALOG_CONTENT).await?;
            info!(text = %message, "result dialog after acknowledgement");
        }

        if is_success(&message) {
            info!("check-in succeeded");
            Ok(Outcome { failed: false })
        } else {
            // Retrying cannot fix a content mismatch, so the outcome is
            // terminal even with attempts remaining.
            error!(text = %message, "unexpected dialog message, check-in failed");
            Ok(Outcome { failed: true })
        }
    }
}

fn is_success(message: &str) -> bool {
    SUCCESS_MESSAGES.contains(&message)
}

fn needs_remarks(message: &str) -> bool {
    REMARKS_MARKERS.iter().any(|marker| message.contains(marker))
}
