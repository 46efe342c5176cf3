//! clockin entrypoint
//!
//! Load configuration, launch the browser session, drive the declaration
//! workflow, release the session, notify, and exit with the outcome.

use anyhow::{Context, Result};
use clockin::{Notifier, Outcome, Session, Settings, WorkflowDriver};
use std::process::ExitCode;
use tracing::{error, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    match run().await {
        Ok(outcome) if outcome.failed => ExitCode::FAILURE,
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %format!("{err:#}"), "run aborted");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<Outcome> {
    let settings = Settings::from_env().context("loading configuration")?;

    let session = Session::launch(&settings.browser)
        .await
        .context("launching chromium")?;

    let driver = WorkflowDriver::new(&session, &settings.credentials);
    let result = driver.run().await;

    // The session is released on every exit path before the notifier runs.
    session.close().await;

    let outcome = result.context("workflow aborted")?;

    let notifier = Notifier::new(settings.push_token.clone());
    if let Err(err) = notifier.notify(outcome.failed).await {
        warn!(error = %format!("{err:#}"), "failed to deliver push notification");
    }

    Ok(outcome)
}
