//! Workflow stages and page classification
//!
//! The portal renders each step of the declaration workflow as a distinct
//! page with a stable title. Classification maps an observed title back to
//! the stage the session is actually on, which is how the driver resumes
//! after a refresh instead of restarting from scratch.

use serde::{Deserialize, Serialize};

/// Title of the CAS login page.
pub const TITLE_IDENTITY_LOGIN: &str = "Unified Identity Authentication";
/// Title of the portal home page.
pub const TITLE_PORTAL: &str = "融合门户";
/// Title of the declaration form landing page.
pub const TITLE_FORM_LANDING: &str = "学生健康状况申报";
/// Titles the form shows while loading or once ready for input.
pub const TITLES_FORM_READY: [&str; 3] = [
    "Loading...",
    "表单填写与审批::加载中",
    "填报健康信息 - 学生健康状况申报",
];

/// Discrete position in the fixed multi-page workflow, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stage {
    /// No page loaded yet, or an unknown page: restart navigation from the top.
    Start,
    /// CAS login page is showing.
    IdentityLogin,
    /// Portal home page is showing.
    Portal,
    /// Declaration landing page with the start control.
    FormLanding,
    /// Start control clicked, form still rendering.
    FormLoading,
    /// Form controls are interactive; fill and submit.
    FormReady,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Start => "start",
            Stage::IdentityLogin => "identity_login",
            Stage::Portal => "portal",
            Stage::FormLanding => "form_landing",
            Stage::FormLoading => "form_loading",
            Stage::FormReady => "form_ready",
        }
    }
}

/// Map an observed page title to a stage.
///
/// Returns `None` for an empty title: the page has not settled yet and the
/// caller should refresh and classify again. Any non-empty title outside the
/// known set means an unknown page, which restarts the workflow from `Start`.
pub fn classify(title: &str) -> Option<Stage> {
    if title.is_empty() {
        return None;
    }

    let stage = match title {
        TITLE_IDENTITY_LOGIN => Stage::IdentityLogin,
        TITLE_PORTAL => Stage::Portal,
        TITLE_FORM_LANDING => Stage::FormLanding,
        _ if TITLES_FORM_READY.contains(&title) => Stage::FormReady,
        _ => Stage::Start,
    };

    Some(stage)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_titles_map_to_their_stage() {
        assert_eq!(
            classify("Unified Identity Authentication"),
            Some(Stage::IdentityLogin)
        );
        assert_eq!(classify("融合门户"), Some(Stage::Portal));
        assert_eq!(classify("学生健康状况申报"), Some(Stage::FormLanding));
    }

    #[test]
    fn loading_and_ready_titles_map_to_form_ready() {
        assert_eq!(classify("Loading..."), Some(Stage::FormReady));
        assert_eq!(classify("表单填写与审批::加载中"), Some(Stage::FormReady));
        assert_eq!(
            classify("填报健康信息 - 学生健康状况申报"),
            Some(Stage::FormReady)
        );
    }

    #[test]
    fn empty_title_is_transient() {
        assert_eq!(classify(""), None);
    }

    #[test]
    fn unknown_titles_restart_from_the_top() {
        assert_eq!(classify("404 Not Found"), Some(Stage::Start));
        assert_eq!(classify("某个新页面"), Some(Stage::Start));
    }

    #[test]
    fn stages_order_matches_the_workflow() {
        assert!(Stage::Start < Stage::IdentityLogin);
        assert!(Stage::IdentityLogin < Stage::Portal);
        assert!(Stage::Portal < Stage::FormLanding);
        assert!(Stage::FormLanding < Stage::FormLoading);
        assert!(Stage::FormLoading < Stage::FormReady);
    }
}
