//! Per-equipment command dialects.
//!
//! Each supported equipment class needs a different command sequence to get a
//! complete, non-paginated configuration dump out of its CLI. The dialect is
//! a tagged variant resolved once from the node's declared type tag; from
//! then on everything dispatches through the enum, so adding a dialect means
//! the compiler points at every spot that needs a decision.

use std::time::Duration;

use crate::config::SessionTuning;
use crate::error::BackupError;
use crate::expect::ExpectPattern;

/// Equipment classes with a known configuration-dump sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// SRX-style firewall/router: flat `set`-form dump, pagination disabled
    /// inline via `no-more`.
    FirewallRouter,
    /// EXOS-style connectivity switch: pagination disabled up front, dump via
    /// `show configuration`.
    Switch,
}

/// One step of a dialect script: wait for a pattern, then act.
#[derive(Debug, Clone)]
pub struct DialectStep {
    /// Pattern that must appear before the action runs.
    pub wait_for: ExpectPattern,
    /// Budget for the wait; elapsing is a node-level failure.
    pub timeout: Duration,
    pub action: StepAction,
    /// Sleep the settle delay after the action, letting slow devices finish
    /// buffering output before capture starts.
    pub settle_after: bool,
}

/// What to do once a step's pattern has appeared.
#[derive(Debug, Clone)]
pub enum StepAction {
    /// Send a command line to the device.
    SendLine(&'static str),
    /// Stop here: the text consumed up to this pattern is the capture.
    Capture,
}

/// The ordered command/prompt sequence for one equipment class.
///
/// Looked up by type tag, never mutated at runtime.
#[derive(Debug, Clone)]
pub struct DialectScript {
    pub steps: Vec<DialectStep>,
}

impl Dialect {
    /// Resolves a node's type tag to its dialect.
    ///
    /// Unrecognized tags are an explicit unsupported-equipment outcome, never
    /// a silent no-op.
    pub fn lookup(node_type: &str) -> Result<Dialect, BackupError> {
        match node_type {
            "srx" => Ok(Self::FirewallRouter),
            "connectivitySwitch" => Ok(Self::Switch),
            other => Err(BackupError::UnsupportedEquipment(other.to_string())),
        }
    }

    /// The command that makes the device print its full configuration.
    pub fn capture_command(&self) -> &'static str {
        match self {
            Self::FirewallRouter => "show config | display set | no-more",
            Self::Switch => "show configuration",
        }
    }

    /// The command disabling output paging, for dialects that need one.
    pub fn pagination_command(&self) -> Option<&'static str> {
        match self {
            Self::FirewallRouter => None,
            Self::Switch => Some("disable clipaging"),
        }
    }

    /// The pattern whose reappearance ends the capture.
    pub fn termination_pattern(&self) -> ExpectPattern {
        match self {
            Self::FirewallRouter => ExpectPattern::literal("set"),
            Self::Switch => ExpectPattern::literal("#"),
        }
    }

    /// Builds the full script for this dialect against a node's prompt.
    ///
    /// Every script ends in a capture step awaiting the termination pattern;
    /// the capture command always gets a settle window before it.
    pub fn script(&self, prompt: ExpectPattern, tuning: &SessionTuning) -> DialectScript {
        let mut steps = Vec::new();

        match self.pagination_command() {
            Some(pagination) => {
                steps.push(DialectStep {
                    wait_for: prompt,
                    timeout: tuning.prompt_timeout,
                    action: StepAction::SendLine(pagination),
                    settle_after: false,
                });
                steps.push(DialectStep {
                    wait_for: self.termination_pattern(),
                    timeout: tuning.prompt_timeout,
                    action: StepAction::SendLine(self.capture_command()),
                    settle_after: true,
                });
            }
            None => {
                steps.push(DialectStep {
                    wait_for: prompt,
                    timeout: tuning.prompt_timeout,
                    action: StepAction::SendLine(self.capture_command()),
                    settle_after: true,
                });
            }
        }

        steps.push(DialectStep {
            wait_for: self.termination_pattern(),
            timeout: tuning.prompt_timeout,
            action: StepAction::Capture,
            settle_after: false,
        });

        DialectScript { steps }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_type_tags_resolve() {
        assert_eq!(Dialect::lookup("srx").unwrap(), Dialect::FirewallRouter);
        assert_eq!(
            Dialect::lookup("connectivitySwitch").unwrap(),
            Dialect::Switch
        );
    }

    #[test]
    fn unknown_type_tag_is_unsupported_equipment() {
        for tag in ["", "SRX", "router", "connectivityswitch"] {
            let err = Dialect::lookup(tag).expect_err("tag should be unsupported");
            match err {
                BackupError::UnsupportedEquipment(t) => assert_eq!(t, tag),
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn firewall_script_is_prompt_dump_capture() {
        let tuning = SessionTuning::default();
        let script =
            Dialect::FirewallRouter.script(ExpectPattern::literal("fw01>"), &tuning);

        assert_eq!(script.steps.len(), 2);
        assert!(matches!(
            script.steps[0].action,
            StepAction::SendLine("show config | display set | no-more")
        ));
        assert!(script.steps[0].settle_after);
        assert!(matches!(script.steps[1].action, StepAction::Capture));
        assert_eq!(script.steps[1].timeout, tuning.prompt_timeout);
    }

    #[test]
    fn switch_script_disables_paging_first() {
        let tuning = SessionTuning::default();
        let script = Dialect::Switch.script(ExpectPattern::literal("EXOS-VM"), &tuning);

        assert_eq!(script.steps.len(), 3);
        assert!(matches!(
            script.steps[0].action,
            StepAction::SendLine("disable clipaging")
        ));
        assert!(!script.steps[0].settle_after);
        assert!(matches!(
            script.steps[1].action,
            StepAction::SendLine("show configuration")
        ));
        assert!(script.steps[1].settle_after);
        assert!(matches!(script.steps[2].action, StepAction::Capture));
    }
}
