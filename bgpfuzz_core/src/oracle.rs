use crate::bgp::{self, MessageType};
use crate::transport::SendStatus;
use serde::Serialize;

/// Severity for a peer that stopped accepting connections after a case.
const DEFAULT_CRASH_SEVERITY: u8 = 10;
/// Severity for a peer that answered with a NOTIFICATION.
const NOTIFICATION_SEVERITY: u8 = 2;

/// Represents a potential bug or interesting finding identified by an `Oracle`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BugReport {
    /// The encoded test case that triggered this report.
    pub input: Vec<u8>,
    /// A human-readable description of the finding.
    pub description: String,
    /// MD5 of the input, useful for deduplication.
    pub input_hash: String,
    /// Oracle-defined severity; higher is worse.
    pub severity: u8,
}

impl BugReport {
    pub fn new(input: &[u8], description: String, severity: u8) -> Self {
        Self {
            input: input.to_vec(),
            description,
            input_hash: format!("{:x}", md5::compute(input)),
            severity,
        }
    }

    /// One-line JSON rendering, for findings logs.
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// An `Oracle` examines how the target reacted to a test case to decide
/// whether something worth reporting happened.
pub trait Oracle {
    /// # Returns
    /// `Some(BugReport)` if the outcome indicates a bug, otherwise `None`.
    fn examine(&self, input: &[u8], status: &SendStatus) -> Option<BugReport>;
}

/// Watches a BGP session target.
///
/// A target that cannot be reached right after a case most likely died on
/// the previous one. A NOTIFICATION answer means the case was parsed and
/// rejected, which is reported at low severity so error handling paths can be
/// reviewed.
#[derive(Debug, Default)]
pub struct SessionOracle {
    pub report_notifications: bool,
}

impl SessionOracle {
    pub fn new(report_notifications: bool) -> Self {
        Self {
            report_notifications,
        }
    }
}

impl Oracle for SessionOracle {
    fn examine(&self, input: &[u8], status: &SendStatus) -> Option<BugReport> {
        match status {
            SendStatus::Unreachable(reason) => Some(BugReport::new(
                input,
                format!("target unreachable, probable crash: {reason}"),
                DEFAULT_CRASH_SEVERITY,
            )),
            SendStatus::Accepted(response) if self.report_notifications => {
                let notification = bgp::framed_messages(response)
                    .into_iter()
                    .find(|m| bgp::message_type_of(m) == Some(MessageType::Notification))?;
                let code = notification.get(bgp::HEADER_LEN).copied().unwrap_or(0);
                let subcode = notification.get(bgp::HEADER_LEN + 1).copied().unwrap_or(0);
                Some(BugReport::new(
                    input,
                    format!("target sent NOTIFICATION {code}/{subcode}"),
                    NOTIFICATION_SEVERITY,
                ))
            }
            _ => None,
        }
    }
}
