//! Notification delivery plans.
//!
//! A [`Delivery`] policy expands to an ordered list of steps. The dispatcher
//! runs them in order and stops at the first one that delivers; every step
//! that failed before it is reported in the response message.

use crate::protocol::Delivery;

/// One presentation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStep {
    /// Post through the OS notification center. May be unauthorized.
    System,
    /// Show the broker's overlay. Always succeeds.
    Overlay,
}

impl DeliveryStep {
    /// Name used in "used <step>" notes.
    pub fn name(self) -> &'static str {
        match self {
            DeliveryStep::System => "system",
            DeliveryStep::Overlay => "overlay",
        }
    }

    /// Message recorded when this step fails.
    pub fn failure(self) -> &'static str {
        match self {
            DeliveryStep::System => "notification not authorized",
            DeliveryStep::Overlay => "overlay failed",
        }
    }
}

/// Steps to attempt for a delivery policy, in order.
pub fn plan(delivery: Delivery) -> &'static [DeliveryStep] {
    match delivery {
        Delivery::System => &[DeliveryStep::System],
        Delivery::Overlay => &[DeliveryStep::Overlay],
        Delivery::Auto => &[DeliveryStep::System, DeliveryStep::Overlay],
    }
}

/// Build the response message for a delivery that succeeded at `used`
/// after the `failed` steps.
///
/// `None` when the first step delivered.
pub fn success_note(failed: &[DeliveryStep], used: DeliveryStep) -> Option<String> {
    if failed.is_empty() {
        return None;
    }
    let mut parts: Vec<&str> = failed.iter().map(|step| step.failure()).collect();
    let used = format!("used {}", used.name());
    parts.push(&used);
    Some(parts.join("; "))
}

/// Response message when every step failed.
pub fn failure_message(failed: &[DeliveryStep]) -> String {
    failed
        .iter()
        .map(|step| step.failure())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plans() {
        assert_eq!(plan(Delivery::System), &[DeliveryStep::System]);
        assert_eq!(plan(Delivery::Overlay), &[DeliveryStep::Overlay]);
        assert_eq!(plan(Delivery::Auto), &[DeliveryStep::System, DeliveryStep::Overlay]);
    }

    #[test]
    fn test_fallback_note_names_the_path_used() {
        assert_eq!(success_note(&[], DeliveryStep::System), None);
        assert_eq!(
            success_note(&[DeliveryStep::System], DeliveryStep::Overlay).as_deref(),
            Some("notification not authorized; used overlay")
        );
    }

    #[test]
    fn test_failure_message() {
        assert_eq!(failure_message(&[DeliveryStep::System]), "notification not authorized");
    }
}
