// src/status.rs

use serde::{Deserialize, Serialize};
use std::fmt;

/*
Appointment lifecycle:

  pending   → scheduled | cancelled
  scheduled → completed | cancelled
  completed → (terminal)
  cancelled → (terminal)

This module holds the only copy of the table. Every surface that renders or
submits a status change goes through `can_transition`; re-selecting the
current status is not a transition and is never submitted.
*/

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Scheduled,
    Completed,
    Cancelled,
}

pub const ALL_STATUSES: [AppointmentStatus; 4] = [
    AppointmentStatus::Pending,
    AppointmentStatus::Scheduled,
    AppointmentStatus::Completed,
    AppointmentStatus::Cancelled,
];

impl AppointmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }

    /// Display label shown to operators (the clinic runs in Spanish).
    pub fn label(self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "Pendiente",
            AppointmentStatus::Scheduled => "Aprobada",
            AppointmentStatus::Completed => "Completada",
            AppointmentStatus::Cancelled => "Cancelada",
        }
    }

    /// Terminal statuses freeze the appointment: no field may change and no
    /// further transition exists.
    pub fn is_frozen(self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::Cancelled
        )
    }

    pub fn allowed_targets(self) -> &'static [AppointmentStatus] {
        match self {
            AppointmentStatus::Pending => {
                &[AppointmentStatus::Scheduled, AppointmentStatus::Cancelled]
            }
            AppointmentStatus::Scheduled => {
                &[AppointmentStatus::Completed, AppointmentStatus::Cancelled]
            }
            AppointmentStatus::Completed => &[],
            AppointmentStatus::Cancelled => &[],
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pure legality check. Same-status pairs are not in the table, so
/// re-confirming the current status is rejected here as well.
pub fn can_transition(from: AppointmentStatus, to: AppointmentStatus) -> bool {
    from.allowed_targets().contains(&to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use AppointmentStatus::*;

    #[test]
    fn test_transition_table() {
        assert!(can_transition(Pending, Scheduled));
        assert!(can_transition(Pending, Cancelled));
        assert!(can_transition(Scheduled, Completed));
        assert!(can_transition(Scheduled, Cancelled));

        // Skipping straight from pending to completed is not allowed
        assert!(!can_transition(Pending, Completed));
        // No transition re-opens a pending appointment
        assert!(!can_transition(Scheduled, Pending));
    }

    #[test]
    fn test_terminal_statuses_have_no_targets() {
        for to in ALL_STATUSES {
            assert!(!can_transition(Completed, to));
            assert!(!can_transition(Cancelled, to));
        }
        assert!(Completed.is_frozen());
        assert!(Cancelled.is_frozen());
        assert!(!Pending.is_frozen());
        assert!(!Scheduled.is_frozen());
    }

    #[test]
    fn test_self_transition_is_never_legal() {
        for s in ALL_STATUSES {
            assert!(!can_transition(s, s));
        }
    }

    #[test]
    fn test_every_pair_outside_the_table_is_rejected() {
        let listed = |from: AppointmentStatus, to: AppointmentStatus| {
            from.allowed_targets().contains(&to)
        };
        for from in ALL_STATUSES {
            for to in ALL_STATUSES {
                assert_eq!(can_transition(from, to), listed(from, to));
            }
        }
    }

    #[test]
    fn test_wire_format_is_snake_case() {
        let s: AppointmentStatus = serde_json::from_str("\"scheduled\"").unwrap();
        assert_eq!(s, Scheduled);
        assert_eq!(serde_json::to_string(&Cancelled).unwrap(), "\"cancelled\"");
    }
}
