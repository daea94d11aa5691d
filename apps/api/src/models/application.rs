use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::text_enum;

text_enum! {
    pub enum ApplicationStatus {
        Applied => "applied",
        Screening => "screening",
        Interview => "interview",
        Offer => "offer",
        Hired => "hired",
        Rejected => "rejected",
        Withdrawn => "withdrawn",
    }
}

/// Which side of an application is acting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    Candidate,
    Company,
}

#[derive(Debug, PartialEq, Eq)]
pub enum TransitionError {
    /// The status graph has no such edge.
    Illegal {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
    /// The edge exists but this party may not take it.
    NotPermitted { to: ApplicationStatus },
}

impl ApplicationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ApplicationStatus::Hired | ApplicationStatus::Rejected | ApplicationStatus::Withdrawn
        )
    }

    /// applied → screening → interview → offer → hired, with rejected and
    /// withdrawn reachable from every non-terminal status.
    pub fn can_transition_to(&self, next: ApplicationStatus) -> bool {
        use ApplicationStatus::*;
        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, next),
            (Applied, Screening) | (Screening, Interview) | (Interview, Offer) | (Offer, Hired)
        ) || matches!(next, Rejected | Withdrawn)
    }

    /// Candidates may only withdraw; companies may do anything but withdraw.
    pub fn check_transition(&self, next: ApplicationStatus, party: Party) -> Result<(), TransitionError> {
        let permitted = match party {
            Party::Candidate => next == ApplicationStatus::Withdrawn,
            Party::Company => next != ApplicationStatus::Withdrawn,
        };
        if !permitted {
            return Err(TransitionError::NotPermitted { to: next });
        }
        if !self.can_transition_to(next) {
            return Err(TransitionError::Illegal { from: *self, to: next });
        }
        Ok(())
    }
}

impl From<TransitionError> for crate::errors::AppError {
    fn from(e: TransitionError) -> Self {
        match e {
            TransitionError::Illegal { from, to } => {
                crate::errors::AppError::Conflict(format!("Cannot move an application from {from} to {to}"))
            }
            TransitionError::NotPermitted { to } => {
                tracing::debug!("Refused transition to {to}: wrong party");
                crate::errors::AppError::Forbidden
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ApplicationRow {
    pub id: Uuid,
    pub job_id: Uuid,
    pub candidate_id: Uuid,
    pub cover_letter: Option<String>,
    pub cv_key: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Application joined with the job title, company and candidate display fields.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ApplicationView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub application: ApplicationRow,
    pub job_title: String,
    pub company_id: Uuid,
    pub company_name: String,
    pub candidate_name: String,
    pub candidate_email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StatusHistoryRow {
    pub id: Uuid,
    pub application_id: Uuid,
    pub from_status: Option<String>,
    pub to_status: String,
    pub changed_by: Uuid,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CommunicationRow {
    pub id: Uuid,
    pub application_id: Uuid,
    pub sender_id: Uuid,
    pub sender_name: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ApplicationStatus::*;

    #[test]
    fn test_happy_path_is_linear() {
        assert!(Applied.can_transition_to(Screening));
        assert!(Screening.can_transition_to(Interview));
        assert!(Interview.can_transition_to(Offer));
        assert!(Offer.can_transition_to(Hired));
        assert!(!Applied.can_transition_to(Interview));
        assert!(!Screening.can_transition_to(Applied));
        assert!(!Applied.can_transition_to(Hired));
    }

    #[test]
    fn test_terminal_statuses_are_final() {
        for terminal in [Hired, Rejected, Withdrawn] {
            for next in ApplicationStatus::ALL {
                assert!(!terminal.can_transition_to(*next), "{terminal} -> {next}");
            }
        }
    }

    #[test]
    fn test_party_rules() {
        assert_eq!(Offer.check_transition(Withdrawn, Party::Candidate), Ok(()));
        assert_eq!(
            Applied.check_transition(Screening, Party::Candidate),
            Err(TransitionError::NotPermitted { to: Screening })
        );
        assert_eq!(
            Interview.check_transition(Withdrawn, Party::Company),
            Err(TransitionError::NotPermitted { to: Withdrawn })
        );
        assert_eq!(
            Rejected.check_transition(Screening, Party::Company),
            Err(TransitionError::Illegal { from: Rejected, to: Screening })
        );
        assert_eq!(Interview.check_transition(Rejected, Party::Company), Ok(()));
    }
}
