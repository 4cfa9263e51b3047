//! Book loan model and its lifecycle

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{book::Book, transition};
use crate::error::AppResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "loan_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Active,
    Overdue,
    Returned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoanOp {
    MarkOverdue,
    Return,
}

const LOAN_TRANSITIONS: &[(LoanStatus, LoanOp, LoanStatus)] = &[
    (LoanStatus::Active, LoanOp::MarkOverdue, LoanStatus::Overdue),
    (LoanStatus::Active, LoanOp::Return, LoanStatus::Returned),
    (LoanStatus::Overdue, LoanOp::Return, LoanStatus::Returned),
];

impl LoanStatus {
    pub fn apply(self, op: LoanOp) -> AppResult<LoanStatus> {
        transition(LOAN_TRANSITIONS, self, op, "loan")
    }

    /// Active and overdue loans both hold a copy of the book
    pub fn is_outstanding(self) -> bool {
        matches!(self, LoanStatus::Active | LoanStatus::Overdue)
    }
}

/// Book loan record
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Loan {
    pub id: Uuid,
    pub user_id: Uuid,
    pub book_id: Uuid,
    pub reservation_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub status: LoanStatus,
}

/// Loan with the borrowed book, for display
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LoanDetails {
    pub loan: Loan,
    pub book: Option<Book>,
}

/// Create loan request
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateLoan {
    pub book_id: Uuid,
    /// Loan duration in days, defaults to the configured value (14)
    pub days_to_return: Option<i64>,
}

/// Insertable loan record
#[derive(Debug, Clone)]
pub struct NewLoan {
    pub user_id: Uuid,
    pub book_id: Uuid,
    pub reservation_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loan_transitions() {
        assert_eq!(LoanStatus::Active.apply(LoanOp::MarkOverdue).unwrap(), LoanStatus::Overdue);
        assert_eq!(LoanStatus::Overdue.apply(LoanOp::Return).unwrap(), LoanStatus::Returned);
        assert!(LoanStatus::Overdue.apply(LoanOp::MarkOverdue).is_err());
        assert!(LoanStatus::Returned.apply(LoanOp::Return).is_err());
        assert!(LoanStatus::Returned.apply(LoanOp::MarkOverdue).is_err());
    }

    #[test]
    fn test_outstanding() {
        assert!(LoanStatus::Active.is_outstanding());
        assert!(LoanStatus::Overdue.is_outstanding());
        assert!(!LoanStatus::Returned.is_outstanding());
    }
}
