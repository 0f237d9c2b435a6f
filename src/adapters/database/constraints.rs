use crate::error::AppError;

/// Domain outcomes that the schema reports as constraint violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConstraintViolation {
    ChatAlreadyExists,
    ChatNotFound,
    MessageAlreadyExists,
    RepliedMessageNotFound,
}

/// Constraint name (as declared in the migrations) to domain outcome.
const CONSTRAINT_TABLE: &[(&str, ConstraintViolation)] = &[
    ("chats_pkey", ConstraintViolation::ChatAlreadyExists),
    ("chat_members_chat_id_fkey", ConstraintViolation::ChatNotFound),
    ("messages_pkey", ConstraintViolation::MessageAlreadyExists),
    ("messages_reply_to_fkey", ConstraintViolation::RepliedMessageNotFound),
    ("messages_chat_id_fkey", ConstraintViolation::ChatNotFound),
];

impl ConstraintViolation {
    pub(crate) fn from_constraint(name: &str) -> Option<Self> {
        CONSTRAINT_TABLE.iter().find(|(constraint, _)| *constraint == name).map(|(_, violation)| *violation)
    }
}

impl From<ConstraintViolation> for AppError {
    fn from(violation: ConstraintViolation) -> Self {
        match violation {
            ConstraintViolation::ChatAlreadyExists => Self::ChatAlreadyExists,
            ConstraintViolation::ChatNotFound => Self::ChatNotFound,
            ConstraintViolation::MessageAlreadyExists => Self::MessageAlreadyExists,
            ConstraintViolation::RepliedMessageNotFound => Self::RepliedMessageNotFound,
        }
    }
}

/// Translates a write failure into a domain error.
///
/// Violations of constraints missing from the table stay `AppError::Database`.
pub(crate) fn map_write_error(err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &err
        && let Some(violation) = db_err.constraint().and_then(ConstraintViolation::from_constraint)
    {
        tracing::debug!(constraint = ?db_err.constraint(), ?violation, "Constraint violation mapped");
        return violation.into();
    }
    AppError::Database(err)
}
