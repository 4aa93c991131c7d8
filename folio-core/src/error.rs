use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("Page with id {0} not found")]
    PageNotFound(i64),

    #[error("Parent page with id {0} not found")]
    ParentNotFound(i64),

    #[error("A page with id {0} already exists in the tree")]
    DuplicateId(i64),

    #[error("Page has no id")]
    MissingId,

    #[error("Cannot move page {page_id} under {parent_id}: it would create a cycle")]
    WouldCreateCycle { page_id: i64, parent_id: i64 },

    #[error("Ancestor chain of page {0} is cyclic")]
    CycleDetected(i64),

    #[error("No page ids left to assign")]
    IdsExhausted,
}

pub type Result<T> = std::result::Result<T, TreeError>;
