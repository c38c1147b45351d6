//! Stateful kernel services over the transaction scope.
//!
//! Every service borrows one `Txn` scope and a shared clock; the
//! `PostingOrchestrator` constructs each service exactly once per scope.

pub mod auditor;
pub mod ingestor;
pub mod journal_writer;
pub mod orchestrator;
pub mod period;
pub mod reference;
pub mod sequence;
pub mod snapshot;
pub mod subledger;
pub mod subledger_period;

pub use auditor::{AuditError, AuditorService};
pub use ingestor::{IngestError, IngestorService};
pub use journal_writer::{
    BindingRecord, JournalWriteResult, JournalWriter, RoleResolver, WriteError, WriteStatus,
    WrittenEntry,
};
pub use orchestrator::{OrchestratorError, PostEventResult, PostingOrchestrator};
pub use period::{PeriodError, PeriodService};
pub use reference::{ReferenceDataLoader, ReferenceError};
pub use sequence::SequenceService;
pub use snapshot::{ReferenceSnapshotService, SnapshotValidation};
pub use subledger::{SubledgerService, SubledgerServiceError};
pub use subledger_period::SubledgerPeriodService;
