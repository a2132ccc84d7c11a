pub mod cache;
pub mod confirmation;
pub mod form;
pub mod normalize;
pub mod presentation;
pub mod slots;
pub mod store;
pub mod validation;

pub use cache::{CacheStats, ReferenceCache};
pub use confirmation::DiscardConfirmation;
pub use form::{AgendaForm, FormSnapshot, SubmitOutcome, SubmitPhase};
pub use presentation::{render, AgendaView};
pub use slots::generate_time_slots;
pub use store::{LocationCache, ScheduleStore, SupabaseScheduleStore};
pub use validation::{can_save, validate_block, week_issues, BlockError, BlockIssue};
