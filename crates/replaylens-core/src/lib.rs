pub mod diagnostics;
pub mod profile;
pub mod session_contracts;

pub use diagnostics::Diagnostics;
pub use profile::{ProfileError, ReplayProfile};
pub use session_contracts::{
    model_short_name, timestamp_utc, BoundaryEvent, Entity, PatchKind, PatchRecord, PathSegment,
    ResponsePart, SummaryHash, ToolInvocation,
};
