//! Exchange-agnostic domain types.

mod error;
mod id;
mod money;
mod opportunity;
mod participant;
mod performance;
mod position;
mod ranking;
mod snapshot;

pub use error::DomainError;
pub use id::{OpportunityId, ParticipantAddress, PositionId};
pub use money::{Percent, Price, Volume};
pub use opportunity::{Opportunity, OpportunityBuildError, OpportunityBuilder, OpportunityStatus};
pub use participant::Participant;
pub use performance::{PerformanceMetrics, PerformanceRecord, RollingMetrics, UpsertOutcome};
pub use position::{
    ObservedPosition, OpenPositionBook, Position, PositionClose, PositionKey, PositionStatus, Side,
};
pub use ranking::{RankedLoser, RankedLoserView};
pub use snapshot::{AccountSnapshot, Fill, FillSide, MidPrices};
