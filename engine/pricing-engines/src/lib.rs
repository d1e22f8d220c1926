// Setting pricing engines - one variant per payment setting behind a
// shared capability

mod asc;
mod config;
mod dispatch;
mod drugs;
mod error;
mod fee_schedule;
mod ipps;
mod mpfs;
mod opps;
mod pos;
#[cfg(test)]
mod testutil;
mod types;

pub use asc::AscEngine;
pub use config::EngineConfig;
pub use dispatch::{EngineSet, SettingEngine};
pub use drugs::DrugEngine;
pub use error::{PricingError, Result};
pub use fee_schedule::{ClfsEngine, DmeposEngine};
pub use ipps::IppsEngine;
pub use mpfs::MpfsEngine;
pub use opps::OppsEngine;
pub use pos::{is_facility_pos, resolve_pos, PosResolution, POS_ASC, POS_HOPD, POS_OFFICE};
pub use types::{
    LineItemResult, Modifier, Plan, PlanComponent, PricedLine, PricingContext, Setting,
};
