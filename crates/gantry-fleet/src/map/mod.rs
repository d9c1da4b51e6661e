mod schedule;
mod settings;

pub use schedule::{to_schedule, to_schedules};
pub use settings::to_fleet_settings;
