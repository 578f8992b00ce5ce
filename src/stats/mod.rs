pub mod tally;
pub mod weekly;
pub mod season;

pub use season::{Eligibility, SeasonQuery, SeasonScorer};
pub use weekly::{WeeklyAggregator, WeeklyReport};
