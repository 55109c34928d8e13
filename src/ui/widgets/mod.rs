//! UI Widgets

pub mod clock_card;
pub mod footer;
pub mod header;
pub mod metric_card;

pub use clock_card::ClockCard;
pub use footer::Footer;
pub use header::Header;
pub use metric_card::MetricCard;
