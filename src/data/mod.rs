//! Data structures behind the display: frame history, color gradient,
//! frequency mapping and the label layout helpers.

pub mod coords;
pub mod gradient;
pub mod history;
pub mod item_cache;
pub mod stacker;
