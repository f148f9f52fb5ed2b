pub mod icons;
pub mod output;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{empty, header, success};
pub use table::{presence_table, sources_table, stats_table};
pub use theme::{theme, Theme};
