//! Pure data model: the table, the row sets, bounded ranges and plot settings.
//! Nothing in here knows about egui.

pub mod range;
pub mod selection;
pub mod settings;
pub mod store;
pub mod table;
pub mod x_formatter;
