//! Terminal User Interface components for the gradebook.

pub mod chart;
pub mod form;
mod help;
mod theme;
pub mod widgets;

pub use help::HelpOverlay;
pub use theme::Theme;
