pub mod baseline;
pub mod fetch;
pub mod project;
pub mod quotes;
pub mod setup;
pub mod ui;
