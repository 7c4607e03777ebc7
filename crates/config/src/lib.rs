mod settings;

pub use settings::{AppSettings, Settings, SfuSettings};
