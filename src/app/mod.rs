pub mod events;
mod registry;
mod state;

pub use events::AppEvent;
pub use state::{App, InputMode, StatusView, UserAction};
