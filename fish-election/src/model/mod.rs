//! The entity set from the data model: Application, Label, ApplicationState,
//! Vote, ApplicationResource, ApplicationTask. Every type derives
//! `Serialize`/`Deserialize` so the State Store and cluster transport ports
//! can move them as JSON without any type-specific wire code.

mod application;
mod label;
mod resource;
mod state;
mod task;
mod vote;

pub use application::Application;
pub use label::{Disk, Label, LabelDefinition, Resources};
pub use resource::{ApplicationResource, Authentication};
pub use state::{ApplicationState, NewApplicationState, Status};
pub use task::ApplicationTask;
pub use vote::Vote;
