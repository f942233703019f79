pub mod abilities;
pub mod convert;
mod error;
pub mod intake;
mod model;
mod validation;

pub use abilities::{Ability, AbilityCatalog};
pub use convert::{flow_to_service, service_to_flow};
pub use error::*;
pub use model::*;
pub use validation::*;
