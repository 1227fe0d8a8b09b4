//! Ceremony state and the chain events that drive it

mod dkg_state;
mod events;
mod participant;
mod phase;

pub use dkg_state::DkgState;
pub use events::DkgEvent;
pub use participant::Participant;
pub use phase::Phase;
