pub mod control;
pub mod display;
pub mod indicate;
pub mod ranging;
pub mod resources;
pub mod ride_link;
