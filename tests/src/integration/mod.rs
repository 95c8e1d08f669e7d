//! Cross-component scenarios: client channels and the dispatcher talking
//! through one bus.

pub mod flows;
pub mod routing;
