pub mod artifact;
pub mod contracts;
pub mod error;
pub mod events;
pub mod factory;
pub mod position_token;
pub mod protocol;
pub mod proxy;
pub mod supply;
pub mod util;
