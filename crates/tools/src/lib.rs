//! RSCT tools library

pub mod common;
pub mod config;
pub mod inspect;
pub mod pack;
pub mod unpack;

pub use common::{init_logging, GlobalConfig, ProgressReporter};
pub use config::{PackProfile, Profile, UnpackProfile};
pub use inspect::InspectConfig;
pub use pack::{PackConfig, Packer};
pub use unpack::{UnpackConfig, Unpacker};
