pub mod cli;
pub mod plugins;
pub mod run;
pub mod validate;
pub mod version;
