pub mod deploy;
pub mod server;
pub mod settings;
