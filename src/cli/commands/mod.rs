pub mod add;
pub mod completions;
pub mod delete;
pub mod escrow_keygen;
pub mod generate;
pub mod get;
pub mod init;
pub mod list;
pub mod strength;
