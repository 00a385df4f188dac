// apps/pf_cli/src/commands/mod.rs

//! 子命令

pub mod check_mesh;
pub mod info;
pub mod run;
