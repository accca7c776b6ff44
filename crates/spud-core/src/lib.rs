//! Core types and collaborator contracts for the Spud engine.
//!
//! This crate provides the pieces shared by the renderer core and its callers:
//! - The engine-wide error type
//! - The filesystem contract used to load precompiled shader bytecode
//! - Render packets and global uniform data handed from the frontend to a backend

pub mod error;
pub mod filesystem;
pub mod packet;

pub use error::{Error, Result};
pub use filesystem::{FileSystem, StdFileSystem};
pub use packet::{GlobalUniforms, RenderPacket};
