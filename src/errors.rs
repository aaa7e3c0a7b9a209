//! Error Types
//!
//! This module defines the error types used throughout the binder.
//!
//! # Overview
//!
//! Two families of failures exist, and they propagate very differently:
//!
//! - [`RenderError`] covers *configuration* failures: a shader chunk that cannot
//!   be resolved, a template that does not render, or a uniform whose driver type
//!   has no setter. These indicate that the engine itself is misconfigured and are
//!   returned to the caller, halting the frame.
//! - [`ProgramError`] covers *per-program* failures: a stage that does not
//!   compile or a program that does not link. These are recorded in the
//!   program's diagnostics; the affected material is skipped while every other
//!   draw proceeds normally.
//!
//! # Usage
//!
//! ```rust,ignore
//! use myth_gl::errors::{RenderError, Result};
//!
//! fn build() -> Result<()> {
//!     Ok(())
//! }
//! ```

use thiserror::Error;

use crate::driver::ShaderStage;

/// The main error type for the binder.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    // ========================================================================
    // Shader Assembly Errors
    // ========================================================================
    /// A named shader fragment could not be found in the chunk registry.
    #[error("Unresolved shader chunk: {0}")]
    UnresolvedChunk(String),

    /// The template syntax configuration was rejected.
    #[error("Invalid shader template syntax: {0}")]
    TemplateSyntax(String),

    /// A template failed to render for a reason other than a missing chunk.
    #[error("Shader template '{template}' failed to render: {message}")]
    TemplateRender {
        /// Template that was being rendered
        template: String,
        /// Renderer message
        message: String,
    },

    // ========================================================================
    // Uniform Reflection Errors
    // ========================================================================
    /// A driver-reported uniform uses a type with no known setter.
    #[error("Unknown uniform type 0x{code:04X} for '{name}'")]
    UnknownUniformType {
        /// Uniform name as reported by the driver
        name: String,
        /// Raw driver type code
        code: u32,
    },

    /// A driver-reported uniform name does not follow the path grammar.
    #[error("Malformed uniform name: '{0}'")]
    MalformedUniformName(String),

    // ========================================================================
    // Handle Errors
    // ========================================================================
    /// A program handle no longer refers to a live cache entry.
    #[error("Program handle is stale or was never issued")]
    InvalidProgramHandle,
}

/// Failure of one program, recorded in its diagnostics.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProgramError {
    /// A shader stage did not compile.
    #[error("{stage:?} shader failed to compile: {log}")]
    Compile {
        /// Failing stage
        stage: ShaderStage,
        /// Driver info log
        log: String,
    },

    /// The program did not link.
    #[error("Program failed to link: {log}")]
    Link {
        /// Driver info log
        log: String,
    },
}

impl From<minijinja::Error> for RenderError {
    fn from(err: minijinja::Error) -> Self {
        match err.kind() {
            minijinja::ErrorKind::TemplateNotFound => RenderError::UnresolvedChunk(
                err.detail().map_or_else(|| err.to_string(), str::to_owned),
            ),
            _ => RenderError::TemplateRender {
                template: err.name().unwrap_or("<unknown>").to_owned(),
                message: err.to_string(),
            },
        }
    }
}

/// Alias for `Result<T, RenderError>`.
pub type Result<T> = std::result::Result<T, RenderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_template_maps_to_unresolved_chunk() {
        let err = minijinja::Error::new(
            minijinja::ErrorKind::TemplateNotFound,
            "template \"chunks/nope\" does not exist",
        );
        let mapped: RenderError = err.into();
        assert!(matches!(mapped, RenderError::UnresolvedChunk(ref s) if s.contains("chunks/nope")));
    }

    #[test]
    fn test_unknown_uniform_type_message() {
        let err = RenderError::UnknownUniformType {
            name: "weird".into(),
            code: 0x8B5F,
        };
        assert_eq!(err.to_string(), "Unknown uniform type 0x8B5F for 'weird'");
    }
}
