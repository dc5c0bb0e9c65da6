//! Input safety for codehelper.
//!
//! Provides the [`InputGuardrail`] trait and the configured
//! [`DenylistGuardrail`] that runs before every model call.

pub mod guardrail;

pub use guardrail::{DenylistGuardrail, GuardrailError, GuardrailVerdict, InputGuardrail};
