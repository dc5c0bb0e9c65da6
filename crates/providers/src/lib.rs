//! Model provider implementations for codehelper.
//!
//! All providers implement the `codehelper_core::Provider` trait.
//! [`factory::build_from_config`] picks and configures one from `AppConfig`.

pub mod factory;
pub mod openai_compat;

pub use factory::build_from_config;
pub use openai_compat::OpenAiCompatProvider;
