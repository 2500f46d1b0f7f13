//! # amencast-translation
//!
//! Sentence-by-sentence sermon translation.
//!
//! - [`glossary`]: fixed English to es/it/de term table and register rules
//! - [`prompt`]: system and user prompt construction
//! - [`context`]: [`RollingContext`], the last N source sentences
//! - [`translator`]: the [`Translator`] seam and [`TranslationSession`]
//! - [`openai`]: the chat-completions provider

#![deny(unsafe_code)]

pub mod context;
pub mod errors;
pub mod glossary;
pub mod openai;
pub mod prompt;
pub mod translator;

pub use context::RollingContext;
pub use errors::TranslationError;
pub use glossary::{GLOSSARY, GlossaryEntry, GlossaryLanguage, glossary_prompt, language_instructions};
pub use openai::OpenAiTranslator;
pub use translator::{TranslationRequest, TranslationSession, Translator};
