//! Neural - Local Translation Orchestrator
//!
//! Turns typing, clipboard changes and shortcuts into translations served by
//! local inference backends (an accelerated OpenAI-compatible server with an
//! Ollama fallback), with language auto-detection, a bounded result cache and
//! a JSON translation history.

pub mod cli;
pub mod config;
pub mod error;
pub mod language;
pub mod resolver;
pub mod cache;
pub mod engine;
pub mod gateway;
pub mod history;
pub mod clipboard;
pub mod orchestrator;
pub mod trigger;
pub mod session;
