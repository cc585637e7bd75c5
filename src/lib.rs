//! Weft: LLM agent orchestration.
//!
//! Builds agents that loop against a chat model, dispatch tool calls
//! (local closures, remote tool servers, or delegated sub-agents), and
//! record a hierarchical trace of every run. One canonical message
//! representation bridges both OpenAI wire dialects.
//!
//! # Quick Start
//!
//! ```no_run
//! use weft::prelude::*;
//!
//! # async fn example() -> weft::error::Result<()> {
//! let agent = Agent::builder()
//!     .name("Helper")
//!     .purpose("answer questions briefly")
//!     .build()?;
//! let response = agent.run("What is the capital of France?").await?;
//! println!("{}", response.final_message);
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod bridge;
pub mod config;
pub mod error;
pub mod prelude;
pub mod provider;
pub mod runner;
pub mod tools;
pub mod trace;
pub mod types;
pub mod util;
