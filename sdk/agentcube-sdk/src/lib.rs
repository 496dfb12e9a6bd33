//! Rust SDK for AgentCube (C9): creates short-lived sandbox sessions and
//! signs every data-plane call against them.
//!
//! ```no_run
//! # async fn example() -> agentcube_sdk::Result<()> {
//! use agentcube_sdk::{SdkConfig, SessionClient};
//!
//! let config = SdkConfig {
//!     control_plane_url: "http://localhost:8080".into(),
//!     router_url: "http://localhost:9090".into(),
//! };
//! let session = SessionClient::create_code_interpreter(
//!     &config,
//!     "default",
//!     "my-session",
//!     Some(900),
//!     serde_json::json!({}),
//! )
//! .await?;
//! let output = session.run_code("python", "print('hi')", None).await?;
//! println!("{}", output.stdout);
//! session.close().await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod control_plane;
mod error;
mod keypair;

pub use client::{ExecuteOutput, FileEntry, SdkConfig, SessionClient};
pub use error::{Result, SdkError};
pub use keypair::SessionKeypair;
