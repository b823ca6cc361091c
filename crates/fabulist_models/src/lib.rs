//! Model service clients for Fabulist.
//!
//! [`ArkClient`] talks to the Volcengine Ark API and implements every
//! collaborator trait from `fabulist_interface`. [`MockStudio`] implements
//! the same traits offline.
//!
//! ```no_run
//! use fabulist_core::FabulistConfig;
//! use fabulist_interface::ChatCompletion;
//! use fabulist_models::ArkClient;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = FabulistConfig::load()?;
//! let client = ArkClient::new(config.ark)?;
//! let reply = client.complete("You are terse.", "Say hello").await?;
//! println!("{reply}");
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod ark;
mod mock;

pub use ark::ArkClient;
pub use mock::{MOCK_TASK_ID, MOCK_VIDEO_URL, MockStudio};
