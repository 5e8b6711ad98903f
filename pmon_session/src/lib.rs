// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

#![warn(missing_docs)]
#![allow(clippy::needless_return)]

//! Monitoring-session orchestration: configuration, buffer sizing,
//! multiplexed counter reading, worker threads and the native register
//! transport.

pub use config::SessionConfig;
pub use error::SessionError;
pub use native::PerfCtl;
pub use rendezvous::Rendezvous;
pub use results::read_incremental;
pub use results::read_results;
pub use results::SetRuntime;
pub use session::plan_sampling_buffer;
pub use session::BufferPlan;
pub use session::EntitySession;
pub use worker::Control;
pub use worker::EntityId;
pub use worker::QuitReason;
pub use worker::WorkerPool;

pub mod changelog;

mod config;
mod error;
mod native;
mod rendezvous;
mod results;
mod session;
mod worker;
