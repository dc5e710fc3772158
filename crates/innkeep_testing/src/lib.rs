// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Private test helpers shared by the innkeep crates.
//!
//! Not published. Nothing in here is part of any public API.

mod log;
mod script;

pub use log::{LogCapture, LogCaptureWriter};
pub use script::Script;
