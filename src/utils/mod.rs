// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 rosflow contributors

//! Utility modules
//!
//! Terminal output helpers shared by the rosflow CLI.

pub mod output;
pub mod spinner;

pub use output::*;
pub use spinner::*;
