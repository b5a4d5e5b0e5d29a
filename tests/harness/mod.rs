// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Test harness for admission limiter attack simulation.
//!
//! This module provides utilities for simulating abusive traffic patterns
//! against the limiter to validate its defensive behaviour.

pub mod generators;
pub mod metrics;
