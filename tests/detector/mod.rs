// SPDX-FileCopyrightText: 2025-2026 Carlson Büth <code@cbueth.de>
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Module containing tests for the cross-validated leakage detector.
mod end_to_end;
mod partial_failure;
mod search_stage;
