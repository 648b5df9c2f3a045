// ABOUTME: Review subsystem - result normalization and the pipeline coordinator
// ABOUTME: Drives a book's review through Metadata, InitialReview, and DetailedReview
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Folio Review

//! # Review Pipeline
//!
//! [`normalizer`] turns raw model output into a typed fragment;
//! [`pipeline`] owns every `AiReview.processing_status` transition and calls
//! resolver, invoker, and normalizer in sequence for each stage.

pub mod normalizer;
pub mod pipeline;

pub use normalizer::normalize;
pub use pipeline::{AllowAll, EntitlementCheck, ReviewPipeline};
