//! ops
//!
//! The operation surface of an edit session.
//!
//! # Architecture
//!
//! A session starts life as an [`EditRequest`]: plain strings straight from
//! CLI flags or a plan file. [`EditRequest::parse`] checks shape, mode, and
//! naming rules and produces an [`EditPlan`] of typed operations;
//! [`EditPlan::check`] then confirms every referenced identity against a
//! repository. Only a plan that has passed both stages is handed to the
//! engine.
//!
//! All failures on this path are [`ConstructionError`]s and abort before
//! any tree is loaded.

mod request;

pub use request::{
    AddConfig, AddLibtype, ConstructionError, DelConfig, DelLibtype, EditMode, EditOps, EditPlan,
    EditRequest, RepConfig, RepLibtype,
};
