//! Engine errors

use miette::Diagnostic;
use thiserror::Error;

use crate::core::StoreError;

/// Fatal conditions of an assembly run
#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    #[error("no part data: the catalog selection is empty and the exchange file has no products")]
    #[diagnostic(
        code(tasm::engine::no_part_data),
        help("add parts under catalog/parts/ or pass a STEP file that declares products")
    )]
    NoPartData,

    #[error("run cancelled: deadline passed before {stage}")]
    #[diagnostic(code(tasm::engine::cancelled))]
    Cancelled { stage: &'static str },

    #[error("placement incomplete: {missing} instance(s) without a placement, {duplicated} with more than one")]
    #[diagnostic(code(tasm::engine::placement_incomplete))]
    PlacementIncomplete { missing: usize, duplicated: usize },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),
}
