//! Parallel generation over many functions.
//!
//! Generation is single-threaded per function; fan-out happens one level
//! up. Each worker gets its own emitter (and so its own declaration maps
//! and memo tables) and only shares the read-only analysis results.

use rayon::prelude::*;
use recast_ir::CancellationToken;

use crate::ast::{FunctionDefinition, GlobalScope};
use crate::emitter::{FunctionEmitter, GeneratorContext};
use crate::error::Result;
use crate::options::GeneratorOptions;

/// Generates definitions for many functions in parallel.
///
/// Each function gets a private [`GlobalScope`]; callers that want global
/// declarations shared across functions drive [`FunctionEmitter`] directly
/// and own the scope themselves. Failures are per-function: one
/// inconsistent function does not stop the others.
pub fn generate_functions_parallel(
    contexts: Vec<GeneratorContext<'_>>,
    options: GeneratorOptions,
    token: &CancellationToken,
) -> Vec<Result<FunctionDefinition>> {
    contexts
        .into_par_iter()
        .map(|ctx| {
            let mut globals = GlobalScope::new();
            FunctionEmitter::new(ctx, options, &mut globals, token)?.emit()
        })
        .collect()
}
