//! Outcome logging shared by the domain services.
//!
//! Business rejections go to `debug`; storage faults go to `error`.

use tracing::{debug, error};

use super::{Actor, Error};

/// Log a failed operation at the level its code warrants.
pub(crate) fn rejection(operation: &'static str, actor: &Actor, err: &Error) {
    if err.is_fault() {
        error!(
            operation,
            actor = %actor.user_id,
            code = ?err.code(),
            message = err.message(),
            "engine operation failed"
        );
    } else {
        debug!(
            operation,
            actor = %actor.user_id,
            code = ?err.code(),
            message = err.message(),
            "engine operation rejected"
        );
    }
}
