/// Domain-aware logging macros.
///
/// Each macro injects a `domain` field automatically so callers never need
/// to remember the string literal. The domain is one of: `stage` (cascade
/// progress), `graph` (call-graph search), `sym` (symbolic evaluator).
///
/// # Usage
///
/// ```ignore
/// use crate::log_macros::*;
///
/// cd_debug!(stage, rule = %rule.crime, stage = 3, "both APIs resolved");
/// cd_warn!(graph, depth = layer, "mutual-parent search hit MAX_SEARCH_LAYER");
/// ```
#[doc(hidden)]
macro_rules! cd_log {
    ($level:ident, $domain:ident, $($field:tt)*) => {
        tracing::$level!(domain = stringify!($domain), $($field)*)
    };
}

macro_rules! cd_warn {
    ($domain:ident, $($rest:tt)*) => {
        $crate::log_macros::cd_log!(warn, $domain, $($rest)*)
    };
}

macro_rules! cd_info {
    ($domain:ident, $($rest:tt)*) => {
        $crate::log_macros::cd_log!(info, $domain, $($rest)*)
    };
}

macro_rules! cd_debug {
    ($domain:ident, $($rest:tt)*) => {
        $crate::log_macros::cd_log!(debug, $domain, $($rest)*)
    };
}

pub(crate) use cd_debug;
pub(crate) use cd_info;
pub(crate) use cd_log;
pub(crate) use cd_warn;
