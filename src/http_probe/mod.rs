pub mod address;
pub mod client;
pub mod emit;
pub mod input;
pub mod probe;
pub mod result;

use std::fmt::Write;

/// Render an error together with its whole `source()` chain.
pub(crate) fn report(mut err: &(dyn std::error::Error + 'static)) -> String {
    let mut s = format!("{}", err);
    while let Some(src) = err.source() {
        let _ = write!(s, "\n\nCaused by: {}", src);
        err = src;
    }
    s
}
