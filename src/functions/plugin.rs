//! Process-wide plugin-function hook (§4.F, §5): a single replaceable
//! slot holding at most one user-registered handler. Closed set of 0-2 arg
//! scalar/list signatures; the dispatcher coerces caller arguments to the
//! handler's declared arity and reports `PluginError` on mismatch.

use parking_lot::RwLock;

use crate::model::Value;
use crate::{Error, Result};

/// A user-supplied function: receives its already-evaluated arguments,
/// returns a `Value` or an error message.
pub type PluginFn = Box<dyn Fn(&[Value]) -> std::result::Result<Value, String> + Send + Sync>;

static PLUGIN: RwLock<Option<(String, PluginFn)>> = RwLock::new(None);

/// Install (or replace) the process-wide plugin handler. Only one handler
/// is supported at a time, matching the spec's "single replaceable slot".
pub fn register(name: impl Into<String>, handler: PluginFn) {
    *PLUGIN.write() = Some((name.into(), handler));
}

/// Remove the currently-registered handler, if any.
pub fn unregister() {
    *PLUGIN.write() = None;
}

/// Dispatch `name(args)` to the registered handler if its name matches.
/// Returns `Ok(None)` when no handler is registered or the name doesn't
/// match, so the caller can fall through to `UnknownFunction`.
pub fn call(name: &str, args: &[Value]) -> Result<Option<Value>> {
    let guard = PLUGIN.read();
    match &*guard {
        Some((registered_name, handler)) if registered_name.eq_ignore_ascii_case(name) => {
            handler(args).map(Some).map_err(Error::PluginError)
        }
        _ => Ok(None),
    }
}
