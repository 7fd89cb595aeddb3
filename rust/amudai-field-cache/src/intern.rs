//! Process-wide interning of field names.
//!
//! Every cache key carries its field name as an interned `Arc<str>`, so keys
//! for the same field share one allocation and usually compare by pointer.

use std::sync::{Arc, LazyLock, Mutex};

use ahash::AHashSet;

/// Names are never removed, so the set grows with the number of distinct
/// field names seen by the process.
static FIELD_NAMES: LazyLock<Mutex<AHashSet<Arc<str>>>> = LazyLock::new(Default::default);

/// Returns the canonical shared instance of `field`.
pub fn intern(field: &str) -> Arc<str> {
    let mut names = FIELD_NAMES.lock().expect("field names lock");
    if let Some(name) = names.get(field) {
        return Arc::clone(name);
    }
    let name: Arc<str> = Arc::from(field);
    names.insert(Arc::clone(&name));
    name
}
