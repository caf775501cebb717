//! sqlite-vec extension registration.
//!
//! SQLite auto-extensions are process-global by nature; this is the single
//! place the crate touches process-wide state, and the only unsafe code.

use std::sync::Once;

use rusqlite::ffi::{sqlite3, sqlite3_api_routines, sqlite3_auto_extension};
use sqlite_vec::sqlite3_vec_init;

type SqliteExtensionFn =
    unsafe extern "C" fn(*mut sqlite3, *mut *mut i8, *const sqlite3_api_routines) -> i32;

static REGISTER: Once = Once::new();

/// Register sqlite-vec as an auto-loaded extension for all future
/// connections. Must run before the persistent backend opens its
/// connection; calling it more than once is a no-op.
#[allow(unsafe_code)]
pub fn init_sqlite_vec_extension() {
    REGISTER.call_once(|| {
        // SAFETY: sqlite3_auto_extension is a stable SQLite API and
        // sqlite3_vec_init is the entry point exported by the sqlite-vec
        // crate for exactly this registration.
        unsafe {
            sqlite3_auto_extension(Some(std::mem::transmute::<*const (), SqliteExtensionFn>(
                sqlite3_vec_init as *const (),
            )));
        }
    });
}
