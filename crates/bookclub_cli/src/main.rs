//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `bookclub_core` linkage.
//! - Keep output deterministic for quick local sanity checks.

fn main() {
    println!("bookclub_core version={}", bookclub_core::core_version());

    // Opening an in-memory database exercises the full migration chain.
    match bookclub_core::db::open_db_in_memory() {
        Ok(_) => println!("bookclub_core storage=ready"),
        Err(err) => {
            eprintln!("bookclub_core storage error: {err}");
            std::process::exit(1);
        }
    }
}
