//! syllabus CLI binary
//!
//! All logic is in the library; `main` only maps the exit code.

fn main() {
    // cli::run() prints every error itself
    if let Err(code) = syllabus::cli::run() {
        std::process::exit(code.as_i32());
    }
}
