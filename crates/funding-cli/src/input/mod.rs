pub mod data_dir;
pub mod file;
pub mod stdin;

use funding_core::allocation::AllocationInput;

/// Resolve the allocation book from `--input`, `--data-dir`, or piped stdin,
/// in that order of precedence.
pub fn load_book(
    input: Option<&str>,
    data_dir: Option<&str>,
) -> Result<AllocationInput, Box<dyn std::error::Error>> {
    if let Some(path) = input {
        file::read_json(path)
    } else if let Some(dir) = data_dir {
        data_dir::read_data_dir(dir)
    } else if let Some(book) = stdin::read_stdin()? {
        Ok(book)
    } else {
        Err("--input or --data-dir is required (or pipe JSON on stdin)".into())
    }
}
