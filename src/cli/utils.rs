use camino::Utf8PathBuf;
use simple_error::{SimpleResult, bail};

/// Check a required input filename
///
/// Assumes no logger has been configured yet
///
pub fn check_required_filename(filename: &str, label: &str) -> SimpleResult<()> {
    if filename.is_empty() {
        bail!("Must specify {label} file");
    }
    let path = std::path::Path::new(&filename);
    if !path.exists() {
        bail!("Can't find specified {label} file: '{filename}'");
    }
    if !path.is_file() {
        bail!("Specified {label} file path does not appear to be a file: '{filename}'");
    }
    Ok(())
}

/// Canonicalize a file path which is already known to exist
///
pub fn canonicalize_string_path(s: &str) -> SimpleResult<String> {
    match Utf8PathBuf::from(s).canonicalize_utf8() {
        Ok(x) => Ok(x.to_string()),
        Err(e) => bail!("Can't canonicalize file path '{s}': {e}"),
    }
}
