//! Process-wide engine setup
//!
//! Library paths and engine options are appended before the first transform
//! and handed to every new factory. Both lists only grow.

use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use once_cell::sync::Lazy;
use xslt_engine_traits::EngineEnvironment;

static LIBRARIES: Lazy<RwLock<Vec<PathBuf>>> = Lazy::new(|| RwLock::new(Vec::new()));
static OPTIONS: Lazy<RwLock<Vec<String>>> = Lazy::new(|| RwLock::new(Vec::new()));

/// Append `path` to the library search paths unless it is already listed.
pub fn add_library<P: AsRef<Path>>(path: P) {
    let path = path.as_ref();
    let mut libraries = LIBRARIES.write().unwrap_or_else(PoisonError::into_inner);
    if !libraries.iter().any(|known| known == path) {
        log::debug!("library path added: {}", path.display());
        libraries.push(path.to_path_buf());
    }
}

/// Append engine startup options. Duplicates are kept.
pub fn add_options<I, S>(options: I)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut list = OPTIONS.write().unwrap_or_else(PoisonError::into_inner);
    list.extend(options.into_iter().map(Into::into));
}

pub fn libraries() -> Vec<PathBuf> {
    LIBRARIES.read().unwrap_or_else(PoisonError::into_inner).clone()
}

pub fn options() -> Vec<String> {
    OPTIONS.read().unwrap_or_else(PoisonError::into_inner).clone()
}

/// Snapshot of both lists for a new factory
pub fn environment() -> EngineEnvironment {
    EngineEnvironment {
        library_paths: libraries(),
        options: options(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_libraries_are_listed_once() {
        add_library("/opt/xslt/unit-test-lib");
        add_library(PathBuf::from("/opt/xslt/unit-test-lib"));
        let count = libraries()
            .iter()
            .filter(|p| p.as_path() == Path::new("/opt/xslt/unit-test-lib"))
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn options_accumulate_with_duplicates() {
        add_options(["unit-test-flag", "unit-test-flag"]);
        let count = options().iter().filter(|o| *o == "unit-test-flag").count();
        assert_eq!(count, 2);
        assert!(environment().options.contains(&"unit-test-flag".to_string()));
    }
}
