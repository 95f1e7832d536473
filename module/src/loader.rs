//! Dynamic library discovery and loading.

use crate::abi::OnaContext;
use crate::context;
use crate::runtime::{self, SystemRecord};
use libloading::Library;
use std::fs;
use std::path::{Path, PathBuf};

type ModuleInitializer = unsafe extern "C" fn(*const OnaContext) -> bool;
type ModuleFinalizer = unsafe extern "C" fn(*const OnaContext);

/// One loaded module: the OS library handle plus the systems it spawned
/// during `OnaInit`.
pub(crate) struct Module {
    library: Option<Library>,
    pub(crate) systems: Vec<SystemRecord>,
}

impl Module {
    #[cfg(test)]
    pub(crate) fn with_systems(systems: Vec<SystemRecord>) -> Module {
        Module {
            library: None,
            systems,
        }
    }

    /// Invokes the module's optional `OnaExit`.
    pub(crate) fn call_exit(&self, ona: &OnaContext) {
        let library = match &self.library {
            Some(library) => library,
            None => return,
        };

        unsafe {
            if let Ok(exit) = library.get::<ModuleFinalizer>(b"OnaExit\0") {
                exit(ona);
            }
        }
    }
}

/// Loads every dynamic library under `directory`, alphabetically by file
/// name so load order is reproducible. Hidden entries are skipped; entries
/// that fail to open, export no `OnaInit` or decline to initialize are
/// logged and skipped.
pub(crate) fn load_modules(directory: &Path) -> Vec<Module> {
    let entries = match fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(error) => {
            warn!("module directory {:?} is unreadable: {}", directory, error);

            return Vec::new();
        }
    };

    let mut file_names: Vec<_> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name())
        .filter(|file_name| !file_name.to_string_lossy().starts_with('.'))
        .collect();

    file_names.sort();

    let mut modules = Vec::new();

    for file_name in file_names {
        let library_path = PathBuf::from(".").join(directory).join(&file_name);

        let library = match Library::new(&library_path) {
            Ok(library) => library,
            Err(error) => {
                warn!("failed to open module {:?}: {}", library_path, error);

                continue;
            }
        };

        let initialized = unsafe {
            match library.get::<ModuleInitializer>(b"OnaInit\0") {
                Ok(init) => init(context::context()),
                Err(error) => {
                    warn!("module {:?} exports no OnaInit: {}", library_path, error);

                    false
                }
            }
        };

        if !initialized {
            // Discard anything a failed initializer managed to spawn.
            runtime::take_pending_systems();
            info!("module {:?} skipped", library_path);

            continue;
        }

        let systems = runtime::take_pending_systems();

        info!(
            "loaded module {:?} with {} systems",
            library_path,
            systems.len()
        );

        modules.push(Module {
            library: Some(library),
            systems,
        });
    }

    modules
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_directory_loads_nothing() {
        assert!(load_modules(Path::new("no-such-module-directory")).is_empty());
    }
}
