//! System records and their init/process/finalize lifecycle.

use crate::abi::{OnaContext, OnaEvents, SystemFinalizer, SystemInfo, SystemInitializer, SystemProcessor};
use crate::context;
use crate::loader::{self, Module};
use ona_tasks::TaskScheduler;
use std::os::raw::c_void;
use std::path::Path;
use std::sync::Mutex;

/// A raw pointer that may cross into a scheduler task.
///
/// Safe to send only because the host loop waits on the frame barrier before
/// the pointee is touched again or dropped.
struct SendPtr<T>(*mut T);

unsafe impl<T> Send for SendPtr<T> {}

/// One spawned system: its zero-initialized userdata plus the three
/// lifecycle callbacks copied out of the module's `SystemInfo`.
pub(crate) struct SystemRecord {
    userdata: Box<[u8]>,
    init: SystemInitializer,
    process: SystemProcessor,
    finalize: SystemFinalizer,
    initialized: bool,
}

impl SystemRecord {
    pub(crate) fn new(info: &SystemInfo) -> SystemRecord {
        SystemRecord {
            userdata: vec![0u8; info.size as usize].into_boxed_slice(),
            init: info.init,
            process: info.process,
            finalize: info.finalize,
            initialized: false,
        }
    }

    fn userdata_ptr(&mut self) -> *mut c_void {
        self.userdata.as_mut_ptr() as *mut c_void
    }
}

lazy_static! {
    /// Systems spawned by the module currently running `OnaInit`; drained
    /// into that module's record once its initializer returns.
    static ref PENDING_SYSTEMS: Mutex<Vec<SystemRecord>> = Mutex::new(Vec::new());
}

pub(crate) fn push_pending_system(record: SystemRecord) {
    PENDING_SYSTEMS.lock().unwrap().push(record);
}

pub(crate) fn take_pending_systems() -> Vec<SystemRecord> {
    PENDING_SYSTEMS.lock().unwrap().split_off(0)
}

/// All loaded modules and their systems, in load order.
pub struct SystemRuntime {
    modules: Vec<Module>,
}

impl SystemRuntime {
    /// Discovers and loads every module under `directory`. Failed modules
    /// are skipped with a log line; modules are independent.
    pub fn load(directory: &Path) -> SystemRuntime {
        SystemRuntime {
            modules: loader::load_modules(directory),
        }
    }

    pub fn system_count(&self) -> usize {
        self.modules.iter().map(|module| module.systems.len()).sum()
    }

    /// Runs every system's `init` once, in spawn order. Call before the
    /// first frame, on the main thread.
    pub fn initialize(&mut self) {
        let ona = context::context() as *const OnaContext;

        for module in &mut self.modules {
            for system in &mut module.systems {
                if let Some(init) = system.init {
                    unsafe { init(system.userdata_ptr(), ona) };
                }

                system.initialized = true;
            }
        }
    }

    /// Submits every system's `process` for this frame to `scheduler`, in
    /// spawn order.
    ///
    /// The caller must reach `scheduler.wait()` before `events` goes out of
    /// scope or the runtime is used again; the submitted tasks hold raw
    /// pointers into both.
    pub fn process_frame(&mut self, scheduler: &TaskScheduler, events: &OnaEvents) {
        let ona = context::context() as *const OnaContext;

        for module in &mut self.modules {
            for system in &mut module.systems {
                if let Some(process) = system.process {
                    let userdata = SendPtr(system.userdata_ptr());
                    let ona = SendPtr(ona as *mut OnaContext);
                    let events = SendPtr(events as *const OnaEvents as *mut OnaEvents);

                    scheduler.execute(move || unsafe {
                        process(userdata.0, ona.0, events.0);
                    });
                }
            }
        }
    }

    /// Runs `finalize` for every system whose init pass completed, releases
    /// system userdata, invokes each module's `OnaExit` and closes the
    /// libraries.
    pub fn finalize(&mut self) {
        let ona = context::context();

        for module in &mut self.modules {
            for system in &mut module.systems {
                if !system.initialized {
                    continue;
                }

                if let Some(finalize) = system.finalize {
                    unsafe { finalize(system.userdata_ptr(), ona) };
                }
            }

            module.systems.clear();
            module.call_exit(ona);
        }

        self.modules.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[repr(C)]
    struct CounterSystem {
        process_calls: u32,
    }

    static INIT_CALLS: AtomicUsize = AtomicUsize::new(0);
    static PROCESS_CALLS: AtomicUsize = AtomicUsize::new(0);
    static FINALIZE_CALLS: AtomicUsize = AtomicUsize::new(0);

    lazy_static! {
        static ref SEEN_USERDATA: Mutex<Vec<usize>> = Mutex::new(Vec::new());
    }

    unsafe extern "C" fn record_init(userdata: *mut c_void, _ona: *const OnaContext) {
        SEEN_USERDATA.lock().unwrap().push(userdata as usize);
        INIT_CALLS.fetch_add(1, Ordering::SeqCst);
    }

    unsafe extern "C" fn record_process(
        userdata: *mut c_void,
        _ona: *const OnaContext,
        events: *const OnaEvents,
    ) {
        assert!(!events.is_null());
        assert!((*events).delta_time >= 0.0);

        let system = &mut *(userdata as *mut CounterSystem);
        system.process_calls += 1;

        SEEN_USERDATA.lock().unwrap().push(userdata as usize);
        PROCESS_CALLS.fetch_add(1, Ordering::SeqCst);
    }

    unsafe extern "C" fn record_finalize(userdata: *mut c_void, _ona: *const OnaContext) {
        let system = &*(userdata as *const CounterSystem);
        assert_eq!(system.process_calls, 3);

        SEEN_USERDATA.lock().unwrap().push(userdata as usize);
        FINALIZE_CALLS.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn lifecycle_runs_init_process_finalize_in_order() {
        let info = SystemInfo {
            size: mem::size_of::<CounterSystem>() as u32,
            init: Some(record_init),
            process: Some(record_process),
            finalize: Some(record_finalize),
        };

        assert!(unsafe { (context::context().spawnSystem)(&info) });

        let mut runtime = SystemRuntime {
            modules: vec![Module::with_systems(take_pending_systems())],
        };

        assert_eq!(runtime.system_count(), 1);

        let scheduler = TaskScheduler::new(0.25);
        let events = OnaEvents::default();

        runtime.initialize();

        for _ in 0..3 {
            runtime.process_frame(&scheduler, &events);
            scheduler.wait();
        }

        runtime.finalize();

        assert_eq!(INIT_CALLS.load(Ordering::SeqCst), 1);
        assert_eq!(PROCESS_CALLS.load(Ordering::SeqCst), 3);
        assert_eq!(FINALIZE_CALLS.load(Ordering::SeqCst), 1);

        // Same userdata pointer across the whole lifecycle.
        let seen = SEEN_USERDATA.lock().unwrap();
        assert_eq!(seen.len(), 5);
        assert!(seen.iter().all(|&pointer| pointer == seen[0]));
    }

    #[test]
    fn null_descriptor_is_rejected() {
        assert!(!unsafe { (context::context().spawnSystem)(std::ptr::null()) });
    }

    #[test]
    fn finalize_skips_systems_missed_by_the_init_pass() {
        static LATE_FINALIZE_CALLS: AtomicUsize = AtomicUsize::new(0);

        unsafe extern "C" fn late_finalize(_userdata: *mut c_void, _ona: *const OnaContext) {
            LATE_FINALIZE_CALLS.fetch_add(1, Ordering::SeqCst);
        }

        let info = SystemInfo {
            size: 4,
            init: None,
            process: None,
            finalize: Some(late_finalize),
        };

        let mut runtime = SystemRuntime {
            modules: vec![Module::with_systems(vec![SystemRecord::new(&info)])],
        };

        // No initialize() pass: the system was never initialized, so its
        // finalizer must not run.
        runtime.finalize();
        assert_eq!(LATE_FINALIZE_CALLS.load(Ordering::SeqCst), 0);
    }
}
